pub mod contexts;
pub mod facts;
pub mod units;

use chrono::NaiveDate;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};

use crate::parsing::DocTree;
use crate::types::{
    Context, Diagnostic, DiagnosticKind, ExtractionResult, FilingMetadata, FormatProfile, Period,
    Provenance,
};

/// Walk a parsed tree into an ExtractionResult using the profile's strategy
/// ordering and the caller's fiscal metadata.
pub fn extract(tree: &DocTree, profile: &FormatProfile, meta: &FilingMetadata) -> ExtractionResult {
    let mut diagnostics = Vec::new();

    let raw_contexts = contexts::locate(tree, &profile.strategy_order, &mut diagnostics);
    let unit_list = units::extract_units(tree);

    // Declared contexts, synthesizing a fiscal-year duration where the
    // document associates no period with an id
    let mut context_positions = Vec::new();
    let mut context_list = Vec::new();
    for raw in raw_contexts {
        context_positions.push((raw.node, raw.id.clone()));
        match raw.period {
            Some(period) => context_list.push(Context {
                id: raw.id,
                period,
                dimensions: raw.dimensions,
                provenance: Provenance::Declared,
            }),
            None => match synthetic_period(meta) {
                Some(period) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::MissingPeriod,
                        format!("synthesized fiscal-year period for context {}", raw.id),
                    ));
                    context_list.push(Context {
                        id: raw.id,
                        period,
                        dimensions: raw.dimensions,
                        provenance: Provenance::Synthetic,
                    });
                }
                None => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::MissingPeriod,
                        format!(
                            "context {} has no period and no fiscal metadata to anchor one",
                            raw.id
                        ),
                    ));
                }
            },
        }
    }

    let unit_index: HashMap<String, String> = unit_list
        .iter()
        .map(|u| (u.id.clone(), u.measure.to_string()))
        .collect();

    let mut fact_list = facts::explicit_facts(tree, &unit_index, &mut diagnostics);
    if fact_list.is_empty() {
        // No context-reference attributes anywhere: fall back to the leaf
        // walk, synthesizing an anchor context if the document declared none
        if context_list.is_empty() {
            if let Some((context, position)) = anchor_context(meta) {
                context_positions.push(position);
                context_list.push(context);
            }
        }
        fact_list = facts::leaf_facts(tree, &context_positions, &mut diagnostics);
    }

    // Referential integrity: a fact either resolves to a context in this
    // result or is discarded with a diagnostic, never left dangling
    let known: HashSet<&str> = context_list.iter().map(|c| c.id.as_str()).collect();
    let (resolved, dangling): (Vec<_>, Vec<_>) = fact_list
        .into_iter()
        .partition(|f| known.contains(f.context_ref.as_str()));
    for fact in &dangling {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DanglingContextRef,
            format!(
                "discarded {}:{} referencing unknown context {}",
                fact.prefix, fact.name, fact.context_ref
            ),
        ));
    }

    let success = !resolved.is_empty();
    if !success {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::NoFactsExtracted,
            "strict walk and leaf fallback both yielded nothing",
        ));
    }

    log::debug!(
        "extracted {} facts, {} contexts, {} units ({} dangling)",
        resolved.len(),
        context_list.len(),
        unit_list.len(),
        dangling.len()
    );

    ExtractionResult {
        contexts: context_list,
        units: unit_list,
        facts: resolved,
        diagnostics,
        success,
        dialect: None,
    }
}

fn synthetic_period(meta: &FilingMetadata) -> Option<Period> {
    let year = meta.anchor_year()?;
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
    Some(Period::Duration {
        start: start.to_string(),
        end: end.to_string(),
    })
}

/// A synthetic context for the leaf fallback when the document declares no
/// contexts at all. Anchored on caller-supplied fiscal metadata, never
/// invented from nothing.
fn anchor_context(meta: &FilingMetadata) -> Option<(Context, (usize, String))> {
    let year = meta.anchor_year()?;
    let period = synthetic_period(meta)?;
    let id = format!("fy{}", year);
    let context = Context {
        id: id.clone(),
        period,
        dimensions: Vec::new(),
        provenance: Provenance::Synthetic,
    };
    Some((context, (0, id)))
}

/// Context ids referenced by facts, in first-reference order. Useful for
/// downstream formatters that render facts grouped by context.
pub fn referenced_contexts(result: &ExtractionResult) -> Vec<String> {
    result
        .facts
        .iter()
        .map(|f| f.context_ref.clone())
        .unique()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::{html, xml};
    use crate::types::Provenance;

    #[test]
    fn test_single_context_single_fact_instance() {
        let tree = xml::parse_instance(
            r#"<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:us-gaap="urn:gaap">
                <xbrli:context id="c1">
                    <xbrli:entity><xbrli:identifier scheme="cik">0000320193</xbrli:identifier></xbrli:entity>
                    <xbrli:period><xbrli:instant>2023-12-31</xbrli:instant></xbrli:period>
                </xbrli:context>
                <xbrli:unit id="usd"><xbrli:measure>iso4217:USD</xbrli:measure></xbrli:unit>
                <us-gaap:Assets contextRef="c1" unitRef="usd" decimals="-3">352583000</us-gaap:Assets>
            </xbrli:xbrl>"#,
        )
        .unwrap();

        let result = extract(
            &tree,
            &FormatProfile::default(),
            &FilingMetadata::for_ticker("AAPL"),
        );

        assert!(result.success);
        assert_eq!(result.contexts.len(), 1);
        assert_eq!(result.facts.len(), 1);
        assert_eq!(result.units.len(), 1);
        assert_eq!(
            result.contexts[0].period,
            Period::Instant {
                date: "2023-12-31".to_string()
            }
        );
        assert_eq!(result.facts[0].context_ref, "c1");
        assert!(result.context("c1").is_some());
    }

    #[test]
    fn test_periodless_contexts_are_synthesized_from_fiscal_year() {
        let tree = html::parse_inline(
            r#"<html><body>
                <xbrli:context id="c1"><xbrli:entity>0000320193</xbrli:entity></xbrli:context>
                <xbrli:context id="c2"><xbrli:entity>0000320193</xbrli:entity></xbrli:context>
                <ix:nonFraction name="us-gaap:Revenues" contextRef="c1">118,209</ix:nonFraction>
                <ix:nonFraction name="us-gaap:NetIncomeLoss" contextRef="c2">29,998</ix:nonFraction>
            </body></html>"#,
        );

        let meta = FilingMetadata {
            fiscal_year: Some(2023),
            ..FilingMetadata::for_ticker("ACME")
        };
        let result = extract(&tree, &FormatProfile::default(), &meta);

        assert!(result.success);
        assert_eq!(result.contexts.len(), 2);
        for context in &result.contexts {
            assert_eq!(context.provenance, Provenance::Synthetic);
            assert_eq!(
                context.period,
                Period::Duration {
                    start: "2023-01-01".to_string(),
                    end: "2023-12-31".to_string()
                }
            );
        }
        assert_eq!(result.facts.len(), 2);
        assert_eq!(referenced_contexts(&result), vec!["c1", "c2"]);
    }

    #[test]
    fn test_leaf_fallback_yields_inferred_success() {
        let tree = html::parse_inline(
            r#"<html><body><p>Revenue was <b>$5,000</b> in fiscal 2023</p></body></html>"#,
        );

        let meta = FilingMetadata {
            fiscal_year: Some(2023),
            ..FilingMetadata::for_ticker("ACME")
        };
        let result = extract(&tree, &FormatProfile::default(), &meta);

        assert!(result.success);
        assert!(result.facts.iter().all(|f| f.inferred));
        assert_eq!(result.contexts.len(), 1);
        assert_eq!(result.contexts[0].provenance, Provenance::Synthetic);
        // Every inferred fact still resolves
        for fact in &result.facts {
            assert!(result.context(&fact.context_ref).is_some());
        }
    }

    #[test]
    fn test_dangling_references_are_discarded_with_diagnostic() {
        let tree = xml::parse_instance(
            r#"<xbrl xmlns="urn:x" xmlns:us-gaap="urn:gaap">
                <us-gaap:Assets contextRef="missing">352583000</us-gaap:Assets>
            </xbrl>"#,
        )
        .unwrap();

        let result = extract(
            &tree,
            &FormatProfile::default(),
            &FilingMetadata::for_ticker("ACME"),
        );

        assert!(!result.success);
        assert!(result.facts.is_empty());
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::DanglingContextRef));
    }
}
