use chrono::NaiveDate;
use once_cell::sync::Lazy;

use crate::error::ParseError;
use crate::extract;
use crate::parsing;
use crate::registry::FormatDetector;
use crate::types::{
    Diagnostic, DiagnosticKind, Dialect, ExtractionResult, FilingMetadata, FormatProfile,
};

/// First phase-in date of the inline-XBRL filing mandate. Filings on or
/// after it try inline HTML first.
pub static INLINE_XBRL_MANDATE: Lazy<NaiveDate> =
    Lazy::new(|| NaiveDate::from_ymd_opt(2019, 6, 15).unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    SelectStrategy,
    TryPrimary,
    TryFallback,
    Done,
}

/// Runs the dialect cascade over one document: primary dialect, then the
/// other on structural failure, first success wins. No retries beyond the
/// two dialects.
pub struct Orchestrator {
    detector: FormatDetector,
}

impl Orchestrator {
    pub fn new(detector: FormatDetector) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &FormatDetector {
        &self.detector
    }

    pub fn extract_document(
        &self,
        bytes: &[u8],
        hint: Option<Dialect>,
        meta: &FilingMetadata,
    ) -> ExtractionResult {
        let source_name = meta.source_name.as_deref().unwrap_or("");
        let profile = self.detector.detect(source_name, &meta.ticker);

        let mut phase = Phase::SelectStrategy;
        let mut order = [Dialect::InstanceXml, Dialect::InlineHtml];
        let mut attempts: Vec<ExtractionResult> = Vec::new();

        loop {
            match phase {
                Phase::SelectStrategy => {
                    order = dialect_order(hint, &profile, meta);
                    log::debug!("trying {} then {}", order[0], order[1]);
                    phase = Phase::TryPrimary;
                }
                Phase::TryPrimary => {
                    let result = attempt(bytes, order[0], &profile, meta);
                    let done = result.success;
                    attempts.push(result);
                    phase = if done { Phase::Done } else { Phase::TryFallback };
                }
                Phase::TryFallback => {
                    let mut result = attempt(bytes, order[1], &profile, meta);
                    result.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::DialectFallback,
                        format!("dialect {} produced no facts, fell back to {}", order[0], order[1]),
                    ));
                    attempts.push(result);
                    phase = Phase::Done;
                }
                Phase::Done => break,
            }
        }

        // First success wins; otherwise the attempt with the most facts
        let mut winner: Option<ExtractionResult> = None;
        for result in attempts {
            let better = match &winner {
                None => true,
                Some(w) => result.facts.len() > w.facts.len(),
            };
            if better {
                winner = Some(result);
            }
        }
        let result = winner.expect("at least one attempt");

        if result.success {
            if let Some(dialect) = result.dialect {
                if let Err(e) = self.detector.learn(&meta.ticker, dialect) {
                    log::warn!("registry update failed for {}: {}", meta.ticker, e);
                }
            }
        }
        result
    }
}

/// Declared hint first, then a conclusive detector signature or issuer
/// history, then the filing-date rule against the mandate threshold.
fn dialect_order(
    hint: Option<Dialect>,
    profile: &FormatProfile,
    meta: &FilingMetadata,
) -> [Dialect; 2] {
    let primary = hint
        .or(profile.preferred_dialect)
        .unwrap_or_else(|| match meta.filing_date {
            Some(date) if date >= *INLINE_XBRL_MANDATE => Dialect::InlineHtml,
            _ => Dialect::InstanceXml,
        });
    [primary, primary.other()]
}

fn attempt(
    bytes: &[u8],
    dialect: Dialect,
    profile: &FormatProfile,
    meta: &FilingMetadata,
) -> ExtractionResult {
    match parsing::parse(bytes, dialect) {
        Ok(tree) => {
            let mut result = extract::extract(&tree, profile, meta);
            result.dialect = Some(dialect);
            result
        }
        Err(ParseError::MalformedDocument { reason, recovered }) => match recovered {
            Some(tree) => {
                let mut result = extract::extract(&tree, profile, meta);
                result.dialect = Some(dialect);
                result.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::MalformedDocument,
                    format!("recovered partial tree: {}", reason),
                ));
                result
            }
            None => {
                log::debug!("no tree recoverable as {}: {}", dialect, reason);
                ExtractionResult::failed(
                    Some(dialect),
                    vec![Diagnostic::new(DiagnosticKind::MalformedDocument, reason)],
                )
            }
        },
    }
}
