use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    InstanceXml,
    InlineHtml,
}

impl Dialect {
    pub fn other(self) -> Dialect {
        match self {
            Dialect::InstanceXml => Dialect::InlineHtml,
            Dialect::InlineHtml => Dialect::InstanceXml,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Instant { date: String },
    Duration { start: String, end: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Declared,
    Synthetic,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub axis_prefix: String,
    pub axis_name: String,
    pub member_prefix: String,
    pub member_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
    pub period: Period,
    pub dimensions: Vec<Dimension>,
    pub provenance: Provenance,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    Single(String),
    Ratio { numerator: String, denominator: String },
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Measure::Single(value) => write!(f, "{}", value),
            Measure::Ratio {
                numerator,
                denominator,
            } => write!(f, "{}/{}", numerator, denominator),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub measure: Measure,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub prefix: String,
    pub name: String,
    pub value: String,
    pub formatted_value: String,
    pub decimals: Option<String>,
    pub context_ref: String,
    pub unit_ref: Option<String>,
    pub inferred: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    MalformedDocument,
    DanglingContextRef,
    MissingPeriod,
    SkippedElement,
    StrategyEscalation,
    InferredFacts,
    DialectFallback,
    NoFactsExtracted,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub contexts: Vec<Context>,
    pub units: Vec<Unit>,
    pub facts: Vec<Fact>,
    pub diagnostics: Vec<Diagnostic>,
    pub success: bool,
    pub dialect: Option<Dialect>,
}

impl ExtractionResult {
    pub fn failed(dialect: Option<Dialect>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            contexts: Vec::new(),
            units: Vec::new(),
            facts: Vec::new(),
            diagnostics,
            success: false,
            dialect,
        }
    }

    pub fn context(&self, id: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.id == id)
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }
}

/// Caller-supplied filing metadata. Used for strategy ordering and for
/// anchoring synthetic contexts, never to override extracted data.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilingMetadata {
    pub ticker: String,
    pub filing_type: Option<String>,
    pub filing_date: Option<NaiveDate>,
    pub fiscal_year: Option<i32>,
    pub fiscal_period: Option<String>,
    pub source_name: Option<String>,
}

impl FilingMetadata {
    pub fn for_ticker(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            ..Default::default()
        }
    }

    /// The year synthetic contexts anchor on. Fiscal year when supplied,
    /// else the filing-date year.
    pub fn anchor_year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.fiscal_year
            .or_else(|| self.filing_date.map(|d| d.year()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatProfile {
    pub preferred_dialect: Option<Dialect>,
    pub success_counts: BTreeMap<String, u64>,
    pub strategy_order: Vec<String>,
}

impl Default for FormatProfile {
    fn default() -> Self {
        Self {
            preferred_dialect: None,
            success_counts: BTreeMap::new(),
            strategy_order: crate::extract::contexts::default_strategy_order(),
        }
    }
}
