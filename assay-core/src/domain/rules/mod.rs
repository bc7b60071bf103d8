// assay-core/src/domain/rules/mod.rs

pub mod dates;
pub mod dispatcher;
pub mod params;

pub use dispatcher::{CompiledRule, Outcome, RowVerdict};
pub use params::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::domain::condition::{Condition, CrossTableCondition};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Failure,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failure => "failure",
            Self::Warning => "warning",
        }
    }
}

/// Rule type tag, as written in rule documents (`ruleType`).
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RuleType {
    Required,
    NotNull,
    Range,
    Length,
    Regex,
    Email,
    Unique,
    Type,
    Enum,
    Dependency,
    CrossColumn,
    ColumnComparison,
    Lookup,
    Custom,
    Formula,
    DateBefore,
    DateAfter,
    DateBetween,
    DateFormat,
}

impl RuleType {
    pub const ALL: [RuleType; 19] = [
        Self::Required,
        Self::NotNull,
        Self::Range,
        Self::Length,
        Self::Regex,
        Self::Email,
        Self::Unique,
        Self::Type,
        Self::Enum,
        Self::Dependency,
        Self::CrossColumn,
        Self::ColumnComparison,
        Self::Lookup,
        Self::Custom,
        Self::Formula,
        Self::DateBefore,
        Self::DateAfter,
        Self::DateBetween,
        Self::DateFormat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::NotNull => "not-null",
            Self::Range => "range",
            Self::Length => "length",
            Self::Regex => "regex",
            Self::Email => "email",
            Self::Unique => "unique",
            Self::Type => "type",
            Self::Enum => "enum",
            Self::Dependency => "dependency",
            Self::CrossColumn => "cross-column",
            Self::ColumnComparison => "column-comparison",
            Self::Lookup => "lookup",
            Self::Custom => "custom",
            Self::Formula => "formula",
            Self::DateBefore => "date-before",
            Self::DateAfter => "date-after",
            Self::DateBetween => "date-between",
            Self::DateFormat => "date-format",
        }
    }
}

impl FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("Unknown rule type: {}", s))
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rule type together with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    Required,
    NotNull,
    Range(RangeParams),
    Length(LengthParams),
    Regex(RegexParams),
    Email,
    Unique,
    Type(TypeParams),
    Enum(EnumParams),
    Dependency(DependencyParams),
    CrossColumn(ColumnComparisonParams),
    ColumnComparison(ColumnComparisonParams),
    Lookup(LookupParams),
    Custom(CustomParams),
    Formula(FormulaParams),
    DateBefore(DateCompareParams),
    DateAfter(DateCompareParams),
    DateBetween(DateBetweenParams),
    DateFormat(DateFormatParams),
}

impl RuleKind {
    pub fn rule_type(&self) -> RuleType {
        match self {
            Self::Required => RuleType::Required,
            Self::NotNull => RuleType::NotNull,
            Self::Range(_) => RuleType::Range,
            Self::Length(_) => RuleType::Length,
            Self::Regex(_) => RuleType::Regex,
            Self::Email => RuleType::Email,
            Self::Unique => RuleType::Unique,
            Self::Type(_) => RuleType::Type,
            Self::Enum(_) => RuleType::Enum,
            Self::Dependency(_) => RuleType::Dependency,
            Self::CrossColumn(_) => RuleType::CrossColumn,
            Self::ColumnComparison(_) => RuleType::ColumnComparison,
            Self::Lookup(_) => RuleType::Lookup,
            Self::Custom(_) => RuleType::Custom,
            Self::Formula(_) => RuleType::Formula,
            Self::DateBefore(_) => RuleType::DateBefore,
            Self::DateAfter(_) => RuleType::DateAfter,
            Self::DateBetween(_) => RuleType::DateBetween,
            Self::DateFormat(_) => RuleType::DateFormat,
        }
    }

    /// Builds the typed variant from a tag and a raw parameter block.
    /// A missing block (`null`) means "all defaults".
    pub fn from_parts(
        rule_type: RuleType,
        parameters: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let parameters = match parameters {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other,
        };
        let p = parameters;
        Ok(match rule_type {
            RuleType::Required => Self::Required,
            RuleType::NotNull => Self::NotNull,
            RuleType::Email => Self::Email,
            RuleType::Unique => Self::Unique,
            RuleType::Range => Self::Range(serde_json::from_value(p)?),
            RuleType::Length => Self::Length(serde_json::from_value(p)?),
            RuleType::Regex => Self::Regex(serde_json::from_value(p)?),
            RuleType::Type => Self::Type(serde_json::from_value(p)?),
            RuleType::Enum => Self::Enum(serde_json::from_value(p)?),
            RuleType::Dependency => Self::Dependency(serde_json::from_value(p)?),
            RuleType::CrossColumn => Self::CrossColumn(serde_json::from_value(p)?),
            RuleType::ColumnComparison => Self::ColumnComparison(serde_json::from_value(p)?),
            RuleType::Lookup => Self::Lookup(serde_json::from_value(p)?),
            RuleType::Custom => Self::Custom(serde_json::from_value(p)?),
            RuleType::Formula => Self::Formula(serde_json::from_value(p)?),
            RuleType::DateBefore => Self::DateBefore(serde_json::from_value(p)?),
            RuleType::DateAfter => Self::DateAfter(serde_json::from_value(p)?),
            RuleType::DateBetween => Self::DateBetween(serde_json::from_value(p)?),
            RuleType::DateFormat => Self::DateFormat(serde_json::from_value(p)?),
        })
    }

    /// Parameter block for serialization; `None` for parameterless types.
    pub fn parameters(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
        let value = match self {
            Self::Required | Self::NotNull | Self::Email | Self::Unique => return Ok(None),
            Self::Range(p) => serde_json::to_value(p)?,
            Self::Length(p) => serde_json::to_value(p)?,
            Self::Regex(p) => serde_json::to_value(p)?,
            Self::Type(p) => serde_json::to_value(p)?,
            Self::Enum(p) => serde_json::to_value(p)?,
            Self::Dependency(p) => serde_json::to_value(p)?,
            Self::CrossColumn(p) | Self::ColumnComparison(p) => serde_json::to_value(p)?,
            Self::Lookup(p) => serde_json::to_value(p)?,
            Self::Custom(p) => serde_json::to_value(p)?,
            Self::Formula(p) => serde_json::to_value(p)?,
            Self::DateBefore(p) | Self::DateAfter(p) => serde_json::to_value(p)?,
            Self::DateBetween(p) => serde_json::to_value(p)?,
            Self::DateFormat(p) => serde_json::to_value(p)?,
        };
        Ok(Some(value))
    }
}

fn default_enabled() -> bool {
    true
}

// --- RULE DEFINITION ---

/// A declarative data-quality check bound to a table (and usually a column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(try_from = "RuleDocument", into = "RuleDocument")]
pub struct DataQualityRule {
    #[validate(length(min = 1, message = "Rule id cannot be empty"))]
    pub id: String,
    #[validate(length(min = 1, message = "Rule name cannot be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "Rule table cannot be empty"))]
    pub table: String,
    pub column: String,
    pub kind: RuleKind,
    pub additional_columns: Vec<String>,
    pub conditions: Vec<Condition>,
    pub cross_table_conditions: Vec<CrossTableCondition>,
    pub severity: Severity,
    pub enabled: bool,
    pub description: String,
}

impl DataQualityRule {
    /// A new enabled rule with failure severity and no extras.
    pub fn new(
        id: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        kind: RuleKind,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            table: table.into(),
            column: column.into(),
            kind,
            additional_columns: Vec::new(),
            conditions: Vec::new(),
            cross_table_conditions: Vec::new(),
            severity: Severity::default(),
            enabled: true,
            description: String::new(),
        }
    }

    pub fn rule_type(&self) -> RuleType {
        self.kind.rule_type()
    }
}

/// Wire shape of a rule document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleDocument {
    id: String,
    name: String,
    table: String,
    #[serde(default)]
    column: String,
    rule_type: RuleType,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    parameters: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    additional_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    cross_table_conditions: Vec<CrossTableCondition>,
    #[serde(default)]
    severity: Severity,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
}

impl TryFrom<RuleDocument> for DataQualityRule {
    type Error = String;

    fn try_from(doc: RuleDocument) -> Result<Self, Self::Error> {
        let kind = RuleKind::from_parts(doc.rule_type, doc.parameters).map_err(|e| {
            format!("invalid parameters for {} rule '{}': {}", doc.rule_type, doc.id, e)
        })?;
        Ok(Self {
            id: doc.id,
            name: doc.name,
            table: doc.table,
            column: doc.column,
            kind,
            additional_columns: doc.additional_columns,
            conditions: doc.conditions,
            cross_table_conditions: doc.cross_table_conditions,
            severity: doc.severity,
            enabled: doc.enabled,
            description: doc.description,
        })
    }
}

impl From<DataQualityRule> for RuleDocument {
    fn from(rule: DataQualityRule) -> Self {
        // Parameter structs only hold plain data, so this cannot fail in practice.
        let parameters = rule.kind.parameters().ok().flatten().unwrap_or_default();
        Self {
            id: rule.id,
            name: rule.name,
            table: rule.table,
            column: rule.column,
            rule_type: rule.kind.rule_type(),
            parameters,
            additional_columns: rule.additional_columns,
            conditions: rule.conditions,
            cross_table_conditions: rule.cross_table_conditions,
            severity: rule.severity,
            enabled: rule.enabled,
            description: rule.description,
        }
    }
}
