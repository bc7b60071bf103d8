// assay-core/src/domain/aggregation/mod.rs

pub mod distinct;

pub use distinct::{Group, Grouping, partition, representatives};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::data::Value;
use crate::domain::error::DomainError;

const DISTINCT_PREFIX: &str = "DISTINCT_GROUP_";

/// Scalar aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Count => "COUNT",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }

    /// Applies the function to a scope of values.
    ///
    /// `COUNT` counts non-null values. The other functions ignore nulls and
    /// return `Null` when nothing numeric is left; a non-null, non-numeric
    /// value is a type mismatch.
    pub fn apply<'a, I>(self, values: I) -> Result<Value, DomainError>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        if self == Self::Count {
            let count = values.into_iter().filter(|v| !v.is_null()).count();
            return Ok(Value::Number(count as f64));
        }

        let mut numbers = Vec::new();
        for value in values {
            if value.is_null() {
                continue;
            }
            match value.as_number() {
                Some(n) => numbers.push(n),
                None => {
                    return Err(DomainError::type_mismatch(format!(
                        "{} expects numeric values, found {} {}",
                        self.as_str(),
                        value.type_name(),
                        value.describe()
                    )));
                }
            }
        }

        if numbers.is_empty() {
            return Ok(Value::Null);
        }

        let result = match self {
            Self::Sum => numbers.iter().sum::<f64>(),
            Self::Avg => numbers.iter().sum::<f64>() / numbers.len() as f64,
            Self::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Count => numbers.len() as f64,
        };
        Ok(Value::Number(result))
    }
}

impl FromStr for AggregateFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SUM" => Ok(Self::Sum),
            "AVG" | "AVERAGE" => Ok(Self::Avg),
            "COUNT" => Ok(Self::Count),
            "MIN" => Ok(Self::Min),
            "MAX" => Ok(Self::Max),
            _ => Err(format!("Unknown aggregate function: {}", s)),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An aggregate function, either plain or applied per distinct group
/// (`SUM` vs `DISTINCT_GROUP_SUM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AggregationFunction {
    pub function: AggregateFunction,
    pub distinct_group: bool,
}

impl AggregationFunction {
    pub fn plain(function: AggregateFunction) -> Self {
        Self {
            function,
            distinct_group: false,
        }
    }

    pub fn distinct_group(function: AggregateFunction) -> Self {
        Self {
            function,
            distinct_group: true,
        }
    }
}

impl FromStr for AggregationFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        match upper.strip_prefix(DISTINCT_PREFIX) {
            Some(base) => base.parse().map(Self::distinct_group),
            None => upper.parse().map(Self::plain),
        }
    }
}

impl TryFrom<String> for AggregationFunction {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AggregationFunction> for String {
    fn from(f: AggregationFunction) -> Self {
        f.to_string()
    }
}

impl fmt::Display for AggregationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.distinct_group {
            write!(f, "{}{}", DISTINCT_PREFIX, self.function)
        } else {
            write!(f, "{}", self.function)
        }
    }
}

/// Quorum turning per-group verdicts into one rule-level verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultHandling {
    #[default]
    All,
    Any,
    Majority,
}

impl ResultHandling {
    /// ALL: every group passes (vacuously true without groups).
    /// ANY: at least one group passes. MAJORITY: strictly more than half pass.
    pub fn resolve(self, verdicts: &[bool]) -> bool {
        let passed = verdicts.iter().filter(|v| **v).count();
        match self {
            Self::All => passed == verdicts.len(),
            Self::Any => passed > 0,
            Self::Majority => passed * 2 > verdicts.len(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Any => "ANY",
            Self::Majority => "MAJORITY",
        }
    }
}

/// Declarative aggregation attached to a formula rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationConfig {
    pub function: AggregationFunction,
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub group_columns: Vec<String>,
    #[serde(default)]
    pub distinct_column: String,
    #[serde(default)]
    pub result_handling: ResultHandling,
}
