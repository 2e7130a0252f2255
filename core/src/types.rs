//! Shared value types for alarms and composite alarms

use serde::{Deserialize, Serialize};

use crate::{Result, VigilError};

/// Comparison operators accepted by the alarm backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ComparisonOperator {
    GreaterThanOrEqualToThreshold,
    GreaterThanThreshold,
    GreaterThanUpperThreshold,
    LessThanOrEqualToThreshold,
    LessThanThreshold,
    LessThanLowerThreshold,
    LessThanLowerOrGreaterThanUpperThreshold,
    Equals,
}

impl ComparisonOperator {
    /// Get the operator name as the backend spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThanOrEqualToThreshold => "GreaterThanOrEqualToThreshold",
            ComparisonOperator::GreaterThanThreshold => "GreaterThanThreshold",
            ComparisonOperator::GreaterThanUpperThreshold => "GreaterThanUpperThreshold",
            ComparisonOperator::LessThanOrEqualToThreshold => "LessThanOrEqualToThreshold",
            ComparisonOperator::LessThanThreshold => "LessThanThreshold",
            ComparisonOperator::LessThanLowerThreshold => "LessThanLowerThreshold",
            ComparisonOperator::LessThanLowerOrGreaterThanUpperThreshold => {
                "LessThanLowerOrGreaterThanUpperThreshold"
            }
            ComparisonOperator::Equals => "Equals",
        }
    }

    /// Get the operator as a short symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThanOrEqualToThreshold => ">=",
            ComparisonOperator::GreaterThanThreshold => ">",
            ComparisonOperator::GreaterThanUpperThreshold => ">",
            ComparisonOperator::LessThanOrEqualToThreshold => "<=",
            ComparisonOperator::LessThanThreshold => "<",
            ComparisonOperator::LessThanLowerThreshold => "<",
            ComparisonOperator::LessThanLowerOrGreaterThanUpperThreshold => "<>",
            ComparisonOperator::Equals => "==",
        }
    }

    /// Human-readable phrase used in alarm descriptions
    pub fn phrase(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThanOrEqualToThreshold => "is greater than or equal to",
            ComparisonOperator::GreaterThanThreshold => "is greater than",
            ComparisonOperator::GreaterThanUpperThreshold => "is above the upper band of",
            ComparisonOperator::LessThanOrEqualToThreshold => "is less than or equal to",
            ComparisonOperator::LessThanThreshold => "is less than",
            ComparisonOperator::LessThanLowerThreshold => "is below the lower band of",
            ComparisonOperator::LessThanLowerOrGreaterThanUpperThreshold => "is outside the band of",
            ComparisonOperator::Equals => "is equal to",
        }
    }

    /// Whether the alarming range lies above the threshold
    pub fn is_greater_than(&self) -> bool {
        matches!(
            self,
            ComparisonOperator::GreaterThanOrEqualToThreshold
                | ComparisonOperator::GreaterThanThreshold
                | ComparisonOperator::GreaterThanUpperThreshold
        )
    }

    /// Whether the alarming range lies below the threshold
    pub fn is_less_than(&self) -> bool {
        matches!(
            self,
            ComparisonOperator::LessThanOrEqualToThreshold
                | ComparisonOperator::LessThanThreshold
                | ComparisonOperator::LessThanLowerThreshold
        )
    }

    /// Whether the operator compares against an anomaly detection band
    pub fn is_band(&self) -> bool {
        matches!(
            self,
            ComparisonOperator::GreaterThanUpperThreshold
                | ComparisonOperator::LessThanLowerThreshold
                | ComparisonOperator::LessThanLowerOrGreaterThanUpperThreshold
        )
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ComparisonOperator {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GreaterThanOrEqualToThreshold" | ">=" => Ok(ComparisonOperator::GreaterThanOrEqualToThreshold),
            "GreaterThanThreshold" | ">" => Ok(ComparisonOperator::GreaterThanThreshold),
            "GreaterThanUpperThreshold" => Ok(ComparisonOperator::GreaterThanUpperThreshold),
            "LessThanOrEqualToThreshold" | "<=" => Ok(ComparisonOperator::LessThanOrEqualToThreshold),
            "LessThanThreshold" | "<" => Ok(ComparisonOperator::LessThanThreshold),
            "LessThanLowerThreshold" => Ok(ComparisonOperator::LessThanLowerThreshold),
            "LessThanLowerOrGreaterThanUpperThreshold" => {
                Ok(ComparisonOperator::LessThanLowerOrGreaterThanUpperThreshold)
            }
            "Equals" | "==" => Ok(ComparisonOperator::Equals),
            _ => Err(VigilError::invalid_threshold(
                "<unknown>".to_string(),
                format!("unknown comparison operator: {}", s),
            )),
        }
    }
}

/// Behaviour when metric data is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatMissingData {
    Breaching,
    NotBreaching,
    Ignore,
    #[default]
    Missing,
}

/// Logical operator joining the operands of a composite alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompositeOperator {
    /// Trigger only if all the alarms are triggered
    And,

    /// Trigger if any of the alarms is triggered
    #[default]
    Or,
}

impl CompositeOperator {
    /// Get the operator as it appears in an alarm rule
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositeOperator::And => "AND",
            CompositeOperator::Or => "OR",
        }
    }
}

/// Severity derived from the commonly used disambiguators
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Other,
    Warning,
    Critical,
}

impl Severity {
    /// Derive severity from an alarm disambiguator ("Warning", "Critical", ...)
    pub fn from_disambiguator(disambiguator: Option<&str>) -> Self {
        match disambiguator.map(str::to_lowercase).as_deref() {
            Some("critical") => Severity::Critical,
            Some("warning") => Severity::Warning,
            _ => Severity::Other,
        }
    }
}
