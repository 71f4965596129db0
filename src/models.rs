use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// One of the two 9-box grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Performance,
    Potential,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Performance, Axis::Potential];

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::Performance => "performance",
            Axis::Potential => "potential",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributesTo {
    Performance,
    Potential,
    Both,
}

impl ContributesTo {
    pub fn as_str(self) -> &'static str {
        match self {
            ContributesTo::Performance => "performance",
            ContributesTo::Potential => "potential",
            ContributesTo::Both => "both",
        }
    }

    /// True when a signal mapped this way feeds the given axis.
    pub fn applies_to(self, axis: Axis) -> bool {
        matches!(
            (self, axis),
            (ContributesTo::Both, _)
                | (ContributesTo::Performance, Axis::Performance)
                | (ContributesTo::Potential, Axis::Potential)
        )
    }
}

impl FromStr for ContributesTo {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "performance" => Ok(ContributesTo::Performance),
            "potential" => Ok(ContributesTo::Potential),
            "both" => Ok(ContributesTo::Both),
            _ => Err(ParseEnumError::new("contributes_to", value)),
        }
    }
}

impl fmt::Display for ContributesTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiasRiskLevel {
    Low,
    Medium,
    High,
}

impl BiasRiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            BiasRiskLevel::Low => "low",
            BiasRiskLevel::Medium => "medium",
            BiasRiskLevel::High => "high",
        }
    }

    /// Parses an optional stored value. Missing or blank means unset.
    pub fn parse_optional(value: Option<&str>) -> Result<Option<Self>, ParseEnumError> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => text.parse().map(Some),
        }
    }
}

impl FromStr for BiasRiskLevel {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(BiasRiskLevel::Low),
            "medium" => Ok(BiasRiskLevel::Medium),
            "high" => Ok(BiasRiskLevel::High),
            _ => Err(ParseEnumError::new("bias_risk_level", value)),
        }
    }
}

impl fmt::Display for BiasRiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal category. The known set is closed; companies may add their own,
/// which are carried as `Custom` and only resolve through custom mappings
/// or an overridden default table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalCategory {
    Leadership,
    PeopleLeadership,
    StrategicThinking,
    Influence,
    Adaptability,
    Technical,
    CustomerFocus,
    Teamwork,
    Values,
    General,
    Custom(String),
}

impl SignalCategory {
    pub fn as_str(&self) -> &str {
        match self {
            SignalCategory::Leadership => "leadership",
            SignalCategory::PeopleLeadership => "people_leadership",
            SignalCategory::StrategicThinking => "strategic_thinking",
            SignalCategory::Influence => "influence",
            SignalCategory::Adaptability => "adaptability",
            SignalCategory::Technical => "technical",
            SignalCategory::CustomerFocus => "customer_focus",
            SignalCategory::Teamwork => "teamwork",
            SignalCategory::Values => "values",
            SignalCategory::General => "general",
            SignalCategory::Custom(name) => name,
        }
    }
}

impl From<&str> for SignalCategory {
    fn from(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "leadership" => SignalCategory::Leadership,
            "people_leadership" => SignalCategory::PeopleLeadership,
            "strategic_thinking" => SignalCategory::StrategicThinking,
            "influence" => SignalCategory::Influence,
            "adaptability" => SignalCategory::Adaptability,
            "technical" => SignalCategory::Technical,
            "customer_focus" => SignalCategory::CustomerFocus,
            "teamwork" => SignalCategory::Teamwork,
            "values" => SignalCategory::Values,
            "general" => SignalCategory::General,
            _ => SignalCategory::Custom(normalized),
        }
    }
}

impl From<String> for SignalCategory {
    fn from(value: String) -> Self {
        SignalCategory::from(value.as_str())
    }
}

impl From<SignalCategory> for String {
    fn from(value: SignalCategory) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SignalDefinition {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub category: SignalCategory,
    pub is_active: bool,
}

/// A current observation of one definition for one employee, as handed to
/// the engine by the data-access layer.
#[derive(Debug, Clone)]
pub struct SignalSnapshot {
    pub employee_id: Uuid,
    pub signal_definition_id: Uuid,
    pub signal_name: String,
    pub category: SignalCategory,
    pub normalized_score: f64,
    pub confidence_score: f64,
    pub bias_risk_level: Option<BiasRiskLevel>,
    pub captured_at: DateTime<Utc>,
    pub is_current: bool,
}

#[derive(Debug, Clone)]
pub struct SignalAxisMapping {
    pub company_id: Uuid,
    pub signal_definition_id: Uuid,
    pub contributes_to: ContributesTo,
    pub weight: f64,
    pub minimum_confidence: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingSource {
    Custom,
    Default,
}

impl MappingSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingSource::Custom => "custom",
            MappingSource::Default => "default",
        }
    }
}

/// The mapping that actually applies to a signal after resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveMapping {
    pub contributes_to: ContributesTo,
    pub weight: f64,
    pub minimum_confidence: f64,
    pub source: MappingSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalContribution {
    pub signal_name: String,
    pub adjusted_score: f64,
    pub weight: f64,
    pub confidence: f64,
    pub bias_risk_level: Option<BiasRiskLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedAxisScore {
    pub axis: Axis,
    pub composite_score: f64,
    pub composite_confidence: f64,
    pub signal_count: usize,
    pub breakdown: Vec<SignalContribution>,
}

/// `None` on an axis means insufficient data, never a score of zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisScores {
    pub performance: Option<AggregatedAxisScore>,
    pub potential: Option<AggregatedAxisScore>,
}

impl AxisScores {
    pub fn get(&self, axis: Axis) -> Option<&AggregatedAxisScore> {
        match axis {
            Axis::Performance => self.performance.as_ref(),
            Axis::Potential => self.potential.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmployeeRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_applies_to_every_axis() {
        for axis in Axis::ALL {
            assert!(ContributesTo::Both.applies_to(axis));
        }
        assert!(ContributesTo::Performance.applies_to(Axis::Performance));
        assert!(!ContributesTo::Performance.applies_to(Axis::Potential));
        assert!(!ContributesTo::Potential.applies_to(Axis::Performance));
    }

    #[test]
    fn parses_stored_enum_text() {
        assert_eq!("Both".parse::<ContributesTo>(), Ok(ContributesTo::Both));
        assert_eq!(" high ".parse::<BiasRiskLevel>(), Ok(BiasRiskLevel::High));
        assert!("sideways".parse::<ContributesTo>().is_err());
        assert_eq!(BiasRiskLevel::parse_optional(None), Ok(None));
        assert_eq!(BiasRiskLevel::parse_optional(Some("")), Ok(None));
        assert_eq!(
            BiasRiskLevel::parse_optional(Some("medium")),
            Ok(Some(BiasRiskLevel::Medium))
        );
    }

    #[test]
    fn unknown_categories_are_kept_as_custom() {
        assert_eq!(
            SignalCategory::from("Strategic_Thinking"),
            SignalCategory::StrategicThinking
        );
        let custom = SignalCategory::from("Innovation");
        assert_eq!(custom, SignalCategory::Custom("innovation".to_string()));
        assert_eq!(custom.as_str(), "innovation");
    }
}
