use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{
    ContributesTo, EffectiveMapping, MappingSource, SignalAxisMapping, SignalCategory,
    SignalDefinition,
};

pub const DEFAULT_MINIMUM_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    #[error("weight must be a finite number, got {0}")]
    NonFiniteWeight(f64),
    #[error("weight must not be negative, got {0}")]
    NegativeWeight(f64),
    #[error("minimum confidence must lie within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),
}

/// Rejects configurations the combiner does not re-check at aggregation time.
pub fn validate_mapping(weight: f64, minimum_confidence: f64) -> Result<(), MappingError> {
    if !weight.is_finite() {
        return Err(MappingError::NonFiniteWeight(weight));
    }
    if weight < 0.0 {
        return Err(MappingError::NegativeWeight(weight));
    }
    if !(0.0..=1.0).contains(&minimum_confidence) {
        return Err(MappingError::ConfidenceOutOfRange(minimum_confidence));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DefaultMappingEntry {
    pub category: SignalCategory,
    pub contributes_to: ContributesTo,
    pub weight: f64,
    /// Documentation only.
    #[serde(default)]
    pub rationale: String,
}

/// Category-keyed fallback mappings used when a company has no custom
/// mapping for a signal definition.
#[derive(Debug, Clone, Default)]
pub struct DefaultMappingTable {
    entries: HashMap<SignalCategory, DefaultMappingEntry>,
}

#[derive(Deserialize)]
struct DefaultMappingFile {
    entries: Vec<DefaultMappingEntry>,
}

impl DefaultMappingTable {
    pub fn new(entries: impl IntoIterator<Item = DefaultMappingEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.category.clone(), entry))
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        use ContributesTo::{Both, Performance, Potential};
        use SignalCategory as C;

        let rows = [
            (C::Leadership, Potential, 1.0, "Leadership capability predicts readiness for broader roles"),
            (C::PeopleLeadership, Potential, 1.0, "Developing others signals capacity to lead at scale"),
            (C::StrategicThinking, Potential, 1.0, "Strategic thinking is a leading indicator of growth"),
            (C::Influence, Potential, 0.8, "Influence without authority supports larger scope"),
            (C::Adaptability, Potential, 0.9, "Learning agility is the core of potential"),
            (C::Technical, Performance, 1.0, "Technical mastery shows in delivered results"),
            (C::CustomerFocus, Performance, 0.8, "Customer outcomes reflect current delivery"),
            (C::Teamwork, Both, 0.7, "Collaboration affects results today and scope tomorrow"),
            (C::Values, Both, 0.5, "Values alignment moderates both axes"),
            (C::General, Performance, 0.5, "General ratings mostly describe current performance"),
        ];

        Self::new(rows.into_iter().map(
            |(category, contributes_to, weight, rationale)| DefaultMappingEntry {
                category,
                contributes_to,
                weight,
                rationale: rationale.to_string(),
            },
        ))
    }

    /// Loads a replacement table from a JSON file of the form
    /// `{"entries": [{"category": ..., "contributes_to": ..., "weight": ...}]}`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read default mappings from {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("invalid default mappings in {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let file: DefaultMappingFile = serde_json::from_str(raw)?;
        for entry in &file.entries {
            validate_mapping(entry.weight, DEFAULT_MINIMUM_CONFIDENCE)
                .with_context(|| format!("category {}", entry.category))?;
        }
        Ok(Self::new(file.entries))
    }

    pub fn get(&self, category: &SignalCategory) -> Option<&DefaultMappingEntry> {
        self.entries.get(category)
    }

    /// Entries ordered by category name.
    pub fn entries(&self) -> Vec<&DefaultMappingEntry> {
        let mut entries: Vec<&DefaultMappingEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.category.as_str().cmp(b.category.as_str()));
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves the effective mapping for a signal: an active company mapping for
/// the exact definition wins, otherwise the category default applies.
#[derive(Debug, Clone)]
pub struct MappingResolver<'a> {
    custom: HashMap<Uuid, &'a SignalAxisMapping>,
    defaults: &'a DefaultMappingTable,
}

impl<'a> MappingResolver<'a> {
    pub fn new(custom_mappings: &'a [SignalAxisMapping], defaults: &'a DefaultMappingTable) -> Self {
        let custom = custom_mappings
            .iter()
            .filter(|mapping| mapping.is_active)
            .map(|mapping| (mapping.signal_definition_id, mapping))
            .collect();
        Self { custom, defaults }
    }

    /// `None` means the signal feeds no axis, which is a normal outcome.
    pub fn resolve(
        &self,
        signal_definition_id: Uuid,
        category: &SignalCategory,
    ) -> Option<EffectiveMapping> {
        if let Some(mapping) = self.custom.get(&signal_definition_id) {
            return Some(EffectiveMapping {
                contributes_to: mapping.contributes_to,
                weight: mapping.weight,
                minimum_confidence: mapping.minimum_confidence,
                source: MappingSource::Custom,
            });
        }

        self.defaults.get(category).map(|entry| EffectiveMapping {
            contributes_to: entry.contributes_to,
            weight: entry.weight,
            minimum_confidence: DEFAULT_MINIMUM_CONFIDENCE,
            source: MappingSource::Default,
        })
    }
}

/// Builds the company mapping rows that "initialize default mappings" inserts.
/// Duplicates against existing rows are left to the store's unique constraint.
pub fn plan_default_mappings(
    company_id: Uuid,
    definitions: &[SignalDefinition],
    defaults: &DefaultMappingTable,
) -> Vec<SignalAxisMapping> {
    definitions
        .iter()
        .filter(|definition| definition.is_active)
        .filter_map(|definition| {
            defaults
                .get(&definition.category)
                .map(|entry| SignalAxisMapping {
                    company_id,
                    signal_definition_id: definition.id,
                    contributes_to: entry.contributes_to,
                    weight: entry.weight,
                    minimum_confidence: DEFAULT_MINIMUM_CONFIDENCE,
                    is_active: true,
                })
        })
        .collect()
}
