use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::mapping::MappingResolver;
use crate::models::{Axis, BiasRiskLevel, SignalContribution, SignalSnapshot};

pub const HIGH_BIAS_MULTIPLIER: f64 = 0.7;
pub const MEDIUM_BIAS_MULTIPLIER: f64 = 0.85;

pub fn bias_multiplier(level: Option<BiasRiskLevel>) -> f64 {
    match level {
        Some(BiasRiskLevel::High) => HIGH_BIAS_MULTIPLIER,
        Some(BiasRiskLevel::Medium) => MEDIUM_BIAS_MULTIPLIER,
        Some(BiasRiskLevel::Low) | None => 1.0,
    }
}

pub fn adjusted_score(normalized_score: f64, level: Option<BiasRiskLevel>) -> f64 {
    normalized_score * bias_multiplier(level)
}

/// Keeps one current snapshot per (employee, definition), preferring the most
/// recently captured. Non-current snapshots are dropped. Order of first
/// appearance is preserved.
pub fn latest_current(snapshots: &[SignalSnapshot]) -> Vec<&SignalSnapshot> {
    let mut order: Vec<(Uuid, Uuid)> = Vec::new();
    let mut latest: HashMap<(Uuid, Uuid), &SignalSnapshot> = HashMap::new();

    for snapshot in snapshots.iter().filter(|snapshot| snapshot.is_current) {
        let key = (snapshot.employee_id, snapshot.signal_definition_id);
        match latest.entry(key) {
            Entry::Occupied(mut slot) => {
                if slot.get().captured_at < snapshot.captured_at {
                    slot.insert(snapshot);
                }
            }
            Entry::Vacant(slot) => {
                order.push(key);
                slot.insert(snapshot);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| latest.get(&key).copied())
        .collect()
}

/// Selects the signals feeding `axis` and applies the bias discount.
/// An empty result means no evidence for the axis.
pub fn discount_signals(
    snapshots: &[SignalSnapshot],
    axis: Axis,
    resolver: &MappingResolver<'_>,
) -> Vec<SignalContribution> {
    let mut contributions = Vec::new();

    for snapshot in latest_current(snapshots) {
        let Some(mapping) = resolver.resolve(snapshot.signal_definition_id, &snapshot.category)
        else {
            debug!(signal = %snapshot.signal_name, "no mapping resolves, excluded");
            continue;
        };

        if !mapping.contributes_to.applies_to(axis) {
            continue;
        }

        if snapshot.confidence_score < mapping.minimum_confidence {
            debug!(
                signal = %snapshot.signal_name,
                %axis,
                confidence = snapshot.confidence_score,
                minimum = mapping.minimum_confidence,
                "below confidence gate, excluded"
            );
            continue;
        }

        contributions.push(SignalContribution {
            signal_name: snapshot.signal_name.clone(),
            adjusted_score: adjusted_score(snapshot.normalized_score, snapshot.bias_risk_level),
            weight: mapping.weight,
            confidence: snapshot.confidence_score,
            bias_risk_level: snapshot.bias_risk_level,
        });
    }

    contributions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::DefaultMappingTable;
    use crate::models::{ContributesTo, SignalAxisMapping, SignalCategory};
    use chrono::{Duration, Utc};

    fn snapshot(
        category: &str,
        score: f64,
        confidence: f64,
        bias: Option<BiasRiskLevel>,
    ) -> SignalSnapshot {
        SignalSnapshot {
            employee_id: Uuid::new_v4(),
            signal_definition_id: Uuid::new_v4(),
            signal_name: format!("{category} signal"),
            category: SignalCategory::from(category),
            normalized_score: score,
            confidence_score: confidence,
            bias_risk_level: bias,
            captured_at: Utc::now(),
            is_current: true,
        }
    }

    #[test]
    fn multipliers_are_monotonic() {
        let high = adjusted_score(4.0, Some(BiasRiskLevel::High));
        let medium = adjusted_score(4.0, Some(BiasRiskLevel::Medium));
        let low = adjusted_score(4.0, Some(BiasRiskLevel::Low));
        let unset = adjusted_score(4.0, None);

        assert!((high - 2.8).abs() < 1e-9);
        assert!((medium - 3.4).abs() < 1e-9);
        assert_eq!(low, 4.0);
        assert_eq!(unset, 4.0);
        assert!(high <= medium && medium <= low);
    }

    #[test]
    fn leadership_feeds_potential_only() {
        let defaults = DefaultMappingTable::builtin();
        let resolver = MappingResolver::new(&[], &defaults);
        let signals = vec![snapshot("leadership", 4.0, 0.9, Some(BiasRiskLevel::Low))];

        let potential = discount_signals(&signals, Axis::Potential, &resolver);
        assert_eq!(potential.len(), 1);
        assert_eq!(potential[0].adjusted_score, 4.0);
        assert_eq!(potential[0].weight, 1.0);

        assert!(discount_signals(&signals, Axis::Performance, &resolver).is_empty());
    }

    #[test]
    fn low_confidence_is_gated_out() {
        let defaults = DefaultMappingTable::builtin();
        let resolver = MappingResolver::new(&[], &defaults);
        let signals = vec![snapshot("leadership", 4.0, 0.5, None)];

        for axis in Axis::ALL {
            assert!(discount_signals(&signals, axis, &resolver).is_empty());
        }
    }

    #[test]
    fn confidence_equal_to_minimum_passes() {
        let defaults = DefaultMappingTable::builtin();
        let resolver = MappingResolver::new(&[], &defaults);
        let signals = vec![snapshot("technical", 3.0, 0.6, None)];
        assert_eq!(
            discount_signals(&signals, Axis::Performance, &resolver).len(),
            1
        );
    }

    #[test]
    fn both_signals_feed_each_axis_with_same_mapping() {
        let defaults = DefaultMappingTable::builtin();
        let resolver = MappingResolver::new(&[], &defaults);
        let signals = vec![snapshot("teamwork", 3.0, 0.8, Some(BiasRiskLevel::Medium))];

        for axis in Axis::ALL {
            let contributions = discount_signals(&signals, axis, &resolver);
            assert_eq!(contributions.len(), 1);
            assert!((contributions[0].adjusted_score - 2.55).abs() < 1e-9);
            assert_eq!(contributions[0].weight, 0.7);
        }
    }

    #[test]
    fn custom_mapping_redirects_axis() {
        let defaults = DefaultMappingTable::builtin();
        let signal = snapshot("leadership", 4.0, 0.9, None);
        let custom = vec![SignalAxisMapping {
            company_id: Uuid::new_v4(),
            signal_definition_id: signal.signal_definition_id,
            contributes_to: ContributesTo::Performance,
            weight: 1.0,
            minimum_confidence: 0.6,
            is_active: true,
        }];
        let resolver = MappingResolver::new(&custom, &defaults);
        let signals = vec![signal];

        assert_eq!(
            discount_signals(&signals, Axis::Performance, &resolver).len(),
            1
        );
        assert!(discount_signals(&signals, Axis::Potential, &resolver).is_empty());
    }

    #[test]
    fn unmapped_categories_are_skipped() {
        let defaults = DefaultMappingTable::builtin();
        let resolver = MappingResolver::new(&[], &defaults);
        let signals = vec![snapshot("innovation", 5.0, 1.0, None)];
        for axis in Axis::ALL {
            assert!(discount_signals(&signals, axis, &resolver).is_empty());
        }
    }

    #[test]
    fn duplicate_current_snapshots_keep_latest() {
        let older = snapshot("technical", 2.0, 0.9, None);
        let mut newer = older.clone();
        newer.normalized_score = 4.5;
        newer.captured_at = older.captured_at + Duration::days(7);
        let mut stale = older.clone();
        stale.is_current = false;
        stale.captured_at = older.captured_at + Duration::days(30);

        let snapshots = vec![older, newer, stale];
        let kept = latest_current(&snapshots);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].normalized_score, 4.5);
    }
}
