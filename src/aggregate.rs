use crate::filter::discount_signals;
use crate::mapping::MappingResolver;
use crate::models::{AggregatedAxisScore, Axis, AxisScores, SignalContribution, SignalSnapshot};

/// Weighted mean of the discounted scores. Confidence is a plain mean over
/// the same signals. Returns `None` when there is nothing to weigh.
pub fn combine(axis: Axis, contributions: Vec<SignalContribution>) -> Option<AggregatedAxisScore> {
    let total_weight: f64 = contributions.iter().map(|c| c.weight).sum();
    if contributions.is_empty() || total_weight == 0.0 {
        return None;
    }

    let weighted_sum: f64 = contributions
        .iter()
        .map(|c| c.adjusted_score * c.weight)
        .sum();
    let count = contributions.len();
    let confidence_sum: f64 = contributions.iter().map(|c| c.confidence).sum();

    Some(AggregatedAxisScore {
        axis,
        composite_score: weighted_sum / total_weight,
        composite_confidence: confidence_sum / count as f64,
        signal_count: count,
        breakdown: contributions,
    })
}

pub fn aggregate_axis(
    snapshots: &[SignalSnapshot],
    axis: Axis,
    resolver: &MappingResolver<'_>,
) -> Option<AggregatedAxisScore> {
    combine(axis, discount_signals(snapshots, axis, resolver))
}

/// Computes both axes for one employee's current signals.
pub fn aggregate_axis_scores(
    snapshots: &[SignalSnapshot],
    resolver: &MappingResolver<'_>,
) -> AxisScores {
    AxisScores {
        performance: aggregate_axis(snapshots, Axis::Performance, resolver),
        potential: aggregate_axis(snapshots, Axis::Potential, resolver),
    }
}
