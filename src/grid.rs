use crate::models::{Axis, AxisScores};

pub const MODERATE_THRESHOLD: f64 = 2.5;
pub const HIGH_THRESHOLD: f64 = 3.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Band {
    Low,
    Moderate,
    High,
}

impl Band {
    pub fn from_score(score: f64) -> Self {
        if score < MODERATE_THRESHOLD {
            Band::Low
        } else if score < HIGH_THRESHOLD {
            Band::Moderate
        } else {
            Band::High
        }
    }

    fn index(self) -> usize {
        match self {
            Band::Low => 0,
            Band::Moderate => 1,
            Band::High => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Cell { performance: Band, potential: Band },
    /// Axes with no score. Never rendered as a zero placement.
    InsufficientData { missing: Vec<Axis> },
}

// Rows are potential (low to high), columns performance (low to high).
const CELL_LABELS: [[&str; 3]; 3] = [
    ["Underperformer", "Effective", "Trusted Professional"],
    ["Inconsistent Player", "Core Player", "High Performer"],
    ["Rough Diamond", "Future Star", "Star"],
];

impl Placement {
    pub fn from_scores(scores: &AxisScores) -> Self {
        match (&scores.performance, &scores.potential) {
            (Some(performance), Some(potential)) => Placement::Cell {
                performance: Band::from_score(performance.composite_score),
                potential: Band::from_score(potential.composite_score),
            },
            _ => Placement::InsufficientData {
                missing: Axis::ALL
                    .into_iter()
                    .filter(|axis| scores.get(*axis).is_none())
                    .collect(),
            },
        }
    }

    /// Box number 1..=9, counted from low/low to high/high.
    pub fn box_number(&self) -> Option<usize> {
        match self {
            Placement::Cell {
                performance,
                potential,
            } => Some(potential.index() * 3 + performance.index() + 1),
            Placement::InsufficientData { .. } => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Placement::Cell {
                performance,
                potential,
            } => CELL_LABELS[potential.index()][performance.index()].to_string(),
            Placement::InsufficientData { missing } => {
                let axes: Vec<&str> = missing.iter().map(|axis| axis.as_str()).collect();
                format!("Insufficient data ({})", axes.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AggregatedAxisScore;

    fn axis_score(axis: Axis, composite_score: f64) -> AggregatedAxisScore {
        AggregatedAxisScore {
            axis,
            composite_score,
            composite_confidence: 0.8,
            signal_count: 1,
            breakdown: Vec::new(),
        }
    }

    #[test]
    fn bands_follow_thresholds() {
        assert_eq!(Band::from_score(0.0), Band::Low);
        assert_eq!(Band::from_score(2.49), Band::Low);
        assert_eq!(Band::from_score(2.5), Band::Moderate);
        assert_eq!(Band::from_score(3.74), Band::Moderate);
        assert_eq!(Band::from_score(3.75), Band::High);
        assert_eq!(Band::from_score(5.0), Band::High);
    }

    #[test]
    fn places_high_high_as_star() {
        let scores = AxisScores {
            performance: Some(axis_score(Axis::Performance, 4.2)),
            potential: Some(axis_score(Axis::Potential, 4.0)),
        };
        let placement = Placement::from_scores(&scores);
        assert_eq!(placement.box_number(), Some(9));
        assert_eq!(placement.label(), "Star");
    }

    #[test]
    fn high_performance_low_potential() {
        let scores = AxisScores {
            performance: Some(axis_score(Axis::Performance, 4.5)),
            potential: Some(axis_score(Axis::Potential, 1.0)),
        };
        let placement = Placement::from_scores(&scores);
        assert_eq!(placement.box_number(), Some(3));
        assert_eq!(placement.label(), "Trusted Professional");
    }

    #[test]
    fn missing_axis_is_not_a_zero_placement() {
        let scores = AxisScores {
            performance: Some(axis_score(Axis::Performance, 1.0)),
            potential: None,
        };
        let placement = Placement::from_scores(&scores);
        assert_eq!(
            placement,
            Placement::InsufficientData {
                missing: vec![Axis::Potential]
            }
        );
        assert_eq!(placement.box_number(), None);
        assert_eq!(placement.label(), "Insufficient data (potential)");

        let empty = Placement::from_scores(&AxisScores::default());
        assert_eq!(empty.label(), "Insufficient data (performance, potential)");
    }
}
