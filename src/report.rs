use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::grid::Placement;
use crate::models::{AggregatedAxisScore, Axis, AxisScores, EmployeeRecord};

#[derive(Debug, Clone)]
pub struct EmployeeGridEntry {
    pub employee: EmployeeRecord,
    pub scores: AxisScores,
    pub placement: Placement,
}

impl EmployeeGridEntry {
    pub fn new(employee: EmployeeRecord, scores: AxisScores) -> Self {
        let placement = Placement::from_scores(&scores);
        Self {
            employee,
            scores,
            placement,
        }
    }
}

/// Count per box number, with insufficient-data employees under `None`.
pub fn grid_distribution(entries: &[EmployeeGridEntry]) -> BTreeMap<Option<usize>, (String, usize)> {
    let mut distribution: BTreeMap<Option<usize>, (String, usize)> = BTreeMap::new();

    for entry in entries {
        let key = entry.placement.box_number();
        let label = match key {
            Some(_) => entry.placement.label(),
            None => "Insufficient data".to_string(),
        };
        distribution.entry(key).or_insert((label, 0)).1 += 1;
    }

    distribution
}

pub fn describe_axis(score: Option<&AggregatedAxisScore>) -> String {
    match score {
        Some(score) => format!(
            "{:.2} (confidence {:.2}, {} signals)",
            score.composite_score, score.composite_confidence, score.signal_count
        ),
        None => "insufficient data".to_string(),
    }
}

pub fn build_report(company: &str, generated_on: NaiveDate, entries: &[EmployeeGridEntry]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Talent Grid Report");
    let _ = writeln!(output, "Generated for {} on {}", company, generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Grid Distribution");

    if entries.is_empty() {
        let _ = writeln!(output, "No employees found for this company.");
        return output;
    }

    let _ = writeln!(output, "| Box | Placement | Employees |");
    let _ = writeln!(output, "|-----|-----------|-----------|");
    // Highest box first; insufficient data sorts as None and goes last.
    for (box_number, (label, count)) in grid_distribution(entries).iter().rev() {
        let box_label = box_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(output, "| {} | {} | {} |", box_label, label, count);
    }

    let mut sorted: Vec<&EmployeeGridEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        b.placement
            .box_number()
            .cmp(&a.placement.box_number())
            .then_with(|| a.employee.full_name.cmp(&b.employee.full_name))
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Employees");

    for entry in sorted {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "### {} ({})",
            entry.employee.full_name, entry.employee.email
        );
        let _ = writeln!(output, "- Placement: {}", entry.placement.label());

        for axis in Axis::ALL {
            let score = entry.scores.get(axis);
            let _ = writeln!(output, "- {}: {}", axis, describe_axis(score));
            if let Some(score) = score {
                for contribution in &score.breakdown {
                    let bias = contribution
                        .bias_risk_level
                        .map(|level| level.as_str())
                        .unwrap_or("unset");
                    let _ = writeln!(
                        output,
                        "  - {}: {:.2} x {:.2} (confidence {:.2}, bias {})",
                        contribution.signal_name,
                        contribution.adjusted_score,
                        contribution.weight,
                        contribution.confidence,
                        bias
                    );
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BiasRiskLevel, SignalContribution};
    use uuid::Uuid;

    fn employee(name: &str) -> EmployeeRecord {
        EmployeeRecord {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        }
    }

    fn axis_score(axis: Axis, composite_score: f64) -> AggregatedAxisScore {
        AggregatedAxisScore {
            axis,
            composite_score,
            composite_confidence: 0.85,
            signal_count: 1,
            breakdown: vec![SignalContribution {
                signal_name: "Strategic Thinking".to_string(),
                adjusted_score: composite_score,
                weight: 1.0,
                confidence: 0.85,
                bias_risk_level: Some(BiasRiskLevel::Medium),
            }],
        }
    }

    #[test]
    fn report_lists_placements_and_insufficient_data() {
        let entries = vec![
            EmployeeGridEntry::new(
                employee("Avery Lee"),
                AxisScores {
                    performance: Some(axis_score(Axis::Performance, 4.1)),
                    potential: Some(axis_score(Axis::Potential, 4.3)),
                },
            ),
            EmployeeGridEntry::new(
                employee("Jules Moreno"),
                AxisScores {
                    performance: Some(axis_score(Axis::Performance, 3.0)),
                    potential: None,
                },
            ),
        ];

        let date = NaiveDate::from_ymd_opt(2026, 2, 2).expect("valid date");
        let report = build_report("Acme", date, &entries);

        assert!(report.contains("Generated for Acme on 2026-02-02"));
        assert!(report.contains("| 9 | Star | 1 |"));
        assert!(report.contains("| - | Insufficient data | 1 |"));
        assert!(report.contains("- potential: insufficient data"));
        assert!(report.contains("bias medium"));
        let star = report.find("### Avery Lee").expect("avery listed");
        let missing = report.find("### Jules Moreno").expect("jules listed");
        assert!(star < missing);
    }

    #[test]
    fn empty_company_report() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 2).expect("valid date");
        let report = build_report("Acme", date, &[]);
        assert!(report.contains("No employees found for this company."));
    }

    #[test]
    fn distribution_counts_per_box() {
        let entries = vec![
            EmployeeGridEntry::new(employee("A"), AxisScores::default()),
            EmployeeGridEntry::new(employee("B"), AxisScores::default()),
            EmployeeGridEntry::new(
                employee("C"),
                AxisScores {
                    performance: Some(axis_score(Axis::Performance, 3.0)),
                    potential: Some(axis_score(Axis::Potential, 3.0)),
                },
            ),
        ];
        let distribution = grid_distribution(&entries);
        assert_eq!(distribution.get(&None), Some(&("Insufficient data".to_string(), 2)));
        assert_eq!(distribution.get(&Some(5)), Some(&("Core Player".to_string(), 1)));
    }
}
