use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::strategy::WithdrawalStrategyConfig;
use crate::error::ValidationIssue;
use crate::returns::model::validate_return_config;
use crate::returns::ReturnConfig;
use crate::types::{Rate, Year};

/// One phase of a segmented withdrawal plan, e.g. "early retirement" with a
/// higher rate followed by a more conservative phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalSegment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub start_year: Year,
    pub end_year: Year,
    pub strategy: WithdrawalStrategyConfig,
    pub return_config: ReturnConfig,
    /// Yearly inflation for inflation-adjusted strategies; none when absent.
    #[serde(default)]
    pub inflation: Option<Rate>,
    /// Personal income tax rate for the Günstigerprüfung in this segment.
    #[serde(default)]
    pub income_tax_rate: Option<Rate>,
    #[serde(default = "default_true")]
    pub steuer_reduziert_endkapital: bool,
}

fn default_true() -> bool {
    true
}

impl WithdrawalSegment {
    pub fn contains(&self, year: Year) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }
}

/// Index of the segment that drives `year`.
pub fn segment_index_for_year(segments: &[WithdrawalSegment], year: Year) -> Option<usize> {
    segments.iter().position(|s| s.contains(year))
}

/// Check that the segments are ordered, contiguous, non-overlapping and start
/// at `expected_start` (when given), plus each segment's own settings.
pub fn validate_segments(
    segments: &[WithdrawalSegment],
    expected_start: Option<Year>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if segments.is_empty() {
        issues.push(ValidationIssue::new(
            "segments",
            "Mindestens ein Entnahme-Segment ist erforderlich.",
        ));
        return issues;
    }

    let mut seen = HashSet::new();
    for (i, segment) in segments.iter().enumerate() {
        let field = format!("segments[{i}]");
        if !seen.insert(segment.id.as_str()) {
            issues.push(ValidationIssue::new(
                format!("{field}.id"),
                format!("Segment-ID '{}' ist doppelt vergeben.", segment.id),
            ));
        }
        if segment.end_year < segment.start_year {
            issues.push(ValidationIssue::new(
                format!("{field}.end_year"),
                "Endjahr liegt vor dem Startjahr.",
            ));
        }
        if let Some(infl) = segment.inflation {
            if infl <= Decimal::NEGATIVE_ONE {
                issues.push(ValidationIssue::new(
                    format!("{field}.inflation"),
                    "Inflationsrate muss größer als -100% sein.",
                ));
            }
        }
        if let Some(rate) = segment.income_tax_rate {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                issues.push(ValidationIssue::new(
                    format!("{field}.income_tax_rate"),
                    "Wert muss zwischen 0 und 1 liegen.",
                ));
            }
        }
        issues.extend(segment.strategy.validate(&format!("{field}.strategy")));
        issues.extend(validate_return_config(
            &segment.return_config,
            &format!("{field}.return_config"),
        ));
    }

    if let (Some(start), Some(first)) = (expected_start, segments.first()) {
        if first.start_year != start {
            issues.push(ValidationIssue::new(
                "segments[0].start_year",
                format!("Erstes Segment muss {start} beginnen."),
            ));
        }
    }

    for (i, pair) in segments.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        let field = format!("segments[{}].start_year", i + 1);
        if next.start_year <= prev.end_year {
            issues.push(ValidationIssue::new(
                field,
                format!("Segment '{}' überschneidet sich mit '{}'.", next.id, prev.id),
            ));
        } else if next.start_year != prev.end_year + 1 {
            issues.push(ValidationIssue::new(
                field,
                format!(
                    "Lücke zwischen '{}' ({}) und '{}' ({}).",
                    prev.id, prev.end_year, next.id, next.start_year
                ),
            ));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn segment(id: &str, start: Year, end: Year) -> WithdrawalSegment {
        WithdrawalSegment {
            id: id.into(),
            name: id.into(),
            start_year: start,
            end_year: end,
            strategy: WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.04) },
            return_config: ReturnConfig::Fixed { rate: dec!(0.05) },
            inflation: None,
            income_tax_rate: None,
            steuer_reduziert_endkapital: true,
        }
    }

    #[test]
    fn test_contiguous_segments_valid() {
        let segs = vec![segment("a", 2040, 2049), segment("b", 2050, 2070)];
        assert!(validate_segments(&segs, Some(2040)).is_empty());
        assert_eq!(segment_index_for_year(&segs, 2050), Some(1));
        assert_eq!(segment_index_for_year(&segs, 2071), None);
    }

    #[test]
    fn test_gap_detected() {
        let segs = vec![segment("a", 2040, 2049), segment("b", 2051, 2070)];
        let issues = validate_segments(&segs, None);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("Lücke"));
    }

    #[test]
    fn test_overlap_and_duplicate_id_detected() {
        let segs = vec![segment("a", 2040, 2050), segment("a", 2050, 2070)];
        let issues = validate_segments(&segs, None);
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_wrong_start_detected() {
        let segs = vec![segment("a", 2041, 2050)];
        let issues = validate_segments(&segs, Some(2040));
        assert_eq!(issues[0].field, "segments[0].start_year");
    }

    #[test]
    fn test_empty_plan_rejected() {
        assert_eq!(validate_segments(&[], None).len(), 1);
    }
}
