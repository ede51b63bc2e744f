use serde::Serialize;

use super::types::SweepSeries;

/// An income range over which a raise loses more in benefits than it adds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cliff {
    pub start_income: f64,
    pub end_income: f64,
    pub income_gain: f64,
    pub benefit_loss: f64,
    /// Change in income plus benefits across the range; always negative.
    pub net_change: f64,
}

/// Merges consecutive sample intervals where net resources fall.
pub fn find_cliffs(series: &SweepSeries) -> Vec<Cliff> {
    let axis = series.income_axis();
    let combined = series.combined();
    let mut cliffs: Vec<Cliff> = Vec::new();
    let mut open: Option<Cliff> = None;

    for idx in 1..axis.len() {
        let income_gain = axis[idx] - axis[idx - 1];
        let benefit_loss = combined[idx - 1] - combined[idx];
        if benefit_loss > income_gain + 1e-9 {
            let cliff = open.get_or_insert(Cliff {
                start_income: axis[idx - 1],
                end_income: axis[idx - 1],
                income_gain: 0.0,
                benefit_loss: 0.0,
                net_change: 0.0,
            });
            cliff.end_income = axis[idx];
            cliff.income_gain += income_gain;
            cliff.benefit_loss += benefit_loss;
            cliff.net_change = cliff.income_gain - cliff.benefit_loss;
        } else if let Some(cliff) = open.take() {
            cliffs.push(cliff);
        }
    }
    cliffs.extend(open);

    if !cliffs.is_empty() {
        tracing::debug!(count = cliffs.len(), "benefit cliffs found");
    }
    cliffs
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::core::types::{ProgramId, Timescale};

    fn series(axis: &[f64], benefits: &[f64]) -> SweepSeries {
        let mut by_program = BTreeMap::new();
        by_program.insert(ProgramId::from("test"), benefits.to_vec());
        SweepSeries::new(Timescale::Yearly, axis.to_vec(), by_program)
    }

    #[test]
    fn gradual_phase_out_is_not_a_cliff() {
        let s = series(&[0.0, 1_000.0, 2_000.0], &[5_000.0, 4_500.0, 4_000.0]);
        assert!(find_cliffs(&s).is_empty());
    }

    #[test]
    fn steep_drop_is_reported() {
        let s = series(
            &[0.0, 1_000.0, 2_000.0, 3_000.0],
            &[5_000.0, 5_000.0, 0.0, 0.0],
        );
        let cliffs = find_cliffs(&s);
        assert_eq!(
            cliffs,
            vec![Cliff {
                start_income: 1_000.0,
                end_income: 2_000.0,
                income_gain: 1_000.0,
                benefit_loss: 5_000.0,
                net_change: -4_000.0,
            }]
        );
    }

    #[test]
    fn adjacent_drops_merge_and_separate_ones_do_not() {
        let s = series(
            &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            &[10.0, 7.0, 4.0, 4.0, 1.0, 1.0],
        );
        let cliffs = find_cliffs(&s);
        assert_eq!(cliffs.len(), 2);
        assert_eq!(cliffs[0].start_income, 0.0);
        assert_eq!(cliffs[0].end_income, 2.0);
        assert_eq!(cliffs[0].net_change, -4.0);
        assert_eq!(cliffs[1].start_income, 3.0);
        assert_eq!(cliffs[1].end_income, 4.0);
    }

    #[test]
    fn cliff_at_the_last_interval_is_kept() {
        let s = series(&[0.0, 1.0], &[10.0, 0.0]);
        assert_eq!(find_cliffs(&s).len(), 1);
    }
}
