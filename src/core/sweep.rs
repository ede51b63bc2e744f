use std::collections::BTreeMap;

use super::error::{EvaluationError, SweepError};
use super::evaluator::ScenarioEvaluator;
use super::types::{
    FinancialState, Household, ProgramId, ProgramResult, Scenario, SweepSeries, Timescale,
};

pub const MAX_SWEEP_POINTS: usize = 100_000;

/// Strictly increasing, non-negative income sample points.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeAxis {
    points: Vec<f64>,
}

impl IncomeAxis {
    /// `start, start + step, ...` up to but excluding `stop`. When `step` does
    /// not divide the range the last point is the largest one below `stop`.
    pub fn range(start: f64, stop: f64, step: f64) -> Result<Self, SweepError> {
        if !start.is_finite() || !stop.is_finite() || !step.is_finite() {
            return Err(SweepError::InvalidAxis(
                "start, stop and step must be finite".to_string(),
            ));
        }
        if start < 0.0 {
            return Err(SweepError::InvalidAxis("start must be >= 0".to_string()));
        }
        if step <= 0.0 {
            return Err(SweepError::InvalidAxis("step must be > 0".to_string()));
        }
        if stop <= start {
            return Err(SweepError::InvalidAxis("stop must be > start".to_string()));
        }

        let span = (stop - start) / step;
        let nearest = span.round();
        let count = if (span - nearest).abs() <= 1e-9 * nearest.max(1.0) {
            nearest
        } else {
            span.ceil()
        }
        .max(1.0);
        if count > MAX_SWEEP_POINTS as f64 {
            return Err(SweepError::InvalidAxis(format!(
                "range yields more than {MAX_SWEEP_POINTS} points"
            )));
        }

        // Multiply instead of accumulating so every point is exact to one rounding.
        let points: Vec<f64> = (0..count as usize)
            .map(|idx| start + idx as f64 * step)
            .collect();
        if points.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SweepError::InvalidAxis(
                "step is too small for the range magnitude".to_string(),
            ));
        }
        Ok(Self { points })
    }

    pub fn from_points(points: Vec<f64>) -> Result<Self, SweepError> {
        if points.is_empty() {
            return Err(SweepError::InvalidAxis(
                "at least one income point is required".to_string(),
            ));
        }
        if points.len() > MAX_SWEEP_POINTS {
            return Err(SweepError::InvalidAxis(format!(
                "at most {MAX_SWEEP_POINTS} points are allowed"
            )));
        }
        if let Some(bad) = points.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(SweepError::InvalidAxis(format!(
                "income points must be finite and >= 0, got {bad}"
            )));
        }
        if points.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SweepError::InvalidAxis(
                "income points must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub axis: IncomeAxis,
    pub varied: Scenario,
    pub timescale: Timescale,
}

impl SweepConfig {
    /// Varies the future scenario over annual income.
    pub fn new(axis: IncomeAxis) -> Self {
        Self {
            axis,
            varied: Scenario::Future,
            timescale: Timescale::Yearly,
        }
    }
}

/// State handed from one sweep step to the next.
///
/// It is installed into the baseline scenario (the one not being varied), so
/// each step compares the new income against the previous step's outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarriedState {
    /// Monthly earned income of the previous step.
    pub earned_income: f64,
    /// Rent share left to the household after the previous step's subsidy.
    pub rent_share: Option<f64>,
}

impl CarriedState {
    pub fn seed(baseline: &FinancialState, first_monthly_income: f64) -> Self {
        Self {
            earned_income: first_monthly_income,
            rent_share: baseline.rent_share,
        }
    }

    pub fn from_outcome(working: &FinancialState) -> Self {
        Self {
            earned_income: working.earned_income,
            rent_share: working.rent_share,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.earned_income.is_finite() && self.rent_share.is_none_or(f64::is_finite)
    }

    fn install(&self, baseline: &mut FinancialState) {
        baseline.earned_income = self.earned_income;
        baseline.rent_share = self.rent_share;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepStep {
    pub income: f64,
    pub results: Vec<ProgramResult>,
    pub carried: CarriedState,
}

/// Re-evaluates the active programs across an income axis.
pub struct IncomeSweep {
    evaluator: ScenarioEvaluator,
    config: SweepConfig,
}

impl IncomeSweep {
    pub fn new(evaluator: ScenarioEvaluator, config: SweepConfig) -> Self {
        Self { evaluator, config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &ScenarioEvaluator {
        &self.evaluator
    }

    /// One step of the recurrence: a fresh copy of `base` with `carried`
    /// installed as the baseline and `income` (in the sweep's timescale) as
    /// the varied scenario's earnings.
    pub fn step(
        &self,
        base: &Household,
        carried: &CarriedState,
        income: f64,
    ) -> Result<SweepStep, EvaluationError> {
        let varied = self.config.varied;
        let mut snapshot = base.clone();
        carried.install(snapshot.scenario_mut(varied.other()));
        snapshot.scenario_mut(varied).earned_income = income / self.config.timescale.from_monthly();

        let evaluation = self.evaluator.evaluate(&snapshot, varied)?;
        let carried = CarriedState::from_outcome(&evaluation.working);
        Ok(SweepStep {
            income,
            results: evaluation.results,
            carried,
        })
    }

    /// Folds over the axis in ascending order; step `i + 1` sees the state
    /// carried out of step `i`. `base` is only read.
    pub fn run(&self, base: &Household) -> Result<SweepSeries, SweepError> {
        let base = base.sanitized().map_err(SweepError::InvalidInput)?;
        let varied = self.config.varied;
        let multiplier = self.config.timescale.from_monthly();
        let points = self.config.axis.points();

        let first = points.first().copied().unwrap_or(0.0);
        let seed = CarriedState::seed(base.scenario(varied.other()), first / multiplier);

        let mut series: BTreeMap<ProgramId, Vec<f64>> = self
            .evaluator
            .programs()
            .map(|id| (id.clone(), Vec::with_capacity(points.len())))
            .collect();

        tracing::debug!(
            points = points.len(),
            programs = series.len(),
            %varied,
            "starting income sweep"
        );

        points
            .iter()
            .enumerate()
            .try_fold(seed, |carried, (index, &income)| {
                let step = self
                    .step(&base, &carried, income)
                    .map_err(|source| SweepError::Evaluation {
                        index,
                        income,
                        source,
                    })?;
                if !step.carried.is_finite() {
                    return Err(SweepError::CorruptCarry { index, income });
                }
                for result in &step.results {
                    if let Some(values) = series.get_mut(&result.program) {
                        values.push(result.monthly_amount * multiplier);
                    }
                }
                tracing::trace!(index, income, carried = ?step.carried, "sweep step");
                Ok(step.carried)
            })?;

        Ok(SweepSeries::new(
            self.config.timescale,
            points.to_vec(),
            series,
        ))
    }
}
