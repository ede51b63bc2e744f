mod cliffs;
mod error;
mod evaluator;
mod program;
mod sweep;
mod types;

pub use cliffs::{Cliff, find_cliffs};
pub use error::{CalculatorError, ConfigError, EvaluationError, SweepError};
pub use evaluator::{Evaluation, ScenarioEvaluator};
pub use program::{ProgramCalculator, ProgramEntry, Registry};
pub use sweep::{CarriedState, IncomeAxis, IncomeSweep, MAX_SWEEP_POINTS, SweepConfig, SweepStep};
pub use types::{
    Benefit, FALLBACK_CONTRACT_RENT, FinancialState, Household, Member, ProgramId, ProgramResult,
    Relationship, Rounding, Scenario, SweepSeries, Timescale,
};
