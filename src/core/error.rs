use thiserror::Error;

use super::types::ProgramId;

/// Setup-time problems with the program registry or evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("program `{0}` is not registered")]
    UnknownProgram(ProgramId),
    #[error("program `{0}` is already registered")]
    DuplicateRegistration(ProgramId),
    #[error("program `{0}` appears more than once in the evaluation order")]
    DuplicateInOrder(ProgramId),
    #[error("program `{0}` depends on itself")]
    SelfDependency(ProgramId),
    #[error("program `{program}` depends on `{dependency}`, which is not active")]
    MissingDependency {
        program: ProgramId,
        dependency: ProgramId,
    },
    #[error("program `{program}` depends on `{dependency}`, which is scheduled after it")]
    ForwardReference {
        program: ProgramId,
        dependency: ProgramId,
    },
    #[error("dependency cycle: {}", display_path(.0))]
    Cycle(Vec<ProgramId>),
}

fn display_path(path: &[ProgramId]) -> String {
    path.iter()
        .map(ProgramId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Raised by a rule module that cannot produce a result.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct CalculatorError(pub String);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("program `{program}` failed: {source}")]
    Calculator {
        program: ProgramId,
        #[source]
        source: CalculatorError,
    },
    #[error("program `{program}` returned invalid monthly amount {amount}")]
    InvalidAmount { program: ProgramId, amount: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SweepError {
    #[error("invalid income axis: {0}")]
    InvalidAxis(String),
    #[error("invalid household input: {0}")]
    InvalidInput(String),
    #[error("sweep step {index} (income {income}): {source}")]
    Evaluation {
        index: usize,
        income: f64,
        #[source]
        source: EvaluationError,
    },
    #[error("sweep step {index} (income {income}) produced a non-finite carried value")]
    CorruptCarry { index: usize, income: f64 },
}
