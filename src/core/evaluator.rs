use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::{ConfigError, EvaluationError};
use super::program::{ProgramCalculator, Registry};
use super::types::{FinancialState, Household, ProgramId, ProgramResult, Scenario};

/// Result vector for one scenario plus the working state the programs left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub results: Vec<ProgramResult>,
    pub working: FinancialState,
}

impl Evaluation {
    pub fn total_monthly(&self) -> f64 {
        self.results.iter().map(|r| r.monthly_amount).sum()
    }

    pub fn result(&self, program: &ProgramId) -> Option<&ProgramResult> {
        self.results.iter().find(|r| &r.program == program)
    }
}

struct Scheduled {
    id: ProgramId,
    calculator: Arc<dyn ProgramCalculator>,
}

/// Runs the active programs in a fixed, validated order.
pub struct ScenarioEvaluator {
    schedule: Vec<Scheduled>,
}

impl ScenarioEvaluator {
    /// Checks `order` against the declared dependencies. The order is used
    /// as given; it is never rearranged.
    pub fn new(registry: &Registry, order: &[ProgramId]) -> Result<Self, ConfigError> {
        let mut position = BTreeMap::new();
        for (idx, id) in order.iter().enumerate() {
            if !registry.contains(id) {
                return Err(ConfigError::UnknownProgram(id.clone()));
            }
            if position.insert(id, idx).is_some() {
                return Err(ConfigError::DuplicateInOrder(id.clone()));
            }
        }

        registry.check_acyclic_among(order)?;

        let mut schedule = Vec::with_capacity(order.len());
        for (idx, id) in order.iter().enumerate() {
            let Some(entry) = registry.get(id) else {
                return Err(ConfigError::UnknownProgram(id.clone()));
            };
            for dep in entry.depends_on() {
                match position.get(dep) {
                    None => {
                        return Err(ConfigError::MissingDependency {
                            program: id.clone(),
                            dependency: dep.clone(),
                        });
                    }
                    Some(&dep_idx) if dep_idx > idx => {
                        return Err(ConfigError::ForwardReference {
                            program: id.clone(),
                            dependency: dep.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
            schedule.push(Scheduled {
                id: id.clone(),
                calculator: Arc::clone(entry.calculator()),
            });
        }

        Ok(Self { schedule })
    }

    pub fn programs(&self) -> impl Iterator<Item = &ProgramId> {
        self.schedule.iter().map(|s| &s.id)
    }

    pub fn evaluate(
        &self,
        household: &Household,
        scenario: Scenario,
    ) -> Result<Evaluation, EvaluationError> {
        let mut working = household.clone();
        let mut results = Vec::with_capacity(self.schedule.len());

        for scheduled in &self.schedule {
            let benefit = scheduled
                .calculator
                .compute_benefit(&working, scenario)
                .map_err(|source| EvaluationError::Calculator {
                    program: scheduled.id.clone(),
                    source,
                })?;

            if !benefit.monthly_amount.is_finite() || benefit.monthly_amount < 0.0 {
                return Err(EvaluationError::InvalidAmount {
                    program: scheduled.id.clone(),
                    amount: benefit.monthly_amount,
                });
            }

            let result = ProgramResult {
                program: scheduled.id.clone(),
                monthly_amount: scheduled.calculator.rounding().apply(benefit.monthly_amount),
                eligible: benefit.eligible,
            };
            tracing::trace!(
                program = %result.program,
                %scenario,
                amount = result.monthly_amount,
                eligible = result.eligible,
                "program evaluated"
            );

            scheduled
                .calculator
                .feed_forward(&result, working.scenario_mut(scenario));
            results.push(result);
        }

        Ok(Evaluation {
            results,
            working: working.into_scenario(scenario),
        })
    }
}
