use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::error::{CalculatorError, ConfigError};
use super::types::{Benefit, FinancialState, Household, ProgramId, ProgramResult, Rounding, Scenario};

/// One benefit program's eligibility and amount rule.
///
/// Implementations must be pure: the same household and scenario always
/// produce the same benefit. Categorical ineligibility is reported as
/// [`Benefit::ineligible`], not as an error.
pub trait ProgramCalculator: Send + Sync {
    fn compute_benefit(
        &self,
        household: &Household,
        scenario: Scenario,
    ) -> Result<Benefit, CalculatorError>;

    /// Applied to the monthly amount before any timescale scaling.
    fn rounding(&self) -> Rounding {
        Rounding::NearestCent
    }

    /// Writes this program's result into the scenario fields that programs
    /// scheduled after it read.
    fn feed_forward(&self, _result: &ProgramResult, _working: &mut FinancialState) {}
}

#[derive(Clone)]
pub struct ProgramEntry {
    calculator: Arc<dyn ProgramCalculator>,
    depends_on: Vec<ProgramId>,
}

impl ProgramEntry {
    pub fn calculator(&self) -> &Arc<dyn ProgramCalculator> {
        &self.calculator
    }

    pub fn depends_on(&self) -> &[ProgramId] {
        &self.depends_on
    }
}

/// Program id to calculator plus its declared upstream programs.
#[derive(Clone, Default)]
pub struct Registry {
    entries: BTreeMap<ProgramId, ProgramEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C>(
        &mut self,
        id: impl Into<ProgramId>,
        calculator: C,
        depends_on: &[&str],
    ) -> Result<(), ConfigError>
    where
        C: ProgramCalculator + 'static,
    {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return Err(ConfigError::DuplicateRegistration(id));
        }
        let depends_on = depends_on
            .iter()
            .map(|dep| ProgramId::from(*dep))
            .collect::<Vec<_>>();
        if depends_on.contains(&id) {
            return Err(ConfigError::SelfDependency(id));
        }
        tracing::debug!(program = %id, ?depends_on, "registered program");
        self.entries.insert(
            id,
            ProgramEntry {
                calculator: Arc::new(calculator),
                depends_on,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &ProgramId) -> Option<&ProgramEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ProgramId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProgramId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fails with the first dependency cycle found among registered programs.
    pub fn check_acyclic(&self) -> Result<(), ConfigError> {
        self.check_acyclic_among(self.entries.keys())
    }

    /// Like [`Registry::check_acyclic`], restricted to the given programs.
    pub(crate) fn check_acyclic_among<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a ProgramId>,
    ) -> Result<(), ConfigError> {
        let scope = ids.into_iter().collect::<BTreeSet<_>>();
        let mut done = BTreeSet::new();
        for &id in &scope {
            let mut path = Vec::new();
            self.visit(id, &scope, &mut path, &mut done)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        id: &'a ProgramId,
        scope: &BTreeSet<&'a ProgramId>,
        path: &mut Vec<&'a ProgramId>,
        done: &mut BTreeSet<&'a ProgramId>,
    ) -> Result<(), ConfigError> {
        if done.contains(id) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|p| *p == id) {
            let mut cycle = path[start..].iter().map(|p| (*p).clone()).collect::<Vec<_>>();
            cycle.push(id.clone());
            return Err(ConfigError::Cycle(cycle));
        }
        let Some(entry) = self.entries.get(id) else {
            return Ok(());
        };
        path.push(id);
        for dep in &entry.depends_on {
            if scope.contains(dep) {
                self.visit(dep, scope, path, done)?;
            }
        }
        path.pop();
        done.insert(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);

    impl ProgramCalculator for Fixed {
        fn compute_benefit(
            &self,
            _household: &Household,
            _scenario: Scenario,
        ) -> Result<Benefit, CalculatorError> {
            Ok(Benefit::eligible(self.0))
        }
    }

    #[test]
    fn register_rejects_duplicates_and_self_dependency() {
        let mut registry = Registry::new();
        registry.register("a", Fixed(1.0), &[]).expect("first registration");

        assert_eq!(
            registry.register("a", Fixed(2.0), &[]),
            Err(ConfigError::DuplicateRegistration("a".into()))
        );
        assert_eq!(
            registry.register("b", Fixed(2.0), &["b"]),
            Err(ConfigError::SelfDependency("b".into()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn check_acyclic_reports_cycle_path() {
        let mut registry = Registry::new();
        registry.register("a", Fixed(1.0), &["c"]).expect("a");
        registry.register("b", Fixed(1.0), &["a"]).expect("b");
        registry.register("c", Fixed(1.0), &["b"]).expect("c");

        let err = registry.check_acyclic().expect_err("cycle expected");
        let ConfigError::Cycle(path) = err else {
            panic!("expected cycle error, got {err:?}");
        };
        assert_eq!(path.first(), path.last());
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn check_acyclic_accepts_diamond() {
        let mut registry = Registry::new();
        registry.register("base", Fixed(1.0), &[]).expect("base");
        registry.register("left", Fixed(1.0), &["base"]).expect("left");
        registry.register("right", Fixed(1.0), &["base"]).expect("right");
        registry
            .register("top", Fixed(1.0), &["left", "right"])
            .expect("top");

        assert_eq!(registry.check_acyclic(), Ok(()));
    }

    #[test]
    fn dependencies_on_unregistered_programs_do_not_count_as_cycles() {
        let mut registry = Registry::new();
        registry.register("a", Fixed(1.0), &["ghost"]).expect("a");
        assert_eq!(registry.check_acyclic(), Ok(()));
    }
}
