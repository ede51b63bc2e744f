use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Monthly contract rent assumed when the household has not entered one.
pub const FALLBACK_CONTRACT_RENT: f64 = 700.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Current,
    Future,
}

impl Scenario {
    pub fn other(self) -> Self {
        match self {
            Scenario::Current => Scenario::Future,
            Scenario::Future => Scenario::Current,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Current => f.write_str("current"),
            Scenario::Future => f.write_str("future"),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    #[default]
    Head,
    Spouse,
    Member,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Member {
    pub age: u32,
    pub disabled: bool,
    pub relationship: Relationship,
}

impl Default for Member {
    fn default() -> Self {
        Self {
            age: 30,
            disabled: false,
            relationship: Relationship::Head,
        }
    }
}

impl Member {
    pub fn is_head_or_spouse(&self) -> bool {
        matches!(self.relationship, Relationship::Head | Relationship::Spouse)
    }
}

/// One scenario's monthly financial facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FinancialState {
    pub earned_income: f64,
    pub unearned_income: BTreeMap<String, f64>,
    pub contract_rent: Option<f64>,
    pub rent_share: Option<f64>,
    pub dependent_care: f64,
    pub medical_expenses: f64,
}

impl FinancialState {
    pub fn contract_rent_or_default(&self) -> f64 {
        self.contract_rent.unwrap_or(FALLBACK_CONTRACT_RENT)
    }

    pub fn total_unearned(&self) -> f64 {
        self.unearned_income.values().sum()
    }

    pub fn gross_monthly_income(&self) -> f64 {
        self.earned_income + self.total_unearned()
    }

    fn sanitized(&self, scenario: Scenario) -> Result<Self, String> {
        let mut out = self.clone();
        out.earned_income = non_negative(
            self.earned_income,
            &format!("{scenario}.earnedIncome"),
        )?;
        for (source, amount) in out.unearned_income.iter_mut() {
            *amount = non_negative(*amount, &format!("{scenario}.unearnedIncome.{source}"))?;
        }
        out.contract_rent = self
            .contract_rent
            .map(|v| non_negative(v, &format!("{scenario}.contractRent")))
            .transpose()?;
        out.rent_share = self
            .rent_share
            .map(|v| non_negative(v, &format!("{scenario}.rentShare")))
            .transpose()?;
        out.dependent_care = non_negative(
            self.dependent_care,
            &format!("{scenario}.dependentCare"),
        )?;
        out.medical_expenses = non_negative(
            self.medical_expenses,
            &format!("{scenario}.medicalExpenses"),
        )?;
        Ok(out)
    }
}

fn non_negative(value: f64, field: &str) -> Result<f64, String> {
    if !value.is_finite() {
        return Err(format!("{field} must be a finite number"));
    }
    if value < 0.0 {
        tracing::warn!(field, value, "negative amount clamped to zero");
        return Ok(0.0);
    }
    Ok(value)
}

/// A household's composition plus its two independent scenarios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Household {
    pub members: Vec<Member>,
    pub current: FinancialState,
    pub future: FinancialState,
}

impl Household {
    pub fn size(&self) -> usize {
        self.members.len().max(1)
    }

    pub fn scenario(&self, scenario: Scenario) -> &FinancialState {
        match scenario {
            Scenario::Current => &self.current,
            Scenario::Future => &self.future,
        }
    }

    pub fn scenario_mut(&mut self, scenario: Scenario) -> &mut FinancialState {
        match scenario {
            Scenario::Current => &mut self.current,
            Scenario::Future => &mut self.future,
        }
    }

    pub fn into_scenario(self, scenario: Scenario) -> FinancialState {
        match scenario {
            Scenario::Current => self.current,
            Scenario::Future => self.future,
        }
    }

    /// Head or spouse aged `elderly_age` or older, or any disabled head or spouse.
    pub fn has_elderly_or_disabled_head(&self, elderly_age: u32) -> bool {
        self.members
            .iter()
            .filter(|m| m.is_head_or_spouse())
            .any(|m| m.age >= elderly_age || m.disabled)
    }

    pub fn has_elderly_or_disabled_member(&self, elderly_age: u32) -> bool {
        self.members
            .iter()
            .any(|m| m.age >= elderly_age || m.disabled)
    }

    pub fn dependent_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| !m.is_head_or_spouse() && (m.age < 18 || m.disabled))
            .count()
    }

    /// Copy with every monetary field checked: non-finite values are rejected,
    /// negative amounts are clamped to zero.
    pub fn sanitized(&self) -> Result<Self, String> {
        Ok(Self {
            members: self.members.clone(),
            current: self.current.sanitized(Scenario::Current)?,
            future: self.future.sanitized(Scenario::Future)?,
        })
    }
}

/// Program identifier, e.g. `section8` or `snap`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(String);

impl ProgramId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProgramId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// What a calculator reports before the evaluator stamps and rounds it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Benefit {
    pub monthly_amount: f64,
    pub eligible: bool,
}

impl Benefit {
    pub fn ineligible() -> Self {
        Self {
            monthly_amount: 0.0,
            eligible: false,
        }
    }

    pub fn eligible(monthly_amount: f64) -> Self {
        Self {
            monthly_amount,
            eligible: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramResult {
    pub program: ProgramId,
    pub monthly_amount: f64,
    pub eligible: bool,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rounding {
    #[default]
    NearestCent,
    NearestDollar,
}

impl Rounding {
    pub fn apply(self, amount: f64) -> f64 {
        match self {
            Rounding::NearestCent => (amount * 100.0).round() / 100.0,
            Rounding::NearestDollar => amount.round(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timescale {
    Weekly,
    Monthly,
    #[default]
    Yearly,
}

impl Timescale {
    /// Multiplier converting a monthly amount into this timescale.
    pub fn from_monthly(self) -> f64 {
        match self {
            Timescale::Weekly => 12.0 / 52.0,
            Timescale::Monthly => 1.0,
            Timescale::Yearly => 12.0,
        }
    }
}

/// Benefit amounts per program, index-aligned with the income axis.
///
/// Built once by the sweep and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSeries {
    timescale: Timescale,
    income_axis: Vec<f64>,
    series_by_program: BTreeMap<ProgramId, Vec<f64>>,
    combined: Vec<f64>,
}

impl SweepSeries {
    pub(crate) fn new(
        timescale: Timescale,
        income_axis: Vec<f64>,
        series_by_program: BTreeMap<ProgramId, Vec<f64>>,
    ) -> Self {
        let combined = (0..income_axis.len())
            .map(|idx| series_by_program.values().map(|s| s[idx]).sum())
            .collect();
        Self {
            timescale,
            income_axis,
            series_by_program,
            combined,
        }
    }

    pub fn timescale(&self) -> Timescale {
        self.timescale
    }

    pub fn income_axis(&self) -> &[f64] {
        &self.income_axis
    }

    pub fn series(&self, program: &ProgramId) -> Option<&[f64]> {
        self.series_by_program.get(program).map(Vec::as_slice)
    }

    pub fn series_by_program(&self) -> &BTreeMap<ProgramId, Vec<f64>> {
        &self.series_by_program
    }

    pub fn combined(&self) -> &[f64] {
        &self.combined
    }

    /// Earned income plus all benefits at each sample point.
    pub fn net_resources(&self) -> Vec<f64> {
        self.income_axis
            .iter()
            .zip(&self.combined)
            .map(|(income, benefits)| income + benefits)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.income_axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.income_axis.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_rent_falls_back_when_missing() {
        let state = FinancialState::default();
        assert_eq!(state.contract_rent_or_default(), FALLBACK_CONTRACT_RENT);

        let state = FinancialState {
            contract_rent: Some(950.0),
            ..FinancialState::default()
        };
        assert_eq!(state.contract_rent_or_default(), 950.0);
    }

    #[test]
    fn scenario_mut_only_touches_requested_state() {
        let mut household = Household::default();
        household.scenario_mut(Scenario::Future).earned_income = 1_500.0;
        household.scenario_mut(Scenario::Future).rent_share = Some(200.0);

        assert_eq!(household.current, FinancialState::default());
        assert_eq!(household.future.earned_income, 1_500.0);
    }

    #[test]
    fn sanitized_rejects_non_finite_and_clamps_negative() {
        let mut household = Household::default();
        household.future.earned_income = f64::NAN;
        let err = household.sanitized().expect_err("NaN must be rejected");
        assert!(err.contains("future.earnedIncome"));

        let mut household = Household::default();
        household.current.rent_share = Some(-40.0);
        household
            .current
            .unearned_income
            .insert("childSupport".to_string(), -10.0);
        let clean = household.sanitized().expect("negative values are clamped");
        assert_eq!(clean.current.rent_share, Some(0.0));
        assert_eq!(clean.current.total_unearned(), 0.0);
    }

    #[test]
    fn rounding_policies() {
        assert_eq!(Rounding::NearestCent.apply(12.345_6), 12.35);
        assert_eq!(Rounding::NearestDollar.apply(12.5), 13.0);
        assert_eq!(Rounding::NearestDollar.apply(12.49), 12.0);
    }

    #[test]
    fn dependents_exclude_head_and_spouse() {
        let household = Household {
            members: vec![
                Member::default(),
                Member {
                    age: 16,
                    relationship: Relationship::Spouse,
                    ..Member::default()
                },
                Member {
                    age: 4,
                    relationship: Relationship::Member,
                    ..Member::default()
                },
                Member {
                    age: 40,
                    relationship: Relationship::Member,
                    ..Member::default()
                },
            ],
            ..Household::default()
        };
        assert_eq!(household.size(), 4);
        assert_eq!(household.dependent_count(), 1);
    }

    #[test]
    fn household_json_uses_camel_case_and_defaults() {
        let json = r#"{
          "members": [{ "age": 67, "disabled": false, "relationship": "head" }],
          "current": { "earnedIncome": 1000, "contractRent": 800 },
          "future": { "earnedIncome": 1500, "unearnedIncome": { "ssi": 200 } }
        }"#;
        let household: Household = serde_json::from_str(json).expect("household should parse");
        assert_eq!(household.current.contract_rent, Some(800.0));
        assert_eq!(household.current.rent_share, None);
        assert_eq!(household.future.total_unearned(), 200.0);
        assert!(household.has_elderly_or_disabled_head(62));
    }
}
