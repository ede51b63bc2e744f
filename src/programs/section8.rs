//! Section 8 Housing Choice Voucher.
//!
//! The household pays a total tenant payment (TTP) towards the contract rent
//! and the voucher covers the rest. A household already holding a voucher
//! does not have its share recomputed from scratch when income changes: the
//! share moves by the change in TTP relative to its baseline scenario.

use crate::core::{
    Benefit, CalculatorError, FinancialState, Household, ProgramCalculator, ProgramResult,
    Rounding, Scenario,
};

const ELDERLY_AGE: u32 = 62;
const DEPENDENT_DEDUCTION_ANNUAL: f64 = 480.0;
const ELDERLY_DISABLED_DEDUCTION_ANNUAL: f64 = 400.0;
const MEDICAL_EXPENSE_THRESHOLD: f64 = 0.03;
const ADJUSTED_INCOME_RATE: f64 = 0.30;
const GROSS_INCOME_RATE: f64 = 0.10;

/// Annual low-income (80% of area median) limits for household sizes 1 through 8.
const INCOME_LIMITS: [f64; 8] = [
    56_800.0, 64_900.0, 73_000.0, 81_100.0, 87_600.0, 94_100.0, 100_600.0, 107_100.0,
];
/// Each member beyond eight adds this share of the four-person limit.
const EXTRA_MEMBER_LIMIT_SHARE: f64 = 0.08;

#[derive(Debug, Clone, Copy, Default)]
pub struct Section8;

impl Section8 {
    fn income_limit(size: usize) -> f64 {
        match size {
            0 => INCOME_LIMITS[0],
            1..=8 => INCOME_LIMITS[size - 1],
            _ => INCOME_LIMITS[7] + (size - 8) as f64 * EXTRA_MEMBER_LIMIT_SHARE * INCOME_LIMITS[3],
        }
    }

    fn adjusted_monthly_income(household: &Household, state: &FinancialState) -> f64 {
        let annual = state.gross_monthly_income() * 12.0;
        let elderly_or_disabled = household.has_elderly_or_disabled_head(ELDERLY_AGE);

        let mut deductions = household.dependent_count() as f64 * DEPENDENT_DEDUCTION_ANNUAL
            + state.dependent_care * 12.0;
        if elderly_or_disabled {
            deductions += ELDERLY_DISABLED_DEDUCTION_ANNUAL;
            deductions += (state.medical_expenses * 12.0 - MEDICAL_EXPENSE_THRESHOLD * annual).max(0.0);
        }
        (annual - deductions).max(0.0) / 12.0
    }

    /// Monthly total tenant payment.
    pub fn total_tenant_payment(household: &Household, state: &FinancialState) -> f64 {
        let adjusted = Self::adjusted_monthly_income(household, state);
        (ADJUSTED_INCOME_RATE * adjusted).max(GROSS_INCOME_RATE * state.gross_monthly_income())
    }

    fn rent_share(household: &Household, scenario: Scenario) -> f64 {
        let state = household.scenario(scenario);
        match scenario {
            Scenario::Current => state
                .rent_share
                .unwrap_or_else(|| Self::total_tenant_payment(household, state)),
            Scenario::Future => {
                let baseline = household.scenario(Scenario::Current);
                let future_ttp = Self::total_tenant_payment(household, state);
                match baseline.rent_share {
                    Some(prior) => {
                        prior + future_ttp - Self::total_tenant_payment(household, baseline)
                    }
                    None => future_ttp,
                }
            }
        }
    }
}

impl ProgramCalculator for Section8 {
    fn compute_benefit(
        &self,
        household: &Household,
        scenario: Scenario,
    ) -> Result<Benefit, CalculatorError> {
        let state = household.scenario(scenario);
        if state.gross_monthly_income() * 12.0 > Self::income_limit(household.size()) {
            return Ok(Benefit::ineligible());
        }

        let rent = state.contract_rent_or_default();
        let share = Self::rent_share(household, scenario).max(0.0);
        let subsidy = (rent - share).clamp(0.0, rent);
        if subsidy <= 0.0 {
            return Ok(Benefit::ineligible());
        }
        Ok(Benefit::eligible(subsidy))
    }

    fn rounding(&self) -> Rounding {
        Rounding::NearestCent
    }

    fn feed_forward(&self, result: &ProgramResult, working: &mut FinancialState) {
        working.rent_share = Some(working.contract_rent_or_default() - result.monthly_amount);
    }
}
