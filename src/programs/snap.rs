//! Supplemental Nutrition Assistance Program (federal rules, FY2018 figures).

use crate::core::{Benefit, CalculatorError, Household, ProgramCalculator, Rounding, Scenario};

const ELDERLY_AGE: u32 = 60;
const FPL_ANNUAL_BASE: f64 = 12_140.0;
const FPL_ANNUAL_PER_MEMBER: f64 = 4_320.0;
const GROSS_LIMIT_RATIO: f64 = 1.30;
const EARNED_INCOME_DEDUCTION: f64 = 0.20;
const MEDICAL_EXPENSE_THRESHOLD: f64 = 35.0;
const SHELTER_CAP: f64 = 535.0;
const NET_INCOME_CONTRIBUTION: f64 = 0.30;
const MINIMUM_BENEFIT: f64 = 15.0;

const MAX_ALLOTMENTS: [f64; 8] = [192.0, 353.0, 505.0, 642.0, 762.0, 914.0, 1_011.0, 1_155.0];
const EXTRA_MEMBER_ALLOTMENT: f64 = 144.0;
const STANDARD_DEDUCTIONS: [f64; 6] = [160.0, 160.0, 160.0, 170.0, 199.0, 228.0];

#[derive(Debug, Clone, Copy, Default)]
pub struct Snap;

fn monthly_poverty_line(size: usize) -> f64 {
    (FPL_ANNUAL_BASE + FPL_ANNUAL_PER_MEMBER * size.saturating_sub(1) as f64) / 12.0
}

fn max_allotment(size: usize) -> f64 {
    match size {
        0 => MAX_ALLOTMENTS[0],
        1..=8 => MAX_ALLOTMENTS[size - 1],
        _ => MAX_ALLOTMENTS[7] + (size - 8) as f64 * EXTRA_MEMBER_ALLOTMENT,
    }
}

fn standard_deduction(size: usize) -> f64 {
    STANDARD_DEDUCTIONS[size.clamp(1, STANDARD_DEDUCTIONS.len()) - 1]
}

impl ProgramCalculator for Snap {
    fn compute_benefit(
        &self,
        household: &Household,
        scenario: Scenario,
    ) -> Result<Benefit, CalculatorError> {
        let state = household.scenario(scenario);
        let size = household.size();
        let elderly_or_disabled = household.has_elderly_or_disabled_member(ELDERLY_AGE);
        let poverty_line = monthly_poverty_line(size);
        let gross = state.gross_monthly_income();

        if !elderly_or_disabled && gross > poverty_line * GROSS_LIMIT_RATIO {
            return Ok(Benefit::ineligible());
        }

        let mut adjusted = gross
            - EARNED_INCOME_DEDUCTION * state.earned_income
            - standard_deduction(size)
            - state.dependent_care;
        if elderly_or_disabled {
            adjusted -= (state.medical_expenses - MEDICAL_EXPENSE_THRESHOLD).max(0.0);
        }
        let adjusted = adjusted.max(0.0);

        // Post-subsidy rent when a housing program has run, full rent otherwise.
        let housing_cost = state
            .rent_share
            .unwrap_or_else(|| state.contract_rent_or_default());
        let mut excess_shelter = (housing_cost - adjusted / 2.0).max(0.0);
        if !elderly_or_disabled {
            excess_shelter = excess_shelter.min(SHELTER_CAP);
        }

        let net = (adjusted - excess_shelter).max(0.0);
        if net > poverty_line {
            return Ok(Benefit::ineligible());
        }

        let mut amount = max_allotment(size) - NET_INCOME_CONTRIBUTION * net;
        if size <= 2 {
            amount = amount.max(MINIMUM_BENEFIT);
        }
        if amount <= 0.0 {
            return Ok(Benefit::ineligible());
        }
        Ok(Benefit::eligible(amount))
    }

    fn rounding(&self) -> Rounding {
        Rounding::NearestDollar
    }
}
