use cliffs::api;
use cliffs::core::{
    Benefit, CalculatorError, FinancialState, Household, IncomeAxis, IncomeSweep, Member,
    ProgramCalculator, ProgramId, ProgramResult, Registry, Scenario, ScenarioEvaluator,
    SweepConfig, SweepSeries, Timescale,
};
use cliffs::programs::{self, SECTION8, SNAP, Section8, Snap};

const EPS: f64 = 1e-6;

fn assert_approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= EPS,
        "expected {expected}, got {actual}"
    );
}

fn single_adult_paying(rent: f64) -> Household {
    let mut household = Household {
        members: vec![Member::default()],
        ..Household::default()
    };
    household.current.contract_rent = Some(rent);
    household.future.contract_rent = Some(rent);
    household
}

fn annual_sweep(registry: &Registry, order: &[&str], base: &Household) -> SweepSeries {
    let order = order.iter().map(|id| ProgramId::from(*id)).collect::<Vec<_>>();
    let evaluator = ScenarioEvaluator::new(registry, &order).expect("valid order");
    let axis = IncomeAxis::range(0.0, 100_000.0, 1_000.0).expect("valid axis");
    IncomeSweep::new(evaluator, SweepConfig::new(axis))
        .run(base)
        .expect("sweep")
}

/// Flat rent supplement that lowers the rent later programs see.
struct RentSupplement(f64);

impl ProgramCalculator for RentSupplement {
    fn compute_benefit(
        &self,
        _household: &Household,
        _scenario: Scenario,
    ) -> Result<Benefit, CalculatorError> {
        if self.0 > 0.0 {
            Ok(Benefit::eligible(self.0))
        } else {
            Ok(Benefit::ineligible())
        }
    }

    fn feed_forward(&self, result: &ProgramResult, working: &mut FinancialState) {
        let rent = working.contract_rent_or_default();
        working.contract_rent = Some((rent - result.monthly_amount).max(0.0));
    }
}

/// Housing program that never pays.
struct NoHousing;

impl ProgramCalculator for NoHousing {
    fn compute_benefit(
        &self,
        _household: &Household,
        _scenario: Scenario,
    ) -> Result<Benefit, CalculatorError> {
        Ok(Benefit::ineligible())
    }
}

fn supplemented_registry(supplement: f64) -> Registry {
    let mut registry = Registry::new();
    registry
        .register("supplement", RentSupplement(supplement), &[])
        .expect("register supplement");
    registry
        .register(SECTION8, Section8, &["supplement"])
        .expect("register housing");
    registry
}

#[test]
fn single_adult_housing_sweep_phases_out_linearly() {
    let registry = programs::standard_registry().expect("registry");
    let base = single_adult_paying(700.0);
    let sweep = annual_sweep(&registry, &[SECTION8], &base);

    assert_eq!(sweep.len(), 100);
    assert_eq!(sweep.income_axis()[0], 0.0);
    assert_eq!(sweep.income_axis()[99], 99_000.0);
    assert_eq!(sweep.timescale(), Timescale::Yearly);

    let housing = sweep.series(&ProgramId::from(SECTION8)).expect("housing series");
    assert_approx(housing[0], 8_400.0);
    assert_approx(housing[1], 8_100.0);
    assert_approx(housing[10], 5_400.0);
    assert!(housing.windows(2).all(|w| w[1] <= w[0] + EPS));

    let first_zero = housing
        .iter()
        .position(|amount| *amount == 0.0)
        .expect("housing should phase out");
    assert_eq!(sweep.income_axis()[first_zero], 28_000.0);
    assert!(housing[first_zero..].iter().all(|amount| *amount == 0.0));
}

#[test]
fn standard_programs_produce_aligned_series() {
    let registry = programs::standard_registry().expect("registry");
    let sweep = annual_sweep(&registry, &[SECTION8, SNAP], &single_adult_paying(700.0));

    assert_eq!(sweep.series_by_program().len(), 2);
    for series in sweep.series_by_program().values() {
        assert_eq!(series.len(), sweep.income_axis().len());
    }
    assert_eq!(sweep.combined().len(), sweep.len());

    let snap = sweep.series(&ProgramId::from(SNAP)).expect("snap series");
    assert_approx(snap[0], 192.0 * 12.0);
    assert_approx(sweep.combined()[0], 8_400.0 + 192.0 * 12.0);
    assert_approx(sweep.net_resources()[0], sweep.combined()[0]);
}

#[test]
fn sweep_is_deterministic_and_leaves_base_untouched() {
    let registry = programs::standard_registry().expect("registry");
    let mut base = single_adult_paying(950.0);
    base.current.rent_share = Some(120.0);
    base.future.dependent_care = 80.0;
    let snapshot = base.clone();

    let first = annual_sweep(&registry, &[SECTION8, SNAP], &base);
    let second = annual_sweep(&registry, &[SECTION8, SNAP], &base);

    assert_eq!(base, snapshot);
    assert_eq!(
        serde_json::to_string(&first).expect("serialize"),
        serde_json::to_string(&second).expect("serialize")
    );
}

#[test]
fn upstream_supplement_reduces_downstream_housing() {
    let base = single_adult_paying(700.0);
    let supplemented = annual_sweep(
        &supplemented_registry(200.0),
        &["supplement", SECTION8],
        &base,
    );
    let unsupplemented = annual_sweep(
        &supplemented_registry(0.0),
        &["supplement", SECTION8],
        &base,
    );

    let id = ProgramId::from(SECTION8);
    let with = supplemented.series(&id).expect("housing series");
    let without = unsupplemented.series(&id).expect("housing series");

    assert_approx(with[0], 500.0 * 12.0);
    assert_approx(without[0], 700.0 * 12.0);
    assert!(with.iter().zip(without).all(|(w, wo)| *wo >= *w - EPS));
    assert!(without.iter().sum::<f64>() > with.iter().sum::<f64>());
}

#[test]
fn snap_reads_the_rent_share_left_by_housing() {
    let base = single_adult_paying(700.0);
    let real = programs::standard_registry().expect("registry");
    let mut stubbed = Registry::new();
    stubbed
        .register(SECTION8, NoHousing, &[])
        .expect("register housing stub");
    stubbed
        .register(SNAP, Snap, &[SECTION8])
        .expect("register snap");

    let with_housing = annual_sweep(&real, &[SECTION8, SNAP], &base);
    let without_housing = annual_sweep(&stubbed, &[SECTION8, SNAP], &base);

    let id = ProgramId::from(SNAP);
    let subsidized = with_housing.series(&id).expect("snap series");
    let unsubsidized = without_housing.series(&id).expect("snap series");

    // At 12k/yr the voucher leaves a 300 rent share, below half of adjusted income.
    assert_approx(subsidized[12], 15.0 * 12.0);
    assert_approx(unsubsidized[12], 114.0 * 12.0);
    assert!(unsubsidized.iter().sum::<f64>() > subsidized.iter().sum::<f64>());
}

#[test]
fn household_json_runs_through_the_api_layer() {
    let household = api::household_from_json(
        r#"{
          "members": [{ "age": 41 }, { "age": 9, "relationship": "member" }],
          "current": { "earnedIncome": 900, "contractRent": 1000 },
          "future": { "earnedIncome": 900, "contractRent": 1000 }
        }"#,
    )
    .expect("household JSON");

    let mut args = api::default_args_for_api();
    args.stop = 60_000.0;
    args.step = 5_000.0;
    let request = api::build_sweep_request(args, household).expect("request");
    let registry = programs::standard_registry().expect("registry");
    let response = api::run_sweep(&registry, request).expect("sweep");

    assert_eq!(response.sweep.len(), 12);
    assert!(response.cliffs.is_some());
    let housing = response
        .sweep
        .series(&ProgramId::from(SECTION8))
        .expect("housing series");
    assert!(housing[0] > housing[11]);
}
