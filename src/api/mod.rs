use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Json, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{
    Cliff, ConfigError, EvaluationError, Household, IncomeAxis, IncomeSweep, Member, ProgramId,
    ProgramResult, Registry, Relationship, Rounding, Scenario, ScenarioEvaluator, SweepConfig,
    SweepError, SweepSeries, Timescale, find_cliffs,
};
use crate::programs::{self, STANDARD_ORDER};

const MAX_HOUSEHOLD_SIZE: u32 = 20;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliScenario {
    Current,
    Future,
}

impl From<CliScenario> for Scenario {
    fn from(value: CliScenario) -> Self {
        match value {
            CliScenario::Current => Scenario::Current,
            CliScenario::Future => Scenario::Future,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliTimescale {
    Weekly,
    Monthly,
    Yearly,
}

impl From<CliTimescale> for Timescale {
    fn from(value: CliTimescale) -> Self {
        match value {
            CliTimescale::Weekly => Timescale::Weekly,
            CliTimescale::Monthly => Timescale::Monthly,
            CliTimescale::Yearly => Timescale::Yearly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiScenario {
    Current,
    Future,
}

impl From<ApiScenario> for CliScenario {
    fn from(value: ApiScenario) -> Self {
        match value {
            ApiScenario::Current => CliScenario::Current,
            ApiScenario::Future => CliScenario::Future,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiTimescale {
    #[serde(alias = "week", alias = "Weekly")]
    Weekly,
    #[serde(alias = "month", alias = "Monthly")]
    Monthly,
    #[serde(alias = "year", alias = "annual", alias = "Yearly")]
    Yearly,
}

impl From<ApiTimescale> for CliTimescale {
    fn from(value: ApiTimescale) -> Self {
        match value {
            ApiTimescale::Weekly => CliTimescale::Weekly,
            ApiTimescale::Monthly => CliTimescale::Monthly,
            ApiTimescale::Yearly => CliTimescale::Yearly,
        }
    }
}

/// Sweep parameters shared by the CLI and the HTTP API.
#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[arg(long, default_value_t = 0.0, help = "First income sample, in --timescale units")]
    pub start: f64,
    #[arg(
        long,
        default_value_t = 100_000.0,
        help = "Exclusive upper bound of the income range"
    )]
    pub stop: f64,
    #[arg(long, default_value_t = 1_000.0, help = "Distance between income samples")]
    pub step: f64,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Explicit, strictly increasing income points; overrides --start/--stop/--step"
    )]
    pub points: Vec<f64>,
    #[arg(
        long,
        value_delimiter = ',',
        default_values = STANDARD_ORDER,
        help = "Active programs in evaluation order"
    )]
    pub programs: Vec<String>,
    #[arg(
        long,
        value_enum,
        default_value_t = CliScenario::Future,
        help = "Scenario whose earned income is swept"
    )]
    pub varied: CliScenario,
    #[arg(
        long,
        value_enum,
        default_value_t = CliTimescale::Yearly,
        help = "Unit of the income axis and of the reported benefit amounts"
    )]
    pub timescale: CliTimescale,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SweepPayload {
    household: Option<Household>,
    start: Option<f64>,
    stop: Option<f64>,
    step: Option<f64>,
    points: Option<Vec<f64>>,
    programs: Option<Vec<String>>,
    varied: Option<ApiScenario>,
    timescale: Option<ApiTimescale>,
}

/// Flat query-string form of [`SweepPayload`] with a generated household.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SweepQuery {
    start: Option<f64>,
    stop: Option<f64>,
    step: Option<f64>,
    programs: Option<String>,
    varied: Option<ApiScenario>,
    timescale: Option<ApiTimescale>,
    household_size: Option<u32>,
    contract_rent: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EvaluatePayload {
    household: Option<Household>,
    programs: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct SweepRequest {
    pub household: Household,
    pub order: Vec<ProgramId>,
    pub config: SweepConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResponse {
    pub sweep: SweepSeries,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cliffs: Option<Vec<Cliff>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    pub earned_income: f64,
    pub results: Vec<ProgramResult>,
    pub total_monthly: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub current: ScenarioSummary,
    pub future: ScenarioSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramInfo {
    pub id: ProgramId,
    pub depends_on: Vec<ProgramId>,
    pub rounding: Rounding,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sweep(#[from] SweepError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error("invalid household input: {0}")]
    InvalidInput(String),
}

impl RunError {
    fn status(&self) -> StatusCode {
        match self {
            RunError::Config(_)
            | RunError::InvalidInput(_)
            | RunError::Sweep(SweepError::InvalidAxis(_) | SweepError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            RunError::Sweep(_) | RunError::Evaluation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
}

pub fn default_args_for_api() -> SweepArgs {
    SweepArgs {
        start: 0.0,
        stop: 100_000.0,
        step: 1_000.0,
        points: Vec::new(),
        programs: STANDARD_ORDER.iter().map(|id| id.to_string()).collect(),
        varied: CliScenario::Future,
        timescale: CliTimescale::Yearly,
    }
}

/// Single adult head of household, plus children to reach `size`.
pub fn default_household(size: u32) -> Household {
    let mut members = vec![Member::default()];
    for _ in 1..size.max(1) {
        members.push(Member {
            age: 8,
            disabled: false,
            relationship: Relationship::Member,
        });
    }
    Household {
        members,
        ..Household::default()
    }
}

pub fn household_from_json(json: &str) -> Result<Household, String> {
    serde_json::from_str::<Household>(json).map_err(|e| format!("Invalid household JSON: {e}"))
}

pub fn build_sweep_request(args: SweepArgs, household: Household) -> Result<SweepRequest, String> {
    if args.programs.is_empty() {
        return Err("--programs must name at least one program".to_string());
    }

    let mut order = Vec::with_capacity(args.programs.len());
    for name in &args.programs {
        let name = name.trim();
        if name.is_empty() {
            return Err("--programs must not contain empty names".to_string());
        }
        order.push(ProgramId::from(name));
    }

    let axis = if args.points.is_empty() {
        if !args.start.is_finite() || args.start < 0.0 {
            return Err("--start must be >= 0".to_string());
        }
        if !args.step.is_finite() || args.step <= 0.0 {
            return Err("--step must be > 0".to_string());
        }
        if !args.stop.is_finite() || args.stop <= args.start {
            return Err("--stop must be > --start".to_string());
        }
        IncomeAxis::range(args.start, args.stop, args.step)
    } else {
        IncomeAxis::from_points(args.points)
    }
    .map_err(|e| e.to_string())?;

    Ok(SweepRequest {
        household,
        order,
        config: SweepConfig {
            axis,
            varied: args.varied.into(),
            timescale: args.timescale.into(),
        },
    })
}

pub fn run_sweep(registry: &Registry, request: SweepRequest) -> Result<SweepResponse, RunError> {
    let evaluator = ScenarioEvaluator::new(registry, &request.order)?;
    let sweep = IncomeSweep::new(evaluator, request.config);
    let series = sweep.run(&request.household)?;
    let cliffs = find_cliffs(&series);
    tracing::info!(
        points = series.len(),
        cliffs = cliffs.len(),
        "sweep finished"
    );
    Ok(SweepResponse {
        sweep: series,
        cliffs: Some(cliffs),
    })
}

/// Evaluates both scenarios of a household side by side.
pub fn evaluate_household(
    registry: &Registry,
    household: &Household,
    order: &[ProgramId],
) -> Result<EvaluateResponse, RunError> {
    let evaluator = ScenarioEvaluator::new(registry, order)?;
    let household = household.sanitized().map_err(RunError::InvalidInput)?;

    let summarize = |scenario: Scenario| -> Result<ScenarioSummary, RunError> {
        let evaluation = evaluator.evaluate(&household, scenario)?;
        Ok(ScenarioSummary {
            earned_income: household.scenario(scenario).earned_income,
            total_monthly: evaluation.total_monthly(),
            results: evaluation.results,
        })
    };

    Ok(EvaluateResponse {
        current: summarize(Scenario::Current)?,
        future: summarize(Scenario::Future)?,
    })
}

pub fn list_programs(registry: &Registry) -> Vec<ProgramInfo> {
    registry
        .ids()
        .filter_map(|id| {
            registry.get(id).map(|entry| ProgramInfo {
                id: id.clone(),
                depends_on: entry.depends_on().to_vec(),
                rounding: entry.calculator().rounding(),
            })
        })
        .collect()
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/programs", get(programs_handler))
        .route(
            "/api/sweep",
            get(sweep_get_handler).post(sweep_post_handler),
        )
        .route("/api/evaluate", post(evaluate_post_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let registry = programs::standard_registry().map_err(std::io::Error::other)?;
    let state = AppState {
        registry: Arc::new(registry),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "benefit cliff API listening");

    axum::serve(listener, build_router(state)).await
}

async fn programs_handler(State(state): State<AppState>) -> Response {
    json_response(StatusCode::OK, list_programs(&state.registry))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn sweep_get_handler(
    State(state): State<AppState>,
    query: Result<Query<SweepQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };
    match sweep_payload_from_query(query) {
        Ok(payload) => sweep_handler_impl(&state, payload),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn sweep_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<SweepPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => sweep_handler_impl(&state, payload),
        Err(rejection) => error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    }
}

fn sweep_handler_impl(state: &AppState, payload: SweepPayload) -> Response {
    let request = match sweep_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match run_sweep(&state.registry, request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => {
            tracing::warn!(error = %err, "sweep request failed");
            error_response(err.status(), &err.to_string())
        }
    }
}

async fn evaluate_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<EvaluatePayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };
    let household = payload.household.unwrap_or_else(|| default_household(1));
    let order = payload
        .programs
        .unwrap_or_else(|| STANDARD_ORDER.iter().map(|id| id.to_string()).collect())
        .iter()
        .map(|id| ProgramId::from(id.trim()))
        .collect::<Vec<_>>();

    match evaluate_household(&state.registry, &household, &order) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => error_response(err.status(), &err.to_string()),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn sweep_request_from_json(json: &str) -> Result<SweepRequest, String> {
    let payload = serde_json::from_str::<SweepPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    sweep_request_from_payload(payload)
}

fn sweep_payload_from_query(query: SweepQuery) -> Result<SweepPayload, String> {
    let size = query.household_size.unwrap_or(1);
    if !(1..=MAX_HOUSEHOLD_SIZE).contains(&size) {
        return Err(format!(
            "householdSize must be between 1 and {MAX_HOUSEHOLD_SIZE}"
        ));
    }
    let mut household = default_household(size);
    if let Some(rent) = query.contract_rent {
        household.current.contract_rent = Some(rent);
        household.future.contract_rent = Some(rent);
    }

    Ok(SweepPayload {
        household: Some(household),
        start: query.start,
        stop: query.stop,
        step: query.step,
        points: None,
        programs: query
            .programs
            .map(|list| list.split(',').map(|id| id.trim().to_string()).collect()),
        varied: query.varied,
        timescale: query.timescale,
    })
}

fn sweep_request_from_payload(payload: SweepPayload) -> Result<SweepRequest, String> {
    let mut args = default_args_for_api();

    if let Some(v) = payload.start {
        args.start = v;
    }
    if let Some(v) = payload.stop {
        args.stop = v;
    }
    if let Some(v) = payload.step {
        args.step = v;
    }
    if let Some(v) = payload.points {
        args.points = v;
    }
    if let Some(v) = payload.programs {
        args.programs = v;
    }
    if let Some(v) = payload.varied {
        args.varied = v.into();
    }
    if let Some(v) = payload.timescale {
        args.timescale = v.into();
    }

    let household = payload.household.unwrap_or_else(|| default_household(1));
    build_sweep_request(args, household)
}
