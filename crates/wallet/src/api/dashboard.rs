use analytics::{
    compute_asset_allocation, compute_earnings_summary, compute_monthly_performance,
    compute_project_investments, generate_period_report, AllocationSlice, Dashboard,
    EarningsSummary, PerformancePoint, Period, PeriodReport, ProjectInvestment,
};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::{ApiError, AppState};

pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> Result<Json<Dashboard>, ApiError> {
    let view = state.current_view().await?;
    Ok(Json(Dashboard::compute(&view, chrono::Utc::now())))
}

pub async fn get_performance(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PerformancePoint>>, ApiError> {
    let view = state.current_view().await?;
    Ok(Json(compute_monthly_performance(&view, chrono::Utc::now())))
}

pub async fn get_allocation(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AllocationSlice>>, ApiError> {
    let view = state.current_view().await?;
    Ok(Json(compute_asset_allocation(&view)))
}

pub async fn get_investments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProjectInvestment>>, ApiError> {
    let view = state.current_view().await?;
    Ok(Json(compute_project_investments(&view)))
}

pub async fn get_earnings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EarningsSummary>, ApiError> {
    let view = state.current_view().await?;
    Ok(Json(compute_earnings_summary(&view)))
}

#[derive(Deserialize)]
pub struct ReportQuery {
    pub year: i32,
    pub quarter: Option<u8>,
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<PeriodReport>, ApiError> {
    let period = match query.quarter {
        Some(q) => Period::quarterly(query.year, q)?,
        None => Period::annual(query.year),
    };
    let view = state.current_view().await?;
    Ok(Json(generate_period_report(&view.entries, period)?))
}
