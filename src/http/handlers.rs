//! Route handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Serialize;

use crate::apm::PerformanceSummary;
use crate::health::HealthStatus;
use crate::http::response::{no_cache, ApiError};
use crate::http::server::AppState;
use crate::portfolio::{self, Portfolio, PublishedPage, Template};

fn health_status_code(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    }
}

pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.health.run_all_checks().await;
    no_cache(health_status_code(report.overall), report)
}

pub async fn health_check(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let check = state
        .health
        .run_check(&name)
        .await
        .ok_or(ApiError::CheckNotFound(name))?;
    Ok(no_cache(health_status_code(check.status), check))
}

pub async fn ready(State(state): State<AppState>) -> Response {
    let readiness = state.health.readiness().await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    no_cache(status, readiness)
}

pub async fn live(State(state): State<AppState>) -> Response {
    no_cache(StatusCode::OK, state.health.liveness())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApmSummary {
    pub enabled: bool,
    pub retained_transactions: usize,
    pub retained_metrics: usize,
    #[serde(flatten)]
    pub performance: PerformanceSummary,
}

pub async fn apm_summary(State(state): State<AppState>) -> Json<ApmSummary> {
    Json(ApmSummary {
        enabled: state.apm.is_enabled(),
        retained_transactions: state.apm.ledger().transaction_count(),
        retained_metrics: state.apm.metrics().len(),
        performance: state.apm.performance_summary(),
    })
}

#[derive(Serialize)]
pub struct PortfolioSummary {
    pub slug: String,
    pub owner_name: String,
    pub headline: String,
    pub template: Template,
}

pub async fn list_portfolios(State(state): State<AppState>) -> Result<Json<Vec<PortfolioSummary>>, ApiError> {
    let store = state.portfolios.clone();
    let summaries = state
        .correlator
        .portfolio("list", "*", async move {
            Ok::<_, ApiError>(
                store
                    .list()
                    .into_iter()
                    .map(|p| PortfolioSummary {
                        slug: p.slug,
                        owner_name: p.owner_name,
                        headline: p.headline,
                        template: p.template,
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .await?;
    Ok(Json(summaries))
}

#[derive(Serialize)]
pub struct PortfolioView {
    pub portfolio: Portfolio,
    pub page: PublishedPage,
}

pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PortfolioView>, ApiError> {
    let base_domain = state.config.load().portfolio.base_domain.clone();
    let store = state.portfolios.clone();

    let view = state
        .correlator
        .portfolio("view", &slug, async {
            let portfolio = store
                .get(&slug)
                .ok_or_else(|| ApiError::PortfolioNotFound(slug.clone()))?;
            let page = portfolio::assemble(&portfolio, &base_domain)?;
            Ok::<_, ApiError>(PortfolioView { portfolio, page })
        })
        .await?;
    Ok(Json(view))
}
