use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::analytics::financial::{self, FinancialAnalytics, FinancialQuery};
use crate::analytics::reports::{
    self, Interval, LocationReport, OrganizationReport, ReportWindow, UserReport,
};
use crate::analytics::summary::{self, Summary};
use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct ReportQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub interval: Option<Interval>,
}

impl ReportQuery {
    fn window(&self) -> Result<ReportWindow, AppError> {
        Ok(ReportWindow::from_query(
            self.start.as_deref(),
            self.end.as_deref(),
            self.interval,
            Utc::now(),
        )?)
    }
}

pub async fn summary(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Summary>, AppError> {
    let appointments = db::appointments::list_by_user(&state.pool, auth.user_id).await?;
    let summary = summary::summarize(&state.pool, &appointments, Utc::now()).await?;
    Ok(Json(summary))
}

pub async fn financial(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<FinancialQuery>,
) -> Result<Json<FinancialAnalytics>, AppError> {
    let query = query.scoped_for(&auth).map_err(AppError::Forbidden)?;
    let report = financial::financial_analytics(&state.pool, &query, Utc::now()).await?;
    Ok(Json(report))
}

pub async fn organization(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<OrganizationReport>, AppError> {
    auth.require_organization_admin(id)?;
    let report = reports::organization_report(&state.pool, id, &query.window()?, Utc::now()).await?;
    Ok(Json(report))
}

/// A user may read their own report; admins read those of their members.
pub async fn user(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<UserReport>, AppError> {
    if id != auth.user_id && !auth.is_super_admin() {
        let target = db::users::find_by_id(&state.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        match target.organization_id {
            Some(org) => auth.require_organization_admin(org)?,
            None => auth.require_super_admin()?,
        }
    }
    let report = reports::user_report(&state.pool, id, &query.window()?, Utc::now()).await?;
    Ok(Json(report))
}

pub async fn location(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<LocationReport>, AppError> {
    let location = db::locations::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Location not found".to_string()))?;
    match location.organization_id {
        Some(org) => auth.require_organization_admin(org)?,
        None => auth.require_super_admin()?,
    }
    let report = reports::location_report(&state.pool, id, &query.window()?, Utc::now()).await?;
    Ok(Json(report))
}
