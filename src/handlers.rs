// src/handlers.rs
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::economics::{CostTable, VisitParams, VisitReport};
use crate::error::ApiResult;
use crate::AppState;

// ==================== COMMON STRUCTURES ====================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
}

impl PaginationQuery {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

// ==================== HEALTH ====================

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

// ==================== VISIT ECONOMICS ====================

/// Публичный расчёт экономики визита для слайдеров на лендинге.
pub async fn calculate_economics(query: web::Query<VisitParams>) -> ApiResult<HttpResponse> {
    query.validate()?;

    let report = VisitReport::build(&query, CostTable::default());
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

// ==================== DASHBOARD STATISTICS ====================

pub async fn get_dashboard_stats(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    #[derive(Debug, Serialize)]
    struct DashboardStats {
        active_doctors: i64,
        total_clinics: i64,
        clinics_on_moderation: i64,
        new_orders: i64,
        orders_in_progress: i64,
        completed_orders: i64,
    }

    let active_doctors: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM doctors WHERE status = 'active'")
            .fetch_one(&app_state.db_pool)
            .await?;

    let total_clinics: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clinics")
        .fetch_one(&app_state.db_pool)
        .await?;

    let clinics_on_moderation: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM clinics WHERE account_status = 'on_moderation'")
            .fetch_one(&app_state.db_pool)
            .await?;

    let new_orders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE status = 'new'")
        .fetch_one(&app_state.db_pool)
        .await?;

    let orders_in_progress: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE status IN ('confirmed', 'in_progress')",
    )
    .fetch_one(&app_state.db_pool)
    .await?;

    let completed_orders: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE status = 'completed'")
            .fetch_one(&app_state.db_pool)
            .await?;

    let stats = DashboardStats {
        active_doctors: active_doctors.0,
        total_clinics: total_clinics.0,
        clinics_on_moderation: clinics_on_moderation.0,
        new_orders: new_orders.0,
        orders_in_progress: orders_in_progress.0,
        completed_orders: completed_orders.0,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normalize_defaults() {
        let query = PaginationQuery {
            page: None,
            per_page: None,
            search: None,
            status: None,
        };
        assert_eq!(query.normalize(), (1, 20, 0));
    }

    #[test]
    fn test_pagination_normalize_clamps() {
        let query = PaginationQuery {
            page: Some(-3),
            per_page: Some(1000),
            search: None,
            status: None,
        };
        assert_eq!(query.normalize(), (1, 100, 0));

        let query = PaginationQuery {
            page: Some(3),
            per_page: Some(10),
            search: None,
            status: None,
        };
        assert_eq!(query.normalize(), (3, 10, 20));
    }
}
