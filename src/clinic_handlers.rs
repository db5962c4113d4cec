// src/clinic_handlers.rs
//! Администрирование клиник: список, карточка, правка, модерация.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::info;
use std::sync::Arc;
use validator::Validate;

use crate::auth::require_admin;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::models::{Clinic, ClinicInfo, UpdateClinicRequest, UpdateClinicStatusRequest};
use crate::validation::{validate_inn, validate_phone};
use crate::AppState;

// ==================== ADMIN LIST ====================

pub async fn get_clinics(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_admin(&http_request)?;
    let (page, per_page, offset) = query.normalize();

    let mut where_sql = "WHERE 1=1".to_string();
    let mut params: Vec<String> = Vec::new();

    if let Some(ref search) = query.search {
        let search = search.trim();
        if !search.is_empty() {
            where_sql.push_str(" AND (clinic_name LIKE ? OR email LIKE ? OR city LIKE ?)");
            let pattern = format!("%{}%", search);
            params.extend([pattern.clone(), pattern.clone(), pattern]);
        }
    }
    if let Some(ref status) = query.status {
        where_sql.push_str(" AND account_status = ?");
        params.push(status.clone());
    }

    let count_sql = format!("SELECT COUNT(*) FROM clinics {}", where_sql);
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    for p in &params {
        count_query = count_query.bind(p);
    }
    let (total,) = count_query.fetch_one(&app_state.db_pool).await?;

    let list_sql = format!(
        "SELECT * FROM clinics {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let mut list_query = sqlx::query_as::<_, Clinic>(&list_sql);
    for p in &params {
        list_query = list_query.bind(p);
    }
    let clinics = list_query
        .bind(per_page)
        .bind(offset)
        .fetch_all(&app_state.db_pool)
        .await?;

    let infos: Vec<ClinicInfo> = clinics.into_iter().map(ClinicInfo::from).collect();

    let total_pages = (total + per_page - 1) / per_page;
    let response = PaginatedResponse {
        data: infos,
        total,
        page,
        per_page,
        total_pages,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

pub async fn get_clinic(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_admin(&http_request)?;
    let clinic_id = path.into_inner();

    let clinic = Clinic::find_by_id(&app_state.db_pool, &clinic_id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ClinicInfo::from(clinic))))
}

// ==================== UPDATE ====================

pub async fn update_clinic(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<UpdateClinicRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_admin(&http_request)?;
    let clinic_id = path.into_inner();
    request.validate()?;

    if let Some(ref phone) = request.phone {
        validate_phone(phone)?;
    }
    if let Some(ref inn) = request.inn {
        validate_inn(inn)?;
    }

    let existing = Clinic::find_by_id(&app_state.db_pool, &clinic_id).await?;

    let clinic_name = request.clinic_name.clone().unwrap_or(existing.clinic_name);
    let phone = request.phone.clone().unwrap_or(existing.phone);
    let region = request.region.clone().unwrap_or(existing.region);
    let city = request.city.clone().unwrap_or(existing.city);
    let contact_person_name = request
        .contact_person_name
        .clone()
        .unwrap_or(existing.contact_person_name);
    let contact_person_position = request
        .contact_person_position
        .clone()
        .or(existing.contact_person_position);
    let inn = request.inn.clone().or(existing.inn);
    let legal_address = request.legal_address.clone().or(existing.legal_address);

    sqlx::query(
        r#"UPDATE clinics SET
            clinic_name = ?, phone = ?, region = ?, city = ?,
            contact_person_name = ?, contact_person_position = ?,
            inn = ?, legal_address = ?, updated_at = ?
        WHERE id = ?"#,
    )
    .bind(&clinic_name)
    .bind(&phone)
    .bind(&region)
    .bind(&city)
    .bind(&contact_person_name)
    .bind(&contact_person_position)
    .bind(&inn)
    .bind(&legal_address)
    .bind(Utc::now())
    .bind(&clinic_id)
    .execute(&app_state.db_pool)
    .await?;

    let clinic = Clinic::find_by_id(&app_state.db_pool, &clinic_id).await?;

    info!("Admin {} updated clinic {}", claims.name, clinic_id);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        ClinicInfo::from(clinic),
        "Clinic updated successfully".to_string(),
    )))
}

// ==================== MODERATION ====================

/// Модерация аккаунта: on_moderation → active / blocked и обратно.
pub async fn update_clinic_status(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<UpdateClinicStatusRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_admin(&http_request)?;
    let clinic_id = path.into_inner();

    let result = sqlx::query(
        "UPDATE clinics SET account_status = ?, updated_at = datetime('now') WHERE id = ?",
    )
    .bind(request.account_status)
    .bind(&clinic_id)
    .execute(&app_state.db_pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::clinic_not_found(&clinic_id));
    }

    info!(
        "Admin {} set clinic {} status to {}",
        claims.name, clinic_id, request.account_status
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        "Clinic status updated".to_string(),
    )))
}
