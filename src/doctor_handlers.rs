// src/doctor_handlers.rs
//! Обработчики каталога врачей: публичная витрина и администрирование.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_admin;
use crate::catalog::CatalogQuery;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::models::{
    encode_list, CreateDoctorRequest, Doctor, DoctorDetails, DoctorStatus, UpdateDoctorRequest,
};
use crate::AppState;

// ==================== PUBLIC CATALOG ====================

#[derive(Debug, Deserialize)]
pub struct CatalogParams {
    pub search: Option<String>,
    pub specialty: Option<String>,
    pub workplace_type: Option<String>,
    pub sort: Option<String>,
}

/// Страница витрины: списковые поля врачей уже раскодированы, как и в
/// карточке отдельного врача.
#[derive(Debug, Serialize)]
pub struct PublicCatalogPage {
    pub doctors: Vec<DoctorDetails>,
    pub total: usize,
    pub filters_active: bool,
}

/// Публичный каталог: фильтрация и сортировка выполняются движком
/// поверх снимка активных врачей.
pub async fn get_public_doctors(
    app_state: web::Data<Arc<AppState>>,
    params: web::Query<CatalogParams>,
) -> ApiResult<HttpResponse> {
    let doctors: Vec<Doctor> =
        sqlx::query_as("SELECT * FROM doctors WHERE status = 'active' ORDER BY created_at")
            .fetch_all(&app_state.db_pool)
            .await?;

    let query = CatalogQuery::from_params(
        params.search.as_deref(),
        params.specialty.as_deref(),
        params.workplace_type.as_deref(),
        params.sort.as_deref(),
    );
    let page = query.apply(&doctors);

    let response = PublicCatalogPage {
        total: page.total,
        filters_active: page.filters_active,
        doctors: page.doctors.into_iter().map(DoctorDetails::from).collect(),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

pub async fn get_public_doctor(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let doctor_id = path.into_inner();

    let doctor: Doctor = sqlx::query_as("SELECT * FROM doctors WHERE id = ? AND status = 'active'")
        .bind(&doctor_id)
        .fetch_one(&app_state.db_pool)
        .await
        .map_err(|_| ApiError::doctor_not_found(&doctor_id))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(DoctorDetails::from(doctor))))
}

/// Список специальностей для выпадающего фильтра.
pub async fn get_specialties(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT specialty FROM doctors WHERE status = 'active' ORDER BY specialty",
    )
    .fetch_all(&app_state.db_pool)
    .await?;

    let specialties: Vec<String> = rows.into_iter().map(|(s,)| s).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(specialties)))
}

// ==================== ADMIN CRUD ====================

pub async fn get_doctors(
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
            where_sql.push_str(" AND (full_name LIKE ? OR specialty LIKE ? OR workplace LIKE ?)");
            let pattern = format!("%{}%", search);
            params.extend([pattern.clone(), pattern.clone(), pattern]);
        }
    }
    if let Some(ref status) = query.status {
        where_sql.push_str(" AND status = ?");
        params.push(status.clone());
    }

    let count_sql = format!("SELECT COUNT(*) FROM doctors {}", where_sql);
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    for p in &params {
        count_query = count_query.bind(p);
    }
    let (total,) = count_query.fetch_one(&app_state.db_pool).await?;

    let list_sql = format!(
        "SELECT * FROM doctors {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let mut list_query = sqlx::query_as::<_, Doctor>(&list_sql);
    for p in &params {
        list_query = list_query.bind(p);
    }
    let doctors = list_query
        .bind(per_page)
        .bind(offset)
        .fetch_all(&app_state.db_pool)
        .await?;

    let total_pages = (total + per_page - 1) / per_page;
    let response = PaginatedResponse {
        data: doctors,
        total,
        page,
        per_page,
        total_pages,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

pub async fn get_doctor(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_admin(&http_request)?;
    let doctor_id = path.into_inner();

    let doctor: Doctor = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
        .bind(&doctor_id)
        .fetch_one(&app_state.db_pool)
        .await
        .map_err(|_| ApiError::doctor_not_found(&doctor_id))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(doctor)))
}

pub async fn create_doctor(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateDoctorRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_admin(&http_request)?;
    request.validate()?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"INSERT INTO doctors (
            id, full_name, specialty, workplace, workplace_type,
            experience_years, prepayment, photo_url, description,
            education, skills, achievements, services_provided, available_dates,
            status, successful_visits_count, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', 0, ?, ?)"#,
    )
    .bind(&id)
    .bind(&request.full_name)
    .bind(&request.specialty)
    .bind(&request.workplace)
    .bind(request.workplace_type)
    .bind(request.experience_years)
    .bind(request.prepayment)
    .bind(&request.photo_url)
    .bind(&request.description)
    .bind(encode_list(&request.education))
    .bind(encode_list(&request.skills))
    .bind(encode_list(&request.achievements))
    .bind(encode_list(&request.services_provided))
    .bind(encode_list(&request.available_dates))
    .bind(now)
    .bind(now)
    .execute(&app_state.db_pool)
    .await?;

    let doctor: Doctor = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
        .bind(&id)
        .fetch_one(&app_state.db_pool)
        .await?;

    info!("Admin {} created doctor {} ({})", claims.name, doctor.full_name, doctor.id);

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        doctor,
        "Doctor created successfully".to_string(),
    )))
}

pub async fn update_doctor(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<UpdateDoctorRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_admin(&http_request)?;
    let doctor_id = path.into_inner();
    request.validate()?;

    let existing: Doctor = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
        .bind(&doctor_id)
        .fetch_one(&app_state.db_pool)
        .await
        .map_err(|_| ApiError::doctor_not_found(&doctor_id))?;

    // Merge: непереданные поля сохраняют текущие значения
    let full_name = request.full_name.clone().unwrap_or(existing.full_name);
    let specialty = request.specialty.clone().unwrap_or(existing.specialty);
    let workplace = request.workplace.clone().unwrap_or(existing.workplace);
    let workplace_type = request.workplace_type.unwrap_or(existing.workplace_type);
    let experience_years = request.experience_years.unwrap_or(existing.experience_years);
    let prepayment = request.prepayment.unwrap_or(existing.prepayment);
    let photo_url = request.photo_url.clone().or(existing.photo_url);
    let description = request.description.clone().or(existing.description);
    let education = encode_list(&request.education).or(existing.education);
    let skills = encode_list(&request.skills).or(existing.skills);
    let achievements = encode_list(&request.achievements).or(existing.achievements);
    let services_provided = encode_list(&request.services_provided).or(existing.services_provided);
    let available_dates = encode_list(&request.available_dates).or(existing.available_dates);
    let status = request.status.unwrap_or(existing.status);

    sqlx::query(
        r#"UPDATE doctors SET
            full_name = ?, specialty = ?, workplace = ?, workplace_type = ?,
            experience_years = ?, prepayment = ?, photo_url = ?, description = ?,
            education = ?, skills = ?, achievements = ?, services_provided = ?,
            available_dates = ?, status = ?, updated_at = ?
        WHERE id = ?"#,
    )
    .bind(&full_name)
    .bind(&specialty)
    .bind(&workplace)
    .bind(workplace_type)
    .bind(experience_years)
    .bind(prepayment)
    .bind(&photo_url)
    .bind(&description)
    .bind(&education)
    .bind(&skills)
    .bind(&achievements)
    .bind(&services_provided)
    .bind(&available_dates)
    .bind(status)
    .bind(Utc::now())
    .bind(&doctor_id)
    .execute(&app_state.db_pool)
    .await?;

    let doctor: Doctor = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
        .bind(&doctor_id)
        .fetch_one(&app_state.db_pool)
        .await?;

    info!("Admin {} updated doctor {}", claims.name, doctor_id);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        doctor,
        "Doctor updated successfully".to_string(),
    )))
}

/// Удаление врача. При наличии связанных заявок врач переводится
/// в inactive вместо физического удаления.
pub async fn delete_doctor(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_admin(&http_request)?;
    let doctor_id = path.into_inner();

    let (order_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE doctor_id = ?")
        .bind(&doctor_id)
        .fetch_one(&app_state.db_pool)
        .await?;

    if order_count > 0 {
        let result = sqlx::query(
            "UPDATE doctors SET status = 'inactive', updated_at = datetime('now') WHERE id = ?",
        )
        .bind(&doctor_id)
        .execute(&app_state.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::doctor_not_found(&doctor_id));
        }

        info!("Admin {} deactivated doctor {} ({} linked orders)", claims.name, doctor_id, order_count);
        return Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            (),
            "Doctor has linked orders and was deactivated instead".to_string(),
        )));
    }

    let result = sqlx::query("DELETE FROM doctors WHERE id = ?")
        .bind(&doctor_id)
        .execute(&app_state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::doctor_not_found(&doctor_id));
    }

    info!("Admin {} deleted doctor {}", claims.name, doctor_id);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        "Doctor deleted successfully".to_string(),
    )))
}

/// Переключение статуса active/inactive.
pub async fn update_doctor_status(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<UpdateDoctorStatusRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_admin(&http_request)?;
    let doctor_id = path.into_inner();

    let result = sqlx::query("UPDATE doctors SET status = ?, updated_at = datetime('now') WHERE id = ?")
        .bind(request.status)
        .bind(&doctor_id)
        .execute(&app_state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::doctor_not_found(&doctor_id));
    }

    info!("Admin {} set doctor {} status to {}", claims.name, doctor_id, request.status);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        "Doctor status updated".to_string(),
    )))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorStatusRequest {
    pub status: DoctorStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[actix_rt::test]
    async fn test_public_catalog_returns_decoded_list_fields() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        crate::db::seed_doctors(&pool).await.unwrap();

        let app_state = web::Data::new(Arc::new(AppState {
            db_pool: pool,
            config: Config::default(),
        }));
        let params = web::Query(CatalogParams {
            search: None,
            specialty: None,
            workplace_type: None,
            sort: None,
        });

        let response = get_public_doctors(app_state, params).await.unwrap();
        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        let page = &json["data"];
        assert_eq!(page["total"], 6);
        assert_eq!(page["filters_active"], false);
        // списковые поля приходят массивами, а не JSON-строками
        for doctor in page["doctors"].as_array().unwrap() {
            assert!(doctor["skills"].is_array(), "skills: {}", doctor["skills"]);
            assert!(doctor["education"].is_array());
        }
    }
}
