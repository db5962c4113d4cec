// src/order_handlers.rs
//! Заявки на выезд: создание и отслеживание клиникой, обработка админом.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use log::info;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{require_admin, require_clinic};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::models::{
    Clinic, CreateOrderRequest, Doctor, DoctorStatus, Order, OrderListItem, OrderStatus,
    UpdateOrderRequest,
};
use crate::validation::validate_phone;
use crate::AppState;

const ORDER_LIST_SELECT: &str = r#"
    SELECT
        o.id, o.clinic_id, o.doctor_id, o.visit_date, o.visit_time,
        o.patient_count, o.urgency_level, o.status, o.contact_person,
        o.contact_phone, o.visit_city, o.clinic_comments, o.estimated_cost,
        o.created_at,
        c.clinic_name AS clinic_name,
        d.full_name AS doctor_name,
        d.specialty AS doctor_specialty
    FROM orders o
    LEFT JOIN clinics c ON o.clinic_id = c.id
    LEFT JOIN doctors d ON o.doctor_id = d.id
"#;

async fn fetch_order(pool: &sqlx::SqlitePool, order_id: &str) -> ApiResult<Order> {
    sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(order_id)
        .fetch_one(pool)
        .await
        .map_err(|_| ApiError::order_not_found(order_id))
}

// ==================== CLINIC SIDE ====================

pub async fn create_order(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateOrderRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_clinic(&http_request)?;
    request.validate()?;
    validate_phone(&request.contact_phone)?;

    let doctor: Doctor = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
        .bind(&request.doctor_id)
        .fetch_one(&app_state.db_pool)
        .await
        .map_err(|_| ApiError::doctor_not_found(&request.doctor_id))?;

    if doctor.status != DoctorStatus::Active {
        return Err(ApiError::doctor_inactive(&doctor.id));
    }

    let clinic = Clinic::find_by_id(&app_state.db_pool, &claims.sub).await?;

    // город и регион визита по умолчанию берутся из профиля клиники
    let visit_city = request.visit_city.clone().unwrap_or_else(|| clinic.city.clone());
    let visit_region = request.visit_region.clone().unwrap_or_else(|| clinic.region.clone());

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"INSERT INTO orders (
            id, clinic_id, doctor_id, visit_date, visit_time, patient_count,
            urgency_level, status, contact_person, contact_phone,
            visit_city, visit_region, clinic_comments, estimated_cost,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 'new', ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&claims.sub)
    .bind(&request.doctor_id)
    .bind(request.visit_date)
    .bind(&request.visit_time)
    .bind(request.patient_count)
    .bind(request.urgency_level)
    .bind(&request.contact_person)
    .bind(&request.contact_phone)
    .bind(&visit_city)
    .bind(&visit_region)
    .bind(&request.clinic_comments)
    .bind(doctor.prepayment as f64)
    .bind(now)
    .bind(now)
    .execute(&app_state.db_pool)
    .await?;

    let order = fetch_order(&app_state.db_pool, &id).await?;

    info!(
        "📋 Clinic {} created order {} for doctor {}",
        clinic.clinic_name, id, doctor.full_name
    );

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        order,
        "Order created successfully".to_string(),
    )))
}

/// Заявки текущей клиники, новые сверху.
pub async fn get_my_orders(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_clinic(&http_request)?;
    let (page, per_page, offset) = query.normalize();

    let mut where_sql = "WHERE o.clinic_id = ?".to_string();
    let mut params: Vec<String> = vec![claims.sub.clone()];

    if let Some(ref status) = query.status {
        where_sql.push_str(" AND o.status = ?");
        params.push(status.clone());
    }

    let count_sql = format!("SELECT COUNT(*) FROM orders o {}", where_sql);
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    for p in &params {
        count_query = count_query.bind(p);
    }
    let (total,) = count_query.fetch_one(&app_state.db_pool).await?;

    let list_sql = format!(
        "{} {} ORDER BY o.created_at DESC LIMIT ? OFFSET ?",
        ORDER_LIST_SELECT, where_sql
    );
    let mut list_query = sqlx::query_as::<_, OrderListItem>(&list_sql);
    for p in &params {
        list_query = list_query.bind(p);
    }
    let orders = list_query
        .bind(per_page)
        .bind(offset)
        .fetch_all(&app_state.db_pool)
        .await?;

    let total_pages = (total + per_page - 1) / per_page;
    Ok(HttpResponse::Ok().json(ApiResponse::success(PaginatedResponse {
        data: orders,
        total,
        page,
        per_page,
        total_pages,
    })))
}

pub async fn get_my_order(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_clinic(&http_request)?;
    let order_id = path.into_inner();

    let order = fetch_order(&app_state.db_pool, &order_id).await?;
    if order.clinic_id != claims.sub {
        return Err(ApiError::order_not_found(&order_id));
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

/// Клиника может отменить только ещё не подтверждённую заявку.
pub async fn cancel_order(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_clinic(&http_request)?;
    let order_id = path.into_inner();

    let order = fetch_order(&app_state.db_pool, &order_id).await?;
    if order.clinic_id != claims.sub {
        return Err(ApiError::order_not_found(&order_id));
    }
    if order.status != OrderStatus::New {
        return Err(ApiError::order_not_cancellable());
    }

    let now = Utc::now();
    sqlx::query(
        "UPDATE orders SET status = 'cancelled', cancelled_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(now)
    .bind(now)
    .bind(&order_id)
    .execute(&app_state.db_pool)
    .await?;

    info!("Clinic {} cancelled order {}", claims.name, order_id);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        "Order cancelled".to_string(),
    )))
}

// ==================== ADMIN SIDE ====================

#[derive(Debug, serde::Deserialize)]
pub struct OrderFilterQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub urgency_level: Option<String>,
    pub clinic_id: Option<String>,
    pub doctor_id: Option<String>,
    pub search: Option<String>,
}

pub async fn get_orders(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<OrderFilterQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_admin(&http_request)?;
    let pagination = PaginationQuery {
        page: query.page,
        per_page: query.per_page,
        search: None,
        status: None,
    };
    let (page, per_page, offset) = pagination.normalize();

    let mut where_sql = "WHERE 1=1".to_string();
    let mut params: Vec<String> = Vec::new();

    if let Some(ref status) = query.status {
        where_sql.push_str(" AND o.status = ?");
        params.push(status.clone());
    }
    if let Some(ref urgency) = query.urgency_level {
        where_sql.push_str(" AND o.urgency_level = ?");
        params.push(urgency.clone());
    }
    if let Some(ref clinic_id) = query.clinic_id {
        where_sql.push_str(" AND o.clinic_id = ?");
        params.push(clinic_id.clone());
    }
    if let Some(ref doctor_id) = query.doctor_id {
        where_sql.push_str(" AND o.doctor_id = ?");
        params.push(doctor_id.clone());
    }
    if let Some(ref search) = query.search {
        let search = search.trim();
        if !search.is_empty() {
            where_sql.push_str(
                " AND (c.clinic_name LIKE ? OR d.full_name LIKE ? OR o.visit_city LIKE ?)",
            );
            let pattern = format!("%{}%", search);
            params.extend([pattern.clone(), pattern.clone(), pattern]);
        }
    }

    let count_sql = format!(
        r#"SELECT COUNT(*)
           FROM orders o
           LEFT JOIN clinics c ON o.clinic_id = c.id
           LEFT JOIN doctors d ON o.doctor_id = d.id
           {}"#,
        where_sql
    );
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    for p in &params {
        count_query = count_query.bind(p);
    }
    let (total,) = count_query.fetch_one(&app_state.db_pool).await?;

    let list_sql = format!(
        "{} {} ORDER BY o.created_at DESC LIMIT ? OFFSET ?",
        ORDER_LIST_SELECT, where_sql
    );
    let mut list_query = sqlx::query_as::<_, OrderListItem>(&list_sql);
    for p in &params {
        list_query = list_query.bind(p);
    }
    let orders = list_query
        .bind(per_page)
        .bind(offset)
        .fetch_all(&app_state.db_pool)
        .await?;

    let total_pages = (total + per_page - 1) / per_page;
    Ok(HttpResponse::Ok().json(ApiResponse::success(PaginatedResponse {
        data: orders,
        total,
        page,
        per_page,
        total_pages,
    })))
}

pub async fn get_order(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_admin(&http_request)?;
    let order_id = path.into_inner();

    let order = fetch_order(&app_state.db_pool, &order_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

/// Временные метки перехода статуса. Совпадающий статус ничего не
/// трогает, уже проставленные метки сохраняются.
fn stamp_status_change(
    existing: &Order,
    new_status: OrderStatus,
    now: DateTime<Utc>,
) -> (
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
) {
    let mut confirmed_at = existing.confirmed_at;
    let mut completed_at = existing.completed_at;
    let mut cancelled_at = existing.cancelled_at;
    if new_status != existing.status {
        match new_status {
            OrderStatus::Confirmed => confirmed_at = Some(now),
            OrderStatus::Completed => completed_at = Some(now),
            OrderStatus::Cancelled | OrderStatus::Rejected => cancelled_at = Some(now),
            _ => {}
        }
    }
    (confirmed_at, completed_at, cancelled_at)
}

/// Администраторское обновление заявки. Смена статуса проставляет
/// соответствующую временную метку, назначение врача фиксирует
/// администратора.
pub async fn update_order(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<UpdateOrderRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_admin(&http_request)?;
    let order_id = path.into_inner();
    request.validate()?;

    let existing = fetch_order(&app_state.db_pool, &order_id).await?;

    // завершённые, отменённые и отклонённые заявки статус не меняют
    if existing.status.is_terminal() && request.status.is_some() {
        return Err(ApiError::BadRequest(format!(
            "Order in terminal status '{}' cannot change status",
            existing.status
        )));
    }

    if let Some(ref doctor_id) = request.doctor_id {
        let doctor: Doctor = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
            .bind(doctor_id)
            .fetch_one(&app_state.db_pool)
            .await
            .map_err(|_| ApiError::doctor_not_found(doctor_id))?;
        if doctor.status != DoctorStatus::Active {
            return Err(ApiError::doctor_inactive(doctor_id));
        }
    }

    let now = Utc::now();
    let new_status = request.status.unwrap_or(existing.status);
    let (confirmed_at, completed_at, cancelled_at) =
        stamp_status_change(&existing, new_status, now);

    let doctor_id = request.doctor_id.clone().or(existing.doctor_id.clone());
    let assigned_by_admin_id = if request.doctor_id.is_some() {
        Some(claims.sub.clone())
    } else {
        existing.assigned_by_admin_id.clone()
    };
    let visit_date = request.visit_date.or(existing.visit_date);
    let visit_time = request.visit_time.clone().or(existing.visit_time);
    let urgency_level = request.urgency_level.unwrap_or(existing.urgency_level);
    let estimated_cost = request.estimated_cost.or(existing.estimated_cost);
    let actual_cost = request.actual_cost.or(existing.actual_cost);
    let payment_status = request.payment_status.clone().or(existing.payment_status);
    let admin_notes = request.admin_notes.clone().or(existing.admin_notes);

    sqlx::query(
        r#"UPDATE orders SET
            doctor_id = ?, status = ?, visit_date = ?, visit_time = ?,
            urgency_level = ?, estimated_cost = ?, actual_cost = ?,
            payment_status = ?, admin_notes = ?, assigned_by_admin_id = ?,
            confirmed_at = ?, completed_at = ?, cancelled_at = ?, updated_at = ?
        WHERE id = ?"#,
    )
    .bind(&doctor_id)
    .bind(new_status)
    .bind(visit_date)
    .bind(&visit_time)
    .bind(urgency_level)
    .bind(estimated_cost)
    .bind(actual_cost)
    .bind(&payment_status)
    .bind(&admin_notes)
    .bind(&assigned_by_admin_id)
    .bind(confirmed_at)
    .bind(completed_at)
    .bind(cancelled_at)
    .bind(now)
    .bind(&order_id)
    .execute(&app_state.db_pool)
    .await?;

    // завершённый визит засчитывается врачу
    if new_status == OrderStatus::Completed && existing.status != OrderStatus::Completed {
        if let Some(ref did) = doctor_id {
            sqlx::query(
                "UPDATE doctors SET successful_visits_count = successful_visits_count + 1 WHERE id = ?",
            )
            .bind(did)
            .execute(&app_state.db_pool)
            .await?;
        }
    }

    let order = fetch_order(&app_state.db_pool, &order_id).await?;

    info!(
        "Admin {} updated order {} (status {} -> {})",
        claims.name, order_id, existing.status, new_status
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        order,
        "Order updated successfully".to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UrgencyLevel;
    use chrono::Duration;

    fn sample_order(status: OrderStatus) -> Order {
        let created = Utc::now() - Duration::hours(1);
        Order {
            id: "o-1".to_string(),
            clinic_id: "c-1".to_string(),
            doctor_id: Some("d-1".to_string()),
            visit_date: None,
            visit_time: None,
            patient_count: 10,
            urgency_level: UrgencyLevel::Normal,
            status,
            contact_person: "Иванова А.П.".to_string(),
            contact_phone: "+79001234567".to_string(),
            visit_city: Some("Тверь".to_string()),
            visit_region: Some("Тверская область".to_string()),
            clinic_comments: None,
            admin_notes: None,
            estimated_cost: Some(15000.0),
            actual_cost: None,
            payment_status: None,
            assigned_by_admin_id: None,
            created_at: created,
            updated_at: created,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_confirmation_stamps_confirmed_at_only() {
        let order = sample_order(OrderStatus::New);
        let now = Utc::now();
        let (confirmed, completed, cancelled) =
            stamp_status_change(&order, OrderStatus::Confirmed, now);
        assert_eq!(confirmed, Some(now));
        assert_eq!(completed, None);
        assert_eq!(cancelled, None);
    }

    #[test]
    fn test_completion_keeps_earlier_stamps() {
        let mut order = sample_order(OrderStatus::Confirmed);
        let confirmed_earlier = Utc::now() - Duration::minutes(30);
        order.confirmed_at = Some(confirmed_earlier);

        let now = Utc::now();
        let (confirmed, completed, cancelled) =
            stamp_status_change(&order, OrderStatus::Completed, now);
        assert_eq!(confirmed, Some(confirmed_earlier));
        assert_eq!(completed, Some(now));
        assert_eq!(cancelled, None);
    }

    #[test]
    fn test_rejection_stamps_cancelled_at() {
        let order = sample_order(OrderStatus::New);
        let now = Utc::now();
        let (confirmed, completed, cancelled) =
            stamp_status_change(&order, OrderStatus::Rejected, now);
        assert_eq!(confirmed, None);
        assert_eq!(completed, None);
        assert_eq!(cancelled, Some(now));
    }

    #[test]
    fn test_unchanged_status_stamps_nothing() {
        let mut order = sample_order(OrderStatus::Confirmed);
        let confirmed_earlier = Utc::now() - Duration::minutes(30);
        order.confirmed_at = Some(confirmed_earlier);

        let (confirmed, completed, cancelled) =
            stamp_status_change(&order, OrderStatus::Confirmed, Utc::now());
        assert_eq!(confirmed, Some(confirmed_earlier));
        assert_eq!(completed, None);
        assert_eq!(cancelled, None);
    }

    #[test]
    fn test_in_progress_has_no_dedicated_stamp() {
        let order = sample_order(OrderStatus::Confirmed);
        let (confirmed, completed, cancelled) =
            stamp_status_change(&order, OrderStatus::InProgress, Utc::now());
        assert_eq!(confirmed, None);
        assert_eq!(completed, None);
        assert_eq!(cancelled, None);
    }
}
