// src/auth_handlers.rs - Authentication route handlers

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    get_current_user, AccountRole, Admin, AdminLoginRequest, AuthService, ChangePasswordRequest,
    ClinicLoginRequest, LoginResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::{AccountStatus, Clinic, ClinicInfo, RegisterClinicRequest};
use crate::validation::{validate_inn, validate_phone};
use crate::AppState;

// ======== CLINIC REGISTRATION ========

pub async fn register_clinic(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<RegisterClinicRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    validate_phone(&request.phone)?;
    if let Some(ref inn) = request.inn {
        validate_inn(inn)?;
    }

    // Без обоих согласий регистрация невозможна
    if !request.terms_accepted || !request.data_processing_accepted {
        return Err(ApiError::consent_required());
    }

    let email = request.email.trim().to_lowercase();
    if Clinic::email_exists(&app_state.db_pool, &email).await? {
        return Err(ApiError::email_already_registered(&email));
    }

    let password_hash = auth_service.hash_password(&request.password)?;
    let now = Utc::now();
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"INSERT INTO clinics (
            id, clinic_name, email, phone, region, city, password_hash,
            contact_person_name, contact_person_position, inn, legal_address,
            terms_accepted, data_processing_accepted, consent_date,
            account_status, failed_login_attempts, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 1, ?, 'on_moderation', 0, ?, ?)"#,
    )
    .bind(&id)
    .bind(&request.clinic_name)
    .bind(&email)
    .bind(&request.phone)
    .bind(&request.region)
    .bind(&request.city)
    .bind(&password_hash)
    .bind(&request.contact_person_name)
    .bind(&request.contact_person_position)
    .bind(&request.inn)
    .bind(&request.legal_address)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(&app_state.db_pool)
    .await?;

    let clinic = Clinic::find_by_id(&app_state.db_pool, &id).await?;

    log::info!("🏥 New clinic registered: {} ({})", clinic.clinic_name, clinic.email);

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        ClinicInfo::from(clinic),
        "Registration successful. Account is pending moderation.".to_string(),
    )))
}

// ======== CLINIC LOGIN ========

pub async fn clinic_login(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<ClinicLoginRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;

    let email = request.email.trim().to_lowercase();
    let mut clinic = Clinic::find_by_email(&app_state.db_pool, &email)
        .await
        .map_err(|_| ApiError::invalid_credentials())?;

    if clinic.is_locked() {
        return Err(ApiError::account_locked());
    }

    if !auth_service.verify_password(&request.password, &clinic.password_hash)? {
        clinic
            .register_failed_login(
                &app_state.db_pool,
                app_state.config.auth.max_login_attempts,
                app_state.config.auth.lockout_duration_minutes,
            )
            .await?;

        if clinic.is_locked() {
            return Err(ApiError::account_locked());
        }
        return Err(ApiError::invalid_credentials());
    }

    if clinic.account_status != AccountStatus::Active {
        return Err(ApiError::account_not_active());
    }

    clinic.reset_failed_attempts(&app_state.db_pool).await?;
    clinic.update_last_login(&app_state.db_pool).await?;

    let token = auth_service.generate_token(
        &clinic.id,
        &clinic.clinic_name,
        &clinic.email,
        AccountRole::Clinic,
    )?;

    log::info!("Clinic {} logged in", clinic.clinic_name);

    let response = LoginResponse {
        token,
        expires_in: auth_service.token_lifetime_seconds(),
        account: ClinicInfo::from(clinic),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        response,
        "Login successful".to_string(),
    )))
}

// ======== ADMIN LOGIN ========

pub async fn admin_login(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<AdminLoginRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;

    let admin = Admin::find_by_username(&app_state.db_pool, &request.username)
        .await
        .map_err(|_| ApiError::invalid_credentials())?;

    if !admin.is_active {
        return Err(ApiError::Forbidden("Admin account is deactivated".to_string()));
    }

    if !auth_service.verify_password(&request.password, &admin.password_hash)? {
        log::warn!("Failed admin login attempt for '{}'", request.username);
        return Err(ApiError::invalid_credentials());
    }

    admin.update_last_login(&app_state.db_pool).await?;

    let display_name = admin.full_name.clone().unwrap_or_else(|| admin.username.clone());
    let token =
        auth_service.generate_token(&admin.id, &display_name, &admin.email, AccountRole::Admin)?;

    log::info!("Admin {} logged in", admin.username);

    let response = LoginResponse {
        token,
        expires_in: auth_service.token_lifetime_seconds(),
        account: admin,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        response,
        "Login successful".to_string(),
    )))
}

// ======== PROFILE ========

pub async fn get_profile(
    app_state: web::Data<Arc<AppState>>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = get_current_user(&http_request)?;

    #[derive(Serialize)]
    #[serde(untagged)]
    enum Profile {
        Admin(Admin),
        Clinic(ClinicInfo),
    }

    let profile = match claims.role {
        AccountRole::Admin => {
            Profile::Admin(Admin::find_by_id(&app_state.db_pool, &claims.sub).await?)
        }
        AccountRole::Clinic => Profile::Clinic(ClinicInfo::from(
            Clinic::find_by_id(&app_state.db_pool, &claims.sub).await?,
        )),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(profile)))
}

// ======== CHANGE PASSWORD ========

pub async fn change_password(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<ChangePasswordRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let claims = get_current_user(&http_request)?;

    match claims.role {
        AccountRole::Admin => {
            let admin = Admin::find_by_id(&app_state.db_pool, &claims.sub).await?;
            admin
                .change_password(
                    &app_state.db_pool,
                    &request.current_password,
                    &request.new_password,
                    &auth_service,
                )
                .await?;
            log::info!("Admin {} changed password", admin.username);
        }
        AccountRole::Clinic => {
            let clinic = Clinic::find_by_id(&app_state.db_pool, &claims.sub).await?;
            clinic
                .change_password(
                    &app_state.db_pool,
                    &request.current_password,
                    &request.new_password,
                    &auth_service,
                )
                .await?;
            log::info!("Clinic {} changed password", clinic.clinic_name);
        }
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        "Password changed successfully".to_string(),
    )))
}

// ======== LOGOUT ========

/// Токены не хранятся на сервере; выход — это подтверждение клиенту,
/// что токен можно выбросить.
pub async fn logout(http_request: HttpRequest) -> ApiResult<HttpResponse> {
    let claims = get_current_user(&http_request)?;
    log::info!("{} '{}' logged out", claims.role, claims.name);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        "Logged out".to_string(),
    )))
}
