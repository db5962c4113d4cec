use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    InternalServerError(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
    AuthError(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::DatabaseError(err) => write!(f, "Database Error: {}", err),
            ApiError::AuthError(msg) => write!(f, "Auth Error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        match self {
            ApiError::BadRequest(_) => HttpResponse::BadRequest().json(error_response),
            ApiError::NotFound(_) => HttpResponse::NotFound().json(error_response),
            ApiError::Unauthorized(_) => HttpResponse::Unauthorized().json(error_response),
            ApiError::Forbidden(_) => HttpResponse::Forbidden().json(error_response),
            ApiError::Conflict(_) => HttpResponse::Conflict().json(error_response),
            ApiError::ValidationError(_) => HttpResponse::UnprocessableEntity().json(error_response),
            ApiError::DatabaseError(_) => HttpResponse::InternalServerError().json(error_response),
            ApiError::AuthError(_) => HttpResponse::Unauthorized().json(error_response),
            ApiError::InternalServerError(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ApiError::InternalServerError(format!("Password hashing failed: {}", err))
    }
}

// Специфичные ошибки маркетплейса
impl ApiError {
    pub fn doctor_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Doctor with ID '{}' not found", id))
    }

    pub fn clinic_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Clinic with ID '{}' not found", id))
    }

    pub fn order_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Order with ID '{}' not found", id))
    }

    pub fn email_already_registered(email: &str) -> Self {
        ApiError::Conflict(format!("Email '{}' is already registered", email))
    }

    pub fn invalid_credentials() -> Self {
        ApiError::AuthError("Invalid email or password".to_string())
    }

    pub fn account_locked() -> Self {
        ApiError::AuthError("Account is temporarily locked due to failed login attempts".to_string())
    }

    pub fn account_not_active() -> Self {
        ApiError::Forbidden("Clinic account is not active".to_string())
    }

    pub fn consent_required() -> Self {
        ApiError::BadRequest(
            "Terms of service and personal data processing consent are required".to_string(),
        )
    }

    pub fn order_not_cancellable() -> Self {
        ApiError::BadRequest("Only new orders can be cancelled by the clinic".to_string())
    }

    pub fn doctor_inactive(id: &str) -> Self {
        ApiError::BadRequest(format!("Doctor '{}' is not accepting orders", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::doctor_not_found("x").error_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::email_already_registered("a@b.ru").error_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::invalid_credentials().error_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::account_not_active().error_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::ValidationError("bad".into()).error_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_display_includes_context() {
        let err = ApiError::order_not_found("abc-123");
        assert!(err.to_string().contains("abc-123"));
    }
}
