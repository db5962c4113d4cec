// src/models/clinic.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

// ==================== ENUMS ====================

/// Статус аккаунта клиники. Новые регистрации попадают на модерацию.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AccountStatus {
    OnModeration,
    Active,
    Blocked,
}

// ==================== CLINIC ====================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Clinic {
    pub id: String,
    pub clinic_name: String,
    pub email: String,
    pub phone: String,
    pub region: String,
    pub city: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub contact_person_name: String,
    pub contact_person_position: Option<String>,
    pub inn: Option<String>,
    pub legal_address: Option<String>,
    pub terms_accepted: bool,
    pub data_processing_accepted: bool,
    pub consent_date: Option<DateTime<Utc>>,
    pub account_status: AccountStatus,
    pub failed_login_attempts: i64,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ответное представление без чувствительных полей.
#[derive(Debug, Serialize, Clone)]
pub struct ClinicInfo {
    pub id: String,
    pub clinic_name: String,
    pub email: String,
    pub phone: String,
    pub region: String,
    pub city: String,
    pub contact_person_name: String,
    pub contact_person_position: Option<String>,
    pub inn: Option<String>,
    pub legal_address: Option<String>,
    pub account_status: AccountStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Clinic> for ClinicInfo {
    fn from(c: Clinic) -> Self {
        Self {
            id: c.id,
            clinic_name: c.clinic_name,
            email: c.email,
            phone: c.phone,
            region: c.region,
            city: c.city,
            contact_person_name: c.contact_person_name,
            contact_person_position: c.contact_person_position,
            inn: c.inn,
            legal_address: c.legal_address,
            account_status: c.account_status,
            last_login: c.last_login,
            created_at: c.created_at,
        }
    }
}

// ==================== REQUEST STRUCTS ====================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterClinicRequest {
    #[validate(length(min = 1, max = 255, message = "Clinic name must be between 1 and 255 characters"))]
    pub clinic_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 5, max = 30, message = "Phone must be between 5 and 30 characters"))]
    pub phone: String,

    #[validate(length(min = 1, max = 255, message = "Region is required"))]
    pub region: String,

    #[validate(length(min = 1, max = 255, message = "City is required"))]
    pub city: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 255, message = "Contact person name is required"))]
    pub contact_person_name: String,

    #[validate(length(max = 255, message = "Position cannot exceed 255 characters"))]
    pub contact_person_position: Option<String>,

    pub inn: Option<String>,

    #[validate(length(max = 500, message = "Legal address cannot exceed 500 characters"))]
    pub legal_address: Option<String>,

    pub terms_accepted: bool,
    pub data_processing_accepted: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClinicRequest {
    #[validate(length(min = 1, max = 255, message = "Clinic name must be between 1 and 255 characters"))]
    pub clinic_name: Option<String>,

    #[validate(length(min = 5, max = 30, message = "Phone must be between 5 and 30 characters"))]
    pub phone: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Region cannot be empty"))]
    pub region: Option<String>,

    #[validate(length(min = 1, max = 255, message = "City cannot be empty"))]
    pub city: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Contact person name cannot be empty"))]
    pub contact_person_name: Option<String>,

    #[validate(length(max = 255, message = "Position cannot exceed 255 characters"))]
    pub contact_person_position: Option<String>,

    pub inn: Option<String>,

    #[validate(length(max = 500, message = "Legal address cannot exceed 500 characters"))]
    pub legal_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClinicStatusRequest {
    pub account_status: AccountStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_account_status_roundtrip() {
        assert_eq!(AccountStatus::OnModeration.to_string(), "on_moderation");
        assert_eq!(
            AccountStatus::from_str("on_moderation").unwrap(),
            AccountStatus::OnModeration
        );
        assert_eq!(AccountStatus::from_str("active").unwrap(), AccountStatus::Active);
        assert!(AccountStatus::from_str("deleted").is_err());
    }
}
