// src/models/doctor.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

// ==================== ENUMS ====================

/// Тип места работы врача: федеральный центр или частная практика.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum WorkplaceType {
    Federal,
    Private,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DoctorStatus {
    Active,
    Inactive,
}

// ==================== DOCTOR ====================

/// Выездной специалист. Списковые поля (education, skills, …) хранятся
/// JSON-текстом и для каталожного движка непрозрачны.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Doctor {
    pub id: String,
    pub full_name: String,
    pub specialty: String,
    pub workplace: String,
    pub workplace_type: WorkplaceType,
    pub experience_years: i64,
    pub prepayment: i64,
    pub photo_url: Option<String>,
    pub description: Option<String>,
    pub education: Option<String>,
    pub skills: Option<String>,
    pub achievements: Option<String>,
    pub services_provided: Option<String>,
    pub available_dates: Option<String>,
    pub status: DoctorStatus,
    pub rating: Option<f64>,
    pub successful_visits_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Публичное представление врача: JSON-колонки раскодированы в списки.
#[derive(Debug, Serialize)]
pub struct DoctorDetails {
    pub id: String,
    pub full_name: String,
    pub specialty: String,
    pub workplace: String,
    pub workplace_type: WorkplaceType,
    pub experience_years: i64,
    pub prepayment: i64,
    pub photo_url: Option<String>,
    pub description: Option<String>,
    pub education: Vec<String>,
    pub skills: Vec<String>,
    pub achievements: Vec<String>,
    pub services_provided: Vec<String>,
    pub available_dates: Vec<String>,
    pub rating: Option<f64>,
    pub successful_visits_count: i64,
}

fn decode_list(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

impl From<Doctor> for DoctorDetails {
    fn from(d: Doctor) -> Self {
        Self {
            education: decode_list(d.education.as_deref()),
            skills: decode_list(d.skills.as_deref()),
            achievements: decode_list(d.achievements.as_deref()),
            services_provided: decode_list(d.services_provided.as_deref()),
            available_dates: decode_list(d.available_dates.as_deref()),
            id: d.id,
            full_name: d.full_name,
            specialty: d.specialty,
            workplace: d.workplace,
            workplace_type: d.workplace_type,
            experience_years: d.experience_years,
            prepayment: d.prepayment,
            photo_url: d.photo_url,
            description: d.description,
            rating: d.rating,
            successful_visits_count: d.successful_visits_count,
        }
    }
}

// ==================== REQUEST STRUCTS ====================

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct CreateDoctorRequest {
    #[validate(length(min = 1, max = 255, message = "Full name must be between 1 and 255 characters"))]
    pub full_name: String,

    #[validate(length(min = 1, max = 100, message = "Specialty must be between 1 and 100 characters"))]
    pub specialty: String,

    #[validate(length(min = 1, max = 255, message = "Workplace must be between 1 and 255 characters"))]
    pub workplace: String,

    pub workplace_type: WorkplaceType,

    #[validate(range(min = 0, max = 70, message = "Experience must be 0-70 years"))]
    pub experience_years: i64,

    #[validate(range(min = 0, message = "Prepayment cannot be negative"))]
    pub prepayment: i64,

    #[validate(length(max = 500, message = "Photo URL cannot exceed 500 characters"))]
    pub photo_url: Option<String>,

    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    pub education: Option<Vec<String>>,
    pub skills: Option<Vec<String>>,
    pub achievements: Option<Vec<String>>,
    pub services_provided: Option<Vec<String>>,
    pub available_dates: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDoctorRequest {
    #[validate(length(min = 1, max = 255, message = "Full name must be between 1 and 255 characters"))]
    pub full_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Specialty must be between 1 and 100 characters"))]
    pub specialty: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Workplace must be between 1 and 255 characters"))]
    pub workplace: Option<String>,

    pub workplace_type: Option<WorkplaceType>,

    #[validate(range(min = 0, max = 70, message = "Experience must be 0-70 years"))]
    pub experience_years: Option<i64>,

    #[validate(range(min = 0, message = "Prepayment cannot be negative"))]
    pub prepayment: Option<i64>,

    #[validate(length(max = 500, message = "Photo URL cannot exceed 500 characters"))]
    pub photo_url: Option<String>,

    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    pub education: Option<Vec<String>>,
    pub skills: Option<Vec<String>>,
    pub achievements: Option<Vec<String>>,
    pub services_provided: Option<Vec<String>>,
    pub available_dates: Option<Vec<String>>,

    pub status: Option<DoctorStatus>,
}

/// Кодирует списковое поле для хранения в TEXT-колонке.
pub fn encode_list(items: &Option<Vec<String>>) -> Option<String> {
    items
        .as_ref()
        .map(|v| serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_workplace_type_roundtrip() {
        assert_eq!(WorkplaceType::Federal.to_string(), "federal");
        assert_eq!(WorkplaceType::Private.to_string(), "private");
        assert_eq!(
            WorkplaceType::from_str("federal").unwrap(),
            WorkplaceType::Federal
        );
        assert!(WorkplaceType::from_str("municipal").is_err());
    }

    #[test]
    fn test_decode_list() {
        assert_eq!(
            decode_list(Some(r#"["a","b"]"#)),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(decode_list(Some("not json")).is_empty());
        assert!(decode_list(None).is_empty());
    }

    #[test]
    fn test_encode_list() {
        assert_eq!(encode_list(&None), None);
        assert_eq!(
            encode_list(&Some(vec!["x".to_string()])),
            Some(r#"["x"]"#.to_string())
        );
    }

    #[test]
    fn test_create_request_validation() {
        let req = CreateDoctorRequest {
            full_name: "Иванов Иван Иванович".to_string(),
            specialty: "Кардиолог".to_string(),
            workplace: "НМИЦ кардиологии".to_string(),
            workplace_type: WorkplaceType::Federal,
            experience_years: -1,
            prepayment: 45000,
            photo_url: None,
            description: None,
            education: None,
            skills: None,
            achievements: None,
            services_provided: None,
            available_dates: None,
        };
        assert!(validator::Validate::validate(&req).is_err());
    }
}
