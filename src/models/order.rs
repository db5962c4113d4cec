// src/models/order.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

// ==================== ENUMS ====================

/// Жизненный цикл заявки: new → confirmed → in_progress →
/// completed / cancelled / rejected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Normal,
    Urgent,
    Emergency,
}

impl Default for UrgencyLevel {
    fn default() -> Self {
        UrgencyLevel::Normal
    }
}

// ==================== ORDER ====================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub clinic_id: String,
    pub doctor_id: Option<String>,
    pub visit_date: Option<NaiveDate>,
    pub visit_time: Option<String>,
    pub patient_count: i64,
    pub urgency_level: UrgencyLevel,
    pub status: OrderStatus,
    pub contact_person: String,
    pub contact_phone: String,
    pub visit_city: Option<String>,
    pub visit_region: Option<String>,
    pub clinic_comments: Option<String>,
    pub admin_notes: Option<String>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub payment_status: Option<String>,
    pub assigned_by_admin_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Строка списка заявок с подтянутыми именами клиники и врача.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderListItem {
    pub id: String,
    pub clinic_id: String,
    pub doctor_id: Option<String>,
    pub visit_date: Option<NaiveDate>,
    pub visit_time: Option<String>,
    pub patient_count: i64,
    pub urgency_level: UrgencyLevel,
    pub status: OrderStatus,
    pub contact_person: String,
    pub contact_phone: String,
    pub visit_city: Option<String>,
    pub clinic_comments: Option<String>,
    pub estimated_cost: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub clinic_name: Option<String>,
    pub doctor_name: Option<String>,
    pub doctor_specialty: Option<String>,
}

// ==================== REQUEST STRUCTS ====================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Doctor is required"))]
    pub doctor_id: String,

    pub visit_date: Option<NaiveDate>,

    #[validate(length(max = 20, message = "Visit time cannot exceed 20 characters"))]
    pub visit_time: Option<String>,

    #[validate(range(min = 1, max = 500, message = "Patient count must be 1-500"))]
    pub patient_count: i64,

    #[serde(default)]
    pub urgency_level: UrgencyLevel,

    #[validate(length(min = 1, max = 255, message = "Contact person is required"))]
    pub contact_person: String,

    #[validate(length(min = 5, max = 30, message = "Contact phone must be between 5 and 30 characters"))]
    pub contact_phone: String,

    #[validate(length(max = 255, message = "City cannot exceed 255 characters"))]
    pub visit_city: Option<String>,

    #[validate(length(max = 255, message = "Region cannot exceed 255 characters"))]
    pub visit_region: Option<String>,

    #[validate(length(max = 2000, message = "Comment cannot exceed 2000 characters"))]
    pub clinic_comments: Option<String>,
}

/// Администраторское обновление заявки: назначение врача, статус,
/// стоимость, заметки. Все поля опциональны.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderRequest {
    pub doctor_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub visit_date: Option<NaiveDate>,

    #[validate(length(max = 20, message = "Visit time cannot exceed 20 characters"))]
    pub visit_time: Option<String>,

    #[validate(range(min = 0.0, message = "Estimated cost cannot be negative"))]
    pub estimated_cost: Option<f64>,

    #[validate(range(min = 0.0, message = "Actual cost cannot be negative"))]
    pub actual_cost: Option<f64>,

    #[validate(length(max = 50, message = "Payment status cannot exceed 50 characters"))]
    pub payment_status: Option<String>,

    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub admin_notes: Option<String>,

    pub urgency_level: Option<UrgencyLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_order_status_roundtrip() {
        assert_eq!(OrderStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            OrderStatus::from_str("in_progress").unwrap(),
            OrderStatus::InProgress
        );
        assert!(OrderStatus::from_str("pending").is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::Confirmed.is_terminal());
        assert!(!OrderStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_default_urgency() {
        assert_eq!(UrgencyLevel::default(), UrgencyLevel::Normal);
    }
}
