// src/economics.rs
//! Калькулятор экономики выездного визита.
//!
//! Вся цепочка считается без промежуточных округлений; округление —
//! только на границе представления (`VisitReport`).

use serde::{Deserialize, Serialize};
use validator::Validate;

// ==================== CONSTANTS ====================

/// Комиссия платформы от чистой выручки.
pub const COMMISSION_RATE: f64 = 0.15;

/// Порог прибыли для оценки «отличная экономика».
pub const EXCELLENT_PROFIT_THRESHOLD: f64 = 20000.0;

pub const MIN_PRICE: i64 = 1000;
pub const MAX_PRICE: i64 = 10000;
pub const PRICE_STEP: i64 = 500;
pub const MIN_PATIENTS: i64 = 5;
pub const MAX_PATIENTS: i64 = 30;

// ==================== COST TABLE ====================

/// Фиксированные затраты на организацию одного визита, руб.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CostTable {
    pub doctor_fee: f64,
    pub flights: f64,
    pub accommodation: f64,
    pub food: f64,
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            doctor_fee: 15000.0,
            flights: 10000.0,
            accommodation: 3000.0,
            food: 1500.0,
        }
    }
}

impl CostTable {
    pub fn total(&self) -> f64 {
        self.doctor_fee + self.flights + self.accommodation + self.food
    }
}

// ==================== INPUT ====================

#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct VisitParams {
    #[validate(range(min = 1000, max = 10000, message = "Price must be between 1000 and 10000"))]
    pub price: i64,

    #[validate(range(min = 5, max = 30, message = "Patient count must be between 5 and 30"))]
    pub count: i64,
}

// ==================== BREAKDOWN ====================

/// Разбор экономики визита. Поля не округлены.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VisitBreakdown {
    pub gross_revenue: f64,
    pub costs: CostTable,
    pub total_costs: f64,
    pub net_revenue: f64,
    pub platform_fee: f64,
    pub clinic_profit: f64,
    pub roi_percent: f64,
    pub profit_per_patient: f64,
}

impl VisitBreakdown {
    /// Считает экономику для цены приёма и числа пациентов.
    pub fn calculate(price: i64, count: i64, costs: CostTable) -> Self {
        let gross_revenue = (price * count) as f64;
        let total_costs = costs.total();
        let net_revenue = gross_revenue - total_costs;
        let platform_fee = net_revenue * COMMISSION_RATE;
        let clinic_profit = net_revenue - platform_fee;

        // делители нулевыми быть не должны, но при нуле отдаём 0.0
        let roi_percent = if total_costs > 0.0 {
            (clinic_profit / total_costs) * 100.0
        } else {
            0.0
        };
        let profit_per_patient = if count > 0 {
            clinic_profit / count as f64
        } else {
            0.0
        };

        Self {
            gross_revenue,
            costs,
            total_costs,
            net_revenue,
            platform_fee,
            clinic_profit,
            roi_percent,
            profit_per_patient,
        }
    }

    /// Визит убыточен: выручка не покрывает затраты.
    pub fn is_loss_making(&self) -> bool {
        self.net_revenue < 0.0
    }

    /// Экономика отличная: визит прибыльный и прибыль выше порога.
    pub fn is_excellent(&self) -> bool {
        self.net_revenue > 0.0 && self.clinic_profit > EXCELLENT_PROFIT_THRESHOLD
    }
}

// ==================== REPORT ====================

/// Представление для API: денежные суммы до рубля, ROI до десятой процента.
#[derive(Debug, Serialize)]
pub struct VisitReport {
    pub price: i64,
    pub patient_count: i64,
    pub gross_revenue: f64,
    pub costs: CostTable,
    pub total_costs: f64,
    pub net_revenue: f64,
    pub platform_fee: f64,
    pub clinic_profit: f64,
    pub roi_percent: f64,
    pub profit_per_patient: f64,
    pub loss_making: bool,
    pub excellent: bool,
}

fn round_ruble(v: f64) -> f64 {
    v.round()
}

fn round_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl VisitReport {
    pub fn build(params: &VisitParams, costs: CostTable) -> Self {
        let breakdown = VisitBreakdown::calculate(params.price, params.count, costs);
        Self {
            price: params.price,
            patient_count: params.count,
            gross_revenue: round_ruble(breakdown.gross_revenue),
            costs: breakdown.costs,
            total_costs: round_ruble(breakdown.total_costs),
            net_revenue: round_ruble(breakdown.net_revenue),
            platform_fee: round_ruble(breakdown.platform_fee),
            clinic_profit: round_ruble(breakdown.clinic_profit),
            roi_percent: round_tenth(breakdown.roi_percent),
            profit_per_patient: round_ruble(breakdown.profit_per_patient),
            loss_making: breakdown.is_loss_making(),
            excellent: breakdown.is_excellent(),
        }
    }
}

// ==================== TESTS ====================

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_default_cost_table() {
        let costs = CostTable::default();
        assert!(close(costs.total(), 29500.0));
    }

    #[test]
    fn test_reference_visit_breakdown() {
        // приём 3500 руб, 14 пациентов
        let b = VisitBreakdown::calculate(3500, 14, CostTable::default());
        assert!(close(b.gross_revenue, 49000.0));
        assert!(close(b.net_revenue, 19500.0));
        assert!(close(b.platform_fee, 2925.0));
        assert!(close(b.clinic_profit, 16575.0));
        assert!((b.roi_percent - 56.186).abs() < 0.01);
        assert!((b.profit_per_patient - 1183.93).abs() < 0.01);
        assert!(!b.is_loss_making());
        assert!(!b.is_excellent());
    }

    #[test]
    fn test_report_rounds_only_at_presentation() {
        let params = VisitParams { price: 3500, count: 14 };
        let report = VisitReport::build(&params, CostTable::default());
        assert!(close(report.gross_revenue, 49000.0));
        assert!(close(report.net_revenue, 19500.0));
        assert!(close(report.platform_fee, 2925.0));
        assert!(close(report.clinic_profit, 16575.0));
        assert!(close(report.roi_percent, 56.2));
        assert!(close(report.profit_per_patient, 1184.0));
        assert!(!report.loss_making);
        assert!(!report.excellent);
    }

    #[test]
    fn test_loss_making_visit() {
        // 1000 * 5 = 5000 < 29500
        let b = VisitBreakdown::calculate(1000, 5, CostTable::default());
        assert!(b.net_revenue < 0.0);
        assert!(b.is_loss_making());
        assert!(!b.is_excellent());
        assert!(b.clinic_profit < 0.0);
    }

    #[test]
    fn test_excellent_visit() {
        // 10000 * 30 = 300000; net 270500; profit 229925
        let b = VisitBreakdown::calculate(10000, 30, CostTable::default());
        assert!(b.clinic_profit > EXCELLENT_PROFIT_THRESHOLD);
        assert!(b.is_excellent());
        assert!(!b.is_loss_making());
    }

    #[test]
    fn test_break_even_is_neither() {
        // подбираем затраты так, чтобы net == 0
        let costs = CostTable {
            doctor_fee: 49000.0,
            flights: 0.0,
            accommodation: 0.0,
            food: 0.0,
        };
        let b = VisitBreakdown::calculate(3500, 14, costs);
        assert!(close(b.net_revenue, 0.0));
        assert!(!b.is_loss_making());
        assert!(!b.is_excellent());
    }

    #[test]
    fn test_profit_monotonic_in_price() {
        let mut prev = f64::NEG_INFINITY;
        let mut price = MIN_PRICE;
        while price <= MAX_PRICE {
            let b = VisitBreakdown::calculate(price, 14, CostTable::default());
            assert!(b.clinic_profit > prev);
            prev = b.clinic_profit;
            price += PRICE_STEP;
        }
    }

    #[test]
    fn test_profit_monotonic_in_count() {
        let mut prev = f64::NEG_INFINITY;
        for count in MIN_PATIENTS..=MAX_PATIENTS {
            let b = VisitBreakdown::calculate(3500, count, CostTable::default());
            assert!(b.clinic_profit > prev);
            prev = b.clinic_profit;
        }
    }

    #[test]
    fn test_zero_guards() {
        let zero_costs = CostTable {
            doctor_fee: 0.0,
            flights: 0.0,
            accommodation: 0.0,
            food: 0.0,
        };
        let b = VisitBreakdown::calculate(3500, 14, zero_costs);
        assert!(close(b.roi_percent, 0.0));

        let b = VisitBreakdown::calculate(3500, 0, CostTable::default());
        assert!(close(b.profit_per_patient, 0.0));
    }

    #[test]
    fn test_params_validation_bounds() {
        assert!(validator::Validate::validate(&VisitParams { price: 3500, count: 14 }).is_ok());
        assert!(validator::Validate::validate(&VisitParams { price: 999, count: 14 }).is_err());
        assert!(validator::Validate::validate(&VisitParams { price: 10500, count: 14 }).is_err());
        assert!(validator::Validate::validate(&VisitParams { price: 3500, count: 4 }).is_err());
        assert!(validator::Validate::validate(&VisitParams { price: 3500, count: 31 }).is_err());
    }
}
