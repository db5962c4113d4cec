// src/monitoring.rs
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::time::{interval, Duration};

#[derive(Debug, Clone)]
pub struct Metrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub response_times: Arc<std::sync::Mutex<Vec<u64>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            response_times: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn increment_requests(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response_time(&self, time_ms: u64) {
        if let Ok(mut times) = self.response_times.lock() {
            times.push(time_ms);
            if times.len() > 1000 {
                times.remove(0);
            }
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub requests_total: u64,
    pub errors_total: u64,
    pub avg_response_time_ms: f64,
}

pub async fn readiness_check(pool: web::Data<SqlitePool>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ready",
            "database": "connected"
        })),
        Err(_) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "not ready",
            "database": "disconnected"
        })),
    }
}

pub async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "alive",
        "timestamp": Utc::now()
    }))
}

pub async fn metrics_endpoint(metrics: web::Data<Arc<Metrics>>) -> HttpResponse {
    let request_count = metrics.request_count.load(Ordering::Relaxed);
    let error_count = metrics.error_count.load(Ordering::Relaxed);

    let avg_response_time = if let Ok(times) = metrics.response_times.lock() {
        if times.is_empty() {
            0.0
        } else {
            times.iter().sum::<u64>() as f64 / times.len() as f64
        }
    } else {
        0.0
    };

    let response = MetricsResponse {
        requests_total: request_count,
        errors_total: error_count,
        avg_response_time_ms: avg_response_time,
    };

    HttpResponse::Ok().json(response)
}

// ==================== REQUEST LOGGER MIDDLEWARE ====================

pub struct RequestLogger {
    metrics: Arc<Metrics>,
}

impl RequestLogger {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S, B> actix_web::dev::Transform<S, actix_web::dev::ServiceRequest> for RequestLogger
where
    S: actix_web::dev::Service<
        actix_web::dev::ServiceRequest,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
    B: 'static,
{
    type Response = actix_web::dev::ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequestLoggerMiddleware {
            service,
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: S,
    metrics: Arc<Metrics>,
}

impl<S, B> actix_web::dev::Service<actix_web::dev::ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: actix_web::dev::Service<
        actix_web::dev::ServiceRequest,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
    B: 'static,
{
    type Response = actix_web::dev::ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: actix_web::dev::ServiceRequest) -> Self::Future {
        let start_time = std::time::Instant::now();
        let metrics = self.metrics.clone();
        let fut = self.service.call(req);

        Box::pin(async move {
            metrics.increment_requests();
            let res = fut.await;
            let elapsed = start_time.elapsed().as_millis() as u64;
            metrics.record_response_time(elapsed);

            if let Ok(ref response) = res {
                if response.status().is_client_error() || response.status().is_server_error() {
                    metrics.increment_errors();
                }
            }
            res
        })
    }
}

// ==================== MAINTENANCE TASKS ====================

pub async fn start_maintenance_tasks(pool: SqlitePool) {
    let pool_clone1 = pool.clone();
    let pool_clone2 = pool.clone();

    tokio::spawn(async move {
        clear_expired_lockouts(pool_clone1).await;
    });

    tokio::spawn(async move {
        advance_due_orders(pool_clone2).await;
    });
}

/// Снимает истёкшие блокировки входа у клиник.
async fn clear_expired_lockouts(pool: SqlitePool) {
    let mut interval = interval(Duration::from_secs(3600));

    loop {
        interval.tick().await;
        let result = sqlx::query(
            "UPDATE clinics SET failed_login_attempts = 0, locked_until = NULL \
             WHERE locked_until IS NOT NULL AND locked_until < datetime('now')",
        )
        .execute(&pool)
        .await;

        match result {
            Ok(res) if res.rows_affected() > 0 => {
                log::info!("Unlocked {} clinic accounts", res.rows_affected());
            }
            Ok(_) => {}
            Err(e) => log::error!("Failed to clear expired lockouts: {}", e),
        }
    }
}

/// Переводит подтверждённые заявки с наступившей датой визита
/// в статус in_progress.
async fn advance_due_orders(pool: SqlitePool) {
    let mut interval = interval(Duration::from_secs(3600));

    loop {
        interval.tick().await;
        let result = sqlx::query(
            "UPDATE orders SET status = 'in_progress', updated_at = datetime('now') \
             WHERE status = 'confirmed' AND visit_date IS NOT NULL AND visit_date <= date('now')",
        )
        .execute(&pool)
        .await;

        match result {
            Ok(res) if res.rows_affected() > 0 => {
                log::info!("Moved {} due orders to in_progress", res.rows_affected());
            }
            Ok(_) => {}
            Err(e) => log::error!("Failed to advance due orders: {}", e),
        }
    }
}
