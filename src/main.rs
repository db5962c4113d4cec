// src/main.rs - "Доктор в город" marketplace backend
use actix_web::{
    http::header,
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpServer,
};
use actix_cors::Cors;
use actix_web_httpauth::middleware::HttpAuthentication;
use anyhow::Context;
use rand::{seq::SliceRandom, thread_rng, Rng};
use rand::distributions::Alphanumeric;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod auth_handlers;
mod catalog;
mod clinic_handlers;
mod config;
mod db;
mod doctor_handlers;
mod economics;
mod error;
mod handlers;
mod models;
mod monitoring;
mod order_handlers;
mod validation;

use auth::{jwt_middleware, Admin, AuthService};
use config::Config;
use monitoring::{start_maintenance_tasks, Metrics, RequestLogger};

pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    setup_logging(&config)?;

    if config.is_production() {
        validate_production_config(&config)?;
    }

    let pool = create_database_pool(&config.database).await?;

    // RESET_DATABASE=1 пересоздаёт схему с нуля (только для разработки)
    if env::var("RESET_DATABASE").as_deref() == Ok("1") {
        db::reset_database(&pool).await?;
    }

    db::run_migrations(&pool).await?;
    db::seed_doctors(&pool).await?;

    let auth_service = Arc::new(AuthService::new(&config.auth));

    create_default_admin_if_needed(&pool, &auth_service).await?;

    let app_state = Arc::new(AppState {
        db_pool: pool.clone(),
        config: config.clone(),
    });

    start_maintenance_tasks(pool.clone()).await;

    config.print_startup_info();

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let metrics_arc = Arc::new(Metrics::new());
    let server_config = config.server.clone();

    let mut server = HttpServer::new(move || {
        let cors = setup_cors(&config.security.allowed_origins);
        let auth_middleware = HttpAuthentication::bearer(jwt_middleware);
        let security_headers = setup_security_headers(&config.security);

        App::new()
            .wrap(cors)
            .wrap(security_headers)
            .wrap(Logger::default())
            .wrap(Compress::default())
            .wrap(RequestLogger::new(metrics_arc.clone()))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(metrics_arc.clone()))
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::JsonConfig::default().limit(config.security.max_request_size))

            // Health and metrics (no auth)
            .service(
                web::scope("/health")
                    .route("", web::get().to(handlers::health_check))
                    .route("/ready", web::get().to(monitoring::readiness_check))
                    .route("/live", web::get().to(monitoring::liveness_check))
                    .route("/metrics", web::get().to(monitoring::metrics_endpoint)),
            )

            // Authentication (no token required)
            .service(
                web::scope("/auth")
                    .route("/clinic/register", web::post().to(auth_handlers::register_clinic))
                    .route("/clinic/login", web::post().to(auth_handlers::clinic_login))
                    .route("/admin/login", web::post().to(auth_handlers::admin_login)),
            )

            // Публичная витрина: каталог врачей и калькулятор экономики
            .service(
                web::scope("/api/v1/public")
                    .route("/doctors", web::get().to(doctor_handlers::get_public_doctors))
                    .route("/doctors/{id}", web::get().to(doctor_handlers::get_public_doctor))
                    .route("/specialties", web::get().to(doctor_handlers::get_specialties))
                    .route("/economics", web::get().to(handlers::calculate_economics)),
            )

            // Protected API
            .service(
                web::scope("/api/v1")
                    .wrap(auth_middleware)
                    .service(
                        web::scope("/auth")
                            .route("/profile", web::get().to(auth_handlers::get_profile))
                            .route("/change-password", web::post().to(auth_handlers::change_password))
                            .route("/logout", web::post().to(auth_handlers::logout)),
                    )
                    .service(
                        web::scope("/dashboard")
                            .route("/stats", web::get().to(handlers::get_dashboard_stats)),
                    )
                    .service(
                        web::scope("/doctors")
                            .route("", web::get().to(doctor_handlers::get_doctors))
                            .route("", web::post().to(doctor_handlers::create_doctor))
                            .route("/{id}", web::get().to(doctor_handlers::get_doctor))
                            .route("/{id}", web::put().to(doctor_handlers::update_doctor))
                            .route("/{id}", web::delete().to(doctor_handlers::delete_doctor))
                            .route("/{id}/status", web::put().to(doctor_handlers::update_doctor_status)),
                    )
                    .service(
                        web::scope("/clinics")
                            .route("", web::get().to(clinic_handlers::get_clinics))
                            .route("/{id}", web::get().to(clinic_handlers::get_clinic))
                            .route("/{id}", web::put().to(clinic_handlers::update_clinic))
                            .route("/{id}/status", web::put().to(clinic_handlers::update_clinic_status)),
                    )
                    .service(
                        web::scope("/orders")
                            .route("", web::post().to(order_handlers::create_order))
                            .route("", web::get().to(order_handlers::get_orders))
                            .route("/my", web::get().to(order_handlers::get_my_orders))
                            .route("/my/{id}", web::get().to(order_handlers::get_my_order))
                            .route("/my/{id}/cancel", web::post().to(order_handlers::cancel_order))
                            .route("/{id}", web::get().to(order_handlers::get_order))
                            .route("/{id}", web::put().to(order_handlers::update_order)),
                    ),
            )
    })
    .keep_alive(Duration::from_secs(server_config.keep_alive))
    .client_request_timeout(Duration::from_secs(server_config.client_timeout))
    .client_disconnect_timeout(Duration::from_secs(server_config.client_shutdown))
    .bind(&bind_address)?;

    if let Some(workers) = server_config.workers {
        server = server.workers(workers);
    }

    server.run().await.context("Server failed to run")?;

    Ok(())
}

// ==================== HELPER FUNCTIONS ====================

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

fn validate_production_config(config: &Config) -> anyhow::Result<()> {
    if config.auth.jwt_secret == "your-secret-key-here" || config.auth.jwt_secret.len() < 32 {
        anyhow::bail!("Insecure JWT secret in production! Must be at least 32 characters.");
    }

    if config.security.allowed_origins.contains(&"*".to_string()) {
        anyhow::bail!("Wildcard CORS origins not allowed in production!");
    }

    Ok(())
}

async fn create_database_pool(
    db_config: &crate::config::DatabaseConfig,
) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&db_config.url)
        .context("Invalid database URL")?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.connect_timeout))
        .idle_timeout(Duration::from_secs(db_config.idle_timeout))
        .connect_with(options)
        .await?;

    Ok(pool)
}

fn setup_cors(allowed_origins: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::USER_AGENT,
            header::REFERER,
        ])
        .expose_headers(vec![header::CONTENT_LENGTH])
        .max_age(3600);

    let is_production = env::var("MEDVISIT_ENV").as_deref() == Ok("production");

    if allowed_origins.contains(&"*".to_string()) {
        if is_production {
            log::error!("❌ FATAL: Wildcard CORS origin (*) is not allowed in production!");
            panic!("Cannot start server with wildcard CORS in production");
        }
        log::warn!("⚠️  Using wildcard CORS (*) in development mode");
        cors = cors.allow_any_origin().allow_any_header().allow_any_method();
    } else {
        for origin in allowed_origins {
            if origin.is_empty() {
                continue;
            }
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

fn setup_security_headers(config: &crate::config::SecurityConfig) -> DefaultHeaders {
    let mut headers = DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("X-XSS-Protection", "1; mode=block"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"));

    if config.require_https {
        headers = headers.add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains; preload",
        ));
    }

    headers
}

async fn create_default_admin_if_needed(
    pool: &SqlitePool,
    auth_service: &AuthService,
) -> anyhow::Result<()> {
    if Admin::count(pool).await? > 0 {
        return Ok(());
    }

    let password = env::var("DEFAULT_ADMIN_PASSWORD").unwrap_or_else(|_| {
        let mut rng = thread_rng();
        let digits: Vec<char> = "0123456789".chars().collect();
        let uppercase: Vec<char> = "ABCDEFGHIJKLMNOPQRSTUVWXYZ".chars().collect();
        let lowercase: Vec<char> = "abcdefghijklmnopqrstuvwxyz".chars().collect();

        // Обязательно по символу каждого класса, иначе пароль не пройдёт проверку
        let mut pwd_chars: Vec<char> = vec![
            *digits.choose(&mut rng).unwrap(),
            *uppercase.choose(&mut rng).unwrap(),
            *lowercase.choose(&mut rng).unwrap(),
        ];
        pwd_chars.extend(
            (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(12)
                .map(char::from),
        );
        pwd_chars.shuffle(&mut rng);

        pwd_chars.into_iter().collect()
    });

    let admin = Admin::create(
        pool,
        "admin",
        "admin@medvisit.local",
        &password,
        Some("Администратор платформы"),
        auth_service,
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to create default admin: {}", e))?;

    log::warn!("Default admin account created:");
    log::warn!("  Username: {}", admin.username);
    log::warn!("  Password: {} (generated - CHANGE IMMEDIATELY!)", password);

    Ok(())
}
