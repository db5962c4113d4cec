// src/config.rs - Configuration management
use anyhow::{Context, Result};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
    pub client_timeout: u64,
    pub client_shutdown: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration_hours: i64,
    pub bcrypt_cost: u32,
    pub max_login_attempts: i64,
    pub lockout_duration_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub max_request_size: usize,
    pub require_https: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub console_enabled: bool,
}

// Dummy defaults for tests (no ENV read here)
impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dummy_32_chars_for_tests_only!!!".to_string(), // >=32
            token_expiration_hours: 24,
            bcrypt_cost: 10,
            max_login_attempts: 5,
            lockout_duration_minutes: 15,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            keep_alive: 30,
            client_timeout: 30,
            client_shutdown: 5,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:medvisit.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: 30,
            idle_timeout: 600,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
            max_request_size: 1024 * 1024,
            require_https: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_enabled: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// Генерация безопасного JWT секрета
pub fn generate_jwt_secret() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

pub fn generate_and_save_jwt_secret() -> Result<String> {
    let secret = generate_jwt_secret();

    let env_path = env::var("ENV_FILE").unwrap_or_else(|_| ".env".to_string());
    let path = Path::new(&env_path);
    if path.exists() {
        let mut content = fs::read_to_string(path).unwrap_or_default();
        if !content.contains("JWT_SECRET=") {
            content.push_str(&format!("\nJWT_SECRET={}\n", secret));
            fs::write(path, content)?;
        }
    }

    Ok(secret)
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}

impl Config {
    pub fn load() -> Result<Config> {
        load_env_file()?;

        let mut config = if let Ok(config_file) = env::var("CONFIG_FILE") {
            let config_str = fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {}", config_file))?;
            toml::from_str(&config_str)
                .with_context(|| format!("Failed to parse config file: {}", config_file))?
        } else {
            Config::default()
        };

        config.override_with_env();

        // Секрет не задан ни в TOML, ни в окружении — генерируем свой
        if env::var("JWT_SECRET").is_err()
            && config.auth.jwt_secret == AuthConfig::default().jwt_secret
        {
            config.auth.jwt_secret = generate_and_save_jwt_secret()?;
            log::warn!("JWT_SECRET not set, generated a new one");
        }

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    fn override_with_env(&mut self) {
        if let Ok(host) = env::var("BIND_ADDRESS") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("MEDVISIT_PORT").and_then(|s| {
            s.parse::<u16>().map_err(|_| env::VarError::NotPresent)
        }) {
            self.server.port = port;
        }
        if let Ok(workers) = env::var("MEDVISIT_WORKERS").and_then(|s| {
            s.parse::<usize>().map_err(|_| env::VarError::NotPresent)
        }) {
            self.server.workers = Some(workers);
        }
        if let Ok(jwt_secret) = env::var("JWT_SECRET") {
            self.auth.jwt_secret = jwt_secret;
        }
        if let Ok(expiration) = env::var("AUTH_TOKEN_EXPIRATION_HOURS").and_then(|s| {
            s.parse::<i64>().map_err(|_| env::VarError::NotPresent)
        }) {
            self.auth.token_expiration_hours = expiration;
        }
        if let Ok(cost) = env::var("AUTH_BCRYPT_COST").and_then(|s| {
            s.parse::<u32>().map_err(|_| env::VarError::NotPresent)
        }) {
            self.auth.bcrypt_cost = cost;
        }
        if let Ok(max) = env::var("AUTH_MAX_LOGIN_ATTEMPTS").and_then(|s| {
            s.parse::<i64>().map_err(|_| env::VarError::NotPresent)
        }) {
            self.auth.max_login_attempts = max;
        }
        if let Ok(lockout) = env::var("AUTH_LOCKOUT_DURATION_MINUTES").and_then(|s| {
            s.parse::<i64>().map_err(|_| env::VarError::NotPresent)
        }) {
            self.auth.lockout_duration_minutes = lockout;
        }
        if let Ok(url) = env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(max_conn) = env::var("DATABASE_MAX_CONNECTIONS").and_then(|s| {
            s.parse::<u32>().map_err(|_| env::VarError::NotPresent)
        }) {
            self.database.max_connections = max_conn;
        }
        if let Ok(min_conn) = env::var("DATABASE_MIN_CONNECTIONS").and_then(|s| {
            s.parse::<u32>().map_err(|_| env::VarError::NotPresent)
        }) {
            self.database.min_connections = min_conn;
        }
        if let Ok(origins_str) = env::var("ALLOWED_ORIGINS") {
            self.security.allowed_origins = origins_str
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(level) = env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long (current: {})",
                self.auth.jwt_secret.len()
            ));
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(anyhow::anyhow!(
                "max_connections ({}) must be >= min_connections ({})",
                self.database.max_connections,
                self.database.min_connections
            ));
        }

        if self.auth.max_login_attempts < 1 {
            return Err(anyhow::anyhow!("max_login_attempts must be at least 1"));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        env::var("MEDVISIT_ENV")
            .map(|v| v == "production")
            .unwrap_or(false)
    }

    pub fn print_startup_info(&self) {
        log::info!("🏥 MedVisit Starting up...");
        log::info!("🌐 Server: {}:{}", self.server.host, self.server.port);
        log::info!(
            "💾 Database: {}",
            if self.database.url.contains("sqlite") {
                "SQLite"
            } else if self.database.url.contains("postgres") {
                "PostgreSQL"
            } else {
                "Unknown"
            }
        );
        log::info!("🔒 Auth: JWT ({}h expiration)", self.auth.token_expiration_hours);
        log::info!("📊 Logging: {} level", self.logging.level);

        if !self.is_production() {
            log::warn!("🚧 Running in development mode");
        }

        if self.security.require_https {
            log::info!("🔒 HTTPS enforcement enabled");
        } else if self.is_production() {
            log::warn!("⚠️  HTTPS not required in production mode");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        env::remove_var("MEDVISIT_ENV");
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(!config.is_production());
        assert!(config.auth.jwt_secret.len() >= 32);
        assert_eq!(config.auth.max_login_attempts, 5);
        assert_eq!(config.auth.lockout_duration_minutes, 15);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Короткий секрет
        config.auth.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());

        // Достаточный секрет
        config.auth.jwt_secret = "a".repeat(32);
        assert!(config.validate().is_ok());

        // Некорректные соединения БД
        config.database.max_connections = 1;
        config.database.min_connections = 5;
        assert!(config.validate().is_err());
    }

    // Все сценарии с переменными окружения в одном тесте:
    // параллельные тесты иначе перетирают друг другу env.
    #[test]
    fn test_load_from_toml_and_env() -> Result<()> {
        let toml_content = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [auth]
        jwt_secret = "test_secret_123456789012345678901234567890"
        "#;

        let temp_file = NamedTempFile::new()?;
        fs::write(temp_file.path(), toml_content.as_bytes())?;

        env::set_var("CONFIG_FILE", temp_file.path().to_str().unwrap());
        env::remove_var("MEDVISIT_PORT");
        env::remove_var("JWT_SECRET");
        env::remove_var("BIND_ADDRESS");
        env::remove_var("ALLOWED_ORIGINS");

        let config = Config::load()?;
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.auth.jwt_secret,
            "test_secret_123456789012345678901234567890"
        );

        // Переменные окружения перекрывают TOML
        env::set_var("MEDVISIT_PORT", "9090");
        env::set_var("JWT_SECRET", "env_secret_123456789012345678901234567890");
        env::set_var(
            "ALLOWED_ORIGINS",
            "https://clinic.example.ru, https://admin.example.ru,",
        );

        let config = Config::load()?;
        assert_eq!(config.server.port, 9090);
        assert_eq!(
            config.auth.jwt_secret,
            "env_secret_123456789012345678901234567890"
        );
        assert_eq!(
            config.security.allowed_origins,
            vec![
                "https://clinic.example.ru".to_string(),
                "https://admin.example.ru".to_string()
            ]
        );

        env::remove_var("CONFIG_FILE");
        env::remove_var("MEDVISIT_PORT");
        env::remove_var("JWT_SECRET");
        env::remove_var("ALLOWED_ORIGINS");

        Ok(())
    }

    #[test]
    fn test_generated_secret_passes_validation() {
        let mut config = Config::default();
        config.auth.jwt_secret = generate_jwt_secret();
        assert_eq!(config.auth.jwt_secret.len(), 64);
        assert!(config.validate().is_ok());
    }
}
