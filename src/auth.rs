use actix_web::web;
use actix_web::HttpMessage;
use actix_web::{dev::ServiceRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use bcrypt::{hash, verify};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::config::AuthConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::Clinic;
use crate::validation::validate_password_strength;

// ======== ADMIN MODEL ========

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Admin {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ======== ACCOUNT ROLE ========

/// Две роли в системе: администратор платформы и клиника-заказчик.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Admin,
    Clinic,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Admin => "admin",
            AccountRole::Clinic => "clinic",
        }
    }
}

impl std::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ======== REQUEST/RESPONSE STRUCTS ========

#[derive(Debug, Deserialize, Validate)]
pub struct ClinicLoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminLoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "New password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse<T: Serialize> {
    pub token: String,
    pub expires_in: i64,
    pub account: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account id
    pub name: String,
    pub email: String,
    pub role: AccountRole,
    pub exp: i64,
    pub iat: i64,
}

// ======== AUTH SERVICE ========

pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    bcrypt_cost: u32,
    token_expiration_hours: i64,
}

impl AuthService {
    pub fn new(auth_config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
            bcrypt_cost: auth_config.bcrypt_cost,
            token_expiration_hours: auth_config.token_expiration_hours,
        }
    }

    pub fn hash_password(&self, password: &str) -> ApiResult<String> {
        validate_password_strength(password)?;
        Ok(hash(password, self.bcrypt_cost)?)
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> ApiResult<bool> {
        Ok(verify(password, hash)?)
    }

    pub fn token_lifetime_seconds(&self) -> i64 {
        self.token_expiration_hours * 3600
    }

    pub fn generate_token(
        &self,
        id: &str,
        name: &str,
        email: &str,
        role: AccountRole,
    ) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.token_expiration_hours);

        let claims = Claims {
            sub: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| ApiError::AuthError("Failed to generate token".to_string()))
    }

    pub fn verify_token(&self, token: &str) -> ApiResult<Claims> {
        let validation = Validation::default();
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::AuthError("Token expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    ApiError::AuthError("Invalid token".to_string())
                }
                _ => ApiError::AuthError("Token verification failed".to_string()),
            })
    }
}

// ======== ADMIN METHODS ========

impl Admin {
    pub async fn find_by_username(pool: &SqlitePool, username: &str) -> ApiResult<Admin> {
        sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE username = ?")
            .bind(username)
            .fetch_one(pool)
            .await
            .map_err(|_| ApiError::NotFound("Admin not found".to_string()))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> ApiResult<Admin> {
        sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(|_| ApiError::NotFound("Admin not found".to_string()))
    }

    pub async fn count(pool: &SqlitePool) -> ApiResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn create(
        pool: &SqlitePool,
        username: &str,
        email: &str,
        password: &str,
        full_name: Option<&str>,
        auth_service: &AuthService,
    ) -> ApiResult<Admin> {
        let password_hash = auth_service.hash_password(password)?;
        let now = Utc::now();
        let admin = Admin {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            full_name: full_name.map(|s| s.to_string()),
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO admins (
                id, username, email, password_hash, full_name, is_active,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&admin.id)
        .bind(&admin.username)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .bind(&admin.full_name)
        .bind(admin.is_active as i32)
        .bind(admin.created_at)
        .bind(admin.updated_at)
        .execute(pool)
        .await?;

        Ok(admin)
    }

    pub async fn update_last_login(&self, pool: &SqlitePool) -> ApiResult<()> {
        sqlx::query("UPDATE admins SET last_login = datetime('now') WHERE id = ?")
            .bind(&self.id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn change_password(
        &self,
        pool: &SqlitePool,
        current_password: &str,
        new_password: &str,
        auth_service: &AuthService,
    ) -> ApiResult<()> {
        if !auth_service.verify_password(current_password, &self.password_hash)? {
            return Err(ApiError::AuthError("Current password is incorrect".to_string()));
        }

        let new_hash = auth_service.hash_password(new_password)?;
        sqlx::query("UPDATE admins SET password_hash = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(&new_hash)
            .bind(&self.id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

// ======== CLINIC AUTH METHODS ========

impl Clinic {
    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> ApiResult<Clinic> {
        sqlx::query_as::<_, Clinic>("SELECT * FROM clinics WHERE email = ?")
            .bind(email)
            .fetch_one(pool)
            .await
            .map_err(|_| ApiError::NotFound("Clinic not found".to_string()))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> ApiResult<Clinic> {
        sqlx::query_as::<_, Clinic>("SELECT * FROM clinics WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(|_| ApiError::clinic_not_found(id))
    }

    pub async fn email_exists(pool: &SqlitePool, email: &str) -> ApiResult<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clinics WHERE email = ?")
            .bind(email)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    pub fn is_locked(&self) -> bool {
        if let Some(locked_until) = self.locked_until {
            Utc::now() < locked_until
        } else {
            false
        }
    }

    /// Увеличивает счётчик неудачных входов; при достижении лимита
    /// блокирует аккаунт на lockout_duration_minutes.
    pub async fn register_failed_login(
        &mut self,
        pool: &SqlitePool,
        max_attempts: i64,
        lockout_minutes: i64,
    ) -> ApiResult<()> {
        self.failed_login_attempts += 1;
        if self.failed_login_attempts >= max_attempts {
            self.locked_until = Some(Utc::now() + Duration::minutes(lockout_minutes));
        }
        sqlx::query("UPDATE clinics SET failed_login_attempts = ?, locked_until = ? WHERE id = ?")
            .bind(self.failed_login_attempts)
            .bind(self.locked_until)
            .bind(&self.id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn reset_failed_attempts(&mut self, pool: &SqlitePool) -> ApiResult<()> {
        self.failed_login_attempts = 0;
        self.locked_until = None;
        sqlx::query(
            "UPDATE clinics SET failed_login_attempts = 0, locked_until = NULL WHERE id = ?",
        )
        .bind(&self.id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update_last_login(&self, pool: &SqlitePool) -> ApiResult<()> {
        sqlx::query("UPDATE clinics SET last_login = datetime('now') WHERE id = ?")
            .bind(&self.id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn change_password(
        &self,
        pool: &SqlitePool,
        current_password: &str,
        new_password: &str,
        auth_service: &AuthService,
    ) -> ApiResult<()> {
        if !auth_service.verify_password(current_password, &self.password_hash)? {
            return Err(ApiError::AuthError("Current password is incorrect".to_string()));
        }

        let new_hash = auth_service.hash_password(new_password)?;
        sqlx::query("UPDATE clinics SET password_hash = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(&new_hash)
            .bind(&self.id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

// ======== HELPER FUNCTIONS ========

pub fn get_current_user(req: &HttpRequest) -> ApiResult<Claims> {
    req.extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("No user information found".to_string()))
}

pub fn require_admin(req: &HttpRequest) -> ApiResult<Claims> {
    let claims = get_current_user(req)?;
    if claims.role != AccountRole::Admin {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }
    Ok(claims)
}

pub fn require_clinic(req: &HttpRequest) -> ApiResult<Claims> {
    let claims = get_current_user(req)?;
    if claims.role != AccountRole::Clinic {
        return Err(ApiError::Forbidden("Clinic access required".to_string()));
    }
    Ok(claims)
}

// ======== JWT MIDDLEWARE ========

pub async fn jwt_middleware(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (actix_web::Error, ServiceRequest)> {
    let token = credentials.token();

    let auth_service = match req.app_data::<web::Data<std::sync::Arc<AuthService>>>() {
        Some(svc) => svc,
        None => {
            log::error!("AuthService not found in app data");
            return Err((
                ApiError::InternalServerError("Auth service not available".to_string()).into(),
                req,
            ));
        }
    };

    match auth_service.verify_token(token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(req)
        }
        Err(err) => {
            log::warn!("JWT verification failed: {}", err);
            Err((err.into(), req))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> AuthService {
        let mut config = AuthConfig::default();
        config.bcrypt_cost = 4; // быстрые тесты
        AuthService::new(&config)
    }

    #[test]
    fn test_password_hash_and_verify() {
        let svc = test_service();
        let hash = svc.hash_password("Correct1Horse").unwrap();
        assert!(svc.verify_password("Correct1Horse", &hash).unwrap());
        assert!(!svc.verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_weak_password_rejected() {
        let svc = test_service();
        assert!(svc.hash_password("weak").is_err());
        assert!(svc.hash_password("nodigitshere").is_err());
    }

    #[test]
    fn test_token_roundtrip() {
        let svc = test_service();
        let token = svc
            .generate_token("id-1", "ГКБ №1", "clinic@example.ru", AccountRole::Clinic)
            .unwrap();
        let claims = svc.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "id-1");
        assert_eq!(claims.email, "clinic@example.ru");
        assert_eq!(claims.role, AccountRole::Clinic);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let svc = test_service();
        let token = svc
            .generate_token("id-1", "admin", "a@b.ru", AccountRole::Admin)
            .unwrap();
        let mut other_config = AuthConfig::default();
        other_config.jwt_secret = "another_secret_that_is_long_enough!!".to_string();
        let other = AuthService::new(&other_config);
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(AccountRole::Admin.as_str(), "admin");
        assert_eq!(
            serde_json::to_string(&AccountRole::Clinic).unwrap(),
            "\"clinic\""
        );
    }

    async fn pool_with_clinic() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();

        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO clinics (
                id, clinic_name, email, phone, region, city, password_hash,
                contact_person_name, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind("clinic-1")
        .bind("ГКБ №1 г. Тверь")
        .bind("gkb1@example.ru")
        .bind("+79001234567")
        .bind("Тверская область")
        .bind("Тверь")
        .bind("not-a-real-hash")
        .bind("Иванова А.П.")
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    #[actix_rt::test]
    async fn test_lockout_after_max_failed_attempts() {
        let pool = pool_with_clinic().await;
        let mut clinic = Clinic::find_by_email(&pool, "gkb1@example.ru").await.unwrap();

        // до лимита счётчик растёт, блокировки нет
        clinic.register_failed_login(&pool, 3, 15).await.unwrap();
        clinic.register_failed_login(&pool, 3, 15).await.unwrap();
        assert_eq!(clinic.failed_login_attempts, 2);
        assert!(clinic.locked_until.is_none());
        assert!(!clinic.is_locked());

        clinic.register_failed_login(&pool, 3, 15).await.unwrap();
        assert_eq!(clinic.failed_login_attempts, 3);
        assert!(clinic.is_locked());
        let locked_until = clinic.locked_until.unwrap();
        assert!(locked_until > Utc::now() + Duration::minutes(14));
        assert!(locked_until <= Utc::now() + Duration::minutes(15));

        // блокировка попадает в базу
        let stored = Clinic::find_by_email(&pool, "gkb1@example.ru").await.unwrap();
        assert_eq!(stored.failed_login_attempts, 3);
        assert!(stored.is_locked());
    }

    #[actix_rt::test]
    async fn test_reset_clears_lockout() {
        let pool = pool_with_clinic().await;
        let mut clinic = Clinic::find_by_email(&pool, "gkb1@example.ru").await.unwrap();

        for _ in 0..3 {
            clinic.register_failed_login(&pool, 3, 15).await.unwrap();
        }
        assert!(clinic.is_locked());

        clinic.reset_failed_attempts(&pool).await.unwrap();
        assert_eq!(clinic.failed_login_attempts, 0);
        assert!(!clinic.is_locked());

        let stored = Clinic::find_by_email(&pool, "gkb1@example.ru").await.unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(stored.locked_until.is_none());
    }

    #[actix_rt::test]
    async fn test_expired_lockout_unlocks() {
        let pool = pool_with_clinic().await;
        let mut clinic = Clinic::find_by_email(&pool, "gkb1@example.ru").await.unwrap();

        clinic.locked_until = Some(Utc::now() - Duration::minutes(1));
        assert!(!clinic.is_locked());
    }
}
