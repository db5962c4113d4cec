// src/validation.rs - Centralized validation module
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ApiError;

lazy_static! {
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9()\s-]{5,30}$").unwrap();
    static ref INN_REGEX: Regex = Regex::new(r"^\d{10}(\d{2})?$").unwrap();
}

/// Телефон: цифры, скобки, дефисы, пробелы, опциональный ведущий «+».
pub fn validate_phone(phone: &str) -> Result<(), ApiError> {
    if !PHONE_REGEX.is_match(phone.trim()) {
        return Err(ApiError::ValidationError(format!(
            "Invalid phone number: '{}'",
            phone
        )));
    }
    Ok(())
}

/// ИНН: 10 цифр для юрлиц, 12 для ИП. Пустое значение допустимо.
pub fn validate_inn(inn: &str) -> Result<(), ApiError> {
    let inn = inn.trim();
    if inn.is_empty() {
        return Ok(());
    }
    if !INN_REGEX.is_match(inn) {
        return Err(ApiError::ValidationError(
            "INN must be 10 or 12 digits".to_string(),
        ));
    }
    Ok(())
}

/// Минимальные требования к паролю: 8+ символов, верхний и нижний
/// регистр, хотя бы одна цифра.
pub fn validate_password_strength(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::ValidationError(
            "Password must be at least 8 characters long".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(ApiError::ValidationError(
            "Password must contain at least one uppercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(ApiError::ValidationError(
            "Password must contain at least one lowercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ApiError::ValidationError(
            "Password must contain at least one digit".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_formats() {
        assert!(validate_phone("+7 (900) 123-45-67").is_ok());
        assert!(validate_phone("89001234567").is_ok());
        assert!(validate_phone("123").is_err());
        assert!(validate_phone("call me maybe").is_err());
    }

    #[test]
    fn test_inn() {
        assert!(validate_inn("").is_ok());
        assert!(validate_inn("7707083893").is_ok());
        assert!(validate_inn("500100732259").is_ok());
        assert!(validate_inn("12345").is_err());
        assert!(validate_inn("12345678901").is_err());
        assert!(validate_inn("77070838ab").is_err());
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("Secure1pass").is_ok());
        assert!(validate_password_strength("short1A").is_err());
        assert!(validate_password_strength("nouppercase1").is_err());
        assert!(validate_password_strength("NOLOWERCASE1").is_err());
        assert!(validate_password_strength("NoDigitsHere").is_err());
    }
}
