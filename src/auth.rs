//! Credential validation and token extraction helpers.

use crate::error::{AppError, AppResult};
use axum::http::{header, HeaderMap};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "messmate_session";

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_NAME_LEN: usize = 64;

/// Trim and lowercase an email, rejecting obviously malformed input
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid || email.len() > 254 {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    Ok(email)
}

pub fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Name must be between 1 and {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Session token from `Authorization: Bearer` or the session cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value for a fresh session
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        max_age_secs,
        if secure { "; Secure" } else { "" }
    )
}

/// `Set-Cookie` value that clears the session
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
        assert!(normalize_email("alice").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("alice@localhost").is_err());
        assert!(normalize_email("al ice@example.com").is_err());
    }

    #[test]
    fn test_name_and_password_rules() {
        assert_eq!(validate_name("  Bo ").unwrap(), "Bo");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(65)).is_err());
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn test_bearer_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        headers.insert(header::COOKIE, HeaderValue::from_static("messmate_session=fromcookie"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; messmate_session=tok; other=1"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok"));

        let empty = HeaderMap::new();
        assert!(extract_token(&empty).is_none());
    }

    #[test]
    fn test_session_cookie_format() {
        let cookie = session_cookie("tok", 3600, true);
        assert!(cookie.starts_with("messmate_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("; Secure"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
