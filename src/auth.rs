use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Tolerated clock skew for tokens issued "in the future"
const MAX_FUTURE_SKEW_SECS: i64 = 300;

/// Create the message a token signs
///
/// # Arguments
/// * `user_id` - The user the token identifies
/// * `issued_at` - Unix timestamp of issuance
pub fn create_auth_message(user_id: Uuid, issued_at: i64) -> String {
    format!("reflect_auth:{}:{}", user_id, issued_at)
}

fn sign(secret: &str, message: &str) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Config(format!("Invalid auth secret: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Issue a bearer token `<user_id>.<issued_at>.<hex hmac>`
pub fn issue_token(config: &AuthConfig, user_id: Uuid, issued_at: i64) -> AppResult<String> {
    let signature = sign(&config.secret, &create_auth_message(user_id, issued_at))?;
    Ok(format!("{}.{}.{}", user_id, issued_at, signature))
}

/// Verify a bearer token and return the user it identifies
///
/// Checks that:
/// 1. The token has three well-formed parts
/// 2. The HMAC matches (constant-time comparison)
/// 3. It is not older than the configured max age nor issued more than
///    five minutes in the future
pub fn verify_token(config: &AuthConfig, token: &str, now: i64) -> AppResult<Uuid> {
    let mut parts = token.trim().splitn(3, '.');
    let (user, issued_at, signature) = match (parts.next(), parts.next(), parts.next()) {
        (Some(u), Some(i), Some(s)) if !s.is_empty() => (u, i, s),
        _ => return Err(AppError::Unauthorized("Malformed token".to_string())),
    };

    let user_id = Uuid::parse_str(user)
        .map_err(|_| AppError::Unauthorized("Malformed token".to_string()))?;
    let issued_at: i64 = issued_at
        .parse()
        .map_err(|_| AppError::Unauthorized("Malformed token".to_string()))?;
    let signature = hex::decode(signature)
        .map_err(|_| AppError::Unauthorized("Malformed token".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(config.secret.as_bytes())
        .map_err(|e| AppError::Config(format!("Invalid auth secret: {}", e)))?;
    mac.update(create_auth_message(user_id, issued_at).as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized("Invalid token signature".to_string()))?;

    if issued_at - now > MAX_FUTURE_SKEW_SECS {
        return Err(AppError::Unauthorized("Token issued in the future".to_string()));
    }
    if now - issued_at > config.token_max_age_secs {
        return Err(AppError::Unauthorized("Token expired".to_string()));
    }

    Ok(user_id)
}

/// Extract the token from an `Authorization` header value
pub fn extract_bearer(header: Option<&str>) -> AppResult<&str> {
    let header = header.ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            secret: "test-secret".to_string(),
            token_max_age_secs: 3600,
        }
    }

    #[test]
    fn test_create_auth_message() {
        let user = Uuid::nil();
        let message = create_auth_message(user, 1234567890);
        assert_eq!(
            message,
            "reflect_auth:00000000-0000-0000-0000-000000000000:1234567890"
        );
    }

    #[test]
    fn test_valid_token_round_trip() {
        let user = Uuid::new_v4();
        let now = chrono::Utc::now().timestamp();
        let token = issue_token(&config(), user, now).unwrap();
        assert_eq!(verify_token(&config(), &token, now + 10).unwrap(), user);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let now = chrono::Utc::now().timestamp();
        let token = issue_token(&config(), Uuid::new_v4(), now).unwrap();

        // Same signature, different user
        let forged = format!("{}{}", Uuid::new_v4(), &token[36..]);
        assert!(verify_token(&config(), &forged, now).is_err());

        let other_secret = AuthConfig {
            secret: "another".to_string(),
            ..config()
        };
        assert!(verify_token(&other_secret, &token, now).is_err());
    }

    #[test]
    fn test_expired_and_future_tokens_rejected() {
        let now = chrono::Utc::now().timestamp();
        let user = Uuid::new_v4();

        let old = issue_token(&config(), user, now - 3601).unwrap();
        assert!(verify_token(&config(), &old, now).is_err());

        let future = issue_token(&config(), user, now + 400).unwrap();
        assert!(verify_token(&config(), &future, now).is_err());

        let slight_skew = issue_token(&config(), user, now + 100).unwrap();
        assert!(verify_token(&config(), &slight_skew, now).is_ok());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let now = chrono::Utc::now().timestamp();
        for token in ["", "abc", "not-a-uuid.1.ff", "00000000-0000-0000-0000-000000000000.x.ff"] {
            let err = verify_token(&config(), token, now).unwrap_err();
            assert_eq!(err.status_code(), 401, "{}", token);
        }
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc")).unwrap(), "abc");
        assert!(extract_bearer(Some("Basic abc")).is_err());
        assert!(extract_bearer(Some("Bearer   ")).is_err());
        assert!(extract_bearer(None).is_err());
    }
}
