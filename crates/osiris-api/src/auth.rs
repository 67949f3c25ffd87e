use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::info;
use uuid::Uuid;

use osiris_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::middleware::JsonBody;
use crate::{AppState, blocking};

pub(crate) fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(ApiError::bad_request("Username must be 3-32 characters"));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ApiError::bad_request(
            "Username may only contain letters, digits and underscores",
        ));
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if !(8..=128).contains(&len) {
        return Err(ApiError::bad_request("Password must be 8-128 characters"));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username)?;
    validate_password(&req.password)?;

    let display_name = match req.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => req.username.clone(),
    };
    if display_name.chars().count() > 50 {
        return Err(ApiError::bad_request("Display name must be at most 50 characters"));
    }
    if let Some(word) = state.word_filter.check_all(&[&req.username, &display_name]) {
        return Err(ApiError::bad_request(format!("Name contains a banned word: {}", word)));
    }

    let user_id = Uuid::new_v4();
    let username = req.username.clone();
    let created = blocking(&state, move |db| {
        if db.get_user_by_username(&username)?.is_some() {
            return Ok(None);
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
            .to_string();

        // `None` when the name was taken between the check and the insert
        Ok(db.create_user(&user_id.to_string(), &username, &password_hash, &display_name)?)
    })
    .await?;

    let Some(is_admin) = created else {
        return Err(ApiError::conflict("Username is already taken"));
    };
    if is_admin {
        info!("{} registered as the first user and is an admin", req.username);
    }

    let token = create_token(&state.settings.jwt_secret, state.settings.token_ttl_days, user_id, &req.username)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = blocking(&state, move |db| {
        let Some(user) = db.get_user_by_username(&username)? else {
            return Ok(None);
        };

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow::anyhow!("stored hash for {} is invalid: {}", user.id, e))?;
        let valid = Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .is_ok();
        Ok(valid.then_some(user))
    })
    .await?
    .ok_or(ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;

    let token = create_token(&state.settings.jwt_secret, state.settings.token_ttl_days, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub(crate) fn create_token(secret: &str, ttl_days: i64, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(ttl_days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use osiris_gateway::connection::verify_token;

    #[test]
    fn username_rules() {
        assert!(validate_username("ada_99").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
        assert!(validate_username("ada lovelace").is_err());
        assert!(validate_username("ädä").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("hunter22").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn tokens_verify_with_the_gateway() {
        let user_id = Uuid::new_v4();
        let token = create_token("secret", 1, user_id, "ada").unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "ada");
    }
}
