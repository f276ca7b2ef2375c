use axum::{extract::State, http::StatusCode, Extension, Json};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::jwt::{generate_token_pair, validate_token, TokenPair, TokenType};
use super::middleware::AuthUser;
use super::password::{check_password_policy, hash_password, verify_password};
use chartpulse_db::entities::user;
use chartpulse_db::AppState;

// ─── DTOs ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: uuid::Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role.to_string(),
        }
    }
}

fn internal_error() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal server error".to_string(),
        }),
    )
}

// ─── Handlers ───────────────────────────────────────────────────────

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, Json<ErrorResponse>)> {
    let found = user::Entity::find()
        .filter(user::Column::Username.eq(&body.username))
        .one(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("db error: {e}");
            internal_error()
        })?;

    // Same message for unknown user and wrong password
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid username or password".to_string(),
            }),
        )
    };

    let Some(found) = found else {
        return Err(invalid());
    };

    let ok = verify_password(&body.password, &found.password_hash).map_err(|e| {
        tracing::error!("password verify error: {e}");
        internal_error()
    })?;
    if !ok {
        return Err(invalid());
    }

    if found.is_disabled {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "Account is disabled".to_string(),
            }),
        ));
    }

    let tokens = generate_token_pair(
        found.id,
        &found.username,
        found.role.as_str(),
        &state.jwt_secret,
    )
    .map_err(|e| {
        tracing::error!("token error: {e}");
        internal_error()
    })?;

    Ok(Json(AuthResponse {
        user: found.into(),
        tokens,
    }))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, Json<ErrorResponse>)> {
    let claims = validate_token(&body.refresh_token, &state.jwt_secret).map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid or expired refresh token".to_string(),
            }),
        )
    })?;

    if claims.token_type != TokenType::Refresh {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Refresh token required".to_string(),
            }),
        ));
    }

    // Re-read the user so revoked accounts stop refreshing
    let found = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("db error: {e}");
            internal_error()
        })?
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Account no longer exists".to_string(),
                }),
            )
        })?;

    if found.is_disabled {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "Account is disabled".to_string(),
            }),
        ));
    }

    let tokens = generate_token_pair(
        found.id,
        &found.username,
        found.role.as_str(),
        &state.jwt_secret,
    )
    .map_err(|e| {
        tracing::error!("token error: {e}");
        internal_error()
    })?;

    Ok(Json(AuthResponse {
        user: found.into(),
        tokens,
    }))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<UserResponse>, (StatusCode, Json<ErrorResponse>)> {
    let found = user::Entity::find_by_id(auth_user.0.sub)
        .one(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("db error: {e}");
            internal_error()
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "User not found".to_string(),
                }),
            )
        })?;

    Ok(Json(found.into()))
}

/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    if let Err(msg) = check_password_policy(&body.new_password) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: msg.to_string(),
            }),
        ));
    }

    let found = user::Entity::find_by_id(auth_user.0.sub)
        .one(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("db error: {e}");
            internal_error()
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "User not found".to_string(),
                }),
            )
        })?;

    let ok = verify_password(&body.current_password, &found.password_hash).map_err(|e| {
        tracing::error!("password verify error: {e}");
        internal_error()
    })?;
    if !ok {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Current password is incorrect".to_string(),
            }),
        ));
    }

    let new_hash = hash_password(&body.new_password).map_err(|e| {
        tracing::error!("hash error: {e}");
        internal_error()
    })?;

    let mut update: user::ActiveModel = found.into();
    update.password_hash = Set(new_hash);
    update.updated_at = Set(chrono::Utc::now().into());
    update.update(&state.db).await.map_err(|e| {
        tracing::error!("db error: {e}");
        internal_error()
    })?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_deserialization() {
        let json = r#"{"username": "admin", "password": "secret123"}"#;
        let req: LoginRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.username, "admin");
        assert_eq!(req.password, "secret123");
    }

    #[test]
    fn test_user_response_serialization() {
        let resp = UserResponse {
            id: uuid::Uuid::nil(),
            username: "analyst1".into(),
            email: "a@example.com".into(),
            role: "analyst".into(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["username"], "analyst1");
        assert_eq!(json["role"], "analyst");
    }

    #[test]
    fn test_error_response_serialization() {
        let resp = ErrorResponse {
            error: "Invalid username or password".into(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"], "Invalid username or password");
    }

    #[test]
    fn test_user_response_from_model() {
        let model = user::Model {
            id: uuid::Uuid::new_v4(),
            username: "admin".into(),
            email: "admin@example.com".into(),
            password_hash: "$argon2id$...".into(),
            role: user::UserRole::Admin,
            is_disabled: false,
            created_at: chrono::Utc::now().into(),
            updated_at: chrono::Utc::now().into(),
        };
        let resp: UserResponse = model.into();
        assert_eq!(resp.role, "admin");
        // password hash never leaves through this DTO
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
