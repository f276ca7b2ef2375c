//! Admin endpoints: provider credentials and user management.
//!
//! All routes here sit behind the `require_admin` layer.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::auth::password::{check_password_policy, hash_password};
use crate::credentials;
use chartpulse_db::entities::service_setting;
use chartpulse_db::entities::user::{self, UserRole};
use chartpulse_db::AppState;

/// Every editable setting: (key, env override, holds a secret).
/// Environment variables win over stored rows, see `credentials::resolve`.
const SETTING_KEYS: &[(&str, &str, bool)] = &[
    ("soundcharts_app_id", "SOUNDCHARTS_APP_ID", false),
    ("soundcharts_api_key", "SOUNDCHARTS_API_KEY", true),
    ("soundcharts_base_url", "SOUNDCHARTS_BASE_URL", false),
    ("acr_identify_host", "ACR_IDENTIFY_HOST", false),
    ("acr_access_key", "ACR_ACCESS_KEY", false),
    ("acr_access_secret", "ACR_ACCESS_SECRET", true),
    ("acr_fs_token", "ACR_FS_TOKEN", true),
    ("acr_fs_container_id", "ACR_FS_CONTAINER_ID", false),
    ("acr_fs_base_url", "ACR_FS_BASE_URL", false),
    ("acr_webhook_secret", "ACR_WEBHOOK_SECRET", true),
];

const SECRET_MASK: &str = "•••";

// ─── Service settings ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    /// Stored value; masked for secrets
    pub value: String,
    pub is_secret: bool,
    /// Whether a usable value resolves from the environment or the store
    pub configured: bool,
    pub updated_at: Option<String>,
}

/// GET /api/admin/settings
pub async fn list_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SettingResponse>>, (StatusCode, String)> {
    let rows: HashMap<String, service_setting::Model> = service_setting::Entity::find()
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .into_iter()
        .map(|r| (r.key.clone(), r))
        .collect();

    let mut settings = Vec::with_capacity(SETTING_KEYS.len());
    for &(key, env_var, is_secret) in SETTING_KEYS {
        let configured = credentials::resolve(&state, env_var, key).await.is_some();
        let row = rows.get(key);
        let value = if is_secret {
            if configured {
                SECRET_MASK.to_string()
            } else {
                String::new()
            }
        } else {
            row.map(|r| r.value.clone()).unwrap_or_default()
        };
        settings.push(SettingResponse {
            key: key.to_string(),
            value,
            is_secret,
            configured,
            updated_at: row.map(|r| r.updated_at.to_rfc3339()),
        });
    }

    Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: String,
}

/// PUT /api/admin/settings/:key — an empty value clears the setting
pub async fn update_setting(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(payload): Json<UpdateSettingRequest>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    let Some(&(key, _, is_secret)) = SETTING_KEYS.iter().find(|(k, _, _)| *k == key) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Unknown setting key" })),
        ));
    };

    credentials::set_setting(&state, key, payload.value.trim(), is_secret)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e })),
            )
        })?;

    tracing::info!(key, "setting updated");
    Ok(StatusCode::NO_CONTENT)
}

// ─── User management ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_disabled: bool,
    pub created_at: String,
}

impl From<user::Model> for UserRow {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role.as_str().to_string(),
            is_disabled: u.is_disabled,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserRow>>, (StatusCode, String)> {
    let users = user::Entity::find()
        .order_by_asc(user::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    Ok(Json(users.into_iter().map(UserRow::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserRow>), (StatusCode, Json<serde_json::Value>)> {
    let username = payload.username.trim().to_string();
    if username.len() < 3 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Username must be at least 3 characters" })),
        ));
    }
    let email = payload.email.trim().to_string();
    if !email.contains('@') {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Invalid email address" })),
        ));
    }
    if let Err(e) = check_password_policy(&payload.password) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e })),
        ));
    }
    let role = match payload.role.as_deref() {
        None | Some("analyst") => UserRole::Analyst,
        Some("admin") => UserRole::Admin,
        Some(other) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("Invalid role: {other}") })),
            ))
        }
    };

    let existing = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(&username))
                .add(user::Column::Email.eq(&email)),
        )
        .one(&state.db)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "DB error" })),
            )
        })?;
    if existing.is_some() {
        return Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "Username or email already in use" })),
        ));
    }

    let password_hash = hash_password(&payload.password).map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Failed to hash password" })),
        )
    })?;

    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(role),
        is_disabled: Set(false),
        created_at: Set(chrono::Utc::now().into()),
        updated_at: Set(chrono::Utc::now().into()),
    }
    .insert(&state.db)
    .await
    .map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "DB error" })),
        )
    })?;

    tracing::info!(user_id = %created.id, "user created");
    Ok((StatusCode::CREATED, Json(UserRow::from(created))))
}

async fn active_admin_count(
    db: &sea_orm::DatabaseConnection,
) -> Result<u64, (StatusCode, Json<serde_json::Value>)> {
    user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::Admin))
        .filter(user::Column::IsDisabled.eq(false))
        .count(db)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "DB error" })),
            )
        })
}

async fn find_user(
    db: &sea_orm::DatabaseConnection,
    id: Uuid,
) -> Result<user::Model, (StatusCode, Json<serde_json::Value>)> {
    user::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "DB error" })),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "User not found" })),
            )
        })
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// PUT /api/admin/users/:id/role
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    let new_role = match payload.role.as_str() {
        "admin" => UserRole::Admin,
        "analyst" => UserRole::Analyst,
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("Invalid role: {other}") })),
            ))
        }
    };

    if admin.0.sub == id {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Cannot change your own role" })),
        ));
    }

    let target = find_user(&state.db, id).await?;

    if target.role == UserRole::Admin
        && new_role != UserRole::Admin
        && !target.is_disabled
        && active_admin_count(&state.db).await? <= 1
    {
        return Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "Cannot demote the last admin" })),
        ));
    }

    let mut update: user::ActiveModel = target.into();
    update.role = Set(new_role);
    update.updated_at = Set(chrono::Utc::now().into());
    update.update(&state.db).await.map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "DB error" })),
        )
    })?;

    tracing::info!(%id, role = payload.role, "user role updated");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetDisabledRequest {
    pub disabled: bool,
}

/// PUT /api/admin/users/:id/disable
pub async fn set_user_disabled(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetDisabledRequest>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    if admin.0.sub == id {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Cannot disable your own account" })),
        ));
    }

    let target = find_user(&state.db, id).await?;

    if payload.disabled
        && target.role == UserRole::Admin
        && !target.is_disabled
        && active_admin_count(&state.db).await? <= 1
    {
        return Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "Cannot disable the last admin" })),
        ));
    }

    let mut update: user::ActiveModel = target.into();
    update.is_disabled = Set(payload.disabled);
    update.updated_at = Set(chrono::Utc::now().into());
    update.update(&state.db).await.map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "DB error" })),
        )
    })?;

    if payload.disabled {
        tracing::info!(%id, "user disabled");
    } else {
        tracing::info!(%id, "user re-enabled");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    if admin.0.sub == id {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Cannot delete your own account" })),
        ));
    }

    let target = find_user(&state.db, id).await?;

    if target.role == UserRole::Admin
        && !target.is_disabled
        && active_admin_count(&state.db).await? <= 1
    {
        return Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "Cannot delete the last admin" })),
        ));
    }

    user::Entity::delete_by_id(id)
        .exec(&state.db)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "DB error" })),
            )
        })?;

    tracing::info!(%id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_keys_mark_secrets() {
        let secrets: Vec<&str> = SETTING_KEYS
            .iter()
            .filter(|(_, _, secret)| *secret)
            .map(|(k, _, _)| *k)
            .collect();
        assert!(secrets.contains(&"soundcharts_api_key"));
        assert!(secrets.contains(&"acr_access_secret"));
        assert!(secrets.contains(&"acr_fs_token"));
        assert!(secrets.contains(&"acr_webhook_secret"));
        assert!(!secrets.contains(&"soundcharts_app_id"));
    }

    #[test]
    fn test_setting_keys_unique() {
        let mut keys: Vec<&str> = SETTING_KEYS.iter().map(|(k, _, _)| *k).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), SETTING_KEYS.len());
    }

    #[test]
    fn test_user_row_from_model() {
        let model = user::Model {
            id: Uuid::new_v4(),
            username: "ops".into(),
            email: "ops@example.com".into(),
            password_hash: "$argon2id$...".into(),
            role: UserRole::Admin,
            is_disabled: false,
            created_at: chrono::Utc::now().into(),
            updated_at: chrono::Utc::now().into(),
        };
        let row = UserRow::from(model);
        assert_eq!(row.role, "admin");
        assert!(!row.is_disabled);
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
