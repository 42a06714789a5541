use axum::{
    extract::{Path, State},
    handler::Handler,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::{
        models::{Role, User},
        users,
    },
    error::{AppError, Result},
    extract::Json,
    middleware::auth::{auth_middleware, require_admin, AuthUser},
    routes::MessageResponse,
    services::auth::{create_token, hash_password, verify_password},
    AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    let auth = axum_middleware::from_fn_with_state(state, auth_middleware);

    Router::new()
        .route("/", post(register).get(list_users.layer(auth.clone())))
        .route("/login", post(login))
        .route(
            "/:id",
            get(get_user)
                .put(update_user)
                .delete(delete_user.layer(axum_middleware::from_fn(require_admin)))
                .route_layer(auth),
        )
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "rol")]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "rol")]
    pub role: Option<Role>,
}

/// A user profile without the password hash. Private fields are omitted
/// from the public subset shown to other users.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub description: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owned_projects: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaborated_projects: Option<Vec<String>>,
}

impl UserResponse {
    fn public(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: None,
            description: user.description,
            role: user.role,
            owned_projects: None,
            collaborated_projects: None,
        }
    }

    async fn full(pool: &SqlitePool, user: User) -> Result<Self> {
        let (owned, collaborated) = users::project_ids(pool, &user.id).await?;
        Ok(Self {
            id: user.id,
            username: user.username,
            email: Some(user.email),
            description: user.description,
            role: user.role,
            owned_projects: Some(owned),
            collaborated_projects: Some(collaborated),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserEnvelope>)> {
    let username = body.username.trim();
    let email = body.email.trim();

    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    if body.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    if users::find_by_email(&state.db.pool, email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: hash_password(&body.password)?,
        role: body.role.unwrap_or_default(),
        description: body.description.unwrap_or_default().trim().to_string(),
        created_at: Utc::now(),
    };
    users::insert(&state.db.pool, &user).await?;

    tracing::info!(user_id = %user.id, role = ?user.role, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            message: "User created".to_string(),
            user: UserResponse::full(&state.db.pool, user).await?,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let Some(user) = users::find_by_email(&state.db.pool, body.email.trim()).await? else {
        tracing::warn!("login attempt for unknown email");
        return Err(AppError::Unauthorized);
    };

    if !verify_password(&body.password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "login attempt with wrong password");
        return Err(AppError::Unauthorized);
    }

    let token = create_token(&user, &state.config.jwt_secret)?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::full(&state.db.pool, user).await?,
    }))
}

async fn list_users(
    State(state): State<AppState>,
    viewer: AuthUser,
) -> Result<Json<Vec<UserResponse>>> {
    let all = users::list(&state.db.pool).await?;

    if !viewer.is_admin() {
        return Ok(Json(all.into_iter().map(UserResponse::public).collect()));
    }

    let mut profiles = Vec::with_capacity(all.len());
    for user in all {
        profiles.push(UserResponse::full(&state.db.pool, user).await?);
    }
    Ok(Json(profiles))
}

async fn get_user(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    let user = users::find_by_id(&state.db.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if viewer.is_admin() || viewer.id == user.id {
        return Ok(Json(UserResponse::full(&state.db.pool, user).await?));
    }
    Ok(Json(UserResponse::public(user)))
}

async fn update_user(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserEnvelope>> {
    let mut user = users::find_by_id(&state.db.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !viewer.is_admin() && viewer.id != user.id {
        return Err(AppError::Forbidden(
            "You can only edit your own profile".to_string(),
        ));
    }

    if let Some(password) = body.password.filter(|p| !p.is_empty()) {
        user.password_hash = hash_password(&password)?;
    }

    if let Some(email) = body.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
        if !email.contains('@') {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }
        if let Some(existing) = users::find_by_email(&state.db.pool, &email).await? {
            if existing.id != user.id {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }
        user.email = email;
    }

    if let Some(username) = body.username {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("Username cannot be empty".to_string()));
        }
        user.username = username.to_string();
    }

    if let Some(description) = body.description {
        user.description = description.trim().to_string();
    }

    // Only administrators may change roles; other callers' role field is ignored.
    if let Some(role) = body.role.filter(|_| viewer.is_admin()) {
        user.role = role;
    }

    users::update(&state.db.pool, &user).await?;

    Ok(Json(UserEnvelope {
        message: "Profile updated".to_string(),
        user: UserResponse::full(&state.db.pool, user).await?,
    }))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    if !users::delete_cascade(&state.db.pool, &id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(Json(MessageResponse::new("User deleted")))
}
