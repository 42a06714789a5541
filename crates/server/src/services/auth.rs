use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    config::AdminSeed,
    db::{
        models::{Role, User},
        users,
    },
    error::{AppError, Result},
};

pub const TOKEN_LIFETIME_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub role: Role,
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn create_token(user: &User, secret: &str) -> Result<String> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::days(TOKEN_LIFETIME_DAYS))
        .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?;

    let claims = Claims {
        sub: user.id.clone(),
        role: user.role,
        username: user.username.clone(),
        iat: now.timestamp() as usize,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal("Failed to create token".to_string()))
}

/// Checks signature and expiry. Any failure is reported as `Unauthorized`.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

/// Creates the configured administrator unless the email is already registered.
pub async fn ensure_admin(pool: &SqlitePool, seed: &AdminSeed) -> Result<()> {
    if users::find_by_email(pool, &seed.email).await?.is_some() {
        return Ok(());
    }

    let admin = User {
        id: Uuid::new_v4().to_string(),
        username: seed.username.clone(),
        email: seed.email.clone(),
        password_hash: hash_password(&seed.password)?,
        role: Role::Admin,
        description: "System administrator".to_string(),
        created_at: Utc::now(),
    };
    users::insert(pool, &admin).await?;

    tracing::info!(email = %admin.email, "administrator account created");
    Ok(())
}
