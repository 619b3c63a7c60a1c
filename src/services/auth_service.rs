use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    config::AppConfig,
    dto::auth::{AuthToken, Claims, LoginRequest, RegisterRequest},
    entity::{
        Users,
        sea_orm_active_enums::Role,
        users::{ActiveModel as UserActive, Column as UserCol},
    },
    error::{AppError, AppResult, is_unique_violation},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthToken>> {
    let email = required(payload.email)
        .ok_or_else(|| AppError::Validation("Email and password required".into()))?
        .to_lowercase();
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("Email and password required".into()))?;

    let exist = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("User already exists".into()));
    }

    let password_hash = hash_password(password).await?;

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(Role::User),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::Conflict("User already exists".into())
        } else {
            AppError::Db(err)
        }
    })?;

    let token = issue_token(&state.config, user.id)?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;
    tracing::info!(user_id = %user.id, "user registered");

    Ok(ApiResponse::success(
        "User registered successfully",
        AuthToken::bearer(token),
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthToken>> {
    let invalid = || AppError::Unauthorized("Invalid email or password".into());

    let email = required(payload.email).ok_or_else(invalid)?.to_lowercase();
    let password = payload.password.ok_or_else(invalid)?;

    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    let token = issue_token(&state.config, user.id)?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Login successful",
        AuthToken::bearer(token),
        Some(Meta::empty()),
    ))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(ApiResponse::success(
        "Access granted",
        User::from(model),
        Some(Meta::empty()),
    ))
}

/// Sign a bearer credential for `user_id`.
pub fn issue_token(config: &AppConfig, user_id: Uuid) -> AppResult<String> {
    let now = Utc::now();
    let expiration = Duration::try_hours(config.jwt_ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

/// Argon2 with a random salt. Runs on the blocking pool.
pub async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))?
}

pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&hash)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::Internal(anyhow::anyhow!(e.to_string()))),
        }
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))?
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
