use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::auth::Claims,
    entity::{Users, sea_orm_active_enums::Role},
    error::AppError,
    state::AppState,
};

/// What a route demands of its caller. Declared once per route in the route
/// table and enforced by [`require_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    AdminOnly,
}

impl Access {
    /// Wrap `route` so every request passes the gate before reaching a handler.
    pub fn guard(
        self,
        state: &AppState,
        route: MethodRouter<AppState>,
    ) -> MethodRouter<AppState> {
        match self {
            Access::Public => route,
            Access::Authenticated | Access::AdminOnly => route.route_layer(
                middleware::from_fn_with_state((state.clone(), self), require_access),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub async fn require_access(
    State((state, access)): State<(AppState, Access)>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, request.headers()).await?;

    if access == Access::AdminOnly && !user.is_admin() {
        tracing::warn!(user_id = %user.user_id, uri = %request.uri(), "admin route refused");
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Resolve the bearer credential to a live user. The role is read from the
/// store, not from the token.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?;

    let user_id = decode_token(&state.config, token)?;

    let user = Users::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown user".into()))?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub fn decode_token(config: &AppConfig, token: &str) -> Result<Uuid, AppError> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Missing credentials".into()))
    }
}
