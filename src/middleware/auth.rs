use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::error::{AppError, AppResult};
use crate::utils::jwt::{verify_token, Claims, Role};
use crate::AppState;

/// Extract and validate JWT token from Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let claims = verify_token(auth.token(), &state.config.jwt_secret)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn claims(request: &Request) -> AppResult<&Claims> {
    request
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::Unauthorized("No authentication found".to_string()))
}

/// Require admin role
pub async fn require_admin(
    request: Request,
    next: Next,
) -> AppResult<Response> {
    if claims(&request)?.role != Role::Admin {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(request).await)
}

/// Require conductor (or admin) role, for scanner devices
pub async fn require_conductor(
    request: Request,
    next: Next,
) -> AppResult<Response> {
    if !matches!(claims(&request)?.role, Role::Conductor | Role::Admin) {
        return Err(AppError::Forbidden("Conductor access required".to_string()));
    }

    Ok(next.run(request).await)
}

/// Reject riders acting on someone else's trips or wallet
pub fn ensure_can_act_for(claims: &Claims, user_id: &str) -> AppResult<()> {
    if !claims.can_act_for(user_id) {
        return Err(AppError::Forbidden(
            "You can only access your own account".to_string(),
        ));
    }
    Ok(())
}
