use crate::core::error::ApiError;
use crate::core::state::AppState;
use crate::models::payloads::{LoginRequest, LoginResponse, SuccessResponse, UserProfile};
use crate::models::user::Principal;
use crate::security::auth_layer::BearerToken;
use crate::security::password::verify_password;
use crate::utils::client_ip::ClientIp;
use crate::validation::payloads::Validate;
use axum::{extract::State, Extension, Json};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// POST /auth/login
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    authenticate(&state, ip, payload, false).await.map(Json)
}

/// POST /admin/login
pub async fn admin_login_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    authenticate(&state, ip, payload, true).await.map(Json)
}

/// POST /auth/logout
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Json<SuccessResponse> {
    state.tokens.revoke(&token);
    info!(usn = %principal.usn, "Logged out");

    Json(SuccessResponse {
        success: true,
        message: "Logged out".to_string(),
    })
}

async fn authenticate(
    state: &AppState,
    ip: IpAddr,
    payload: LoginRequest,
    admin_only: bool,
) -> Result<LoginResponse, ApiError> {
    let now = state.clock.now().timestamp();
    if state.login_throttle.is_blocked(ip, now) {
        warn!(ip = %ip, "Login throttled");
        return Err(ApiError::RateLimited);
    }

    payload.validate()?;

    let user = state.identity.get_user_by_email(&payload.email);
    let verified = match &user {
        Some(user) => {
            let hash = user.password_hash.clone();
            let password = payload.password;
            tokio::task::spawn_blocking(move || verify_password(&password, &hash))
                .await
                .map_err(|e| ApiError::InternalError(format!("Password check failed: {}", e)))?
        }
        None => false,
    };

    let user = match user {
        Some(user) if verified && (!admin_only || user.is_admin) => user,
        _ => {
            let failures = state.login_throttle.record_failure(ip, now);
            state.metrics.increment_failed_logins();
            warn!(
                ip = %ip,
                email = %payload.email,
                admin_only = admin_only,
                failures = failures,
                "Login failed"
            );
            return Err(ApiError::InvalidCredentials);
        }
    };

    let student = if user.is_teacher || user.is_admin {
        None
    } else {
        state.identity.get_student(&user.usn)
    };
    let teacher = if user.is_teacher {
        state.identity.get_teacher(&user.usn)
    } else {
        None
    };

    let principal = Principal::for_user(&user, student.as_ref());
    let (access_token, expires_at) = state.tokens.issue(principal);

    info!(
        usn = %user.usn,
        is_teacher = user.is_teacher,
        is_admin = user.is_admin,
        "Login succeeded"
    );

    Ok(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_at,
        user: UserProfile::new(&user, student.as_ref(), teacher.as_ref()),
    })
}
