//! Authentication route handlers.
//!
//! Signup, password login by email or phone, phone-code login, logout and
//! the three-step password recovery. Signed-in state and the recovery step
//! live in the session.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use taiwanese_house_core::account::UserProfile;
use taiwanese_house_core::flow::{LoginMethod, RecoveryStep};

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::auth::Signup;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Signup request body.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: Option<String>,
}

/// Password login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address or phone number.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneStartRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneVerifyRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryStartRequest {
    /// Email address or phone number.
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryVerifyRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryResetRequest {
    pub password: String,
    pub confirm_password: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// Returned after any successful sign-in.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserProfile,
    pub method: LoginMethod,
}

/// Returned when a code has been sent.
#[derive(Debug, Serialize)]
pub struct CodeSentResponse {
    /// Masked destination, e.g. `+60*****6789`.
    pub sent_to: String,
}

#[derive(Debug, Serialize)]
pub struct RecoveryResponse {
    pub step: &'static str,
}

async fn sign_in(
    session: &Session,
    user: UserProfile,
    method: LoginMethod,
) -> Result<Json<SessionResponse>> {
    set_current_user(session, &CurrentUser::new(&user, method)).await?;
    set_sentry_user(&user.id);
    tracing::info!(user_id = %user.id, ?method, "User signed in");
    Ok(Json(SessionResponse { user, method }))
}

// =============================================================================
// Signup & Password Login
// =============================================================================

/// Create an account and sign in.
///
/// POST /api/auth/signup
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<SignupRequest>,
) -> Result<impl IntoResponse> {
    let user = state
        .auth()
        .signup(&Signup {
            name: &body.name,
            email: &body.email,
            phone: &body.phone,
            password: &body.password,
            confirm_password: body.confirm_password.as_deref(),
        })
        .await?;

    let response = sign_in(&session, user, LoginMethod::EmailPassword).await?;
    Ok((StatusCode::CREATED, response))
}

/// Sign in with an email address or phone number and a password.
///
/// POST /api/auth/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let (user, method) = state.auth().login(&body.identifier, &body.password).await?;
    sign_in(&session, user, method).await
}

// =============================================================================
// Phone Code Login
// =============================================================================

/// Send a one-time login code to a registered phone number.
///
/// POST /api/auth/phone/start
#[instrument(skip_all)]
pub async fn phone_start(
    State(state): State<AppState>,
    Json(body): Json<PhoneStartRequest>,
) -> Result<impl IntoResponse> {
    let phone = state.auth().start_phone_login(&body.phone).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CodeSentResponse {
            sent_to: phone.masked(),
        }),
    ))
}

/// Check a phone login code and sign in.
///
/// POST /api/auth/phone/verify
#[instrument(skip_all)]
pub async fn phone_verify(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<PhoneVerifyRequest>,
) -> Result<Json<SessionResponse>> {
    let user = state
        .auth()
        .verify_phone_login(&body.phone, &body.code)
        .await?;
    sign_in(&session, user, LoginMethod::PhoneCode).await
}

/// End the session.
///
/// POST /api/auth/logout
pub async fn logout(
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    if let Some(user) = user {
        tracing::info!(user_id = %user.id, "User signed out");
    }
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Password Recovery
// =============================================================================

async fn recovery_step(session: &Session) -> Result<Option<RecoveryStep>> {
    Ok(session.get::<RecoveryStep>(session_keys::RECOVERY).await?)
}

/// Send a recovery code to an email address or phone number.
///
/// Always answers the same way whether or not an account exists.
///
/// POST /api/auth/recovery/start
#[instrument(skip_all)]
pub async fn recovery_start(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RecoveryStartRequest>,
) -> Result<impl IntoResponse> {
    let step = state.auth().start_recovery(&body.identifier).await?;
    let sent_to = RecoveryStep::pending_identifier(Some(&step))
        .map(taiwanese_house_core::Identifier::masked)
        .unwrap_or_default();

    session.insert(session_keys::RECOVERY, &step).await?;
    Ok((StatusCode::ACCEPTED, Json(CodeSentResponse { sent_to })))
}

/// Check the recovery code.
///
/// POST /api/auth/recovery/verify
#[instrument(skip_all)]
pub async fn recovery_verify(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RecoveryVerifyRequest>,
) -> Result<Json<RecoveryResponse>> {
    let step = recovery_step(&session).await?;
    let verified = state
        .auth()
        .verify_recovery(step.as_ref(), &body.code)
        .await?;

    session.insert(session_keys::RECOVERY, &verified).await?;
    Ok(Json(RecoveryResponse { step: "verified" }))
}

/// Set a new password after the code was verified.
///
/// POST /api/auth/recovery/reset
#[instrument(skip_all)]
pub async fn recovery_reset(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RecoveryResetRequest>,
) -> Result<StatusCode> {
    let step = recovery_step(&session).await?;
    state
        .auth()
        .reset_password(
            step.as_ref(),
            &body.password,
            body.confirm_password.as_deref(),
        )
        .await?;

    session
        .remove::<RecoveryStep>(session_keys::RECOVERY)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
