//! Account route handlers.
//!
//! Profile, profile edits, password change and account deletion. All
//! routes require a signed-in user.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use taiwanese_house_core::account::UserProfile;

use crate::error::{Result, clear_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::auth::ProfileEdit;
use crate::state::AppState;

/// Profile edit body. Omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

/// Current profile, including the coin balance.
///
/// GET /api/account
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UserProfile>> {
    Ok(Json(state.auth().profile(user.id).await?))
}

/// Edit name, email or phone.
///
/// PATCH /api/account
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>> {
    let profile = state
        .auth()
        .update_profile(
            user.id,
            &ProfileEdit {
                name: body.name.as_deref(),
                email: body.email.as_deref(),
                phone: body.phone.as_deref(),
            },
        )
        .await?;

    // Keep the session's copy of the name in step.
    session
        .insert(
            session_keys::CURRENT_USER,
            CurrentUser::new(&profile, user.method),
        )
        .await?;

    Ok(Json(profile))
}

/// Change password, given the current one.
///
/// POST /api/account/password
#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    state
        .auth()
        .change_password(
            user.id,
            &body.current_password,
            &body.new_password,
            body.confirm_password.as_deref(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete the account and sign out. Requires the password.
///
/// DELETE /api/account
#[instrument(skip_all)]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(body): Json<DeleteAccountRequest>,
) -> Result<StatusCode> {
    state.auth().delete_account(user.id, &body.password).await?;
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}
