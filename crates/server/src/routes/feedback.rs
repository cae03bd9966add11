//! Customer feedback handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::instrument;

use taiwanese_house_core::account::{Feedback, NewFeedback};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    /// 1 to 5 stars.
    pub rating: u8,
    pub message: String,
}

/// Leave feedback.
///
/// POST /api/feedback
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<FeedbackRequest>,
) -> Result<impl IntoResponse> {
    let feedback = NewFeedback::new(user.id, body.rating, &body.message)?;
    let feedback = state.store().create_feedback(feedback).await?;

    tracing::info!(user_id = %user.id, rating = feedback.rating.stars(), "Feedback received");
    Ok((StatusCode::CREATED, Json(feedback)))
}

/// The user's own feedback, newest first.
///
/// GET /api/feedback
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Feedback>>> {
    Ok(Json(state.store().feedback_for(user.id).await?))
}
