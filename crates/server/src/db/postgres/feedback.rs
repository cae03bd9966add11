//! Customer feedback.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use taiwanese_house_core::account::{Feedback, NewFeedback, Rating};
use taiwanese_house_core::{FeedbackId, UserId};

use super::PgStore;
use crate::db::{FeedbackStore, RepositoryError};

#[derive(Debug, sqlx::FromRow)]
struct FeedbackRow {
    id: i32,
    user_id: i32,
    rating: i16,
    message: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<FeedbackRow> for Feedback {
    type Error = RepositoryError;

    fn try_from(row: FeedbackRow) -> Result<Self, Self::Error> {
        let rating = u8::try_from(row.rating)
            .ok()
            .and_then(|stars| Rating::new(stars).ok())
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!("invalid rating: {}", row.rating))
            })?;

        Ok(Self {
            id: FeedbackId::new(row.id),
            user_id: UserId::new(row.user_id),
            rating,
            message: row.message,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl FeedbackStore for PgStore {
    async fn create_feedback(&self, feedback: NewFeedback) -> Result<Feedback, RepositoryError> {
        let row = sqlx::query_as::<_, FeedbackRow>(
            r"
            INSERT INTO house.feedback (user_id, rating, message)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, rating, message, created_at
            ",
        )
        .bind(feedback.user_id.as_i32())
        .bind(i16::from(feedback.rating.stars()))
        .bind(&feedback.message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    async fn feedback_for(&self, user: UserId) -> Result<Vec<Feedback>, RepositoryError> {
        let rows = sqlx::query_as::<_, FeedbackRow>(
            r"
            SELECT id, user_id, rating, message, created_at
            FROM house.feedback
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user.as_i32())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
