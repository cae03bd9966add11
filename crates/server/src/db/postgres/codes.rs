//! One-time verification codes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use taiwanese_house_core::CodePurpose;
use taiwanese_house_core::flow::StoredCode;

use super::PgStore;
use crate::db::{CodeStore, RepositoryError};

#[derive(Debug, sqlx::FromRow)]
struct CodeRow {
    destination: String,
    purpose: CodePurpose,
    code_hash: String,
    attempts: i32,
    expires_at: DateTime<Utc>,
}

impl TryFrom<CodeRow> for StoredCode {
    type Error = RepositoryError;

    fn try_from(row: CodeRow) -> Result<Self, Self::Error> {
        let attempts = u32::try_from(row.attempts).map_err(|_| {
            RepositoryError::DataCorruption(format!("invalid attempt count: {}", row.attempts))
        })?;

        Ok(Self {
            destination: row.destination,
            purpose: row.purpose,
            code_hash: row.code_hash,
            attempts,
            expires_at: row.expires_at,
        })
    }
}

#[async_trait]
impl CodeStore for PgStore {
    async fn put_code(&self, code: StoredCode) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO house.verification_code (destination, purpose, code_hash, attempts, expires_at)
            VALUES ($1, $2, $3, 0, $4)
            ON CONFLICT (destination, purpose) DO UPDATE
            SET code_hash = EXCLUDED.code_hash,
                attempts = 0,
                expires_at = EXCLUDED.expires_at,
                created_at = NOW()
            ",
        )
        .bind(&code.destination)
        .bind(code.purpose)
        .bind(&code.code_hash)
        .bind(code.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn code(
        &self,
        destination: &str,
        purpose: CodePurpose,
    ) -> Result<Option<StoredCode>, RepositoryError> {
        let row = sqlx::query_as::<_, CodeRow>(
            r"
            SELECT destination, purpose, code_hash, attempts, expires_at
            FROM house.verification_code
            WHERE destination = $1 AND purpose = $2
            ",
        )
        .bind(destination)
        .bind(purpose)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn claim_attempt(
        &self,
        destination: &str,
        purpose: CodePurpose,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredCode>, RepositoryError> {
        let max_attempts = i32::try_from(max_attempts).unwrap_or(i32::MAX);

        // The row lock taken by UPDATE serializes concurrent guesses.
        let row = sqlx::query_as::<_, CodeRow>(
            r"
            UPDATE house.verification_code
            SET attempts = attempts + 1
            WHERE destination = $1 AND purpose = $2
              AND attempts < $3 AND expires_at > $4
            RETURNING destination, purpose, code_hash, attempts, expires_at
            ",
        )
        .bind(destination)
        .bind(purpose)
        .bind(max_attempts)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn consume_code(
        &self,
        destination: &str,
        purpose: CodePurpose,
        code_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM house.verification_code
            WHERE destination = $1 AND purpose = $2 AND code_hash = $3
            ",
        )
        .bind(destination)
        .bind(purpose)
        .bind(code_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
