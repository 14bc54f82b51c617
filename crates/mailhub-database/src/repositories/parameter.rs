//! PostgreSQL parameter repository.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use mailhub_core::error::{AppError, ErrorKind};
use mailhub_core::result::AppResult;
use mailhub_core::traits::parameters::ParameterRepository;
use mailhub_core::types::parameter::ParameterLevel;

/// Parameter values stored in the `parameters` table.
#[derive(Debug, Clone)]
pub struct PgParameterRepository {
    pool: PgPool,
}

impl PgParameterRepository {
    /// Create a new parameter repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParameterRepository for PgParameterRepository {
    async fn load(&self, app: &str, level: ParameterLevel) -> AppResult<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT name, value FROM parameters WHERE app = $1 AND level = $2")
                .bind(app)
                .bind(level.as_code())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to load parameters", e)
                })?;
        Ok(rows.into_iter().collect())
    }

    async fn save(
        &self,
        app: &str,
        level: ParameterLevel,
        name: &str,
        value: i64,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO parameters (app, level, name, value) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (app, level, name) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(app)
        .bind(level.as_code())
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save parameter", e))?;

        debug!(app, level = %level, name, value, "Parameter saved");
        Ok(())
    }
}
