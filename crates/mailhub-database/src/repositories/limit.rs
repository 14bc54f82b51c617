//! PostgreSQL limit store.
//!
//! Every mutation first takes the row lock of the owner's `limit_pools`
//! row, so concurrent increments and decrements for one owner are
//! serialized while different owners proceed in parallel.
//!
//! [`PgLimitStore::attach_in`] and [`PgLimitStore::detach_in`] write the
//! `limit_owned_objects` row and the counter on a caller-provided
//! connection. A caller inserting or deleting a domain row passes its own
//! transaction so all three commit or roll back together; the trait
//! methods open a transaction of their own.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use mailhub_core::error::{AppError, ErrorKind};
use mailhub_core::result::AppResult;
use mailhub_core::traits::limit_store::{
    Decrement, Detached, LimitSeed, LimitStore, StoreCounts,
};
use mailhub_core::traits::owner::{OwnedObject, OwnerResolver};
use mailhub_core::types::id::UserId;
use mailhub_core::types::limit::{Admission, LimitKind, LimitMax, LimitUsage};
use mailhub_entity::limit::{Limit, LimitPool};

/// Limit store backed by the `limit_pools` and `limits` tables.
#[derive(Debug, Clone)]
pub struct PgLimitStore {
    pool: PgPool,
}

impl PgLimitStore {
    /// Create a new limit store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Increment inside the caller's transaction.
    pub async fn increment_in(
        conn: &mut PgConnection,
        owner: &UserId,
        seed: &LimitSeed,
    ) -> AppResult<LimitUsage> {
        let pool_id = lock_or_create_pool(conn, owner).await?.id;
        seed_limit(conn, pool_id, seed).await?;

        let limit = sqlx::query_as::<_, Limit>(
            "UPDATE limits SET current_value = current_value + 1, updated_at = NOW() \
             WHERE pool_id = $1 AND name = $2 RETURNING *",
        )
        .bind(pool_id)
        .bind(seed.kind.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err("Failed to increment limit"))?;

        debug!(owner = %owner, kind = %seed.kind, current = limit.current_value, "Limit incremented");
        Ok(limit.usage())
    }

    /// Decrement inside the caller's transaction.
    pub async fn decrement_in(
        conn: &mut PgConnection,
        owner: &UserId,
        kind: &LimitKind,
    ) -> AppResult<Option<Decrement>> {
        let Some(pool_id) = lock_pool(conn, owner).await? else {
            return Ok(None);
        };

        let Some(limit) = find_limit(conn, pool_id, kind).await? else {
            return Ok(None);
        };

        if limit.is_empty() {
            return Ok(Some(Decrement {
                usage: limit.usage(),
                clamped: true,
            }));
        }

        let limit = sqlx::query_as::<_, Limit>(
            "UPDATE limits SET current_value = current_value - 1, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(limit.id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err("Failed to decrement limit"))?;

        debug!(owner = %owner, kind = %kind, current = limit.current_value, "Limit decremented");
        Ok(Some(Decrement {
            usage: limit.usage(),
            clamped: false,
        }))
    }

    /// Record `object` against `owner` and increment inside the caller's
    /// transaction. Returns `None`, counting nothing, if already recorded.
    pub async fn attach_in(
        conn: &mut PgConnection,
        object: &OwnedObject,
        owner: &UserId,
        seed: &LimitSeed,
    ) -> AppResult<Option<LimitUsage>> {
        let result = sqlx::query(
            "INSERT INTO limit_owned_objects (object_type, object_id, owner_id) \
             VALUES ($1, $2, $3) ON CONFLICT (object_type, object_id) DO NOTHING",
        )
        .bind(object.type_name())
        .bind(object.uuid())
        .bind(*owner)
        .execute(&mut *conn)
        .await
        .map_err(db_err("Failed to record object owner"))?;

        if result.rows_affected() == 0 {
            debug!(object = %object, "Object already recorded");
            return Ok(None);
        }
        Self::increment_in(conn, owner, seed).await.map(Some)
    }

    /// Forget `object` and decrement its recorded owner inside the caller's
    /// transaction. Returns `None` if the object is not recorded.
    pub async fn detach_in(
        conn: &mut PgConnection,
        object: &OwnedObject,
        kind: &LimitKind,
    ) -> AppResult<Option<Detached>> {
        let owner: Option<UserId> = sqlx::query_scalar(
            "DELETE FROM limit_owned_objects WHERE object_type = $1 AND object_id = $2 \
             RETURNING owner_id",
        )
        .bind(object.type_name())
        .bind(object.uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("Failed to forget object owner"))?;

        let Some(owner) = owner else {
            return Ok(None);
        };
        let decrement = Self::decrement_in(conn, &owner, kind).await?;
        Ok(Some(Detached { owner, decrement }))
    }

    async fn begin(&self) -> AppResult<sqlx::Transaction<'static, sqlx::Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))
    }
}

#[async_trait]
impl OwnerResolver for PgLimitStore {
    async fn owner_of(&self, object: &OwnedObject) -> AppResult<Option<UserId>> {
        sqlx::query_scalar(
            "SELECT owner_id FROM limit_owned_objects WHERE object_type = $1 AND object_id = $2",
        )
        .bind(object.type_name())
        .bind(object.uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to resolve object owner"))
    }
}

#[async_trait]
impl LimitStore for PgLimitStore {
    async fn usage(&self, owner: &UserId, kind: &LimitKind) -> AppResult<Option<LimitUsage>> {
        let limit = sqlx::query_as::<_, Limit>(
            "SELECT l.* FROM limits l JOIN limit_pools p ON p.id = l.pool_id \
             WHERE p.user_id = $1 AND l.name = $2",
        )
        .bind(*owner)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to read limit"))?;

        Ok(limit.map(|l| l.usage()))
    }

    async fn pool_usage(&self, owner: &UserId) -> AppResult<Option<Vec<LimitUsage>>> {
        let pool_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM limit_pools WHERE user_id = $1")
                .bind(*owner)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err("Failed to find limit pool"))?;

        let Some(pool_id) = pool_id else {
            return Ok(None);
        };

        let limits = sqlx::query_as::<_, Limit>(
            "SELECT * FROM limits WHERE pool_id = $1 ORDER BY created_at ASC, name ASC",
        )
        .bind(pool_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list limits"))?;

        Ok(Some(limits.iter().map(Limit::usage).collect()))
    }

    async fn increment(&self, owner: &UserId, seed: &LimitSeed) -> AppResult<LimitUsage> {
        let mut tx = self.begin().await?;
        let usage = Self::increment_in(&mut tx, owner, seed).await?;
        tx.commit().await.map_err(db_err("Failed to commit increment"))?;
        Ok(usage)
    }

    async fn decrement(&self, owner: &UserId, kind: &LimitKind) -> AppResult<Option<Decrement>> {
        let mut tx = self.begin().await?;
        let result = Self::decrement_in(&mut tx, owner, kind).await?;
        tx.commit().await.map_err(db_err("Failed to commit decrement"))?;
        Ok(result)
    }

    async fn attach(
        &self,
        object: &OwnedObject,
        owner: &UserId,
        seed: &LimitSeed,
    ) -> AppResult<Option<LimitUsage>> {
        let mut tx = self.begin().await?;
        let usage = Self::attach_in(&mut tx, object, owner, seed).await?;
        tx.commit().await.map_err(db_err("Failed to commit attach"))?;
        Ok(usage)
    }

    async fn detach(&self, object: &OwnedObject, kind: &LimitKind) -> AppResult<Option<Detached>> {
        let mut tx = self.begin().await?;
        let detached = Self::detach_in(&mut tx, object, kind).await?;
        tx.commit().await.map_err(db_err("Failed to commit detach"))?;
        Ok(detached)
    }

    async fn try_reserve(&self, owner: &UserId, seed: &LimitSeed) -> AppResult<Admission> {
        let mut tx = self.begin().await?;
        let admission = try_reserve_in(&mut tx, owner, seed).await?;
        tx.commit().await.map_err(db_err("Failed to commit reservation"))?;
        Ok(admission)
    }

    async fn ensure_pool(&self, owner: &UserId, seeds: &[LimitSeed]) -> AppResult<u64> {
        let mut tx = self.begin().await?;
        let created = ensure_pool_in(&mut tx, owner, seeds).await?;
        tx.commit().await.map_err(db_err("Failed to commit limit pool"))?;
        Ok(created)
    }

    async fn backfill(&self, seeds: &[LimitSeed]) -> AppResult<u64> {
        let mut tx = self.begin().await?;
        let mut created = 0;

        for seed in seeds {
            let result = sqlx::query(
                "INSERT INTO limits (pool_id, name, current_value, max_value) \
                 SELECT p.id, $1, 0, $2 FROM limit_pools p \
                 ON CONFLICT (pool_id, name) DO NOTHING",
            )
            .bind(seed.kind.as_str())
            .bind(raw_max(seed.max))
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to backfill limits"))?;
            created += result.rows_affected();
        }

        tx.commit().await.map_err(db_err("Failed to commit backfill"))?;
        Ok(created)
    }

    async fn set_max(&self, owner: &UserId, kind: &LimitKind, max: LimitMax) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE limits l SET max_value = $3, updated_at = NOW() \
             FROM limit_pools p WHERE p.id = l.pool_id AND p.user_id = $1 AND l.name = $2",
        )
        .bind(*owner)
        .bind(kind.as_str())
        .bind(raw_max(max))
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to update limit maximum"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_pool(&self, owner: &UserId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM limit_pools WHERE user_id = $1")
            .bind(*owner)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to delete limit pool"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn counts(&self) -> AppResult<StoreCounts> {
        let (pools, limits): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM limit_pools), (SELECT COUNT(*) FROM limits)",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to count limit rows"))?;

        Ok(StoreCounts {
            pools: u64::try_from(pools).unwrap_or(0),
            limits: u64::try_from(limits).unwrap_or(0),
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(db_err("Health check failed"))
    }
}

/// Check-and-increment on one connection.
async fn try_reserve_in(
    conn: &mut PgConnection,
    owner: &UserId,
    seed: &LimitSeed,
) -> AppResult<Admission> {
    let pool_id = lock_or_create_pool(conn, owner).await?.id;
    seed_limit(conn, pool_id, seed).await?;

    let limit = find_limit(conn, pool_id, &seed.kind)
        .await?
        .ok_or_else(|| AppError::internal(format!("Limit '{}' vanished", seed.kind)))?;

    let usage = limit.usage();
    if !usage.admits_one_more() {
        return Ok(Admission::Denied { usage });
    }

    let usage = PgLimitStore::increment_in(conn, owner, seed).await?;
    Ok(Admission::Granted { usage })
}

async fn ensure_pool_in(
    conn: &mut PgConnection,
    owner: &UserId,
    seeds: &[LimitSeed],
) -> AppResult<u64> {
    let pool_id = lock_or_create_pool(conn, owner).await?.id;
    let mut created = 0;
    for seed in seeds {
        if seed_limit(conn, pool_id, seed).await? {
            created += 1;
        }
    }
    Ok(created)
}

/// Lock the owner's pool row, if any.
async fn lock_pool(conn: &mut PgConnection, owner: &UserId) -> AppResult<Option<Uuid>> {
    sqlx::query_scalar("SELECT id FROM limit_pools WHERE user_id = $1 FOR UPDATE")
        .bind(*owner)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("Failed to lock limit pool"))
}

/// Create the owner's pool if needed and lock its row.
///
/// `DO UPDATE` rather than `DO NOTHING` so the row is returned and locked
/// on both branches.
async fn lock_or_create_pool(conn: &mut PgConnection, owner: &UserId) -> AppResult<LimitPool> {
    sqlx::query_as::<_, LimitPool>(
        "INSERT INTO limit_pools (user_id) VALUES ($1) \
         ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
         RETURNING *",
    )
    .bind(*owner)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err("Failed to create limit pool"))
}

/// Insert a limit with a zero counter unless it exists. Returns `true` if inserted.
async fn seed_limit(conn: &mut PgConnection, pool_id: Uuid, seed: &LimitSeed) -> AppResult<bool> {
    let result = sqlx::query(
        "INSERT INTO limits (pool_id, name, current_value, max_value) VALUES ($1, $2, 0, $3) \
         ON CONFLICT (pool_id, name) DO NOTHING",
    )
    .bind(pool_id)
    .bind(seed.kind.as_str())
    .bind(raw_max(seed.max))
    .execute(&mut *conn)
    .await
    .map_err(db_err("Failed to create limit"))?;
    Ok(result.rows_affected() > 0)
}

async fn find_limit(
    conn: &mut PgConnection,
    pool_id: Uuid,
    kind: &LimitKind,
) -> AppResult<Option<Limit>> {
    sqlx::query_as::<_, Limit>("SELECT * FROM limits WHERE pool_id = $1 AND name = $2")
        .bind(pool_id)
        .bind(kind.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("Failed to read limit"))
}

fn raw_max(max: LimitMax) -> i32 {
    i32::try_from(max.as_raw()).unwrap_or(i32::MAX)
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}
