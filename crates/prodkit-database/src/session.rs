//! Transaction helpers on top of a [`DatabaseEngine`].

use futures::future::BoxFuture;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::warn;

use prodkit_core::error::{AppError, ErrorKind};
use prodkit_core::result::AppResult;

use crate::engine::DatabaseEngine;

/// Hands out transactions on the engine's schema.
#[derive(Debug, Clone)]
pub struct SessionMaker {
    engine: DatabaseEngine,
}

impl SessionMaker {
    /// Create a session maker for `engine`.
    pub fn new(engine: DatabaseEngine) -> Self {
        Self { engine }
    }

    /// The engine sessions are opened on.
    pub fn engine(&self) -> &DatabaseEngine {
        &self.engine
    }

    /// Begin a transaction. Dropping it without committing rolls back.
    pub async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.engine.pool().begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })
    }

    /// Run `work` in a transaction that commits on `Ok` and rolls back on `Err`.
    ///
    /// The commit has completed by the time this returns, so anything the
    /// caller does afterwards (such as flushing deferred jobs) observes
    /// committed state.
    pub async fn run<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, AppResult<T>> + Send,
    {
        let mut tx = self.begin().await?;

        match work(&mut *tx).await {
            Ok(value) => {
                tx.commit().await.map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
                })?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed after error: {}", err);
                }
                Err(err)
            }
        }
    }
}
