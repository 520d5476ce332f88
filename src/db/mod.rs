pub mod diesel_pool;
pub mod redis_pool;
pub mod stores;

pub use diesel_pool::{
    check_diesel_health, create_diesel_pool, DieselDatabaseConfig, DieselPool, MIGRATIONS,
};
pub use redis_pool::{RedisHealth, RedisPool};
pub use stores::{PgCampaignStore, PgUserStore};

use thiserror::Error;

/// Error surface shared by the persistence traits, so engine logic and the
/// in-memory test doubles report failures the same way
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Conflicting concurrent update")]
    Conflict,
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => StoreError::Conflict,
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for StoreError {
    fn from(err: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        StoreError::Pool(err.to_string())
    }
}
