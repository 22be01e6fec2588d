//! `RegistrationStore` trait: durable, deduplicating registration records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dialog::UserId;
use crate::error::DatabaseError;

/// A completed registration. At most one exists per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub user_id: UserId,
    pub name: String,
    pub phone: String,
    pub registered_at: DateTime<Utc>,
}

impl RegistrationRecord {
    pub fn new(user_id: UserId, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            phone: phone.into(),
            registered_at: Utc::now(),
        }
    }
}

/// Backend-agnostic registration storage.
///
/// Implementations must be safe to call concurrently, from several
/// processes if the deployment runs more than one instance.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Whether a record exists for `user_id`.
    async fn registration_exists(&self, user_id: UserId) -> Result<bool, DatabaseError>;

    /// Insert `record` unless one already exists for its user.
    ///
    /// Must be a single atomic operation backed by a uniqueness constraint,
    /// never an existence check followed by an insert. Returns `true` only
    /// if this call created the record.
    async fn register_if_absent(&self, record: &RegistrationRecord) -> Result<bool, DatabaseError>;

    /// All records, oldest first.
    async fn list_registrations(&self) -> Result<Vec<RegistrationRecord>, DatabaseError>;

    /// Number of records.
    async fn count_registrations(&self) -> Result<usize, DatabaseError>;
}
