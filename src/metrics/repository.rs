//! Metric Repository
//!
//! Per-kind access to the remote entry collections. The repository keeps no
//! cache and never patches a list locally: every mutation is followed by a
//! full re-read, and the only way to get entries out of a mutation is the
//! fresh [`Snapshot`] that re-read produced.
//!
//! A mutation can fail in two places. [`MutationError::Failed`] means the
//! store never applied it; [`MutationError::RefetchFailed`] means it was
//! applied but the list could not be read back.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::marker::PhantomData;
use thiserror::Error;

use super::types::{Entry, MetricKind};
use crate::aggregate;
use crate::api::{ApiClient, ApiError, ApiResult, ErrorKind};

/// Error from a create or delete followed by its re-read
#[derive(Error, Debug)]
pub enum MutationError {
    #[error(transparent)]
    Failed(ApiError),

    #[error("Change applied but the list could not be re-read: {0}")]
    RefetchFailed(ApiError),
}

impl MutationError {
    pub fn api_error(&self) -> &ApiError {
        match self {
            MutationError::Failed(e) | MutationError::RefetchFailed(e) => e,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.api_error().kind()
    }
}

/// Result type for repository mutations
pub type MutationResult<T> = Result<T, MutationError>;

/// Decode entries one by one, dropping those that cannot be read
fn decode_entries<E: Entry>(kind: &str, values: Vec<Value>) -> Vec<E> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<E>(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(kind, error = %e, "Skipping undecodable entry");
                None
            }
        })
        .collect()
}

/// Why a snapshot was taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshCause {
    /// Plain read
    Listed,
    /// Re-read after a successful create
    Created,
    /// Re-read after deleting the entry with this id
    Deleted(String),
    /// Delete-most-recent found nothing to delete
    NothingToDelete,
}

/// Entry list as read from the remote store, in the store's order
#[derive(Debug, Clone)]
pub struct Snapshot<E> {
    entries: Vec<E>,
    fetched_at: DateTime<Utc>,
    cause: RefreshCause,
}

impl<E: Entry> Snapshot<E> {
    fn new(entries: Vec<E>, cause: RefreshCause) -> Self {
        Self {
            entries,
            fetched_at: Utc::now(),
            cause,
        }
    }

    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<E> {
        self.entries
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn cause(&self) -> &RefreshCause {
        &self.cause
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id() == id)
    }
}

/// Remote collection of one metric kind
pub struct MetricRepository<K: MetricKind> {
    api: ApiClient,
    _kind: PhantomData<fn() -> K>,
}

impl<K: MetricKind> Clone for MetricRepository<K> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: MetricKind> MetricRepository<K> {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            _kind: PhantomData,
        }
    }

    async fn fetch(&self, cause: RefreshCause) -> ApiResult<Snapshot<K::Entry>> {
        let values: Vec<Value> = self.api.get(K::PATH).await?;
        let entries = decode_entries::<K::Entry>(K::NAME, values);
        tracing::debug!(kind = K::NAME, count = entries.len(), cause = ?cause, "Fetched entries");
        Ok(Snapshot::new(entries, cause))
    }

    async fn refetch(&self, cause: RefreshCause) -> MutationResult<Snapshot<K::Entry>> {
        self.fetch(cause).await.map_err(|e| {
            tracing::warn!(kind = K::NAME, error = %e, "Re-read after change failed");
            MutationError::RefetchFailed(e)
        })
    }

    /// All entries of the logged-in user, in the order the store returns them
    pub async fn list(&self) -> ApiResult<Snapshot<K::Entry>> {
        self.fetch(RefreshCause::Listed).await
    }

    /// Submit a new entry, then re-read the collection
    pub async fn create(&self, payload: &K::Payload) -> MutationResult<Snapshot<K::Entry>> {
        self.api
            .post(K::PATH, payload)
            .await
            .map_err(MutationError::Failed)?;
        tracing::info!(kind = K::NAME, ?payload, "Entry created");
        self.refetch(RefreshCause::Created).await
    }

    /// Delete one entry by id, then re-read the collection
    pub async fn delete_by_id(&self, id: &str) -> MutationResult<Snapshot<K::Entry>> {
        let path = format!("{}/{}", K::PATH, urlencoding::encode(id));
        self.api.delete(&path).await.map_err(MutationError::Failed)?;
        tracing::info!(kind = K::NAME, id = %id, "Entry deleted");
        self.refetch(RefreshCause::Deleted(id.to_string())).await
    }

    /// The entry with the greatest timestamp, if any
    ///
    /// Kinds whose store supports `?last=true` ask the store; the others
    /// scan the full list. Either way recency is decided by timestamp, not
    /// by position in the response.
    pub async fn most_recent(&self) -> ApiResult<Option<K::Entry>> {
        let values: Vec<Value> = if K::SERVER_LATEST {
            self.api.get(&format!("{}?last=true", K::PATH)).await?
        } else {
            self.api.get(K::PATH).await?
        };
        let candidates = decode_entries::<K::Entry>(K::NAME, values);
        Ok(aggregate::latest(&candidates).cloned())
    }

    /// Delete the most recent entry; a no-op when the collection is empty
    pub async fn delete_most_recent(&self) -> MutationResult<Snapshot<K::Entry>> {
        match self.most_recent().await.map_err(MutationError::Failed)? {
            Some(entry) => self.delete_by_id(entry.id()).await,
            None => {
                tracing::debug!(kind = K::NAME, "Nothing to delete");
                self.refetch(RefreshCause::NothingToDelete).await
            }
        }
    }
}
