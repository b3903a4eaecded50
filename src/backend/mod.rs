//! Port to the hosted data service.
//!
//! The tracker never talks to the network directly: it holds an
//! `Arc<dyn Backend>` so tests and the offline demo can swap in
//! [`MemoryBackend`] for the REST adapter.

mod memory;
mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;

use crate::models::{Direction, Session, WorkoutSet, WorkoutSetUpsert};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Name of the table holding workout sets.
pub const WORKOUTS_TABLE: &str = "workouts";
/// Columns forming the upsert conflict key.
pub const CONFLICT_KEY: &str = "user_id,date,exercise_id,set_num";

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },
    #[error("no active session")]
    NotSignedIn,
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("backend is not configured: {0}")]
    Config(String),
}

impl BackendError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Current session, if a user is signed in.
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    /// All stored sets for one user on one day.
    async fn fetch_day(&self, user_id: &str, date: NaiveDate)
    -> Result<Vec<WorkoutSet>, BackendError>;

    /// Closest date strictly after (`Next`) or before (`Previous`) `boundary`
    /// that has at least one stored set.
    async fn nearest_date(
        &self,
        user_id: &str,
        boundary: NaiveDate,
        direction: Direction,
    ) -> Result<Option<NaiveDate>, BackendError>;

    /// Insert or replace the row with the same conflict key.
    async fn upsert(&self, row: &WorkoutSetUpsert) -> Result<(), BackendError>;
}
