//! In-process backend used by tests and the offline `memory` mode.

use super::{Backend, BackendError};
use crate::exercises::ExerciseCode;
use crate::models::{Direction, GroupKey, Session, UserIdentity, WorkoutSet, WorkoutSetUpsert};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::Mutex;

type RowKey = (String, NaiveDate, ExerciseCode, u8);

#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, (String, UserIdentity)>,
    session: Option<Session>,
    rows: BTreeMap<RowKey, WorkoutSet>,
    upserts: Vec<WorkoutSetUpsert>,
    upsert_attempts: usize,
    failing_upserts: usize,
    fail_fetches: bool,
    fail_lookups: bool,
    /// `Some(drop_session)` makes the next sign-out fail.
    failing_sign_out: Option<bool>,
    upsert_latency: Option<Duration>,
    in_flight: HashMap<GroupKey, usize>,
    max_in_flight: HashMap<GroupKey, usize>,
}

fn session_for(user: UserIdentity) -> Session {
    Session {
        access_token: format!("token-{}", user.id),
        user,
        refresh_token: None,
        expires_at: None,
    }
}

fn row_key(user_id: &str, date: NaiveDate, exercise: ExerciseCode, set: u8) -> RowKey {
    (user_id.to_string(), date, exercise, set)
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account; its user id is derived from the email.
    pub async fn add_account(&self, email: &str, password: &str) -> UserIdentity {
        let user = UserIdentity {
            id: format!("user-{}", email.trim().to_lowercase()),
            email: Some(email.to_string()),
        };
        let mut state = self.inner.lock().await;
        state
            .accounts
            .insert(email.to_string(), (password.to_string(), user.clone()));
        user
    }

    /// Start already signed in as a freshly registered account.
    pub async fn sign_in_as(&self, email: &str) -> UserIdentity {
        let user = self.add_account(email, "password").await;
        self.inner.lock().await.session = Some(session_for(user.clone()));
        user
    }

    pub async fn insert_row(&self, row: WorkoutSet) {
        let key = row_key(&row.user_id, row.date, row.exercise_id, row.set_num);
        self.inner.lock().await.rows.insert(key, row);
    }

    pub async fn row(
        &self,
        user_id: &str,
        date: NaiveDate,
        exercise: ExerciseCode,
        set: u8,
    ) -> Option<WorkoutSet> {
        let state = self.inner.lock().await;
        state.rows.get(&row_key(user_id, date, exercise, set)).cloned()
    }

    /// Successful upserts in completion order.
    pub async fn upserts(&self) -> Vec<WorkoutSetUpsert> {
        self.inner.lock().await.upserts.clone()
    }

    pub async fn upsert_attempts(&self) -> usize {
        self.inner.lock().await.upsert_attempts
    }

    /// Highest number of simultaneous upserts observed for one group.
    pub async fn max_in_flight(&self, key: GroupKey) -> usize {
        let state = self.inner.lock().await;
        state.max_in_flight.get(&key).copied().unwrap_or(0)
    }

    pub async fn fail_next_upserts(&self, count: usize) {
        self.inner.lock().await.failing_upserts = count;
    }

    /// Fail the next sign-out, optionally losing the session anyway.
    pub async fn fail_next_sign_out(&self, drop_session: bool) {
        self.inner.lock().await.failing_sign_out = Some(drop_session);
    }

    pub async fn set_fetch_failure(&self, fail: bool) {
        self.inner.lock().await.fail_fetches = fail;
    }

    pub async fn set_lookup_failure(&self, fail: bool) {
        self.inner.lock().await.fail_lookups = fail;
    }

    pub async fn set_upsert_latency(&self, latency: Option<Duration>) {
        self.inner.lock().await.upsert_latency = latency;
    }

    async fn finish_upsert(&self, row: &WorkoutSetUpsert) -> Result<(), BackendError> {
        let mut state = self.inner.lock().await;
        let key = row.key();
        if let Some(count) = state.in_flight.get_mut(&key) {
            *count = count.saturating_sub(1);
        }
        if state.failing_upserts > 0 {
            state.failing_upserts -= 1;
            return Err(BackendError::rejected(503, "upsert rejected"));
        }

        let stored = state
            .rows
            .entry(row_key(&row.user_id, row.date, row.exercise_id, row.set_num))
            .or_insert_with(|| WorkoutSet {
                user_id: row.user_id.clone(),
                date: row.date,
                exercise_id: row.exercise_id,
                set_num: row.set_num,
                reps: None,
                weight: None,
                notes: None,
            });
        stored.reps = row.reps;
        stored.notes = row.notes.clone();
        if let Some(weight) = row.weight {
            stored.weight = weight;
        }
        state.upserts.push(row.clone());
        Ok(())
    }

    async fn require_user(&self, user_id: &str) -> Result<(), BackendError> {
        let state = self.inner.lock().await;
        match &state.session {
            Some(session) if session.user.id == user_id => Ok(()),
            Some(_) => Err(BackendError::rejected(403, "row belongs to another user")),
            None => Err(BackendError::NotSignedIn),
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.inner.lock().await.session.clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let mut state = self.inner.lock().await;
        let user = match state.accounts.get(email) {
            Some((expected, user)) if expected == password => user.clone(),
            _ => return Err(BackendError::rejected(400, "Invalid login credentials")),
        };
        let session = session_for(user);
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let mut state = self.inner.lock().await;
        if let Some(drop_session) = state.failing_sign_out.take() {
            if drop_session {
                state.session = None;
            }
            return Err(BackendError::rejected(502, "bad gateway"));
        }
        state.session = None;
        Ok(())
    }

    async fn fetch_day(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<WorkoutSet>, BackendError> {
        self.require_user(user_id).await?;
        let state = self.inner.lock().await;
        if state.fail_fetches {
            return Err(BackendError::rejected(500, "fetch rejected"));
        }
        Ok(state
            .rows
            .values()
            .filter(|row| row.user_id == user_id && row.date == date)
            .cloned()
            .collect())
    }

    async fn nearest_date(
        &self,
        user_id: &str,
        boundary: NaiveDate,
        direction: Direction,
    ) -> Result<Option<NaiveDate>, BackendError> {
        self.require_user(user_id).await?;
        let state = self.inner.lock().await;
        if state.fail_lookups {
            return Err(BackendError::rejected(500, "lookup rejected"));
        }
        let dates = state
            .rows
            .values()
            .filter(|row| row.user_id == user_id)
            .map(|row| row.date);
        Ok(match direction {
            Direction::Next => dates.filter(|date| *date > boundary).min(),
            Direction::Previous => dates.filter(|date| *date < boundary).max(),
        })
    }

    async fn upsert(&self, row: &WorkoutSetUpsert) -> Result<(), BackendError> {
        self.require_user(&row.user_id).await?;
        let latency = {
            let mut state = self.inner.lock().await;
            state.upsert_attempts += 1;
            let key = row.key();
            let count = state.in_flight.entry(key).or_insert(0);
            *count += 1;
            let current = *count;
            let peak = state.max_in_flight.entry(key).or_insert(0);
            *peak = (*peak).max(current);
            state.upsert_latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.finish_upsert(row).await
    }
}
