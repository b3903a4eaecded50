//! Reqwest adapter for a Supabase-style project (GoTrue auth + PostgREST).

use super::{Backend, BackendError, CONFLICT_KEY, WORKOUTS_TABLE};
use crate::exercises::ExerciseCode;
use crate::models::{Direction, Session, UserIdentity, WorkoutSet, WorkoutSetUpsert};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Tokens this close to expiry are renewed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

pub struct RestBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    session: Mutex<Option<Session>>,
}

#[derive(Debug, Deserialize)]
struct DateRow {
    date: NaiveDate,
}

/// A `workouts` row as returned by PostgREST. The exercise code stays text
/// here so rows for exercises outside the catalog can be skipped one by one.
#[derive(Debug, Deserialize)]
struct StoredRow {
    user_id: String,
    date: NaiveDate,
    exercise_id: String,
    set_num: i64,
    #[serde(default)]
    reps: Option<i32>,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    notes: Option<String>,
}

impl StoredRow {
    fn into_set(self) -> Option<WorkoutSet> {
        let exercise_id = match self.exercise_id.parse::<ExerciseCode>() {
            Ok(code) => code,
            Err(err) => {
                debug!(date = %self.date, "skipping row: {err}");
                return None;
            }
        };
        let set_num = u8::try_from(self.set_num).ok()?;
        Some(WorkoutSet {
            user_id: self.user_id,
            date: self.date,
            exercise_id,
            set_num,
            reps: self.reps,
            weight: self.weight,
            notes: self.notes,
        })
    }
}

fn known_rows(rows: Vec<StoredRow>) -> Vec<WorkoutSet> {
    rows.into_iter().filter_map(StoredRow::into_set).collect()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserIdentity,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs));
        Session {
            access_token: self.access_token,
            user: self.user,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

fn needs_refresh(session: &Session, now: i64) -> bool {
    session.refresh_token.is_some()
        && session
            .expires_at
            .is_some_and(|expires_at| now + REFRESH_MARGIN_SECS >= expires_at)
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, BackendError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(BackendError::Config("SUPABASE_URL is empty".to_string()));
        }
        if anon_key.trim().is_empty() {
            return Err(BackendError::Config("SUPABASE_ANON_KEY is empty".to_string()));
        }
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            anon_key: anon_key.trim().to_string(),
            session: Mutex::new(None),
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{WORKOUTS_TABLE}", self.base_url)
    }

    async fn request_token(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, BackendError> {
        let response = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()))?;
        Ok(token.into_session(Utc::now().timestamp()))
    }

    /// Current access token, renewed first when it is about to expire.
    async fn access_token(&self) -> Result<String, BackendError> {
        let mut guard = self.session.lock().await;
        let current = guard.as_ref().ok_or(BackendError::NotSignedIn)?;
        if !needs_refresh(current, Utc::now().timestamp()) {
            return Ok(current.access_token.clone());
        }

        let refresh_token = current.refresh_token.clone().unwrap_or_default();
        match self
            .request_token(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await
        {
            Ok(session) => {
                debug!(user_id = %session.user.id, "access token refreshed");
                let token = session.access_token.clone();
                *guard = Some(session);
                Ok(token)
            }
            Err(err @ BackendError::Rejected { .. }) => {
                warn!("session refresh rejected: {err}");
                *guard = None;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, BackendError> {
        let token = self.access_token().await?;
        Ok(request
            .header("apikey", &self.anon_key)
            .bearer_auth(token))
    }
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .error_description
        .or(body.msg)
        .or(body.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request rejected")
                .to_string()
        });
    Err(BackendError::rejected(status.as_u16(), message))
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl Backend for RestBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.session.lock().await.clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let session = self
            .request_token(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        debug!(user_id = %session.user.id, "signed in");
        *self.session.lock().await = Some(session.clone());
        Ok(session)
    }

    /// The local session is only dropped once the server has revoked it.
    async fn sign_out(&self) -> Result<(), BackendError> {
        let token = match self.access_token().await {
            Ok(token) => token,
            Err(BackendError::NotSignedIn) => return Ok(()),
            Err(err) => return Err(err),
        };
        let response = self
            .client
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;
        match ensure_success(response).await {
            Ok(_) => {}
            // Already invalid server-side.
            Err(BackendError::Rejected { status: 401, .. }) => {
                info!("session was already revoked");
            }
            Err(err) => return Err(err),
        }
        *self.session.lock().await = None;
        Ok(())
    }

    async fn fetch_day(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<WorkoutSet>, BackendError> {
        let request = self.client.get(self.table_url()).query(&[
            ("select", "*".to_string()),
            ("user_id", eq(user_id)),
            ("date", eq(date)),
        ]);
        let response = self.authorized(request).await?.send().await?;
        let rows: Vec<StoredRow> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()))?;
        Ok(known_rows(rows))
    }

    async fn nearest_date(
        &self,
        user_id: &str,
        boundary: NaiveDate,
        direction: Direction,
    ) -> Result<Option<NaiveDate>, BackendError> {
        let (operator, order) = match direction {
            Direction::Next => ("gt", "date.asc"),
            Direction::Previous => ("lt", "date.desc"),
        };
        let request = self.client.get(self.table_url()).query(&[
            ("select", "date".to_string()),
            ("user_id", eq(user_id)),
            ("date", format!("{operator}.{boundary}")),
            ("order", order.to_string()),
            ("limit", "1".to_string()),
        ]);
        let response = self.authorized(request).await?.send().await?;
        let rows: Vec<DateRow> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()))?;
        Ok(rows.into_iter().next().map(|row| row.date))
    }

    async fn upsert(&self, row: &WorkoutSetUpsert) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.table_url())
            .query(&[("on_conflict", CONFLICT_KEY)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row);
        let response = self.authorized(request).await?.send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}
