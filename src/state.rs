use crate::backend::{Backend, BackendError, MemoryBackend, RestBackend};
use crate::config::{BackendMode, Config};
use crate::errors::AppError;
use crate::tracker::Tracker;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    tracker: Option<Arc<Tracker>>,
    startup_error: Option<Arc<str>>,
}

impl AppState {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker: Some(Arc::new(tracker)),
            startup_error: None,
        }
    }

    /// State for a process whose backend could not be set up; every route
    /// reports the message instead of showing the tracker.
    pub fn startup_failed(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self {
            tracker: None,
            startup_error: Some(message.into()),
        }
    }

    pub fn tracker(&self) -> Option<&Arc<Tracker>> {
        self.tracker.as_ref()
    }

    pub fn ready(&self) -> Result<&Arc<Tracker>, AppError> {
        self.tracker.as_ref().ok_or_else(|| {
            AppError::unavailable(self.startup_error().unwrap_or("tracker unavailable"))
        })
    }

    pub fn startup_error(&self) -> Option<&str> {
        self.startup_error.as_deref()
    }
}

async fn build_backend(config: &Config) -> Result<Arc<dyn Backend>, BackendError> {
    match config.backend {
        BackendMode::Memory => {
            let backend = MemoryBackend::new();
            backend
                .add_account(&config.demo_email, &config.demo_password)
                .await;
            info!(email = %config.demo_email, "using in-memory backend");
            let backend: Arc<dyn Backend> = Arc::new(backend);
            Ok(backend)
        }
        BackendMode::Rest => {
            let (Some(url), Some(key)) = (&config.supabase_url, &config.supabase_anon_key) else {
                return Err(BackendError::Config(
                    "SUPABASE_URL and SUPABASE_ANON_KEY must be set".to_string(),
                ));
            };
            let backend: Arc<dyn Backend> = Arc::new(RestBackend::new(url, key)?);
            Ok(backend)
        }
    }
}

/// Build the backend named by `config` and resolve the initial session.
pub async fn build_state(config: &Config) -> AppState {
    match build_backend(config).await {
        Ok(backend) => {
            let tracker = Tracker::new(backend, config.debounce, config.theme_path.clone());
            tracker.start().await;
            AppState::new(tracker)
        }
        Err(err) => {
            error!("startup failed: {err}");
            AppState::startup_failed(format!("Startup error: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rest_mode_without_credentials_fails_startup() {
        let state = build_state(&Config::default()).await;
        assert!(state.tracker().is_none());
        assert!(state.startup_error().unwrap().starts_with("Startup error"));
        let Err(err) = state.ready() else {
            panic!("expected startup failure");
        };
        assert_eq!(err.status, axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn memory_mode_starts_on_the_login_screen() {
        let mut config = Config::default();
        config.backend = BackendMode::Memory;
        config.theme_path = std::env::temp_dir().join(format!(
            "tracker_state_{}/preferences.json",
            std::process::id()
        ));
        let state = build_state(&config).await;
        let tracker = state.ready().unwrap();
        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.screen, crate::tracker::Screen::Auth);
    }
}
