//! View state for the signed-in user's day: session handling, navigation,
//! the day form lifecycle and user-visible notices.

use crate::backend::Backend;
use crate::errors::TrackerError;
use crate::form::{DayForm, day_label};
use crate::models::{Direction, FieldEditRequest, GroupKey, GroupView, UserIdentity};
use crate::notice::Notices;
use crate::sync::SyncEngine;
use crate::theme::{Theme, load_theme, persist_theme};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const NAV_BUSY: &str = "Navigation is disabled while a day is loading or a save is in progress.";
const NOT_SIGNED_IN: &str = "Cannot navigate: User not logged in.";

pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Auth,
    Tracker,
}

enum DayContent {
    Empty,
    Loading,
    Loaded(DayForm),
    Failed,
}

struct ViewState {
    screen: Screen,
    user: Option<UserIdentity>,
    current_date: NaiveDate,
    content: DayContent,
    fetching: bool,
    overlay: Option<String>,
    theme: Option<Theme>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub screen: Screen,
    pub user_email: Option<String>,
    pub date: NaiveDate,
    pub day_label: String,
    pub form: Option<DayForm>,
    pub load_failed: bool,
    pub notice: Option<String>,
    pub overlay: Option<String>,
    pub nav_enabled: bool,
    pub saves_in_progress: usize,
    pub theme: Option<Theme>,
}

pub struct Tracker {
    backend: Arc<dyn Backend>,
    sync: SyncEngine,
    notices: Notices,
    theme_path: PathBuf,
    clock: Clock,
    view: Mutex<ViewState>,
}

impl Tracker {
    pub fn new(backend: Arc<dyn Backend>, debounce: Duration, theme_path: PathBuf) -> Self {
        let notices = Notices::new();
        let sync = SyncEngine::new(Arc::clone(&backend), debounce, notices.clone());
        let clock: Clock = Arc::new(local_today);
        let today = clock();
        Self {
            backend,
            sync,
            notices,
            theme_path,
            clock,
            view: Mutex::new(ViewState {
                screen: Screen::Auth,
                user: None,
                current_date: today,
                content: DayContent::Empty,
                fetching: false,
                overlay: None,
                theme: None,
            }),
        }
    }

    /// Replace the source of "today"; the current date is reset to it.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.view.get_mut().current_date = clock();
        self.clock = clock;
        self
    }

    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub async fn current_date(&self) -> NaiveDate {
        self.view.lock().await.current_date
    }

    /// Load the theme preference and resolve the initial session.
    pub async fn start(&self) {
        let theme = load_theme(&self.theme_path).await;
        self.view.lock().await.theme = theme;
        self.init_session().await;
    }

    pub async fn init_session(&self) {
        self.set_overlay(Some("Checking session...")).await;
        let result = self.backend.get_session().await;
        self.set_overlay(None).await;

        match result {
            Ok(Some(session)) => {
                info!(user_id = %session.user.id, "session active");
                let date = {
                    let mut view = self.view.lock().await;
                    view.user = Some(session.user);
                    view.screen = Screen::Tracker;
                    view.current_date
                };
                self.render_day(date).await;
            }
            Ok(None) => {
                debug!("no active session");
                self.show_auth().await;
            }
            Err(err) => {
                warn!("session check failed: {err}");
                self.notices.show(format!("Session error: {err}"));
                self.show_auth().await;
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) {
        self.set_overlay(Some("Logging in...")).await;
        let result = self
            .backend
            .sign_in_with_password(email.trim(), password)
            .await;
        self.set_overlay(None).await;

        match result {
            Ok(session) => {
                info!(user_id = %session.user.id, "signed in");
                self.init_session().await;
            }
            Err(err) => {
                warn!("login failed: {err}");
                self.notices.show(format!("Login failed: {err}"));
            }
        }
    }

    pub async fn logout(&self) {
        self.set_overlay(Some("Logging out...")).await;
        // Edits still on a timer are written under the session that made them.
        self.sync.flush_pending().await;
        self.sync.wait_idle().await;

        match self.backend.sign_out().await {
            Ok(()) => {
                self.signed_out().await;
                info!("signed out");
            }
            Err(err) => {
                warn!("logout failed: {err}");
                self.notices.show(format!("Logout failed: {err}"));
                // Without a session nothing can be saved, so the form goes too.
                if matches!(self.backend.get_session().await, Ok(None)) {
                    self.signed_out().await;
                }
            }
        }
        self.set_overlay(None).await;
    }

    async fn signed_out(&self) {
        self.sync.clear_day().await;
        let mut view = self.view.lock().await;
        view.user = None;
        view.screen = Screen::Auth;
        view.content = DayContent::Empty;
        view.current_date = (self.clock)();
    }

    /// Fetch `date` and rebuild the form and edit groups from it.
    pub async fn render_day(&self, date: NaiveDate) {
        let user = {
            let mut view = self.view.lock().await;
            let Some(user) = view.user.clone() else {
                view.screen = Screen::Auth;
                self.notices.show("Cannot render day: User not logged in.");
                return;
            };
            view.current_date = date;
            view.content = DayContent::Loading;
            view.fetching = true;
            view.overlay = Some("Loading...".to_string());
            user
        };
        info!(%date, "rendering day");
        self.notices.hide();

        self.sync.flush_pending().await;
        self.sync.wait_idle().await;
        let result = self.backend.fetch_day(&user.id, date).await;

        let mut view = self.view.lock().await;
        match result {
            Ok(records) => {
                let form = DayForm::build(date, &records);
                self.sync.load_day(&user.id, &form).await;
                view.content = DayContent::Loaded(form);
            }
            Err(err) => {
                error!(%date, "failed to load day: {err}");
                self.sync.clear_day().await;
                self.notices
                    .show(format!("Failed to load workout data: {err}"));
                view.content = DayContent::Failed;
            }
        }
        view.fetching = false;
        view.overlay = None;
    }

    /// Jump to the closest day with stored sets in `direction`.
    pub async fn navigate(&self, direction: Direction) {
        let (user, current) = {
            let mut view = self.view.lock().await;
            let Some(user) = view.user.clone() else {
                self.notices.show(NOT_SIGNED_IN);
                return;
            };
            if !self.nav_enabled(&view) {
                self.notices.show(NAV_BUSY);
                return;
            }
            view.fetching = true;
            view.overlay = Some("Finding day...".to_string());
            (user, view.current_date)
        };
        self.notices.hide();

        match self
            .backend
            .nearest_date(&user.id, current, direction)
            .await
        {
            Ok(Some(date)) => {
                info!(from = %current, to = %date, "found day with entries");
                self.render_day(date).await;
            }
            Ok(None) => {
                info!(from = %current, ?direction, "no day with entries");
                self.notices.show(format!(
                    "No {} days with entries found.",
                    direction.relative_word()
                ));
                self.release_navigation().await;
            }
            Err(err) => {
                warn!("day lookup failed: {err}");
                self.notices.show(format!("Error finding day: {err}"));
                self.release_navigation().await;
            }
        }
    }

    pub async fn go_to_today(&self) {
        let today = (self.clock)();
        {
            let mut view = self.view.lock().await;
            if view.user.is_none() {
                self.notices.show(NOT_SIGNED_IN);
                return;
            }
            if view.current_date == today {
                debug!("already on today");
                return;
            }
            if !self.nav_enabled(&view) {
                self.notices.show(NAV_BUSY);
                return;
            }
            view.fetching = true;
        }
        self.render_day(today).await;
    }

    pub async fn edit_field(&self, edit: FieldEditRequest) -> Result<GroupView, TrackerError> {
        {
            let view = self.view.lock().await;
            if view.user.is_none() || view.screen != Screen::Tracker {
                return Err(TrackerError::NotSignedIn);
            }
        }
        self.sync
            .edit(
                GroupKey::new(edit.exercise, edit.set),
                edit.field,
                edit.value,
                edit.seq,
            )
            .await
    }

    pub async fn toggle_theme(&self) {
        let theme = {
            let mut view = self.view.lock().await;
            let next = Theme::toggled(view.theme);
            view.theme = Some(next);
            next
        };
        match persist_theme(&self.theme_path, theme).await {
            Ok(()) => info!(theme = theme.as_str(), "theme saved"),
            Err(err) => {
                error!("failed to save theme preference: {err}");
                self.notices
                    .show(format!("Could not save theme preference: {err}"));
            }
        }
    }

    /// Save whatever is still pending before the process exits.
    pub async fn shutdown(&self) {
        self.sync.flush_pending().await;
        self.sync.wait_idle().await;
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        let view = self.view.lock().await;
        let (form, load_failed) = match &view.content {
            DayContent::Loaded(form) => {
                let mut form = form.clone();
                let groups = self.sync.groups(form.date).await;
                form.apply_groups(&groups);
                (Some(form), false)
            }
            DayContent::Failed => (None, true),
            DayContent::Empty | DayContent::Loading => (None, false),
        };

        ViewSnapshot {
            screen: view.screen,
            user_email: view.user.as_ref().and_then(|user| user.email.clone()),
            date: view.current_date,
            day_label: day_label(view.current_date),
            form,
            load_failed,
            notice: self.notices.current(),
            overlay: view.overlay.clone(),
            nav_enabled: view.screen == Screen::Tracker && self.nav_enabled(&view),
            saves_in_progress: self.sync.saves_in_progress(),
            theme: view.theme,
        }
    }

    fn nav_enabled(&self, view: &ViewState) -> bool {
        !view.fetching && self.sync.saves_in_progress() == 0
    }

    async fn release_navigation(&self) {
        let mut view = self.view.lock().await;
        view.fetching = false;
        view.overlay = None;
    }

    async fn set_overlay(&self, message: Option<&str>) {
        self.view.lock().await.overlay = message.map(str::to_string);
    }

    async fn show_auth(&self) {
        let mut view = self.view.lock().await;
        view.screen = Screen::Auth;
        view.user = None;
        view.content = DayContent::Empty;
    }
}
