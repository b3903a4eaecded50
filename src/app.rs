use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/login", post(handlers::login_form))
        .route("/logout", post(handlers::logout_form))
        .route("/day/previous", post(handlers::previous_day))
        .route("/day/next", post(handlers::next_day))
        .route("/day/today", post(handlers::today_form))
        .route("/theme", post(handlers::theme_form))
        .route("/api/view", get(handlers::get_view))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/navigate", post(handlers::navigate))
        .route("/api/today", post(handlers::today))
        .route("/api/field", post(handlers::edit_field))
        .route("/api/theme", post(handlers::toggle_theme))
        .with_state(state)
}
