use crate::errors::AppError;
use crate::models::{Direction, FieldEditRequest, GroupView, LoginRequest, NavigateRequest};
use crate::state::AppState;
use crate::tracker::ViewSnapshot;
use crate::ui::{render_page, render_startup_error};
use axum::{
    Form, Json,
    extract::State,
    response::{Html, Redirect},
};

pub async fn index(State(state): State<AppState>) -> Html<String> {
    match state.tracker() {
        Some(tracker) => Html(render_page(&tracker.snapshot().await)),
        None => Html(render_startup_error(
            state.startup_error().unwrap_or("Startup error"),
        )),
    }
}

pub async fn login_form(
    State(state): State<AppState>,
    Form(payload): Form<LoginRequest>,
) -> Result<Redirect, AppError> {
    state.ready()?.login(&payload.email, &payload.password).await;
    Ok(Redirect::to("/"))
}

pub async fn logout_form(State(state): State<AppState>) -> Result<Redirect, AppError> {
    state.ready()?.logout().await;
    Ok(Redirect::to("/"))
}

pub async fn previous_day(State(state): State<AppState>) -> Result<Redirect, AppError> {
    state.ready()?.navigate(Direction::Previous).await;
    Ok(Redirect::to("/"))
}

pub async fn next_day(State(state): State<AppState>) -> Result<Redirect, AppError> {
    state.ready()?.navigate(Direction::Next).await;
    Ok(Redirect::to("/"))
}

pub async fn today_form(State(state): State<AppState>) -> Result<Redirect, AppError> {
    state.ready()?.go_to_today().await;
    Ok(Redirect::to("/"))
}

pub async fn theme_form(State(state): State<AppState>) -> Result<Redirect, AppError> {
    state.ready()?.toggle_theme().await;
    Ok(Redirect::to("/"))
}

pub async fn get_view(State(state): State<AppState>) -> Result<Json<ViewSnapshot>, AppError> {
    Ok(Json(state.ready()?.snapshot().await))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ViewSnapshot>, AppError> {
    let tracker = state.ready()?;
    tracker.login(&payload.email, &payload.password).await;
    Ok(Json(tracker.snapshot().await))
}

pub async fn logout(State(state): State<AppState>) -> Result<Json<ViewSnapshot>, AppError> {
    let tracker = state.ready()?;
    tracker.logout().await;
    Ok(Json(tracker.snapshot().await))
}

pub async fn navigate(
    State(state): State<AppState>,
    Json(payload): Json<NavigateRequest>,
) -> Result<Json<ViewSnapshot>, AppError> {
    let tracker = state.ready()?;
    tracker.navigate(payload.direction).await;
    Ok(Json(tracker.snapshot().await))
}

pub async fn today(State(state): State<AppState>) -> Result<Json<ViewSnapshot>, AppError> {
    let tracker = state.ready()?;
    tracker.go_to_today().await;
    Ok(Json(tracker.snapshot().await))
}

pub async fn edit_field(
    State(state): State<AppState>,
    Json(payload): Json<FieldEditRequest>,
) -> Result<Json<GroupView>, AppError> {
    let group = state.ready()?.edit_field(payload).await?;
    Ok(Json(group))
}

pub async fn toggle_theme(State(state): State<AppState>) -> Result<Json<ViewSnapshot>, AppError> {
    let tracker = state.ready()?;
    tracker.toggle_theme().await;
    Ok(Json(tracker.snapshot().await))
}
