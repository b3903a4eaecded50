pub mod app;
pub mod backend;
pub mod config;
pub mod errors;
pub mod exercises;
pub mod form;
pub mod handlers;
pub mod models;
pub mod notice;
pub mod state;
pub mod sync;
pub mod theme;
pub mod tracker;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use state::{AppState, build_state};
pub use tracker::Tracker;
