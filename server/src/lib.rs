pub mod auth;
pub mod billing;
pub mod bookmarks;
pub mod collections;
pub mod components;
pub mod cookies;
pub mod credits;
pub mod cron;
pub mod encryption;
pub mod errors;
pub mod generation;
pub mod identity;
pub mod images;
pub mod migration;
pub mod pagination;
pub mod routes;
pub mod state;
pub mod static_assets;
pub mod storage;
pub mod user;
pub mod validation;

pub use state::AppState;

pub type Result<T, E = color_eyre::Report> = std::result::Result<T, E>;
