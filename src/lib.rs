pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod kv;
pub mod models;
pub mod session;
pub mod stats;
pub mod storage;
pub mod ui;
pub mod state;

pub use app::router;
pub use config::AppConfig;
pub use session::Session;
pub use state::AppState;
pub use storage::{record_key, RecordStore, RECORD_PREFIX};
