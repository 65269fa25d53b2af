//! Server core: configuration, shared state, background tasks, bootstrap.

pub mod config;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use state::AppState;
pub use tasks::{BackgroundTasks, TaskKind};
