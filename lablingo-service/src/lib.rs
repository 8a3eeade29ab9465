pub mod config;
pub mod models;
pub mod service;
pub mod storage;

pub use config::{GateMode, Settings};
pub use service::{AppState, build_router, create_app};
pub use storage::{InMemorySessionStorage, Session, SessionStorage, spawn_idle_sweeper};
