// tasklist - ordered task list with filtering and write-through local persistence

pub mod backend;
pub mod codec;
pub mod config;
pub mod filter;
pub mod models;
pub mod prefs;
pub mod store;

// Re-export main types for convenience
pub use backend::{Backend, FileBackend, MemoryBackend, SqliteBackend};
pub use config::{BackendKind, Config};
pub use filter::{CategoryFilter, Filter, StatusFilter};
pub use models::{Priority, Task, TaskCount, now_iso, now_ms};
pub use prefs::ThemeMode;
pub use store::{Change, DEFAULT_TASKS_KEY, TaskStore};
