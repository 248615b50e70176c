pub mod cli;
pub mod config;
pub mod database;
pub mod models;
pub mod projector;
pub mod store;
pub mod utils;
pub mod views;

pub use config::Config;
pub use database::{Database, DatabaseError};
pub use models::{Category, Priority, RepeatType, RepeatValue, Task, ViewEntry};
pub use store::{StoreError, SyncReport, TaskStore, ToggleOutcome};
pub use utils::{Clock, DateBasis, FixedClock, Profile, SystemClock};
pub use views::{Drift, DriftKind, ViewKind};
