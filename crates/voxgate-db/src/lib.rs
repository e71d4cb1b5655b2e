//! Optional generation history for the voxgate server.
//!
//! SQLite connection pooling (via `r2d2`) in WAL mode, embedded SQL
//! migrations, and the queries behind `GET /api/history`. Nothing here is
//! touched unless history is enabled in the server config.

mod history;
mod migrations;
mod store;

pub use history::{
    list_recent_generations, record_generation, GenerationRecord, HistoryError, NewGeneration,
};
pub use migrations::{run_migrations, MigrationError};
pub use store::{open_store, DbPool, StoreError, StoreSettings, MEMORY_STORE};
