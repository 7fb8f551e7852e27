//! Voxline storage crate - durable string key-value storage.
//!
//! Provides a WAL-mode SQLite database with migrations, the [`KvStore`]
//! trait the chat pipeline persists through, and an in-memory store for
//! tests and ephemeral sessions.

pub mod db;
pub mod kv;
pub mod migrations;

pub use db::Database;
pub use kv::{KvStore, MemoryKvStore, SqliteKvStore};
