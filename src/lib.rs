//! ClassBoard data migration: validate a seed payload, back up the current
//! database, insert every entity group in dependency order, and roll back
//! from any backup.

pub mod backup;
pub mod config;
pub mod db;
pub mod digest;
pub mod error;
pub mod fixtures;
pub mod log;
pub mod migrate;
pub mod model;
pub mod saga;
pub mod store;
pub mod validate;

pub use config::MigrationConfig;
pub use error::MigrationError;
pub use migrate::{MigrationResult, Migrator};
pub use model::{EntityGroup, MigrationPayload};
pub use store::Store;
pub use validate::{validate_input_data, validate_payload, ExistingIds, ValidationError};
