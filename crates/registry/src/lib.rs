//! Plate registry: who owns which tag.
//!
//! The local [`RegistryStore`] is authoritative; an [`ExternalResolver`] is a
//! best-effort fallback whose hits are copied into the store with
//! [`Provenance::External`] and no platform identity.

pub mod error;
pub mod record;
pub mod resolver;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;

pub use {
    error::{Error, Result},
    record::{Provenance, RecordPatch, RegistryRecord},
    resolver::{ExternalPlate, ExternalResolver, HttpResolver, NoopResolver, StaticResolver},
    store::RegistryStore,
    store_memory::InMemoryRegistryStore,
    store_sqlite::SqliteRegistryStore,
};

/// Run database migrations for the registry crate.
///
/// Creates the `registry` table. Called by [`SqliteRegistryStore::new`]; call
/// it yourself before [`SqliteRegistryStore::with_pool`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
