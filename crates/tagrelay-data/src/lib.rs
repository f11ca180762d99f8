#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! PostgreSQL persistence for replication jobs and policies.

pub mod error;
pub mod ledger;
pub mod policy;

pub use error::{DataError, Result as DataResult};
pub use ledger::PgJobLedger;
pub use policy::PgPolicyStore;

use sqlx::PgPool;

/// Apply the embedded schema migrations.
///
/// # Errors
///
/// Returns [`DataError::MigrationFailed`] if a migration cannot be applied.
pub async fn migrate(pool: &PgPool) -> DataResult<()> {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
        .run(pool)
        .await
        .map_err(|source| DataError::MigrationFailed { source })
}
