//! Disposable Postgres databases for integration tests.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use postgres::NoTls;
use url::Url;

/// Environment variable naming the server used for database-backed tests.
pub const TEST_DATABASE_URL_ENV: &str = "TAGRELAY_TEST_DATABASE_URL";

/// Handle to a uniquely named database that is dropped with the handle.
pub struct TestDatabase {
    connection_string: String,
    admin_url: String,
    database: String,
}

impl TestDatabase {
    /// Connection string that can be passed to `sqlx` or other Postgres clients.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let _ = run_admin(
            &self.admin_url,
            format!("DROP DATABASE IF EXISTS \"{}\"", self.database),
        );
    }
}

/// Create a fresh database on the server named by [`TEST_DATABASE_URL_ENV`].
///
/// Tests should skip when this returns an error.
///
/// # Errors
///
/// Returns an error if the variable is unset or the database cannot be created.
pub fn start_postgres() -> Result<TestDatabase> {
    let base_url = std::env::var(TEST_DATABASE_URL_ENV)
        .with_context(|| format!("{TEST_DATABASE_URL_ENV} is not set"))?;
    create_unique_database(&base_url)
}

fn create_unique_database(base_url: &str) -> Result<TestDatabase> {
    let parsed = Url::parse(base_url).context("invalid postgres connection url")?;
    let database = unique_database_name();

    let mut database_url = parsed.clone();
    database_url.set_path(&format!("/{database}"));

    let mut last_error: Option<anyhow::Error> = None;
    for admin_url in admin_urls(&parsed) {
        match run_admin(&admin_url, format!("CREATE DATABASE \"{database}\"")) {
            Ok(()) => {
                return Ok(TestDatabase {
                    connection_string: database_url.to_string(),
                    admin_url,
                    database,
                });
            }
            Err(err) => last_error = Some(err),
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("failed to create database")))
}

fn admin_urls(base: &Url) -> Vec<String> {
    let mut urls = Vec::new();
    let mut admin = base.clone();
    admin.set_path("/postgres");
    urls.push(admin.to_string());
    if admin.path() != base.path() {
        urls.push(base.to_string());
    }
    urls
}

// The blocking client must not run inside a tokio runtime thread.
fn run_admin(admin_url: &str, statement: String) -> Result<()> {
    let admin = admin_url.to_string();
    std::thread::spawn(move || -> Result<()> {
        let config = postgres::Config::from_str(&admin)?;
        let mut client = config.connect(NoTls)?;
        client
            .simple_query(&statement)
            .map(|_| ())
            .context("failed to run administrative statement")
    })
    .join()
    .unwrap_or_else(|_| Err(anyhow!("administrative thread panicked")))
}

fn unique_database_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let pid = std::process::id();
    format!("tagrelay_test_{pid}_{nanos}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_urls_prefer_maintenance_database() -> Result<()> {
        let base = Url::parse("postgres://user@localhost:5432/app")?;
        let urls = admin_urls(&base);
        assert_eq!(urls[0], "postgres://user@localhost:5432/postgres");
        assert_eq!(urls[1], "postgres://user@localhost:5432/app");
        Ok(())
    }

    #[test]
    fn database_names_are_prefixed() {
        assert!(unique_database_name().starts_with("tagrelay_test_"));
    }
}
