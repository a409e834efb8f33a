//! Subcommand implementations.

pub mod migrate;
pub mod role;
pub mod watch;

use secrecy::SecretString;

/// Database URL from `PARCEL_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();
    std::env::var("PARCEL_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}
