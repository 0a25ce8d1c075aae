//! Embedded migrations for `events.duckdb`
//!
//! Applied in order by [`crate::services::EventLog`]; the bookkeeping table
//! is bootstrapped first.

/// (filename, sql) pairs, sorted by name.
///
/// New migrations go in as `NNN_description.sql` and are appended here.
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    (
        "001_initial_schema.sql",
        include_str!("001_initial_schema.sql"),
    ),
];

/// Name of the bootstrap migration
pub const BOOTSTRAP_MIGRATION: &str = "000_migrations.sql";
