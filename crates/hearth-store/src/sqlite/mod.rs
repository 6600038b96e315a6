//! `SQLite` backend: connection pool, migrations, repositories.

pub mod connection;
pub mod migrations;
pub mod repositories;
