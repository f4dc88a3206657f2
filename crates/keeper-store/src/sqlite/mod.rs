//! `SQLite` driver plumbing: the pooled connection type the querier runs on.

pub mod connection;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory, open};
