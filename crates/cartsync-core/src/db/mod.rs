//! `SQLite` layer backing the durable local store and the document store

mod connection;
mod migrations;

pub use connection::Database;
