//! Prodata Kernel Library
//!
//! Health production data service: reference tables, production records,
//! filtered reports, accounts and audit log over PostgreSQL.
//! The main entry point for running the server is the `prodata` binary.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod report;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
