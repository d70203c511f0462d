//! Entity store: generic, audited CRUD over the exposed tables.

pub mod record;
pub mod service;

pub use record::{ListQuery, Page, Pagination, Record};
pub use service::EntityStore;
