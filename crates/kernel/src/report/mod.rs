//! Production reports.
//!
//! A request's filter model is parsed ([`filter`]), compiled to a predicate
//! tree ([`predicate`]), lowered to SQL ([`query_builder`]) and executed
//! against the joined fact table ([`service`]).

pub mod filter;
pub mod predicate;
pub mod query_builder;
pub mod service;

pub use filter::{FilterModel, ReportField};
pub use predicate::{Predicate, compile};
pub use service::{ExportAck, ExportRequest, ReportRecord, ReportService};
