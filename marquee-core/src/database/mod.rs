//! Repository ports and their adapters.
//!
//! Ports are async traits consumed through `Arc<dyn ...>` handles held by
//! [`crate::application::unit_of_work::AppUnitOfWork`]. The PostgreSQL
//! adapters are the production store; the in-memory adapters back tests and
//! database-less development runs.

pub mod memory;
pub mod ports;

#[cfg(feature = "database")]
#[cfg_attr(docsrs, doc(cfg(feature = "database")))]
pub mod postgres;

#[cfg(feature = "database")]
pub use postgres::PostgresDatabase;
