//! Transactional datastore for the cafe ordering service.
//!
//! The domain never talks SQL directly. It opens a [`UnitOfWork`] through a
//! [`Datastore`], performs locking reads and writes on it, and then either
//! commits or rolls back. Dropping a unit without committing discards every
//! write made through it.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{DatastoreError, Result};
pub use memory::{FailPoint, MemoryDatastore};
pub use postgres::PostgresDatastore;
pub use records::*;
pub use store::{Datastore, OrderScope, UnitOfWork};
