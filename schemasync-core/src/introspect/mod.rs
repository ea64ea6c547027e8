//! Live-database introspection: reads the current state of a target database
//! back into a [`SchemaModel`] so it can be compared against the declared one.
//!
//! Both backends funnel every type name and default expression through
//! [`crate::canon`] on the way in, exactly like the declared-SQL parser does,
//! so the two sides of a diff are directly comparable.

pub mod postgres;
pub mod sqlite;

pub use postgres::introspect_postgres;
pub use sqlite::introspect_sqlite;
