//! Operator tables.
//!
//! - `transform`: one handler per operation kind, applied against a record store
//! - `query`: one handler per query expression, answering with transforms

pub mod query;
pub mod transform;
