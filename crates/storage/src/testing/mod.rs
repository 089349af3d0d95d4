//! Test engines
//!
//! Engine wrappers used by the upper crates' tests:
//!
//! - **CountingEngine**: delegates to another engine, counts opens and
//!   deletes, and yields to the runtime inside `open` so concurrent callers
//!   interleave
//! - **UnavailableEngine**: fails the capability probe and every request
//!
//! # Example
//!
//! ```ignore
//! use cairn_storage::testing::CountingEngine;
//! use cairn_storage::EmbeddedEngine;
//!
//! let engine = CountingEngine::new(EmbeddedEngine::ephemeral());
//! // ... drive a store handle ...
//! assert_eq!(engine.opens(), 1);
//! ```

mod engines;

pub use engines::{CountingEngine, UnavailableEngine};
