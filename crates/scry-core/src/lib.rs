//! # scry-core
//! Foundation types for the Scry projection engine: the snapshot data model,
//! the binary snapshot codec, consensus capacity constants, and the template
//! output types published to consumers.

pub mod constants;
pub mod error;
pub mod snapshot;
pub mod template;
pub mod types;
