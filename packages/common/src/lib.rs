//! Shared page model for the puck crates.
//!
//! Holds the page document (`Data`), the tree visitors, and the file system
//! seam the demo host persists through.

pub mod data;
pub mod error;
pub mod filesystem;
pub mod visitor;

pub use data::*;
pub use error::*;
pub use filesystem::*;
pub use visitor::*;
