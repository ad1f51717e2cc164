//! Persisted, transactional tree of Nodes owning typed Parameters.
pub mod document;
pub mod error;
pub mod node;
pub mod parameter;
pub mod types;

pub use document::{Document, Partition};
pub use error::StoreError;
pub use node::Node;
pub use parameter::Parameter;
pub use types::*;
