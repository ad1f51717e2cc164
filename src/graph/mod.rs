//! Defines the dependency graph rebuilt from the document's connections.
pub mod builder;
pub mod dag;
pub mod edge;

// Re-export key types for convenient access
pub use builder::build;
pub use dag::DependencyGraph;
pub use edge::{Edge, EdgeKind};
