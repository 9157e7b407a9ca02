//! Category inputs: directory layout, class registry and image discovery.

pub mod discovery;
pub mod layout;
pub mod registry;

pub use discovery::{ImageLister, QueryCorpus};
pub use layout::CategoryLayout;
pub use registry::{ClassLabel, ClassRegistry};
