pub mod changeset;
pub mod common;
pub mod meta;
pub mod models;
pub mod node;
pub mod path;
pub mod report;
pub mod statement;

pub use changeset::*;
pub use common::*;
pub use meta::*;
pub use models::*;
pub use node::*;
pub use path::{Path, PathError, PathSegment};
pub use report::*;
pub use statement::*;
