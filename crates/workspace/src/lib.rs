//! Session workspace management: directory layout, path containment,
//! atomic file I/O, artifact collection, and scheduled cleanup.

pub mod files;
pub mod manager;
pub mod paths;
pub mod plan_doc;

pub use manager::WorkspaceManager;
pub use paths::validate_path;
pub use plan_doc::PlanDocument;
