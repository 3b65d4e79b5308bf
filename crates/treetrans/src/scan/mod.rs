//! Enumeration and classification of files in a project tree.

pub mod eligibility;
pub mod tree;
pub mod upload_filter;

pub use eligibility::{is_eligible_for_transform, looks_like_text};
pub use tree::{list_files, DEFAULT_IGNORED_DIRECTORIES};
pub use upload_filter::should_ignore_upload_path;
