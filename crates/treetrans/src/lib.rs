pub mod archive;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod path_safety;
pub mod pipeline;
pub mod sanitize;
pub mod scan;
pub mod translator;
pub mod workspace;

pub use archive::{archive_directory, create_zip_from_directory};
pub use config::{load_settings, Settings};
pub use error::{
    ArchiveError, ConfigError, JobError, PathError, Result, ScanError, TreetransError, WorkspaceError,
};
pub use jobs::{
    to_public_view, JobPublicView, JobRecord, JobRequest, JobService, JobSource, JobStatus, JobStore,
};
pub use logging::{init_logging, LogFormat};
pub use path_safety::{normalize_relative_path, resolve_safe_path};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineResult};
pub use scan::{is_eligible_for_transform, list_files, should_ignore_upload_path};
pub use translator::{TranslateContext, TranslateError, Translator, TranslatorRegistry};
pub use workspace::{UploadedFile, WorkspaceManager};
