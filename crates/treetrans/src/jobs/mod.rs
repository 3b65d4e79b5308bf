pub mod artifacts;
pub mod orchestrator;
pub mod record;
pub mod store;
pub mod view;

pub use artifacts::{ArchiveDownload, FileContent, OutputFile};
pub use orchestrator::{
    parse_allowed_extensions, parse_allowed_extensions_csv, JobOutcome, JobRequest, JobService,
    JobSource, CANCELLED_MESSAGE, DEFAULT_ALLOWED_EXTENSIONS,
};
pub use record::{JobProgress, JobRecord, JobStatus, JobUpdate, NewJob, SourceKind};
pub use store::JobStore;
pub use view::{to_public_view, JobPublicView};
