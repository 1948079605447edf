//! `gurukul-infra` — backing stores and collaborator seams.
//!
//! The principal directory is the single authoritative datastore for
//! identity + credential + application records; session state lives in the
//! sessions crate's own store. Collaborators (notifications, course catalog)
//! are narrow traits with in-process implementations; swapping in real
//! backends touches nothing above this crate.

pub mod courses;
pub mod directory;
pub mod notify;
pub mod pipeline;

pub use courses::{CourseCatalog, StaticCourseCatalog};
pub use directory::{DirectoryError, InMemoryPrincipalDirectory, PrincipalDirectory};
pub use notify::{
    LoggingNotificationDispatcher, NotificationDispatcher, NotificationTemplate, NotifyError,
    RecordingNotificationDispatcher, SentNotification,
};
pub use pipeline::{CommandPipeline, PipelineError};
