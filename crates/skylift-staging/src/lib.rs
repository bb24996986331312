//! skylift-staging — the staging-completion feedback loop.
//!
//! The build/staging subsystem reports success or failure of preparing an
//! application over the bus. This crate consumes those reports and drives
//! the application's run-or-fail transition exactly once per staging task:
//!
//! - **`messages`** — the staging-completion payload schema
//! - **`backend`** — collaborator seams: application directory, the
//!   direct-desire execution backend, the instance launcher, and the
//!   operator event sink
//! - **`handler`** — `StagingCompletionHandler`, the guarded state machine
//!
//! The handler owns only the validated state transition; execution
//! mechanics live behind the seams.

pub mod backend;
pub mod handler;
pub mod messages;

pub use backend::{
    AppSnapshot, ApplicationDirectory, DesireBackend, InstanceLauncher, OperatorEventSink,
};
pub use handler::{STAGING_FINISHED_SUBJECT, StagingCompletionHandler};
pub use messages::{StagingFailure, StagingMessageError, StagingOutcome, StagingSuccess};
