//! Import pipeline
//!
//! [`EpgImporter`] pops sources off a [`SourceQueue`], fetches their
//! content with URL failover, runs the parse-and-commit loop on an
//! [`ExecutionBackend`] and closes the run with a single completion
//! callback.

pub mod backend;
pub mod commit;
pub mod fetch;
pub mod importer;
pub mod legacy;
pub mod queue;
pub mod status;

pub use backend::{ExecutionBackend, ExecutionMode, JobOutcome, ParseJob};
pub use commit::Committer;
pub use fetch::{Fetcher, PrimaryInput};
pub use importer::{DoneCallback, EpgImporter, ImportCompletion};
pub use queue::{QueueOrder, SourceQueue};
pub use status::{ImportPhase, ImportStatus, StatusReceiver, StatusReporter};
