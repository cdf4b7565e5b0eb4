//! # docloops-core
//!
//! Closed-loop document improvement: evaluate a document, rewrite it
//! against its weakest areas, re-evaluate, and keep the best revision.
//!
//! ```rust,ignore
//! let collaborators = Collaborators::new().register("readme", evaluator, improver);
//! let controller = CycleController::new(collaborators, logger).with_history(history);
//! let record = controller
//!     .run_cycle(Document::new(content, "readme"), &CycleOptions::default())
//!     .await?;
//! println!("{}", record.format_report());
//! ```

mod archive;
mod collaborators;
mod controller;
mod document;
mod error;
mod improvement;
mod options;
mod records;

pub use archive::CycleArchive;
pub use collaborators::{Collaborators, Registration};
pub use controller::CycleController;
pub use document::{infer_doc_type, Document};
pub use error::CycleError;
pub use improvement::{ImprovementDetails, ImprovementResult};
pub use options::{CycleOptions, SCORE_CEILING};
pub use records::{CycleRecord, FailedAttempt, IterationRecord, StopReason};
