//! Bulk mutations driven item by item, with progress and a result report.

mod delete;
mod progress;
mod report;

pub use delete::{Operation, OperationOptions};
pub use progress::{FnProgress, Progress, ProgressEvent, ProgressObserver};
pub use report::{OperationError, OperationReport, Outcome};
