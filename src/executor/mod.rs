mod worker;

pub use worker::{DeleteOutcome, Worker, WorkerCreationError, WorkerError};
