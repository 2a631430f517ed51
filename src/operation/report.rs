use std::fmt;
use std::path::PathBuf;

use crate::ext::BestEffortPathExt;
use crate::item::Item;

/// What happened to one item of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Removed,
    /// The provider declined without a fault.
    Deferred,
    Fault(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.best_effort_path_display(), self.message)
    }
}

/// Results of one operation, in the order items were processed.
#[derive(Debug, Clone, Default)]
pub struct OperationReport {
    pub deferred: Vec<Item>,
    pub errors: Vec<OperationError>,
    pub removed_items: u64,
    pub removed_bytes: u64,
}

impl OperationReport {
    pub(crate) fn record(&mut self, item: &Item, outcome: Outcome) {
        match outcome {
            Outcome::Removed => {
                self.removed_items += 1;
                self.removed_bytes += item.size();
            }
            Outcome::Deferred => self.deferred.push(item.clone()),
            Outcome::Fault(message) => self.errors.push(OperationError {
                path: item.path().to_path_buf(),
                message,
            }),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.deferred.is_empty() && self.errors.is_empty()
    }
}
