use std::num::NonZeroUsize;

use compio::dispatcher::{Dispatcher, DispatcherBuilder};
use futures_channel::oneshot::Canceled;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::item::Item;
use crate::operation::{Operation, OperationOptions, OperationReport, ProgressObserver};
use crate::provider::ProviderError;
use crate::tree::{NodeId, Tree};

/// Outcome of a bulk delete run on the worker.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    /// Every item and everything below it was removed.
    pub success: bool,
    pub report: OperationReport,
}

/// Runs aggregation and bulk deletion off the caller's thread.
///
/// Work is handed over by value and handed back when done, so a tree is only
/// ever touched by one operation at a time.
pub struct Worker {
    dispatcher: Dispatcher,
}

impl Worker {
    pub fn new() -> Result<Self, WorkerCreationError> {
        let dispatcher = DispatcherBuilder::new()
            .worker_threads(NonZeroUsize::MIN)
            .build()
            .context(DispatcherSnafu)?;
        debug!("Started worker thread");
        Ok(Self { dispatcher })
    }

    /// Aggregates sizes below `id` and returns the tree. On a fault the tree is
    /// dropped, since its partial state cannot be resumed.
    pub async fn get_sizes(&self, tree: Tree, id: NodeId) -> Result<Tree, WorkerError> {
        let receiver = self
            .dispatcher
            .dispatch(move || async move {
                let mut tree = tree;
                tree.get_sizes(id).map(|()| tree)
            })
            .map_err(|e| WorkerError::DispatchError {
                error: e.to_string(),
            })?;

        let result = receiver.await.context(CanceledSnafu)?;
        result.context(AggregationSnafu)
    }

    /// Removes every item (recursively for directories) and reports what stayed.
    pub async fn delete(
        &self,
        items: Vec<Item>,
        force: bool,
        options: OperationOptions,
        observer: Option<Box<dyn ProgressObserver>>,
    ) -> Result<DeleteOutcome, WorkerError> {
        let count = items.len();
        let receiver = self
            .dispatcher
            .dispatch(move || async move {
                let mut operation = Operation::new(options);
                if let Some(observer) = observer {
                    operation = operation.with_observer(observer);
                }
                let success = operation.delete_all(&items, force);
                DeleteOutcome {
                    success,
                    report: operation.into_report(),
                }
            })
            .map_err(|e| WorkerError::DispatchError {
                error: e.to_string(),
            })?;
        info!("Dispatched removal of {} items", count);

        receiver.await.context(CanceledSnafu)
    }

    /// Waits for dispatched work to finish and stops the worker thread.
    pub async fn shutdown(self) -> Result<(), WorkerError> {
        self.dispatcher.join().await.context(ShutdownSnafu)
    }
}

#[derive(Debug, Snafu)]
pub enum WorkerCreationError {
    #[snafu(display("Failed to start the worker thread"))]
    DispatcherError { source: std::io::Error },
}

#[derive(Debug, Snafu)]
pub enum WorkerError {
    #[snafu(display("Failed to hand work to the worker: {}", error))]
    DispatchError { error: String },
    #[snafu(display("The worker dropped the work before finishing it"))]
    CanceledError { source: Canceled },
    #[snafu(display("Size aggregation failed"))]
    AggregationError { source: ProviderError },
    #[snafu(display("Failed to stop the worker thread"))]
    ShutdownError { source: std::io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{Progress, ProgressEvent};
    use crate::provider::{DiskProvider, MemoryProvider, Provider, ProviderRef};
    use futures::StreamExt;
    use futures_channel::mpsc;
    use std::path::Path;
    use tempfile::TempDir;

    #[compio::test]
    async fn sizes_are_computed_on_the_worker() {
        let memory = MemoryProvider::new();
        memory
            .add_file("/r/a.bin", vec![0u8; 5])
            .add_file("/r/sub/b.bin", vec![0u8; 6]);
        let provider: ProviderRef = memory;
        let tree = Tree::open(provider, "/r").expect("Failed to open tree");

        let worker = Worker::new().expect("Failed to start worker");
        let tree = worker
            .get_sizes(tree, NodeId::ROOT)
            .await
            .expect("Aggregation failed");

        assert_eq!(tree.node(NodeId::ROOT).size(), 11);
        assert!(tree.node(NodeId::ROOT).is_complete());
        worker.shutdown().await.expect("Failed to stop worker");
    }

    #[compio::test]
    async fn listing_fault_is_reported() {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let file = temp.path().join("plain.txt");
        std::fs::write(&file, "x").expect("Failed to write");
        let disk: ProviderRef = DiskProvider::global();
        let item = disk
            .get_item(&file)
            .expect("Failed to query")
            .expect("File exists")
            .with_attributes(crate::item::Attributes::DIRECTORY);

        let worker = Worker::new().expect("Failed to start worker");
        let result = worker.get_sizes(Tree::from_item(disk, item), NodeId::ROOT).await;
        assert!(matches!(result, Err(WorkerError::AggregationError { .. })));
    }

    #[compio::test]
    async fn delete_reports_progress_over_a_channel() {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().join("doomed");
        std::fs::create_dir_all(root.join("inner")).expect("Failed to create dirs");
        std::fs::write(root.join("inner/a.txt"), "aaa").expect("Failed to write");
        std::fs::write(root.join("b.txt"), "bb").expect("Failed to write");

        let item = DiskProvider::global()
            .get_item(&root)
            .expect("Failed to query")
            .expect("Directory exists");
        let (sender, receiver) = mpsc::unbounded();

        let worker = Worker::new().expect("Failed to start worker");
        let outcome = worker
            .delete(vec![item], false, OperationOptions::default(), Some(Box::new(sender)))
            .await
            .expect("Delete failed to run");

        assert!(outcome.success);
        assert_eq!(outcome.report.removed_items, 4);
        assert_eq!(outcome.report.removed_bytes, 5);
        assert!(!Path::new(&root).exists());

        let events: Vec<ProgressEvent> = receiver.collect().await;
        assert_eq!(events.first(), Some(&ProgressEvent::Started));
        assert_eq!(events.last(), Some(&ProgressEvent::Ended));
        assert_eq!(events.len(), 6);
    }
    #[compio::test]
    async fn several_items_report_one_progress_stream() {
        let memory = MemoryProvider::new();
        memory.add_file("/a.txt", "aa").add_file("/b.txt", "bbb");
        let items = vec![
            memory
                .get_item(Path::new("/a.txt"))
                .expect("Failed to query")
                .expect("File exists"),
            memory
                .get_item(Path::new("/b.txt"))
                .expect("Failed to query")
                .expect("File exists"),
        ];
        let (sender, receiver) = mpsc::unbounded();

        let worker = Worker::new().expect("Failed to start worker");
        let outcome = worker
            .delete(items, false, OperationOptions::default(), Some(Box::new(sender)))
            .await
            .expect("Delete failed to run");
        assert!(outcome.success);
        assert_eq!(outcome.report.removed_items, 2);

        let events: Vec<ProgressEvent> = receiver.collect().await;
        assert_eq!(
            events,
            vec![
                ProgressEvent::Started,
                ProgressEvent::Updated(Progress {
                    items_done: 1,
                    items_total: 2,
                    bytes_done: 2,
                    bytes_total: Some(5),
                }),
                ProgressEvent::Updated(Progress {
                    items_done: 2,
                    items_total: 2,
                    bytes_done: 5,
                    bytes_total: Some(5),
                }),
                ProgressEvent::Ended,
            ]
        );
        worker.shutdown().await.expect("Failed to stop worker");
    }
}
