use std::collections::HashSet;
use std::path::{Path, PathBuf};

use snafu::ErrorCompat;
use tracing::{debug, info, warn};

use crate::ext::{BestEffortPathExt, component_depth};
use crate::item::Item;
use crate::operation::{Outcome, OperationReport, Progress, ProgressObserver};
use crate::provider::{ProviderError, ProviderRef};
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationOptions {
    /// Emit start/update/end calls to the observer.
    pub report_progress: bool,
    /// Sum file sizes before starting so progress can be reported by bytes.
    pub count_bytes: bool,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self {
            report_progress: true,
            count_bytes: true,
        }
    }
}

/// A bulk removal that keeps going past per-item failures.
///
/// Each item ends up removed, deferred (declined by its provider) or faulted;
/// the latter two are collected in the [`OperationReport`].
pub struct Operation {
    options: OperationOptions,
    observer: Option<Box<dyn ProgressObserver>>,
    report: OperationReport,
}

impl Operation {
    pub fn new(options: OperationOptions) -> Self {
        Self {
            options,
            observer: None,
            report: OperationReport::default(),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn report(&self) -> &OperationReport {
        &self.report
    }

    pub fn into_report(self) -> OperationReport {
        self.report
    }

    /// Removes `item`, and for a directory everything below it first.
    ///
    /// Returns `true` only if every entry was removed. When the item's provider
    /// cannot remove anything, nothing is attempted or recorded.
    pub fn delete(&mut self, item: &Item, force: bool) -> bool {
        self.delete_all(std::slice::from_ref(item), force)
    }

    /// Recursive removal of several roots as one operation.
    ///
    /// Every root is planned before the first removal, so progress totals
    /// cover the whole batch. A root that is already covered by an earlier
    /// one is not removed twice.
    pub fn delete_all(&mut self, items: &[Item], force: bool) -> bool {
        let mut complete = true;
        let mut planned: HashSet<PathBuf> = HashSet::new();
        let mut plan: Vec<Item> = Vec::new();

        for item in items {
            let Some(provider) = removal_provider(item) else {
                complete = false;
                continue;
            };
            match plan_removal(provider, item) {
                Ok(removal) => plan.extend(
                    removal
                        .into_iter()
                        .filter(|entry| planned.insert(entry.path().to_path_buf())),
                ),
                Err(err) => {
                    warn!(
                        "Failed to list {} for removal: {}",
                        item.path().best_effort_path_display(),
                        err
                    );
                    self.report.record(item, Outcome::Fault(describe(&err)));
                    complete = false;
                }
            }
        }

        if plan.is_empty() {
            return complete;
        }
        self.run(&plan, force) && complete
    }

    /// Removes each item as is, without descending into directories.
    ///
    /// Items must come children before parents. An ancestor listed before one
    /// of its descendants is repaired by a stable deepest-first reorder.
    pub fn delete_many(&mut self, items: &[Item], force: bool) -> bool {
        let mut supported = true;
        let mut plan: Vec<Item> = items
            .iter()
            .filter(|item| {
                let removable = removal_provider(item).is_some();
                supported &= removable;
                removable
            })
            .cloned()
            .collect();

        if !is_children_first(&plan) {
            warn!("Removal list has parents before their children, reordering deepest first");
            plan.sort_by_key(|item| std::cmp::Reverse(component_depth(item.path())));
        }

        self.run(&plan, force) && supported
    }

    fn run(&mut self, plan: &[Item], force: bool) -> bool {
        let mut progress = Progress {
            items_total: plan.len() as u64,
            bytes_total: self
                .options
                .count_bytes
                .then(|| plan.iter().map(Item::size).sum()),
            ..Progress::default()
        };
        info!("Removing {} items", plan.len());
        self.notify(|observer| observer.start());

        let mut blocked: HashSet<PathBuf> = HashSet::new();
        let mut all_removed = true;

        for item in plan {
            let outcome = if blocked.contains(item.path()) {
                debug!(
                    "Skipping {}, something below it stayed",
                    item.path().best_effort_path_display()
                );
                Outcome::Deferred
            } else {
                remove_one(item, force)
            };

            if outcome == Outcome::Removed {
                progress.items_done += 1;
                progress.bytes_done += item.size();
                self.notify(|observer| observer.update(&progress));
            } else {
                all_removed = false;
                block_ancestors(&mut blocked, item.path());
            }
            self.report.record(item, outcome);
        }

        self.notify(|observer| observer.end());
        info!(
            "Removed {} items, {} deferred, {} failed",
            progress.items_done,
            self.report.deferred.len(),
            self.report.errors.len()
        );
        all_removed
    }

    fn notify(&mut self, call: impl FnOnce(&mut dyn ProgressObserver)) {
        if !self.options.report_progress {
            return;
        }
        if let Some(observer) = self.observer.as_deref_mut() {
            call(observer);
        }
    }
}

/// The item's provider, if it is alive and allowed to remove entries.
fn removal_provider(item: &Item) -> Option<ProviderRef> {
    let provider = item.provider()?;
    if !provider.capabilities().allows_removal() {
        debug!(
            "Provider '{}' cannot remove {}",
            provider.name(),
            item.path().best_effort_path_display()
        );
        return None;
    }
    Some(provider)
}

/// Children-before-parents list ending with `item` itself.
fn plan_removal(provider: ProviderRef, item: &Item) -> Result<Vec<Item>, ProviderError> {
    if !item.is_directory() {
        return Ok(vec![item.clone()]);
    }

    let mut tree = Tree::from_item(provider, item.clone());
    let mut plan: Vec<Item> = tree
        .post_order(NodeId::ROOT)?
        .into_iter()
        .map(|id| tree.node(id).item().clone())
        .collect();
    plan.push(item.clone());
    Ok(plan)
}

fn remove_one(item: &Item, force: bool) -> Outcome {
    let Some(provider) = item.provider() else {
        return Outcome::Fault("provider is no longer available".to_string());
    };
    match provider.remove_item(item.path(), force) {
        Ok(true) => Outcome::Removed,
        Ok(false) => {
            debug!("Removal of {} deferred", item.path().best_effort_path_display());
            Outcome::Deferred
        }
        Err(err) => {
            warn!("{}", describe(&err));
            Outcome::Fault(describe(&err))
        }
    }
}

fn describe(err: &ProviderError) -> String {
    ErrorCompat::iter_chain(err)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

fn block_ancestors(blocked: &mut HashSet<PathBuf>, path: &Path) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() || !blocked.insert(ancestor.to_path_buf()) {
            break;
        }
    }
}

/// True when no item is preceded by one of its ancestors.
fn is_children_first(items: &[Item]) -> bool {
    let mut seen: HashSet<&Path> = HashSet::new();
    for item in items {
        if item.path().ancestors().skip(1).any(|ancestor| seen.contains(ancestor)) {
            return false;
        }
        seen.insert(item.path());
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{FnProgress, ProgressEvent};
    use crate::provider::testing::FaultyProvider;
    use crate::provider::{Capabilities, MemoryProvider, Provider};
    use std::sync::{Arc, Mutex};

    fn item(provider: &dyn Provider, path: &str) -> Item {
        provider
            .get_item(Path::new(path))
            .expect("Failed to query")
            .expect("Item exists")
    }

    fn tree_fixture() -> Arc<MemoryProvider> {
        let memory = MemoryProvider::new();
        memory
            .add_file("/A/B/c.txt", vec![0u8; 3])
            .add_file("/A/d.txt", vec![0u8; 4]);
        memory
    }

    #[test]
    fn directory_is_removed_depth_first() {
        let faulty = FaultyProvider::new(tree_fixture(), &[]);
        let target = item(faulty.as_ref(), "/A");

        let mut operation = Operation::new(OperationOptions::default());
        assert!(operation.delete(&target, false));

        assert_eq!(
            faulty.removals(),
            vec![
                PathBuf::from("/A/B/c.txt"),
                PathBuf::from("/A/B"),
                PathBuf::from("/A/d.txt"),
                PathBuf::from("/A"),
            ]
        );
        let report = operation.into_report();
        assert!(report.is_clean());
        assert_eq!(report.removed_items, 4);
        assert_eq!(report.removed_bytes, 7);
        assert!(!faulty.exists(Path::new("/A")));
    }

    #[test]
    fn one_fault_does_not_stop_the_rest() {
        let memory = MemoryProvider::new();
        memory
            .add_file("/one.txt", "1")
            .add_file("/two.txt", "2")
            .add_file("/three.txt", "3");
        let faulty = FaultyProvider::new(memory, &["/two.txt"]);
        let items: Vec<Item> = ["/one.txt", "/two.txt", "/three.txt"]
            .iter()
            .map(|path| item(faulty.as_ref(), path))
            .collect();

        let mut operation = Operation::new(OperationOptions::default());
        assert!(!operation.delete_many(&items, false));

        let report = operation.report();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, PathBuf::from("/two.txt"));
        assert!(report.errors[0].message.contains("injected removal fault"));
        assert!(!faulty.exists(Path::new("/one.txt")));
        assert!(faulty.exists(Path::new("/two.txt")));
        assert!(!faulty.exists(Path::new("/three.txt")));
    }

    #[test]
    fn read_only_provider_is_never_asked() {
        let faulty = FaultyProvider::with_capabilities(
            tree_fixture(),
            &[],
            Capabilities::READ_ONLY,
        );
        let target = item(faulty.as_ref(), "/A");

        let mut operation = Operation::new(OperationOptions::default());
        assert!(!operation.delete(&target, true));
        assert!(!operation.delete_many(std::slice::from_ref(&target), true));

        assert!(faulty.removals().is_empty());
        assert!(operation.report().is_clean());
        assert_eq!(operation.report().removed_items, 0);
    }

    #[test]
    fn declined_entries_are_deferred_and_block_their_parents() {
        let memory = tree_fixture();
        memory.set_read_only("/A/B/c.txt", true);
        let faulty = FaultyProvider::new(memory, &[]);
        let target = item(faulty.as_ref(), "/A");

        let mut operation = Operation::new(OperationOptions::default());
        assert!(!operation.delete(&target, false));

        let report = operation.into_report();
        let deferred: Vec<&Path> = report.deferred.iter().map(Item::path).collect();
        assert_eq!(
            deferred,
            vec![Path::new("/A/B/c.txt"), Path::new("/A/B"), Path::new("/A")]
        );
        assert!(report.errors.is_empty());
        assert_eq!(
            faulty.removals(),
            vec![PathBuf::from("/A/B/c.txt"), PathBuf::from("/A/d.txt")]
        );
    }

    #[test]
    fn parents_listed_first_are_reordered() {
        let faulty = FaultyProvider::new(tree_fixture(), &[]);
        let items: Vec<Item> = ["/A", "/A/B", "/A/d.txt", "/A/B/c.txt"]
            .iter()
            .map(|path| item(faulty.as_ref(), path))
            .collect();

        let mut operation = Operation::new(OperationOptions::default());
        assert!(operation.delete_many(&items, false));
        assert_eq!(
            faulty.removals(),
            vec![
                PathBuf::from("/A/B/c.txt"),
                PathBuf::from("/A/B"),
                PathBuf::from("/A/d.txt"),
                PathBuf::from("/A"),
            ]
        );
    }

    #[test]
    fn progress_reports_each_removal() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let faulty = FaultyProvider::new(tree_fixture(), &[]);
        let target = item(faulty.as_ref(), "/A");

        let mut operation = Operation::new(OperationOptions::default()).with_observer(Box::new(
            FnProgress(move |event: ProgressEvent| sink.lock().expect("poisoned").push(event)),
        ));
        assert!(operation.delete(&target, false));

        let events = events.lock().expect("poisoned");
        assert_eq!(events.len(), 6);
        assert_eq!(events[0], ProgressEvent::Started);
        assert_eq!(events[5], ProgressEvent::Ended);
        let ProgressEvent::Updated(last) = &events[4] else {
            panic!("Expected an update, got {:?}", events[4]);
        };
        assert_eq!(last.items_done, 4);
        assert_eq!(last.items_total, 4);
        assert_eq!(last.bytes_total, Some(7));
        assert_eq!(last.fraction(), Some(1.0));
    }

    #[test]
    fn several_roots_share_one_progress_stream() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let memory = tree_fixture();
        memory.add_file("/other.bin", vec![0u8; 5]);
        let faulty = FaultyProvider::new(memory, &[]);
        let roots = vec![
            item(faulty.as_ref(), "/A"),
            item(faulty.as_ref(), "/other.bin"),
            item(faulty.as_ref(), "/A/d.txt"),
        ];

        let mut operation = Operation::new(OperationOptions::default()).with_observer(Box::new(
            FnProgress(move |event: ProgressEvent| sink.lock().expect("poisoned").push(event)),
        ));
        assert!(operation.delete_all(&roots, false));

        let events = events.lock().expect("poisoned");
        let started = events.iter().filter(|e| **e == ProgressEvent::Started).count();
        let ended = events.iter().filter(|e| **e == ProgressEvent::Ended).count();
        assert_eq!((started, ended), (1, 1));
        let updates: Vec<&Progress> = events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Updated(progress) => Some(progress),
                _ => None,
            })
            .collect();
        assert_eq!(updates.len(), 5);
        assert!(updates.iter().all(|p| p.items_total == 5 && p.bytes_total == Some(12)));
        assert_eq!(updates[0].fraction().map(|f| f < 1.0), Some(true));
        assert_eq!(
            faulty.removals(),
            vec![
                PathBuf::from("/A/B/c.txt"),
                PathBuf::from("/A/B"),
                PathBuf::from("/A/d.txt"),
                PathBuf::from("/A"),
                PathBuf::from("/other.bin"),
            ]
        );
    }

    #[test]
    fn batch_skips_roots_it_cannot_remove() {
        let memory = MemoryProvider::new();
        memory.add_file("/kept.txt", "k");
        let read_only = FaultyProvider::with_capabilities(memory, &[], Capabilities::READ_ONLY);
        let writable = FaultyProvider::new(tree_fixture(), &[]);
        let roots = vec![
            item(read_only.as_ref(), "/kept.txt"),
            item(writable.as_ref(), "/A/d.txt"),
        ];

        let mut operation = Operation::new(OperationOptions::default());
        assert!(!operation.delete_all(&roots, false));

        assert!(read_only.removals().is_empty());
        assert_eq!(writable.removals(), vec![PathBuf::from("/A/d.txt")]);
        assert_eq!(operation.report().removed_items, 1);
    }

    #[test]
    fn progress_can_be_silenced() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let faulty = FaultyProvider::new(tree_fixture(), &[]);
        let target = item(faulty.as_ref(), "/A/d.txt");

        let options = OperationOptions {
            report_progress: false,
            count_bytes: false,
        };
        let mut operation = Operation::new(options).with_observer(Box::new(FnProgress(
            move |event: ProgressEvent| sink.lock().expect("poisoned").push(event),
        )));
        assert!(operation.delete(&target, false));
        assert!(events.lock().expect("poisoned").is_empty());
    }
}
