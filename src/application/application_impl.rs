use std::path::Path;

use colored::Colorize;
use futures_channel::mpsc;
use humansize::{BINARY, format_size};
use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use providerfs::config::{Settings, SettingsError};
use providerfs::executor::{Worker, WorkerCreationError, WorkerError};
use providerfs::ext::BestEffortPathExt;
use providerfs::item::Item;
use providerfs::ordering::{ItemComparer, SortOrder, sort_items};
use providerfs::provider::{
    DiskProvider, DriveProvider, Pattern, Provider, ProviderError, ProviderRef, search,
};
use providerfs::tree::{NodeId, Tree, TreeError};

use crate::application::RuntimeConfig;
use crate::application::progress::render_progress;
use crate::cli::Command;

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        let settings = Settings::read(&app_config.settings_path)
            .await
            .context(SettingsSnafu)?;
        debug!("Loaded settings: {:?}", settings);

        match app_config.command {
            Command::List {
                path,
                pattern,
                order,
            } => list(&path, pattern.as_deref(), order.unwrap_or(settings.order)),
            Command::Sizes { path, depth } => sizes(&path, depth).await,
            Command::Find { path, pattern } => find(&path, &pattern),
            Command::Drives => drives(),
            Command::Delete { paths, force } => {
                delete(&paths, force || settings.delete.force, &settings).await
            }
        }
    }
}

/// The drive list answers the empty path; everything else is on disk.
fn provider_for(path: &str) -> ProviderRef {
    if path.trim().is_empty() {
        DriveProvider::global()
    } else {
        DiskProvider::global()
    }
}

fn print_item(item: &Item) {
    let size = if item.is_directory() {
        String::new()
    } else {
        format_size(item.size(), BINARY)
    };
    let name = if item.is_directory() {
        item.name().blue().bold()
    } else {
        item.name().normal()
    };
    println!(
        "{} {:>12}  {:<16} {}",
        item.attributes(),
        size,
        item.type_label(),
        name
    );
}

fn list(path: &str, pattern: Option<&str>, order: SortOrder) -> Result<(), ApplicationError> {
    let provider = provider_for(path);
    let path = provider.normalize_path(path);
    let pattern = Pattern::new(pattern.unwrap_or_default()).context(PatternSnafu)?;

    let mut items = provider
        .get_child_items(Path::new(&path), &pattern)
        .context(ProviderSnafu)?
        .collect::<Result<Vec<_>, _>>()
        .context(ProviderSnafu)?;
    sort_items(&mut items, order);

    for item in &items {
        print_item(item);
    }
    info!("Listed {} items ordered by {}", items.len(), order);
    Ok(())
}

async fn sizes(path: &str, depth: usize) -> Result<(), ApplicationError> {
    let tree = Tree::open(provider_for(path), path).context(TreeSnafu)?;

    let worker = Worker::new().context(WorkerCreationSnafu)?;
    let mut tree = worker
        .get_sizes(tree, NodeId::ROOT)
        .await
        .context(WorkerSnafu)?;
    worker.shutdown().await.context(WorkerSnafu)?;

    let by_size = ItemComparer::new(SortOrder::SizeDesc);
    let mut stack = vec![NodeId::ROOT];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        let label = if id == NodeId::ROOT {
            node.item().path().best_effort_path_display()
        } else {
            node.name().to_string()
        };
        let label = if node.is_directory() {
            label.as_str().blue().bold()
        } else {
            label.as_str().normal()
        };
        println!(
            "{:>12}  {}{}",
            format_size(node.size(), BINARY),
            "  ".repeat(node.depth()),
            label
        );

        if node.depth() < depth {
            tree.sort_children(id, &by_size);
            if let Some(children) = tree.children(id) {
                stack.extend(children.iter().rev());
            }
        }
    }
    Ok(())
}

fn find(path: &str, pattern: &str) -> Result<(), ApplicationError> {
    let provider = provider_for(path);
    let root = provider.normalize_path(path);
    let pattern = Pattern::new(pattern).context(PatternSnafu)?;

    let mut found = 0usize;
    for result in search(provider, root, pattern) {
        match result {
            Ok(item) => {
                found += 1;
                println!("{}", item.path().display());
            }
            Err(err) => warn!("{}", err),
        }
    }
    info!("Found {} matching items", found);
    Ok(())
}

fn drives() -> Result<(), ApplicationError> {
    let volumes = DriveProvider::global().volumes().context(ProviderSnafu)?;
    for volume in volumes {
        let capacity = match volume.capacity() {
            Ok(capacity) => format!(
                "{:>12} free of {:>12}",
                format_size(capacity.available, BINARY),
                format_size(capacity.total, BINARY)
            ),
            Err(err) => {
                debug!("No capacity for {}: {}", volume.mount_point.display(), err);
                "capacity unknown".dimmed().to_string()
            }
        };
        println!(
            "{:<24} {:<12} {}  {}",
            volume.mount_point.display().to_string().as_str().bold(),
            volume.fs_type,
            capacity,
            volume.label
        );
    }
    Ok(())
}

async fn delete(paths: &[String], force: bool, settings: &Settings) -> Result<(), ApplicationError> {
    let disk = DiskProvider::global();
    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        let normalized = disk.normalize_path(path);
        match disk.get_item(Path::new(&normalized)).context(ProviderSnafu)? {
            Some(item) => items.push(item),
            None => warn!("Nothing to delete at {}", normalized),
        }
    }
    if items.is_empty() {
        return Ok(());
    }

    let options = settings.operation_options();
    let (sender, receiver) = mpsc::unbounded();
    let worker = Worker::new().context(WorkerCreationSnafu)?;
    let (outcome, ()) = futures::join!(
        worker.delete(items, force, options, Some(Box::new(sender))),
        render_progress(receiver)
    );
    let outcome = outcome.context(WorkerSnafu)?;
    worker.shutdown().await.context(WorkerSnafu)?;

    let report = &outcome.report;
    println!(
        "Removed {} items ({})",
        report.removed_items.to_string().as_str().green(),
        format_size(report.removed_bytes, BINARY)
    );
    for item in &report.deferred {
        println!("{} {}", "skipped".yellow(), item.path().display());
    }
    for error in &report.errors {
        println!("{} {}", "failed".red(), error);
    }

    ensure!(
        outcome.success,
        IncompleteDeleteSnafu {
            deferred: report.deferred.len(),
            failed: report.errors.len(),
        }
    );
    Ok(())
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while reading settings"))]
    SettingsError { source: SettingsError },
    #[snafu(display("Invalid pattern"))]
    PatternError { source: ProviderError },
    #[snafu(display("Failed to query the provider"))]
    ProviderError { source: ProviderError },
    #[snafu(display("Failed to open the tree"))]
    TreeError { source: TreeError },
    #[snafu(display("Critical failure encountered during worker creation"))]
    WorkerCreationError { source: WorkerCreationError },
    #[snafu(display("Critical failure encountered while running on the worker"))]
    WorkerError { source: WorkerError },
    #[snafu(display("Delete incomplete: {} items skipped, {} failed", deferred, failed))]
    IncompleteDelete { deferred: usize, failed: usize },
}
