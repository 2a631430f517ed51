use futures_channel::mpsc::UnboundedSender;
use tracing::trace;

/// Snapshot of a running bulk operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub items_done: u64,
    pub items_total: u64,
    pub bytes_done: u64,
    /// `None` when byte totals were not computed up front.
    pub bytes_total: Option<u64>,
}

impl Progress {
    /// Completed share in `0.0..=1.0`, by bytes when known and by items otherwise.
    /// `None` means indeterminate.
    pub fn fraction(&self) -> Option<f64> {
        match self.bytes_total {
            Some(total) if total > 0 => Some((self.bytes_done as f64 / total as f64).min(1.0)),
            _ if self.items_total > 0 => {
                Some((self.items_done as f64 / self.items_total as f64).min(1.0))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started,
    Updated(Progress),
    Ended,
}

/// Receives progress of a bulk operation. Calls are fire-and-forget.
pub trait ProgressObserver: Send {
    fn start(&mut self);

    fn update(&mut self, progress: &Progress);

    fn end(&mut self);
}

impl ProgressObserver for UnboundedSender<ProgressEvent> {
    fn start(&mut self) {
        send(self, ProgressEvent::Started);
    }

    fn update(&mut self, progress: &Progress) {
        send(self, ProgressEvent::Updated(*progress));
    }

    fn end(&mut self) {
        send(self, ProgressEvent::Ended);
    }
}

fn send(sender: &UnboundedSender<ProgressEvent>, event: ProgressEvent) {
    if let Err(err) = sender.unbounded_send(event) {
        trace!("Progress receiver is gone: {}", err);
    }
}

/// Adapts a closure over [`ProgressEvent`] into an observer.
pub struct FnProgress<F>(pub F);

impl<F> ProgressObserver for FnProgress<F>
where
    F: FnMut(ProgressEvent) + Send,
{
    fn start(&mut self) {
        (self.0)(ProgressEvent::Started);
    }

    fn update(&mut self, progress: &Progress) {
        (self.0)(ProgressEvent::Updated(*progress));
    }

    fn end(&mut self) {
        (self.0)(ProgressEvent::Ended);
    }
}
