use std::io::{self, IsTerminal, Write};

use futures::StreamExt;
use futures_channel::mpsc::UnboundedReceiver;
use humansize::{BINARY, format_size};
use tracing::trace;

use providerfs::operation::{Progress, ProgressEvent};

/// Draws progress events on one stderr line until the sender goes away.
pub async fn render_progress(mut receiver: UnboundedReceiver<ProgressEvent>) {
    let interactive = io::stderr().is_terminal();
    let mut drawn = false;

    while let Some(event) = receiver.next().await {
        match event {
            ProgressEvent::Started => {}
            ProgressEvent::Updated(progress) if interactive => {
                draw(&mut io::stderr().lock(), &progress);
                drawn = true;
            }
            ProgressEvent::Updated(_) => {}
            ProgressEvent::Ended if drawn => eprintln!(),
            ProgressEvent::Ended => {}
        }
    }
}

fn draw(out: &mut impl Write, progress: &Progress) {
    let share = match progress.fraction() {
        Some(fraction) => format!("{:>3.0}%", fraction * 100.0),
        None => "...".to_string(),
    };
    let drawn = write!(
        out,
        "\rRemoving {share}  {}/{} items, {}",
        progress.items_done,
        progress.items_total,
        format_size(progress.bytes_done, BINARY)
    )
    .and_then(|()| out.flush());
    if let Err(err) = drawn {
        trace!("Failed to draw progress: {}", err);
    }
}
