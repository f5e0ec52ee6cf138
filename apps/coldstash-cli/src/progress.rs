//! Transfer progress on stderr.

use std::io::Write;

use coldstash_transfer::{ProcessController, TransferState, TransferStatus};
use coldstash_vault::VaultError;
use tracing::warn;

/// Returns a status listener that redraws one progress line per push.
pub(crate) fn printer(label: String) -> impl Fn(TransferStatus) + Send + Sync + 'static {
    move |status: TransferStatus| {
        let mut err = std::io::stderr().lock();
        let _ = write!(
            err,
            "\r{label}: {:>5.1}% ({}/{} chunks, {})",
            status.percentage(),
            status.current_offset,
            status.max_position,
            format_bytes(status.bytes_transferred),
        );
        match status.state {
            TransferState::Completed => {
                let _ = writeln!(err, " done");
            }
            TransferState::Aborted => {
                let _ = writeln!(err, " aborted");
            }
            TransferState::Failed => {
                let _ = writeln!(err, " failed");
            }
            TransferState::Pending | TransferState::InProgress => {}
        }
        let _ = err.flush();
    }
}

/// Waits for the transfer, aborting it on Ctrl-C.
pub(crate) async fn wait_or_abort<T>(controller: &ProcessController<T>) -> TransferStatus {
    tokio::select! {
        status = controller.wait() => status,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, aborting at the next chunk boundary");
            controller.abort();
            controller.wait().await
        }
    }
}

/// Turns a joined transfer result into the command's outcome.
pub(crate) fn finished<T>(
    what: &str,
    status: &TransferStatus,
    result: Result<T, VaultError>,
) -> anyhow::Result<T> {
    result.map_err(|e| anyhow::anyhow!("{what} ended in state {:?}: {e}", status.state))
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
