//! Background polling of a connected session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::session::SessionInner;

/// Bound on how long `stop` waits for the poller to wind down. Covers a
/// poller that is mid-read with the configured read timeout still running.
const STOP_GRACE: Duration = Duration::from_secs(2);

pub(crate) struct MonitorHandle {
    task: JoinHandle<()>,
    stop_tx: mpsc::Sender<()>,
}

impl MonitorHandle {
    pub(crate) fn abort(self) {
        self.task.abort();
    }
}

/// Spawn the polling task for a freshly connected session.
pub(crate) fn start(inner: Arc<SessionInner>) -> MonitorHandle {
    let (stop_tx, stop_rx) = mpsc::channel(1);
    let task = tokio::spawn(monitor_loop(inner, stop_rx));
    MonitorHandle { task, stop_tx }
}

/// Signal the poller and wait, bounded, for it to finish.
pub(crate) async fn stop(handle: MonitorHandle) {
    let _ = handle.stop_tx.send(()).await;
    if timeout(STOP_GRACE, handle.task).await.is_err() {
        log::warn!("Scale monitor did not stop within {:?}", STOP_GRACE);
    }
}

async fn monitor_loop(inner: Arc<SessionInner>, mut stop_rx: mpsc::Receiver<()>) {
    let interval = Duration::from_millis(inner.config.monitor_interval_ms);
    log::info!("Scale monitor started, polling every {:?}", interval);

    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        // A failed read already reached subscribers as an event; a single
        // bad frame must not kill the poller. The interval is the only
        // backoff.
        if let Err(e) = inner.read_once().await {
            log::debug!("Monitor read failed: {}", e);
        }

        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    log::info!("Scale monitor stopped");
}
