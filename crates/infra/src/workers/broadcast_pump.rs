use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use resellsync_events::{Broadcaster, EventBus, StatusEvent, Subscription};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    ///
    /// Events already queued in the outbox are delivered before the worker
    /// exits.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Drains the store's outbox into the [`Broadcaster`].
///
/// One pump per outbox keeps delivery in commit order; the commit path only
/// ever pushes onto the outbox channel and never waits on sessions.
#[derive(Debug)]
pub struct BroadcastPump;

impl BroadcastPump {
    /// Subscribe to `outbox` now and spawn the pump thread.
    ///
    /// Events committed after this call returns are guaranteed to reach the
    /// broadcaster.
    pub fn spawn<B>(outbox: &B, broadcaster: Arc<Broadcaster>) -> io::Result<WorkerHandle>
    where
        B: EventBus<StatusEvent>,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = outbox.subscribe();

        let join = thread::Builder::new()
            .name("broadcast-pump".to_string())
            .spawn(move || pump_loop(sub, shutdown_rx, &broadcaster))?;

        info!("broadcast pump started");
        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn pump_loop(
    sub: Subscription<StatusEvent>,
    shutdown_rx: mpsc::Receiver<()>,
    broadcaster: &Broadcaster,
) {
    let tick = Duration::from_millis(100);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            for event in sub.drain() {
                broadcaster.publish(&event);
            }
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(event) => {
                broadcaster.publish(&event);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("broadcast pump stopped");
}
