//! Schema change notifications → extraction passes.
//!
//! The bridge owns the schema subscription. It holds only a weak reference to
//! the engine, so a disposed or dropped engine is never touched again, and
//! dropping the bridge aborts its task and releases the subscription.

use crate::engine::EngineInner;
use crate::schema::SchemaChanged;
use log::{debug, warn};
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time;

pub(crate) struct Bridge {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Bridge {
    pub(crate) fn spawn(
        runtime: &Handle,
        engine: Weak<EngineInner>,
        changes: broadcast::Receiver<SchemaChanged>,
        debounce: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = runtime.spawn(run_bridge(engine, changes, shutdown_rx, debounce));
        Self {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.task.abort();
    }
}

async fn run_bridge(
    engine: Weak<EngineInner>,
    mut changes: broadcast::Receiver<SchemaChanged>,
    mut shutdown_rx: oneshot::Receiver<()>,
    debounce: Duration,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            event = changes.recv() => match event {
                Ok(SchemaChanged) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Schema listener lagged, {skipped} notifications folded into one pass");
                }
                Err(RecvError::Closed) => {
                    debug!("Schema notification channel closed");
                    break;
                }
            },
        }

        if !debounce.is_zero() {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                () = time::sleep(debounce) => {}
            }
        }
        let folded = drain(&mut changes);
        if folded > 0 {
            debug!("Folded {folded} extra schema notifications");
        }

        let Some(engine) = engine.upgrade() else {
            break;
        };
        engine.on_schema_changed();
    }
}

fn drain(changes: &mut broadcast::Receiver<SchemaChanged>) -> usize {
    let mut folded = 0;
    loop {
        match changes.try_recv() {
            Ok(SchemaChanged) | Err(TryRecvError::Lagged(_)) => folded += 1,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return folded,
        }
    }
}
