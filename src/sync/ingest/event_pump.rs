//! Task draining inbound events into the engine.

use std::sync::Arc;

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::sync::engine::core::SyncEngine;
use crate::sync::ingest::inbound_event::InboundEvent;

/// Spawn a task that dispatches every received event to `engine`.
///
/// The task stops when the channel closes or `shutdown` is notified and
/// returns the number of events it dispatched.
#[must_use]
pub fn spawn_event_pump(
    engine: Arc<SyncEngine>,
    mut events: mpsc::Receiver<InboundEvent>,
    shutdown: Arc<Notify>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        info!("Starting event pump");
        let mut dispatched = 0_usize;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Event channel closed");
                        break;
                    };
                    let outcome = engine.dispatch(event);
                    debug!(?outcome, "Dispatched inbound event");
                    dispatched += 1;
                }
                () = shutdown.notified() => {
                    info!("Event pump shutting down");
                    break;
                }
            }
        }

        dispatched
    })
}
