//! Main event loop
//!
//! One task receives events, classifies them, and hands them to the manager,
//! finishing each before receiving the next.

use std::future::Future;

use tracing::{debug, info, warn};

use crate::hub::EventSource;
use crate::state::RoomStateManager;
use crate::store::StateStore;

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    SourceClosed,
}

/// Counters kept while the loop runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub received: u64,
    pub handled: u64,
    pub failed: u64,
}

/// Process events until the source closes or `shutdown` resolves
pub async fn run<S, E>(
    manager: &mut RoomStateManager<S>,
    source: &mut E,
    shutdown: impl Future<Output = ()>,
) -> (StopReason, LoopStats)
where
    S: StateStore,
    E: EventSource + ?Sized,
{
    let mut stats = LoopStats::default();
    tokio::pin!(shutdown);

    info!("Listening for events in {}", manager.room());
    let reason = loop {
        tokio::select! {
            event = source.next_event() => {
                let Some(event) = event else {
                    break StopReason::SourceClosed;
                };
                stats.received += 1;

                let room_event = event.classify();
                if room_event.is_ignored() {
                    continue;
                }
                debug!("Handling event of type: {}", event.key);

                stats.handled += 1;
                if let Err(e) = manager.handle_event(&room_event).await {
                    stats.failed += 1;
                    warn!(
                        device = %event.target_device.device_id,
                        "Dropped {} event: {}",
                        room_event.kind(),
                        e
                    );
                }
            }
            _ = &mut shutdown => {
                break StopReason::Shutdown;
            }
        }
    };

    info!(
        received = stats.received,
        handled = stats.handled,
        failed = stats.failed,
        "Event loop stopped: {:?}",
        reason
    );
    (reason, stats)
}
