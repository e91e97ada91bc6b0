//! Forward pagination of the notification feed, with viewport auto-fill.
//!
//! Notification pages are tiny, so a freshly opened feed often does not fill
//! its viewport and no scroll event will ever request the next page.
//! `fill_viewport` keeps loading while the viewport is under-filled, spaced
//! by a cooldown and bounded by a cap on consecutive automatic loads.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::sync::core::config::PaginationConfig;
use crate::sync::core::ids::ConversationId;
use crate::sync::pagination::merge::page_has_more;
use crate::sync::pagination::request_slot::RequestSlot;
use crate::sync::pagination::scroll::ViewportProbe;
use crate::sync::pagination::thread_pager::LoadOutcome;
use crate::sync::store::notification_store::NotificationStore;
use crate::sync::transport::client::{ApiResponse, ChatTransport, FetchRequest};

/// Summary of one `fill_viewport` run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoFillReport {
    /// Automatic loads performed.
    pub loads: u32,
    /// The consecutive-load cap was hit.
    pub halted: bool,
}

#[derive(Debug)]
struct FeedState {
    conversation_id: Option<ConversationId>,
    has_more: bool,
    consecutive_auto_loads: u32,
    last_auto_load: Option<Instant>,
}

impl FeedState {
    const fn reset_auto_fill(&mut self) {
        self.consecutive_auto_loads = 0;
        self.last_auto_load = None;
    }
}

enum NextStep {
    Stop,
    Halt,
    Load { wait: Duration },
}

/// Notification feed pager.
pub struct NotificationFeed {
    store: Arc<NotificationStore>,
    transport: Arc<dyn ChatTransport>,
    page_size: usize,
    cooldown: Duration,
    max_consecutive: u32,
    slot: RequestSlot,
    state: Mutex<FeedState>,
}

impl NotificationFeed {
    /// Create a feed with no open conversation.
    #[must_use]
    pub fn new(
        store: Arc<NotificationStore>,
        transport: Arc<dyn ChatTransport>,
        config: &PaginationConfig,
    ) -> Self {
        Self {
            store,
            transport,
            page_size: config.notification_page_size,
            cooldown: Duration::from_millis(config.autofill_cooldown_ms),
            max_consecutive: config.autofill_max_consecutive,
            slot: RequestSlot::new(),
            state: Mutex::new(FeedState {
                conversation_id: None,
                has_more: false,
                consecutive_auto_loads: 0,
                last_auto_load: None,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point the feed at `id`. Any in-flight load becomes stale.
    pub fn open(&self, id: ConversationId) {
        self.slot.invalidate();
        let mut state = self.lock_state();
        state.conversation_id = Some(id);
        state.has_more = true;
        state.reset_auto_fill();
    }

    /// Re-arm pagination and auto-fill for the open conversation.
    pub fn refresh(&self) {
        self.slot.invalidate();
        let mut state = self.lock_state();
        state.has_more = true;
        state.reset_auto_fill();
    }

    /// Whether more notifications may remain on the server.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.lock_state().has_more
    }

    /// Automatic loads since the last reset.
    #[must_use]
    pub fn consecutive_auto_loads(&self) -> u32 {
        self.lock_state().consecutive_auto_loads
    }

    /// Load the next page on user request. Resets the auto-fill counter.
    pub async fn load_more(&self) -> LoadOutcome {
        self.lock_state().reset_auto_fill();
        self.fetch_page().await
    }

    /// Load pages while the viewport reported by `probe` is under-filled.
    pub async fn fill_viewport(&self, probe: &dyn ViewportProbe) -> AutoFillReport {
        let mut report = AutoFillReport::default();
        loop {
            let wait = match self.next_step(probe) {
                NextStep::Stop => break,
                NextStep::Halt => {
                    report.halted = true;
                    break;
                }
                NextStep::Load { wait } => wait,
            };
            if !wait.is_zero() {
                sleep(wait).await;
            }

            {
                let mut state = self.lock_state();
                state.consecutive_auto_loads += 1;
                state.last_auto_load = Some(Instant::now());
            }
            report.loads += 1;

            if !matches!(self.fetch_page().await, LoadOutcome::Loaded { .. }) {
                break;
            }
        }
        report
    }

    fn next_step(&self, probe: &dyn ViewportProbe) -> NextStep {
        let mut state = self.lock_state();
        if !probe.metrics().is_underfilled() {
            state.reset_auto_fill();
            return NextStep::Stop;
        }
        if state.conversation_id.is_none() || !state.has_more {
            return NextStep::Stop;
        }
        if state.consecutive_auto_loads >= self.max_consecutive {
            warn!(
                conversation = ?state.conversation_id,
                loads = state.consecutive_auto_loads,
                "Viewport still under-filled; auto-fill halted"
            );
            return NextStep::Halt;
        }
        let wait = state.last_auto_load.map_or(Duration::ZERO, |last| {
            self.cooldown.saturating_sub(last.elapsed())
        });
        NextStep::Load { wait }
    }

    async fn fetch_page(&self) -> LoadOutcome {
        let (conversation_id, has_more) = {
            let state = self.lock_state();
            (state.conversation_id.clone(), state.has_more)
        };
        let Some(conversation_id) = conversation_id else {
            return LoadOutcome::NoConversation;
        };
        if !has_more {
            return LoadOutcome::Exhausted;
        }
        let Some(flight) = self.slot.try_begin() else {
            return LoadOutcome::Busy;
        };

        let request = FetchRequest {
            conversation_id: conversation_id.clone(),
            limit: self.page_size,
            offset: self.store.notification_count(&conversation_id),
            reverse: false,
        };
        let response = self.transport.fetch_notifications(request).await;

        if !flight.is_current() {
            debug!(conversation = %conversation_id, "Discarded stale notification page");
            return LoadOutcome::Stale;
        }

        let page = match response.and_then(ApiResponse::into_result) {
            Ok(page) => page,
            Err(error) => {
                warn!(
                    conversation = %conversation_id,
                    error = %error,
                    "Failed to load notifications"
                );
                return LoadOutcome::Failed {
                    reason: error.to_string(),
                };
            }
        };

        let received = page.len();
        let added = self.store.append_page(&conversation_id, page);
        let has_more = page_has_more(received, self.page_size);
        {
            let mut state = self.lock_state();
            if state.conversation_id.as_ref() == Some(&conversation_id) {
                state.has_more = has_more;
            }
        }
        drop(flight);

        debug!(conversation = %conversation_id, received, added, has_more, "Loaded notifications");
        LoadOutcome::Loaded {
            received,
            added,
            has_more,
        }
    }
}
