//! Startup helpers for the `chat-sync` binary.
//!
//! Replays a JSON-lines stream of inbound events through a sync engine and
//! logs what each conversation looks like afterwards.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, warn};

use crate::sync::core::config::SyncConfig;
use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::ids::ConversationId;
use crate::sync::engine::core::{SyncBackends, SyncEngine};
use crate::sync::ingest::event_pump::spawn_event_pump;
use crate::sync::ingest::inbound_event::InboundEvent;
use crate::sync::transport::memory::MemoryTransport;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_ENV: &str = "CHAT_SYNC_CONFIG";

const EVENT_BUFFER: usize = 256;

/// State of one conversation after a replay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationSummary {
    /// Conversation id.
    pub conversation_id: ConversationId,
    /// Stored messages.
    pub messages: usize,
    /// Unread counter.
    pub unread: u32,
    /// Listed notifications.
    pub notifications: usize,
    /// Whether a notification arrived since the last read.
    pub has_new: bool,
    /// Latest interaction tag.
    pub i_tag: Option<String>,
}

/// Outcome of a replay.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Lines parsed into events.
    pub parsed: usize,
    /// Lines skipped as malformed.
    pub skipped: usize,
    /// Events dispatched by the pump.
    pub dispatched: usize,
    /// Per-conversation state, ordered by id.
    pub conversations: Vec<ConversationSummary>,
}

/// Run the binary.
///
/// # Returns
/// `ExitCode::SUCCESS` once the stream is replayed, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting chat-sync v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let source = std::env::args().nth(1).map(PathBuf::from);
    match rt.block_on(replay(config, source.as_deref())) {
        Ok(report) => {
            log_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Replay failed: {e}");
            ExitCode::from(1)
        }
    }
}

/// Load the configuration file named by `CHAT_SYNC_CONFIG`, then apply
/// `CHAT_SYNC_*` overrides.
///
/// # Errors
/// Returns an error if the file cannot be read or an override is invalid.
pub fn load_config() -> SyncResult<SyncConfig> {
    let base = match std::env::var(CONFIG_ENV) {
        Ok(path) => SyncConfig::from_json_file(Path::new(&path))?,
        Err(_) => SyncConfig::default(),
    };
    let config = base.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Replay events from `source` (stdin when `None`) through a fresh engine.
///
/// # Errors
/// Returns an error if the side store or the source cannot be opened.
pub async fn replay(config: SyncConfig, source: Option<&Path>) -> SyncResult<ReplayReport> {
    let transport = Arc::new(MemoryTransport::new());
    let backends = SyncBackends::sqlite(&config, transport)?;
    let engine = Arc::new(SyncEngine::new(config, backends)?);

    let reader: Box<dyn AsyncBufRead + Send + Unpin> = match source {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let pump = spawn_event_pump(Arc::clone(&engine), rx, Arc::new(Notify::new()));
    let (parsed, skipped) = feed_events(reader, &tx).await?;
    drop(tx);

    let dispatched = pump.await.map_err(|e| SyncError::Io(std::io::Error::other(e)))?;

    Ok(ReplayReport {
        parsed,
        skipped,
        dispatched,
        conversations: summarize(&engine),
    })
}

async fn feed_events<R>(reader: R, tx: &mpsc::Sender<InboundEvent>) -> SyncResult<(usize, usize)>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut parsed = 0_usize;
    let mut skipped = 0_usize;
    let mut line_number = 0_usize;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<InboundEvent>(line) {
            Ok(event) => {
                parsed += 1;
                if tx.send(event).await.is_err() {
                    warn!("Event pump stopped early");
                    break;
                }
            }
            Err(e) => {
                skipped += 1;
                warn!(line = line_number, error = %e, "Skipped malformed event");
            }
        }
    }

    debug!(parsed, skipped, "Finished reading events");
    Ok((parsed, skipped))
}

fn summarize(engine: &SyncEngine) -> Vec<ConversationSummary> {
    let mut ids: BTreeSet<ConversationId> = engine.messages().conversation_ids().into_iter().collect();
    ids.extend(engine.notifications().snapshot().into_keys());

    ids.into_iter()
        .map(|conversation_id| ConversationSummary {
            messages: engine.messages().message_count(&conversation_id),
            unread: engine.messages().get_unread_count(&conversation_id),
            notifications: engine.notifications().notification_count(&conversation_id),
            has_new: engine.notifications().has_new(&conversation_id),
            i_tag: engine.tags().get_latest(&conversation_id),
            conversation_id,
        })
        .collect()
}

fn log_report(report: &ReplayReport) {
    info!(
        parsed = report.parsed,
        skipped = report.skipped,
        dispatched = report.dispatched,
        conversations = report.conversations.len(),
        "Replay finished"
    );
    for summary in &report.conversations {
        info!(
            conversation = %summary.conversation_id,
            messages = summary.messages,
            unread = summary.unread,
            notifications = summary.notifications,
            has_new = summary.has_new,
            i_tag = ?summary.i_tag,
            "Conversation state"
        );
    }
}
