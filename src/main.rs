//! Binary entrypoint that replays inbound chat events through the sync engine.

use std::process::ExitCode;

use chat_sync::start_chat_sync;

/// Replay the events file given as first argument, or stdin.
fn main() -> ExitCode {
    start_chat_sync::run()
}
