// src/bot/runner.rs

//! Inbound interaction loop.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::bot::Dispatcher;
use crate::services::InboundSource;

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Read inbound batches and dispatch them in arrival order until cancelled.
///
/// A failed read is logged and retried after a short pause.
pub async fn run_bot(source: &dyn InboundSource, dispatcher: &Dispatcher, cancel: &CancellationToken) {
    log::info!("Bot loop started");

    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = source.next_batch() => batch,
        };

        match batch {
            Ok(interactions) => {
                for inbound in interactions {
                    dispatcher.handle(inbound).await;
                }
            }
            Err(e) => {
                log::warn!("Failed to read updates: {}", e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }

    log::info!("Bot loop stopped");
}
