//! Scope-keyed cooperative cancellation.
//!
//! A background listener binds an exclusive, server-named queue to the
//! `worker-cancellation` fanout exchange and records every broadcast scope in
//! a process-local registry. The attempt engine and consumer loop read the
//! registry at their checkpoints; a cancellation can race one in-flight
//! completion call and only take effect at the next checkpoint.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties, ExchangeKind};
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use recall_core::defaults::RECONNECT_DELAY_SECS;
use recall_core::message::scope_key;
use recall_core::Result;

use crate::config::RabbitConfig;

/// Process-local set of cancelled scope identifiers.
///
/// Append-only for the process lifetime: a scope once cancelled stays
/// cancelled until restart. Shared between the listener task and the
/// consumer/attempt checkpoints.
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a scope as cancelled.
    pub fn cancel(&self, scope: impl Into<String>) {
        self.inner.lock().unwrap().insert(scope.into());
    }

    /// Best-effort check whether a scope has been cancelled.
    pub fn is_cancelled(&self, scope: &str) -> bool {
        self.inner.lock().unwrap().contains(scope)
    }

    /// Number of cancelled scopes recorded so far.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run the cancellation listener until the process exits.
///
/// On any connection or stream failure the listener logs, waits a fixed
/// delay, and reconnects; it never terminates on its own.
pub async fn run_cancellation_listener(config: RabbitConfig, registry: CancellationRegistry) {
    loop {
        if let Err(e) = listen(&config, &registry).await {
            error!(
                error = %e,
                "Cancellation listener disconnected, retrying in {}s",
                RECONNECT_DELAY_SECS
            );
        }
        tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
    }
}

async fn listen(config: &RabbitConfig, registry: &CancellationRegistry) -> Result<()> {
    let connection = Connection::connect(
        &config.url(),
        ConnectionProperties::default().with_connection_name("cancellation-listener".into()),
    )
    .await?;
    let channel = connection.create_channel().await?;

    channel
        .exchange_declare(
            config.cancellation_exchange(),
            ExchangeKind::Fanout,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    // Server-named, exclusive, auto-delete: each worker process observes the
    // broadcast independently.
    let queue = channel
        .queue_declare(
            "",
            QueueDeclareOptions {
                exclusive: true,
                auto_delete: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_bind(
            queue.name().as_str(),
            config.cancellation_exchange(),
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut consumer = channel
        .basic_consume(
            queue.name().as_str(),
            "cancellation-listener",
            BasicConsumeOptions {
                no_ack: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    info!(
        exchange = config.cancellation_exchange(),
        queue = queue.name().as_str(),
        "Listening for cancellation broadcasts"
    );

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;
        match serde_json::from_slice::<JsonValue>(&delivery.data) {
            Ok(value) => match value.get("scope_id") {
                Some(scope) if !scope.is_null() => {
                    let key = scope_key(scope);
                    info!(scope = %key, "Scope cancelled");
                    registry.cancel(key);
                }
                _ => warn!("Cancellation broadcast without scope_id, ignoring"),
            },
            Err(e) => warn!(error = %e, "Malformed cancellation broadcast, ignoring"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_starts_empty() {
        let registry = CancellationRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.is_cancelled("17"));
    }

    #[test]
    fn test_cancel_is_sticky() {
        let registry = CancellationRegistry::new();
        registry.cancel("17");
        assert!(registry.is_cancelled("17"));
        assert!(registry.is_cancelled("17"));
        assert!(!registry.is_cancelled("18"));
    }

    #[test]
    fn test_duplicate_cancel_is_idempotent() {
        let registry = CancellationRegistry::new();
        registry.cancel("17");
        registry.cancel("17");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_shared_across_clones() {
        let registry = CancellationRegistry::new();
        let listener_side = registry.clone();

        listener_side.cancel("42");
        assert!(registry.is_cancelled("42"));
    }

    #[test]
    fn test_concurrent_insert_and_read() {
        let registry = CancellationRegistry::new();
        let writer = registry.clone();

        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                writer.cancel(i.to_string());
            }
        });
        // Reads may race the writes; they must simply never misbehave.
        for _ in 0..100 {
            let _ = registry.is_cancelled("50");
        }
        handle.join().unwrap();
        assert_eq!(registry.len(), 100);
        assert!(registry.is_cancelled("50"));
    }
}
