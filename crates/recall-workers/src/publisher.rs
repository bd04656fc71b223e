//! Result publishing over a dedicated, per-message broker connection.
//!
//! The consumer channel may be hours old by the time a long job finishes, and
//! a publish on a stale channel fails in ways that are hard to distinguish
//! from a rejected message. Opening a fresh connection for every result is
//! deliberate: results are low-volume and the cost is dwarfed by the
//! completion calls that precede them.

use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::{BasicProperties, Connection, ConnectionProperties};
use tracing::{debug, info};

use recall_core::{Error, Result, ResultMessage, ResultSink};

use crate::config::RabbitConfig;

/// [`ResultSink`] backed by the results exchange.
#[derive(Clone)]
pub struct AmqpResultPublisher {
    config: RabbitConfig,
}

impl AmqpResultPublisher {
    pub fn new(config: RabbitConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl ResultSink for AmqpResultPublisher {
    async fn publish(&self, routing_key: &str, message: &ResultMessage) -> Result<()> {
        let body = message.to_bytes()?;

        let connection = Connection::connect(
            &self.config.url(),
            ConnectionProperties::default().with_connection_name("result-publisher".into()),
        )
        .await?;
        let channel = connection.create_channel().await?;
        // Confirm mode, so the awaited confirmation below is a real broker ack.
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        debug!(
            routing_key,
            exchange = self.config.results_exchange(),
            "Publishing result"
        );

        let confirm = channel
            .basic_publish(
                self.config.results_exchange(),
                routing_key,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2), // persistent
            )
            .await?
            .await?;

        if confirm.is_nack() {
            return Err(Error::Publish(format!(
                "broker rejected result on routing key {}",
                routing_key
            )));
        }

        info!(
            routing_key,
            job_id = %message.job_id,
            status = ?message.status,
            "Result published"
        );

        // Best effort; the message is already with the broker.
        let _ = connection.close(0, "result published").await;

        Ok(())
    }
}
