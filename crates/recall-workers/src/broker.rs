//! Broker connection helpers.

use std::time::Duration;

use lapin::options::BasicQosOptions;
use lapin::{Channel, Connection, ConnectionProperties};
use tracing::{error, info};

use recall_core::defaults::RECONNECT_DELAY_SECS;
use recall_core::Result;

use crate::config::RabbitConfig;

/// Open a connection and a channel with the configured prefetch.
pub async fn connect(config: &RabbitConfig, name: &str) -> Result<(Connection, Channel)> {
    let connection = Connection::connect(
        &config.url(),
        ConnectionProperties::default().with_connection_name(name.into()),
    )
    .await?;

    let channel = connection.create_channel().await?;
    channel
        .basic_qos(config.prefetch_count, BasicQosOptions::default())
        .await?;

    Ok((connection, channel))
}

/// Connect, retrying forever with a fixed delay.
///
/// Workers have nothing useful to do without a broker, so this only returns
/// once a connection is established.
pub async fn connect_with_retry(config: &RabbitConfig, name: &str) -> (Connection, Channel) {
    loop {
        match connect(config, name).await {
            Ok(pair) => {
                info!(host = %config.host, "Connected to RabbitMQ");
                return pair;
            }
            Err(e) => {
                error!(
                    error = %e,
                    "RabbitMQ connection failed, retrying in {}s",
                    RECONNECT_DELAY_SECS
                );
                tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
            }
        }
    }
}
