//! NATS publisher for request replies

use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Publishes reply bodies to a request's reply inbox
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
}

impl ReplyProducer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish a JSON reply body
    pub async fn reply(&self, inbox: Subject, body: Vec<u8>) -> Result<()> {
        let bytes = body.len();
        self.client.publish(inbox.clone(), body.into()).await?;

        debug!(inbox = %inbox, bytes = bytes, "Published reply");
        Ok(())
    }

    /// Push buffered replies to the server
    pub async fn flush(&self) -> Result<()> {
        self.client.flush().await?;
        Ok(())
    }
}
