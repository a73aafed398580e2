//! NATS subscriptions for incoming scoring requests

use crate::config::NatsConfig;
use crate::service::RequestKind;
use anyhow::Result;
use async_nats::{Client, Message, Subscriber};
use futures::stream::{self, BoxStream, StreamExt};
use tracing::info;

/// Consumer for score, explain and health requests.
///
/// Subscriptions join a queue group so several instances share the load.
pub struct PostingConsumer {
    client: Client,
    score_subject: String,
    explain_subject: String,
    health_subject: String,
    queue_group: String,
}

impl PostingConsumer {
    pub fn new(client: Client, config: &NatsConfig) -> Self {
        Self {
            client,
            score_subject: config.score_subject.clone(),
            explain_subject: config.explain_subject.clone(),
            health_subject: config.health_subject.clone(),
            queue_group: config.queue_group.clone(),
        }
    }

    /// Subject serving the given request kind
    pub fn subject(&self, kind: RequestKind) -> &str {
        match kind {
            RequestKind::Score => &self.score_subject,
            RequestKind::Explain => &self.explain_subject,
            RequestKind::Health => &self.health_subject,
        }
    }

    /// Queue-subscribe to the subject for one request kind
    pub async fn subscribe(&self, kind: RequestKind) -> Result<Subscriber> {
        let subject = self.subject(kind).to_string();
        let subscriber = self
            .client
            .queue_subscribe(subject.clone(), self.queue_group.clone())
            .await?;
        info!(
            subject = %subject,
            queue_group = %self.queue_group,
            kind = kind.as_str(),
            "Subscribed to request subject"
        );
        Ok(subscriber)
    }

    /// One stream of all requests, each tagged with its kind
    pub async fn subscribe_all(&self) -> Result<BoxStream<'static, (RequestKind, Message)>> {
        let mut streams = Vec::new();
        for kind in [RequestKind::Score, RequestKind::Explain, RequestKind::Health] {
            let subscriber = self.subscribe(kind).await?;
            streams.push(subscriber.map(move |message| (kind, message)).boxed());
        }
        Ok(stream::select_all(streams).boxed())
    }
}
