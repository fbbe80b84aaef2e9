//! Forwarding module declarations to the client.

use tokio::sync::mpsc;
use tower_lsp::Client;

use crate::module::DeclarationSink;

use super::protocol::{PublishDeclarations, PublishDeclarationsParams};

/// Queues declarations for the client in publication order.
///
/// The queue is drained by a [`DeclarationForwarder`] once the client is
/// ready; anything published earlier waits in the queue.
#[derive(Debug, Clone)]
pub struct ClientSink {
    tx: mpsc::UnboundedSender<PublishDeclarationsParams>,
}

#[derive(Debug)]
pub struct DeclarationForwarder {
    rx: mpsc::UnboundedReceiver<PublishDeclarationsParams>,
}

impl ClientSink {
    pub fn new() -> (Self, DeclarationForwarder) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, DeclarationForwarder { rx })
    }

    fn send(&self, uri: &str, content: &str) {
        let params = PublishDeclarationsParams {
            uri: uri.to_string(),
            content: content.to_string(),
        };
        if self.tx.send(params).is_err() {
            tracing::debug!(uri, "declaration forwarder stopped");
        }
    }
}

impl DeclarationSink for ClientSink {
    fn publish(&self, uri: &str, content: &str) {
        self.send(uri, content);
    }

    fn retract(&self, uri: &str) {
        self.send(uri, "");
    }
}

impl DeclarationForwarder {
    /// Send queued declarations until every sink is dropped.
    pub async fn run(mut self, client: Client) {
        while let Some(params) = self.rx.recv().await {
            client.send_notification::<PublishDeclarations>(params).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queues_in_order_and_retracts_with_empty_content() {
        let (sink, mut forwarder) = ClientSink::new();
        sink.publish("file:///a.ts", "export {};");
        sink.retract("file:///a.ts");

        let first = forwarder.rx.try_recv().unwrap();
        assert_eq!(first.content, "export {};");
        let second = forwarder.rx.try_recv().unwrap();
        assert_eq!(second.uri, "file:///a.ts");
        assert_eq!(second.content, "");
        assert!(forwarder.rx.try_recv().is_err());
    }

    #[test]
    fn publishing_after_forwarder_drop_is_silent() {
        let (sink, forwarder) = ClientSink::new();
        drop(forwarder);
        sink.publish("file:///a.ts", "x");
    }
}
