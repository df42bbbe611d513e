//! In-memory transport.
//!
//! Every outbound message and half-close is recorded in a [`WireLog`].
//! Inbound messages are either scripted up front or, in echo mode, the
//! fragments that were written, delivered once writing is done.

use std::sync::Arc;

use async_trait::async_trait;
use genai_proto::SessionMessage;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{GenaiError, GenaiResult};
use crate::ports::{AuthMetadata, BidiStream, MessageSink, MessageSource, StreamOpener};

#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Sent(SessionMessage),
    DoneWriting,
}

/// Shared record of what a loopback sink saw.
#[derive(Debug, Clone, Default)]
pub struct WireLog {
    events: Arc<Mutex<Vec<WireEvent>>>,
}

impl WireLog {
    fn record(&self, event: WireEvent) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<WireEvent> {
        self.events.lock().clone()
    }

    pub fn sent(&self) -> Vec<SessionMessage> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                WireEvent::Sent(message) => Some(message.clone()),
                WireEvent::DoneWriting => None,
            })
            .collect()
    }

    pub fn done_writing(&self) -> bool {
        self.events
            .lock()
            .iter()
            .any(|event| matches!(event, WireEvent::DoneWriting))
    }
}

#[derive(Debug)]
pub struct LoopbackSink {
    log: WireLog,
    inbound: Option<mpsc::UnboundedSender<SessionMessage>>,
    echo: bool,
    echoed: Vec<SessionMessage>,
}

#[async_trait]
impl MessageSink for LoopbackSink {
    async fn send(&mut self, message: SessionMessage) -> GenaiResult<()> {
        if self.inbound.is_none() {
            return Err(GenaiError::Transport(
                "loopback stream already half-closed".to_owned(),
            ));
        }
        if self.echo && !message.node_fragments.is_empty() {
            self.echoed
                .push(SessionMessage::fragments(message.node_fragments.clone()));
        }
        self.log.record(WireEvent::Sent(message));
        Ok(())
    }

    async fn done_writing(&mut self) -> GenaiResult<()> {
        self.log.record(WireEvent::DoneWriting);
        if let Some(inbound) = self.inbound.take() {
            for message in self.echoed.drain(..) {
                // The reader may already be gone; nothing left to deliver to.
                let _ = inbound.send(message);
            }
        }
        debug!("loopback half-closed");
        Ok(())
    }
}

#[derive(Debug)]
pub struct LoopbackSource {
    inbound: mpsc::UnboundedReceiver<SessionMessage>,
}

#[async_trait]
impl MessageSource for LoopbackSource {
    async fn recv(&mut self) -> GenaiResult<Option<SessionMessage>> {
        Ok(self.inbound.recv().await)
    }
}

fn loopback(echo: bool, responses: Vec<SessionMessage>) -> (WireLog, BidiStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    for response in responses {
        let _ = sender.send(response);
    }
    let log = WireLog::default();
    let sink = LoopbackSink {
        log: log.clone(),
        inbound: Some(sender),
        echo,
        echoed: Vec::new(),
    };
    let source = LoopbackSource { inbound: receiver };
    (log, BidiStream::new(sink, source))
}

/// A stream that answers with every fragment written to it, after half-close.
pub fn echo() -> (WireLog, BidiStream) {
    loopback(true, Vec::new())
}

/// A stream that answers with `responses`, then ends after half-close.
pub fn scripted(responses: impl IntoIterator<Item = SessionMessage>) -> (WireLog, BidiStream) {
    loopback(false, responses.into_iter().collect())
}

#[derive(Debug, Clone)]
pub struct OpenedStream {
    pub address: String,
    pub method: String,
    pub metadata: AuthMetadata,
    pub log: WireLog,
}

/// Opens echo loopback streams and remembers how each was requested.
#[derive(Debug, Clone, Default)]
pub struct LoopbackOpener {
    opened: Arc<Mutex<Vec<OpenedStream>>>,
}

impl LoopbackOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<OpenedStream> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl StreamOpener for LoopbackOpener {
    async fn open_stream(
        &self,
        address: &str,
        method: &str,
        metadata: &AuthMetadata,
    ) -> GenaiResult<BidiStream> {
        let (log, stream) = echo();
        self.opened.lock().push(OpenedStream {
            address: address.to_owned(),
            method: method.to_owned(),
            metadata: metadata.clone(),
            log,
        });
        Ok(stream)
    }
}
