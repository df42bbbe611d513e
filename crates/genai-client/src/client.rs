//! The client facade: resolved target, credentials and a shared transport.

use std::fmt;
use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use genai_actions::Action;
use genai_protocol::{
    AuthMetadata, ChunkStream, GenaiResult, IdGenerator, Session, StreamOpener, default_ids,
};
use tracing::{info, instrument};

use crate::config::ClientConfig;
use crate::endpoint::EndpointAddress;
use crate::transport::GrpcStreamOpener;

pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Entry point for talking to a genai service.
///
/// Holds the resolved endpoint, the credentials and a shareable transport;
/// every session is a fresh stream.
#[derive(Clone)]
pub struct Client {
    target: EndpointAddress,
    metadata: AuthMetadata,
    opener: Arc<dyn StreamOpener>,
    ids: Arc<dyn IdGenerator>,
}

impl Client {
    /// Resolves `config` and dials over gRPC.
    pub fn new(config: &ClientConfig) -> GenaiResult<Self> {
        let opener = GrpcStreamOpener::new().with_connect_timeout(config.connect_timeout);
        Self::with_opener(config, Arc::new(opener))
    }

    pub fn with_opener(config: &ClientConfig, opener: Arc<dyn StreamOpener>) -> GenaiResult<Self> {
        Ok(Self {
            target: config.resolve()?,
            metadata: vec![(API_KEY_HEADER.to_owned(), config.api_key.clone())],
            opener,
            ids: default_ids(),
        })
    }

    /// Uses `ids` for the fragment and parameter ids of every session.
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn target(&self) -> &EndpointAddress {
        &self.target
    }

    #[instrument(skip(self), fields(address = %self.target.address, method = %self.target.method))]
    pub async fn start_session(&self) -> GenaiResult<Session> {
        let stream = self
            .opener
            .open_stream(&self.target.address, &self.target.method, &self.metadata)
            .await?;
        info!("session started");
        Ok(Session::with_ids(stream, Arc::clone(&self.ids)))
    }

    /// Runs `action` on a new session and streams back its response chunks.
    pub fn run(&self, action: Action) -> ChunkStream<'static> {
        let client = self.clone();
        Box::pin(try_stream! {
            let session = client.start_session().await?;
            let mut responses = action.run(session);
            while let Some(chunk) = responses.next().await {
                yield chunk?;
            }
        })
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("target", &self.target)
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{EVERGREEN_METHOD, Endpoint, GEMINI_API_ADDRESS, GEMINI_API_METHOD};
    use genai_actions::generate;
    use genai_protocol::loopback::LoopbackOpener;
    use genai_protocol::{Chunk, GenaiError, SequentialIds};

    #[tokio::test]
    async fn start_session_dials_resolved_target_with_api_key() {
        let opener = Arc::new(LoopbackOpener::new());
        let client = Client::with_opener(&ClientConfig::new("secret"), opener.clone()).unwrap();
        client.start_session().await.unwrap();

        let opened = opener.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].address, GEMINI_API_ADDRESS);
        assert_eq!(opened[0].method, GEMINI_API_METHOD);
        assert_eq!(
            opened[0].metadata,
            vec![("x-goog-api-key".to_owned(), "secret".to_owned())]
        );
    }

    #[test]
    fn custom_endpoint_without_host_fails_early() {
        let config = ClientConfig::new("k").with_endpoint(Endpoint::Custom);
        let err = Client::with_opener(&config, Arc::new(LoopbackOpener::new())).unwrap_err();
        assert!(matches!(err, GenaiError::MissingHost));
    }

    #[tokio::test]
    async fn run_generate_streams_echoed_prompt() {
        let opener = Arc::new(LoopbackOpener::new());
        let config = ClientConfig::new("k")
            .with_endpoint(Endpoint::Custom)
            .with_host("localhost:50051");
        let client = Client::with_opener(&config, opener.clone())
            .unwrap()
            .with_ids(Arc::new(SequentialIds::new("id-")));

        let chunks: Vec<Chunk> = client
            .run(generate("Hello", "model"))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<GenaiResult<_>>()
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_text(true).unwrap(), "Hello");

        let opened = opener.opened();
        assert_eq!(opened[0].address, "localhost:50051");
        assert_eq!(opened[0].method, EVERGREEN_METHOD);
        let sent = opened[0].log.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].actions[0].inputs[0].id, "id-0");
        assert!(opened[0].log.done_writing());
    }

    #[test]
    fn debug_hides_credentials() {
        let client =
            Client::with_opener(&ClientConfig::new("secret"), Arc::new(LoopbackOpener::new()))
                .unwrap();
        assert!(!format!("{client:?}").contains("secret"));
    }
}
