//! gRPC transport: one bidirectional `SessionMessage` call per stream.

use std::time::Duration;

use async_trait::async_trait;
use genai_proto::SessionMessage;
use genai_protocol::{
    AuthMetadata, BidiStream, GenaiError, GenaiResult, MessageSink, MessageSource, StreamOpener,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{Ascii, MetadataKey, MetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, instrument, warn};

/// Outbound messages buffered before `send` waits on the peer.
const OUTBOUND_BUFFER: usize = 16;

const DNS_SCHEME: &str = "dns:///";

/// Turns a dial target into an endpoint URI.
///
/// `dns:///` prefixes are dropped. Targets without a scheme are dialed over
/// TLS, on port 443 unless one is given.
pub fn endpoint_uri(address: &str) -> String {
    let target = address.strip_prefix(DNS_SCHEME).unwrap_or(address);
    if target.starts_with("http://") || target.starts_with("https://") {
        return target.to_owned();
    }
    let has_port = target
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    if has_port {
        format!("https://{target}")
    } else {
        format!("https://{target}:443")
    }
}

fn transport_error(context: &str, error: impl std::fmt::Display) -> GenaiError {
    GenaiError::Transport(format!("{context}: {error}"))
}

fn status_error(status: &Status) -> GenaiError {
    GenaiError::Transport(format!("{:?}: {}", status.code(), status.message()))
}

/// Opens bidirectional streams over tonic channels.
#[derive(Debug, Clone, Default)]
pub struct GrpcStreamOpener {
    connect_timeout: Option<Duration>,
}

impl GrpcStreamOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn connect(&self, uri: String) -> GenaiResult<Channel> {
        let tls = uri.starts_with("https://");
        let mut endpoint =
            Endpoint::from_shared(uri).map_err(|e| transport_error("invalid address", e))?;
        if tls {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|e| transport_error("tls setup failed", e))?;
        }
        if let Some(timeout) = self.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }
        endpoint
            .connect()
            .await
            .map_err(|e| transport_error("connect failed", e))
    }
}

fn request_with_metadata(
    outbound: ReceiverStream<SessionMessage>,
    metadata: &AuthMetadata,
) -> GenaiResult<Request<ReceiverStream<SessionMessage>>> {
    let mut request = Request::new(outbound);
    for (name, value) in metadata {
        let key = MetadataKey::<Ascii>::from_bytes(name.as_bytes())
            .map_err(|e| transport_error("invalid metadata key", e))?;
        let mut value = MetadataValue::<Ascii>::try_from(value.as_str())
            .map_err(|e| transport_error("invalid metadata value", e))?;
        value.set_sensitive(true);
        request.metadata_mut().insert(key, value);
    }
    Ok(request)
}

#[async_trait]
impl StreamOpener for GrpcStreamOpener {
    #[instrument(skip(self, metadata))]
    async fn open_stream(
        &self,
        address: &str,
        method: &str,
        metadata: &AuthMetadata,
    ) -> GenaiResult<BidiStream> {
        let path = method
            .parse::<PathAndQuery>()
            .map_err(|e| transport_error("invalid method path", e))?;
        let uri = endpoint_uri(address);
        let channel = self.connect(uri.clone()).await?;
        info!(%uri, "grpc channel connected");

        let (sender, receiver) = mpsc::channel(OUTBOUND_BUFFER);
        let request = request_with_metadata(ReceiverStream::new(receiver), metadata)?;

        // Response headers may only arrive once the server has read input,
        // so the call is driven off to the side while writes proceed.
        let call = tokio::spawn(async move {
            let mut grpc = tonic::client::Grpc::new(channel);
            grpc.ready()
                .await
                .map_err(|e| Status::unavailable(format!("service was not ready: {e}")))?;
            let codec = tonic_prost::ProstCodec::<SessionMessage, SessionMessage>::default();
            grpc.streaming(request, path, codec).await
        });

        Ok(BidiStream::new(
            GrpcSink {
                outbound: Some(sender),
            },
            GrpcSource {
                inbound: Inbound::Pending(call),
            },
        ))
    }
}

#[derive(Debug)]
struct GrpcSink {
    outbound: Option<mpsc::Sender<SessionMessage>>,
}

#[async_trait]
impl MessageSink for GrpcSink {
    async fn send(&mut self, message: SessionMessage) -> GenaiResult<()> {
        let Some(outbound) = &self.outbound else {
            return Err(GenaiError::Transport(
                "stream already half-closed".to_owned(),
            ));
        };
        outbound
            .send(message)
            .await
            .map_err(|_| GenaiError::Transport("stream closed by peer".to_owned()))
    }

    async fn done_writing(&mut self) -> GenaiResult<()> {
        if self.outbound.take().is_some() {
            debug!("grpc outbound half-closed");
        }
        Ok(())
    }
}

type PendingCall = JoinHandle<Result<Response<Streaming<SessionMessage>>, Status>>;

enum Inbound {
    Pending(PendingCall),
    Open(Streaming<SessionMessage>),
    Finished,
}

struct GrpcSource {
    inbound: Inbound,
}

#[async_trait]
impl MessageSource for GrpcSource {
    async fn recv(&mut self) -> GenaiResult<Option<SessionMessage>> {
        loop {
            match &mut self.inbound {
                Inbound::Pending(call) => {
                    let outcome = call.await;
                    match outcome {
                        Ok(Ok(response)) => self.inbound = Inbound::Open(response.into_inner()),
                        Ok(Err(status)) => {
                            self.inbound = Inbound::Finished;
                            warn!(code = ?status.code(), "grpc call rejected");
                            return Err(status_error(&status));
                        }
                        Err(join) => {
                            self.inbound = Inbound::Finished;
                            return Err(transport_error("grpc call aborted", join));
                        }
                    }
                }
                Inbound::Open(stream) => {
                    let next = stream.message().await;
                    return match next {
                        Ok(Some(message)) => Ok(Some(message)),
                        Ok(None) => {
                            self.inbound = Inbound::Finished;
                            debug!("grpc inbound finished");
                            Ok(None)
                        }
                        Err(status) => {
                            self.inbound = Inbound::Finished;
                            Err(status_error(&status))
                        }
                    };
                }
                Inbound::Finished => return Ok(None),
            }
        }
    }
}

impl Drop for GrpcSource {
    fn drop(&mut self) {
        if let Inbound::Pending(call) = &self.inbound {
            call.abort();
        }
    }
}
