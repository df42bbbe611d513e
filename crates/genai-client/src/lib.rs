//! # genai-client: connecting sessions to a genai service
//!
//! Resolves an [`Endpoint`] to a dial target and RPC method, attaches the
//! API key, and opens sessions over a tonic gRPC channel. Any other
//! [`genai_protocol::StreamOpener`] can stand in for the gRPC transport.
//!
//! - [`endpoint`]: Endpoint kinds and resolution
//! - [`config`]: ClientConfig, environment loading
//! - [`transport`]: GrpcStreamOpener
//! - [`client`]: Client, start_session, run

pub mod client;
pub mod config;
pub mod endpoint;
pub mod transport;

pub use client::{API_KEY_HEADER, Client};
pub use config::ClientConfig;
pub use endpoint::{Endpoint, EndpointAddress, resolve};
pub use transport::GrpcStreamOpener;
