//! # genai-actions: action helpers over genai sessions
//!
//! An [`Action`] names an operation, its target, its input contents and
//! the outputs it wants back. Running one consumes it: the descriptor is
//! written first, then every input under a freshly allocated parameter id,
//! then the session is closed for writing and the response chunks stream
//! back.
//!
//! - [`action`]: generic Action, BoundAction
//! - [`generate`]: the `GENERATE` preset, debug text rendering

pub mod action;
pub mod generate;

pub use action::{Action, BoundAction};
pub use generate::{GENERATE, PROMPT, RESPONSE, debug_format_text, generate};
