//! The `GENERATE` action and a plain-text debug renderer for its output.

use genai_protocol::{Content, GenaiResult, role};

use crate::action::Action;

pub const GENERATE: &str = "GENERATE";
pub const PROMPT: &str = "prompt";
pub const RESPONSE: &str = "response";

/// `GENERATE` with a single `prompt` input and a single `response` output.
pub fn generate(prompt: impl Into<Content>, target_id: impl Into<String>) -> Action {
    Action::new(GENERATE, target_id)
        .input(PROMPT, prompt)
        .output(RESPONSE)
}

/// Renders text-only content as `ROLE: text` lines. For debugging only.
///
/// Consecutive chunks with the same role, or with no role at all, are
/// joined into one line. Rendering starts as `USER`, the role the service
/// assumes when none is set.
pub fn debug_format_text(content: &Content) -> GenaiResult<String> {
    let mut lines = Vec::new();
    let mut last_role = role::USER;
    let mut rolling = String::new();
    for chunk in content {
        let role = chunk.role();
        if role.is_empty() || role == last_role {
            rolling.push_str(chunk.as_text(true)?);
            continue;
        }
        if !rolling.is_empty() {
            lines.push(format!("{last_role}: {rolling}"));
        }
        rolling = chunk.as_text(true)?.to_owned();
        last_role = role;
    }
    if !rolling.is_empty() {
        lines.push(format!("{last_role}: {rolling}"));
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use futures_util::StreamExt;
    use genai_proto::{NamedParameter, NodeFragment, TargetSpec};
    use genai_protocol::loopback::{self, WireEvent};
    use genai_protocol::{
        Chunk, GenaiError, SequentialIds, Session, assistant_chunk, system_chunk, user_chunk,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn generate_on_echo_transport() -> Result<()> {
        let (log, stream) = loopback::echo();
        let session = Session::with_ids(stream, Arc::new(SequentialIds::new("id-")));

        let responses: Vec<Chunk> = generate("Hello", "gemini-1.5-flash")
            .run(session)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<GenaiResult<_>>()?;

        let sent = log.sent();
        assert_eq!(sent.len(), 2);

        let descriptor = &sent[0].actions[0];
        assert_eq!(descriptor.name, GENERATE);
        assert_eq!(
            descriptor.target_spec,
            Some(TargetSpec {
                id: "gemini-1.5-flash".into()
            })
        );
        assert_eq!(descriptor.inputs, vec![NamedParameter::new(PROMPT, "id-0")]);
        assert_eq!(descriptor.outputs, vec![NamedParameter::new(RESPONSE, "id-1")]);

        let fragments = &sent[1].node_fragments;
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].id, "id-2");
        let chunk = fragments[0].chunk_fragment.as_ref().unwrap();
        assert_eq!(chunk.data.as_ref(), b"Hello");
        assert_eq!(chunk.mimetype(), "text/plain");
        assert_eq!(fragments[1], NodeFragment::root("id-0", vec!["id-2".into()]));
        assert!(matches!(log.events().last(), Some(WireEvent::DoneWriting)));

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].as_text(true)?, "Hello");
        Ok(())
    }

    #[tokio::test]
    async fn generate_surfaces_write_errors() -> Result<()> {
        let (_log, stream) = loopback::echo();
        let mut session = Session::new(stream);
        session.close_writes().await?;

        let first = generate("Hello", "m").run(session).next().await;
        assert!(matches!(first, Some(Err(GenaiError::SessionClosedForWriting))));
        Ok(())
    }

    #[test]
    fn formats_roles_and_continuations() -> Result<()> {
        let content = Content::from_chunks([
            Chunk::text("Hi "),
            user_chunk("there", None)?,
            assistant_chunk("Hello", None)?,
            Chunk::text(", friend"),
            system_chunk("Be brief", None)?,
        ]);
        assert_eq!(
            debug_format_text(&content)?,
            "USER: Hi there\nASSISTANT: Hello, friend\nSYSTEM: Be brief"
        );
        Ok(())
    }

    #[test]
    fn leading_role_switch_skips_empty_user_line() -> Result<()> {
        let content = Content::from_chunks([assistant_chunk("only me", None)?]);
        assert_eq!(debug_format_text(&content)?, "ASSISTANT: only me");
        assert_eq!(debug_format_text(&Content::new())?, "");
        Ok(())
    }

    #[test]
    fn non_text_content_is_rejected() -> Result<()> {
        let content = Content::from_chunks([Chunk::bytes(vec![0_u8], "image/png")?]);
        assert!(matches!(
            debug_format_text(&content),
            Err(GenaiError::NotTextContent { .. })
        ));
        Ok(())
    }
}
