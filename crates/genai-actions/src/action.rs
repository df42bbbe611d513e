//! Generic actions: a named operation on a target with named inputs and
//! declared outputs.

use async_stream::try_stream;
use futures_util::StreamExt;
use genai_proto::{Action as ActionProto, NamedParameter, TargetSpec};
use genai_protocol::{
    ChunkStream, Content, ContentId, GenaiResult, IdGenerator, ParameterId, Session,
};
use indexmap::IndexMap;
use tracing::{debug, info, instrument};

/// An operation that receives named inputs and returns named outputs.
///
/// Inputs keep insertion order; that order is the wire order of both the
/// descriptor parameters and the input payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    name: String,
    target_id: String,
    inputs: IndexMap<String, Content>,
    output_names: Vec<String>,
}

impl Action {
    pub fn new(name: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_id: target_id.into(),
            inputs: IndexMap::new(),
            output_names: Vec::new(),
        }
    }

    /// Adds (or replaces) a named input.
    pub fn input(mut self, name: impl Into<String>, content: impl Into<Content>) -> Self {
        self.inputs.insert(name.into(), content.into());
        self
    }

    /// Declares a named output. With no outputs the service returns nothing.
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.output_names.push(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn inputs(&self) -> &IndexMap<String, Content> {
        &self.inputs
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Allocates parameter ids, inputs first then outputs, and builds the
    /// wire descriptor.
    pub fn bind(self, ids: &dyn IdGenerator) -> BoundAction {
        let inputs: Vec<(NamedParameter, Content)> = self
            .inputs
            .into_iter()
            .map(|(name, content)| (NamedParameter::new(name, ids.unique_id()), content))
            .collect();
        let outputs = self
            .output_names
            .into_iter()
            .map(|name| NamedParameter::new(name, ids.unique_id()))
            .collect();

        let descriptor = ActionProto {
            name: self.name,
            target_spec: Some(TargetSpec { id: self.target_id }),
            inputs: inputs.iter().map(|(param, _)| param.clone()).collect(),
            outputs,
        };
        let payloads = inputs
            .into_iter()
            .map(|(param, content)| (ParameterId::from_string(param.id), content))
            .collect();
        BoundAction {
            descriptor,
            payloads,
        }
    }

    /// Runs the action on `session` and streams back every response chunk.
    ///
    /// Writes the descriptor, then each input under its parameter id, then
    /// closes the write side. The first failure ends the stream.
    pub fn run(self, session: Session) -> ChunkStream<'static> {
        Box::pin(try_stream! {
            let mut session = session;
            self.submit(&mut session).await?;
            let mut responses = session.into_read();
            while let Some(chunk) = responses.next().await {
                yield chunk?;
            }
        })
    }

    #[instrument(skip_all, fields(action = %self.name, target = %self.target_id))]
    async fn submit(self, session: &mut Session) -> GenaiResult<()> {
        let bound = self.bind(session.ids().as_ref());
        info!(
            inputs = bound.descriptor.inputs.len(),
            outputs = bound.descriptor.outputs.len(),
            "submitting action"
        );
        session.write(bound.descriptor, None).await?;
        for (id, content) in bound.payloads {
            debug!(parameter = %id, chunks = content.len(), "writing action input");
            session.write(content, Some(ContentId::from(id))).await?;
        }
        session.close_writes().await
    }
}

/// An action with its parameter ids allocated.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundAction {
    descriptor: ActionProto,
    payloads: Vec<(ParameterId, Content)>,
}

impl BoundAction {
    pub fn descriptor(&self) -> &ActionProto {
        &self.descriptor
    }

    /// Input payloads keyed by the parameter id they are written under.
    pub fn payloads(&self) -> &[(ParameterId, Content)] {
        &self.payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use genai_proto::SessionMessage;
    use genai_protocol::loopback::{self, WireEvent};
    use genai_protocol::{Chunk, GenaiError, SequentialIds};
    use std::sync::Arc;

    #[test]
    fn bind_allocates_inputs_before_outputs() {
        let action = Action::new("TRANSLATE", "model")
            .input("text", "hola")
            .input("language", "en")
            .output("translation")
            .output("confidence");
        let bound = action.bind(&SequentialIds::new("p"));

        let descriptor = bound.descriptor();
        assert_eq!(descriptor.name, "TRANSLATE");
        assert_eq!(descriptor.target_spec, Some(TargetSpec { id: "model".into() }));
        assert_eq!(
            descriptor.inputs,
            vec![
                NamedParameter::new("text", "p0"),
                NamedParameter::new("language", "p1")
            ]
        );
        assert_eq!(
            descriptor.outputs,
            vec![
                NamedParameter::new("translation", "p2"),
                NamedParameter::new("confidence", "p3")
            ]
        );
        let ids: Vec<_> = bound.payloads().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1"]);
    }

    #[test]
    fn replacing_an_input_keeps_its_position() {
        let action = Action::new("A", "t")
            .input("first", "1")
            .input("second", "2")
            .input("first", "one");
        let names: Vec<_> = action.inputs().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(action.inputs()["first"].as_text(true).unwrap(), "one");
    }

    #[tokio::test]
    async fn run_writes_descriptor_inputs_then_closes() -> Result<()> {
        let (log, stream) = loopback::echo();
        let session = Session::with_ids(stream, Arc::new(SequentialIds::new("id-")));
        let input = Content::from("ping").with_id("caller-id");
        let action = Action::new("ECHO", "target").input("value", input).output("out");

        let chunks: Vec<Chunk> = action
            .run(session)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<GenaiResult<_>>()?;

        let events = log.events();
        assert_eq!(events.len(), 3);
        match &events[0] {
            WireEvent::Sent(SessionMessage { actions, node_fragments }) => {
                assert!(node_fragments.is_empty());
                assert_eq!(actions.len(), 1);
            }
            other => panic!("expected descriptor, got {other:?}"),
        }
        match &events[1] {
            WireEvent::Sent(message) => {
                let root = message.node_fragments.last().unwrap();
                assert_eq!(root.id, "id-0");
                assert_eq!(root.child_ids, vec!["id-2"]);
            }
            other => panic!("expected input payload, got {other:?}"),
        }
        assert_eq!(events[2], WireEvent::DoneWriting);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_text(true)?, "ping");
        Ok(())
    }

    #[tokio::test]
    async fn run_without_outputs_or_inputs_still_closes() -> Result<()> {
        let (log, stream) = loopback::echo();
        let chunks: Vec<_> = Action::new("NOOP", "t")
            .run(Session::new(stream))
            .collect()
            .await;
        assert!(chunks.is_empty());
        assert_eq!(log.events().len(), 2);
        assert!(log.done_writing());
        Ok(())
    }

    #[tokio::test]
    async fn write_failure_ends_the_stream() -> Result<()> {
        let (log, stream) = loopback::echo();
        let mut session = Session::new(stream);
        session.close_writes().await?;

        let results: Vec<_> = Action::new("GENERATE", "t")
            .input("prompt", "hi")
            .run(session)
            .collect()
            .await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(GenaiError::SessionClosedForWriting)));
        assert_eq!(log.events(), vec![WireEvent::DoneWriting]);
        Ok(())
    }
}
