// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::{gateway::ResponseStream, GenerationRequest, ResponseEvent, Turn};

/// Deterministic mock gateway for tests.  Echoes the last user turn back as
/// the assistant response.
#[derive(Default)]
pub struct EchoGateway;

#[async_trait]
impl crate::Gateway for EchoGateway {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, req: GenerationRequest) -> anyhow::Result<ResponseStream> {
        let reply = req
            .history
            .iter()
            .rev()
            .find_map(|t| match t {
                Turn::User { text } => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or("[no input]")
            .to_string();

        let events: Vec<anyhow::Result<ResponseEvent>> = vec![
            Ok(ResponseEvent::TextDelta(format!("MOCK: {reply}"))),
            Ok(ResponseEvent::Usage { input_tokens: 10, output_tokens: 10 }),
            Ok(ResponseEvent::Done),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

/// A pre-scripted mock gateway.  Each call to `generate` pops the next
/// response script from the front of the queue.  This lets tests specify
/// exact event sequences – including tool calls – without network access.
pub struct ScriptedGateway {
    scripts: Arc<Mutex<Vec<Vec<ResponseEvent>>>>,
    /// The last `GenerationRequest` seen by this gateway.
    /// Written on each `generate()` call so tests can inspect what was sent.
    pub last_request: Arc<Mutex<Option<GenerationRequest>>>,
}

impl ScriptedGateway {
    /// Build a gateway from a list of response scripts.
    /// The outer `Vec` is the ordered list of calls; the inner `Vec` is the
    /// sequence of [`ResponseEvent`]s emitted for that call.
    pub fn new(scripts: Vec<Vec<ResponseEvent>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Convenience: gateway that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![vec![
            ResponseEvent::TextDelta(reply.into()),
            ResponseEvent::Usage { input_tokens: 5, output_tokens: 5 },
            ResponseEvent::Done,
        ]])
    }

    /// Convenience: script emitting the given texts, one per call.
    pub fn text_sequence(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let scripts = replies
            .into_iter()
            .map(|r| vec![ResponseEvent::TextDelta(r.into()), ResponseEvent::Done])
            .collect();
        Self::new(scripts)
    }

    /// Convenience: gateway that returns a native tool call followed by a
    /// text reply on the next call.
    pub fn tool_then_text(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            // Round 1 – model emits a tool call
            vec![
                ResponseEvent::ToolCall {
                    index: 0,
                    id: call_id.into(),
                    name: tool_name.into(),
                    arguments: args_json.into(),
                },
                ResponseEvent::Done,
            ],
            // Round 2 – model responds after the tool result
            vec![ResponseEvent::TextDelta(final_text.into()), ResponseEvent::Done],
        ])
    }
}

#[async_trait]
impl crate::Gateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn generate(&self, req: GenerationRequest) -> anyhow::Result<ResponseStream> {
        *self.last_request.lock().unwrap() = Some(req);
        let events = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                // Default fallback when all scripts are consumed
                vec![
                    ResponseEvent::TextDelta("[no more scripts]".into()),
                    ResponseEvent::Done,
                ]
            } else {
                scripts.remove(0)
            }
        };
        let wrapped: Vec<anyhow::Result<ResponseEvent>> = events.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(wrapped)))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::{Gateway, GenerationRequest, ResponseEvent, Turn};

    fn req_with_user(text: &str) -> GenerationRequest {
        GenerationRequest {
            history: vec![Turn::user(text)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn echo_repeats_last_user_turn() {
        let g = EchoGateway;
        let mut stream = g.generate(req_with_user("hi")).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        match first {
            ResponseEvent::TextDelta(t) => assert!(t.contains("MOCK: hi")),
            other => panic!("unexpected first event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn echo_ends_with_done() {
        let g = EchoGateway;
        let mut stream = g.generate(req_with_user("hi")).await.unwrap();
        let mut events = Vec::new();
        while let Some(ev) = stream.next().await {
            events.push(ev.unwrap());
        }
        assert!(matches!(events.last(), Some(ResponseEvent::Done)));
    }

    #[tokio::test]
    async fn scripted_single_text_reply() {
        let g = ScriptedGateway::always_text("hello world");
        let mut stream = g.generate(req_with_user("hi")).await.unwrap();
        let ev = stream.next().await.unwrap().unwrap();
        assert!(matches!(ev, ResponseEvent::TextDelta(t) if t == "hello world"));
    }

    #[tokio::test]
    async fn scripted_tool_then_text_two_rounds() {
        let g = ScriptedGateway::tool_then_text(
            "call-1",
            "file.readFile",
            r#"{"filePath":"a.txt"}"#,
            "done",
        );

        // Round 1
        let mut events = Vec::new();
        let mut stream = g.generate(req_with_user("go")).await.unwrap();
        while let Some(ev) = stream.next().await {
            events.push(ev.unwrap());
        }
        assert!(events
            .iter()
            .any(|e| matches!(e, ResponseEvent::ToolCall { name, .. } if name == "file.readFile")));

        // Round 2
        let mut events2 = Vec::new();
        let mut stream2 = g.generate(req_with_user("go")).await.unwrap();
        while let Some(ev) = stream2.next().await {
            events2.push(ev.unwrap());
        }
        assert!(events2
            .iter()
            .any(|e| matches!(e, ResponseEvent::TextDelta(t) if t == "done")));
    }

    #[tokio::test]
    async fn scripted_fallback_when_scripts_exhausted() {
        let g = ScriptedGateway::new(vec![]);
        let mut stream = g.generate(req_with_user("hi")).await.unwrap();
        let ev = stream.next().await.unwrap().unwrap();
        assert!(matches!(ev, ResponseEvent::TextDelta(t) if t.contains("no more scripts")));
    }

    #[tokio::test]
    async fn scripted_records_last_request() {
        let g = ScriptedGateway::always_text("ok");
        let _ = g.generate(req_with_user("inspect me")).await.unwrap();
        let last = g.last_request.lock().unwrap();
        let req = last.as_ref().expect("request should be captured");
        assert_eq!(req.history.len(), 1);
        assert_eq!(req.history[0].as_text(), Some("inspect me"));
    }
}
