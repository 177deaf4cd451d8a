//! Shared test fixtures: a scripted provider and workflow helpers.

use crate::controller::{Agent, AgentOptions};
use async_trait::async_trait;
use glossa_core::agent::{PendingDecision, WorkflowState};
use glossa_core::error::ProviderError;
use glossa_core::message::ModelMessage;
use glossa_core::provider::{
    FinishReason, Provider, ProviderRequest, ProviderResponse, StreamEvent,
};
use glossa_core::tool::ToolRegistry;
use glossa_tools::{TranslationOptions, default_registry};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Script {
    turns: VecDeque<Vec<StreamEvent>>,
    completions: VecDeque<String>,
    stream_requests: Vec<ProviderRequest>,
    complete_requests: Vec<ProviderRequest>,
}

/// A provider that plays back scripted turns and completions.
///
/// A turn whose events do not end in `FinishStep` or `Error` keeps its
/// stream open until cancelled, like a slow model would. `complete` with
/// nothing scripted blocks until cancelled.
#[derive(Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
    hold_open: bool,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                turns: VecDeque::new(),
                completions: VecDeque::new(),
                stream_requests: Vec::new(),
                complete_requests: Vec::new(),
            })),
            hold_open: false,
        }
    }

    pub fn with_turn(self, events: Vec<StreamEvent>) -> Self {
        self.script.lock().unwrap().turns.push_back(events);
        self
    }

    pub fn with_completion(self, text: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .completions
            .push_back(text.to_string());
        self
    }

    /// Keep unfinished streams open until cancelled instead of closing them.
    pub fn holding_streams_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn stream_requests(&self) -> Vec<ProviderRequest> {
        self.script.lock().unwrap().stream_requests.clone()
    }

    pub fn complete_requests(&self) -> Vec<ProviderRequest> {
        self.script.lock().unwrap().complete_requests.clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.complete_requests.push(request.clone());
            script.completions.pop_front()
        };

        match reply {
            Some(text) => Ok(ProviderResponse {
                message: ModelMessage::assistant(text),
                reasoning: None,
                usage: None,
                model: request.model,
                finish_reason: Some(FinishReason::Stop),
            }),
            None => {
                cancel.cancelled().await;
                Err(ProviderError::Cancelled)
            }
        }
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        let events = {
            let mut script = self.script.lock().unwrap();
            script.stream_requests.push(request);
            script
                .turns
                .pop_front()
                .ok_or_else(|| ProviderError::InvalidResponse("no scripted turn left".into()))?
        };

        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            tx.try_send(event).unwrap();
        }
        if self.hold_open {
            tokio::spawn(async move {
                cancel.cancelled().await;
                drop(tx);
            });
        }
        Ok(rx)
    }
}

/// Reasoning, a tool call streamed in two fragments, then `tool-calls`.
pub fn tool_call_turn(id: &str, tool_name: &str, input: serde_json::Value) -> Vec<StreamEvent> {
    let raw = input.to_string();
    let (head, tail) = raw.split_at(raw.len() / 2);
    vec![
        StreamEvent::ReasoningDelta {
            text: format!("Next I call {tool_name}."),
        },
        StreamEvent::ToolInputStart {
            id: id.into(),
            tool_name: tool_name.into(),
        },
        StreamEvent::ToolInputDelta {
            id: id.into(),
            delta: head.into(),
        },
        StreamEvent::ToolInputDelta {
            id: id.into(),
            delta: tail.into(),
        },
        StreamEvent::ToolCall {
            id: id.into(),
            tool_name: tool_name.into(),
            input,
        },
        StreamEvent::FinishStep {
            finish_reason: FinishReason::ToolCalls,
        },
    ]
}

/// A plain text answer that ends the workflow.
pub fn text_turn(text: &str) -> Vec<StreamEvent> {
    vec![
        StreamEvent::TextDelta { text: text.into() },
        StreamEvent::FinishStep {
            finish_reason: FinishReason::Stop,
        },
    ]
}

pub fn test_registry() -> ToolRegistry {
    default_registry(&TranslationOptions {
        target_language: "Chinese".into(),
        max_rejections: None,
    })
}

pub fn test_agent(provider: ScriptedProvider) -> Arc<Agent> {
    Arc::new(Agent::new(
        Arc::new(provider),
        test_registry(),
        AgentOptions::default(),
    ))
}

/// Wait for a pending decision other than `after`.
pub async fn next_pending(agent: &Agent, after: Option<&str>) -> PendingDecision {
    let mut rx = agent.subscribe_pending();
    let wait = rx.wait_for(|pending| {
        pending
            .as_ref()
            .is_some_and(|p| Some(p.id.as_str()) != after)
    });
    let pending = tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("no pending decision")
        .unwrap();
    pending.clone().unwrap()
}

pub async fn wait_for_state(agent: &Agent, state: WorkflowState) {
    let mut rx = agent.subscribe_state();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
        .await
        .expect("state never reached")
        .unwrap();
}
