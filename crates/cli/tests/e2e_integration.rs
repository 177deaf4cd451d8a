//! End-to-end integration tests for the Glossa translation workflow.
//!
//! These tests drive a real [`Agent`] with the built-in tools against a
//! scripted provider, playing the reviewer through the public observer API.
//! The provider only implements `complete`, so workflow turns go through the
//! default replay-as-stream path.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use glossa_agent::{Agent, AgentOptions, WorkflowOutcome};
use glossa_config::AppConfig;
use glossa_core::agent::{PendingDecision, WorkflowState};
use glossa_core::error::{Error, ProviderError, ToolError};
use glossa_core::message::{
    AssistantContent, MessageBody, MessageToolCall, ModelMessage, Role, ToolStatus,
};
use glossa_core::provider::{FinishReason, Provider, ProviderRequest, ProviderResponse, Usage};
use glossa_tools::{TranslationOptions, default_registry};
use tokio_util::sync::CancellationToken;

// ── Scripted Provider ────────────────────────────────────────────────────

/// Returns scripted responses in sequence.
///
/// Requests carrying tool definitions are workflow turns; the rest are the
/// one-shot calls tools make. Each kind has its own queue. An empty queue
/// blocks until the request is cancelled.
#[derive(Default)]
struct ScriptedProvider {
    turns: Mutex<VecDeque<ProviderResponse>>,
    tool_replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<ProviderResponse>, tool_replies: Vec<&str>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            tool_replies: Mutex::new(tool_replies.into_iter().map(String::from).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn tool_requests(&self) -> Vec<ProviderRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.tools.is_empty())
            .collect()
    }

    fn turn_requests(&self) -> Vec<ProviderRequest> {
        self.requests()
            .into_iter()
            .filter(|r| !r.tools.is_empty())
            .collect()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());

        let scripted = if request.tools.is_empty() {
            self.tool_replies
                .lock()
                .unwrap()
                .pop_front()
                .map(|text| text_response(&text, None))
        } else {
            self.turns.lock().unwrap().pop_front()
        };

        match scripted {
            Some(response) => Ok(response),
            None => {
                cancel.cancelled().await;
                Err(ProviderError::Cancelled)
            }
        }
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

fn text_response(text: &str, reasoning: Option<&str>) -> ProviderResponse {
    ProviderResponse {
        message: ModelMessage::assistant(text),
        reasoning: reasoning.map(String::from),
        usage: usage(),
        model: "mock".into(),
        finish_reason: Some(FinishReason::Stop),
    }
}

fn tool_response(name: &str, args: serde_json::Value, reasoning: &str) -> ProviderResponse {
    tool_response_raw(name, &serde_json::to_string(&args).unwrap(), reasoning)
}

fn tool_response_raw(name: &str, arguments: &str, reasoning: &str) -> ProviderResponse {
    ProviderResponse {
        message: ModelMessage::assistant_tool_calls(vec![MessageToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }]),
        reasoning: Some(reasoning.to_string()),
        usage: usage(),
        model: "mock".into(),
        finish_reason: Some(FinishReason::ToolCalls),
    }
}

fn build_agent(provider: Arc<ScriptedProvider>, max_rejections: Option<u32>) -> Arc<Agent> {
    let mut config = AppConfig::default();
    config.translation.target_language = "Chinese".into();
    config.translation.max_rejections = max_rejections;

    let tools = default_registry(&TranslationOptions {
        target_language: config.translation.target_language.clone(),
        max_rejections,
    });
    let agent = Arc::new(Agent::new(provider, tools, AgentOptions::from_config(&config)));
    agent.init();
    agent
}

fn spawn_submit(
    agent: &Arc<Agent>,
    text: &str,
) -> tokio::task::JoinHandle<glossa_core::Result<WorkflowOutcome>> {
    let agent = agent.clone();
    let text = text.to_string();
    tokio::spawn(async move { agent.submit(text).await })
}

async fn join(
    handle: tokio::task::JoinHandle<glossa_core::Result<WorkflowOutcome>>,
) -> glossa_core::Result<WorkflowOutcome> {
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("workflow did not finish")
        .unwrap()
}

/// Wait for a review request other than `after`.
async fn review(agent: &Agent, after: Option<&PendingDecision>) -> PendingDecision {
    let mut rx = agent.subscribe_pending();
    let after = after.map(|p| p.id.clone());
    let next = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|p| p.as_ref().is_some_and(|p| Some(&p.id) != after.as_ref())),
    )
    .await
    .expect("no review request")
    .unwrap()
    .clone();
    next.unwrap()
}

// ── E2E: Happy path ──────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_translate_single_sentence() {
    // Scenario: "Hello world." is split into one segment, translated, and
    // approved on the first attempt.
    let provider = Arc::new(ScriptedProvider::new(
        vec![
            tool_response(
                "split",
                serde_json::json!({"text": "Hello world."}),
                "Plan: split, then translate each segment.",
            ),
            tool_response(
                "translate",
                serde_json::json!({"src_string": "Hello world."}),
                "Translate the only segment.",
            ),
            text_response("翻译完成。", Some("All segments are done.")),
        ],
        vec![r#"{"indices": [12]}"#, "你好，世界。"],
    ));
    let agent = build_agent(provider.clone(), None);

    let handle = spawn_submit(&agent, "Hello world.");
    let request = review(&agent, None).await;
    assert_eq!(request.payload["sentence"], "Hello world.");
    assert_eq!(request.payload["translated"], "你好，世界。");
    assert_eq!(agent.state(), WorkflowState::ToolAuditPending);
    assert!(agent.approve());

    assert_eq!(join(handle).await.unwrap(), WorkflowOutcome::Completed);
    assert_eq!(agent.state(), WorkflowState::WorkflowComplete);

    let memory = agent.working_memory();
    assert!(memory.is_complete);
    assert_eq!(memory.split_texts, vec!["Hello world."]);
    assert_eq!(memory.translation_results.len(), 1);
    assert_eq!(memory.translation_results[0].translated, "你好，世界。");
    assert_eq!(memory.translation_results[0].rejection_count, 0);
    assert_eq!(memory.assembled_translation(), "你好，世界。");

    // Three workflow turns, two tool-model calls
    assert_eq!(provider.turn_requests().len(), 3);
    let tool_requests = provider.tool_requests();
    assert_eq!(tool_requests.len(), 2);
    assert!(tool_requests[0].json_mode);
    assert_eq!(tool_requests[1].messages[0].content, "translate this sentence: Hello world.");

    // Reasoning is shown to the user but never sent back to the model
    let messages = agent.messages();
    assert!(messages.iter().any(|m| matches!(
        &m.body,
        MessageBody::Assistant { content: AssistantContent::Reasoning { text } }
            if text == "Plan: split, then translate each segment."
    )));
    let final_turn = &provider.turn_requests()[2];
    assert!(final_turn
        .messages
        .iter()
        .all(|m| !m.content.contains("Plan: split")));
    assert_eq!(
        final_turn.messages.iter().filter(|m| m.role == Role::Tool).count(),
        2
    );
}

#[tokio::test]
async fn e2e_translate_two_segments_in_order() {
    let text = "Good morning. See you later.";
    let provider = Arc::new(ScriptedProvider::new(
        vec![
            tool_response("split", serde_json::json!({"text": text}), "Split first."),
            tool_response(
                "translate",
                serde_json::json!({"src_string": "Good morning."}),
                "Segment one.",
            ),
            tool_response(
                "translate",
                serde_json::json!({"src_string": " See you later."}),
                "Segment two.",
            ),
            text_response("Done.", None),
        ],
        vec!["[13]", "早上好。", "回头见。"],
    ));
    let agent = build_agent(provider, None);

    let handle = spawn_submit(&agent, text);
    let first = review(&agent, None).await;
    assert_eq!(first.payload["translated"], "早上好。");
    agent.approve();
    let second = review(&agent, Some(&first)).await;
    assert_eq!(second.payload["translated"], "回头见。");
    agent.approve();

    assert_eq!(join(handle).await.unwrap(), WorkflowOutcome::Completed);

    let memory = agent.working_memory();
    assert_eq!(memory.split_texts.len(), 2);
    assert_eq!(memory.current_translation_index, 1);
    assert!(memory.is_consistent());
    assert_eq!(memory.assembled_translation(), "早上好。 回头见。");
}

// ── E2E: Review loop ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_reject_then_approve_uses_negative_exemplar() {
    let provider = Arc::new(ScriptedProvider::new(
        vec![
            tool_response(
                "translate",
                serde_json::json!({"src_string": "Hello world."}),
                "Translate directly.",
            ),
            text_response("Done.", None),
        ],
        vec!["哈喽世界", "你好，世界。"],
    ));
    let agent = build_agent(provider.clone(), None);

    let handle = spawn_submit(&agent, "Hello world.");
    let first = review(&agent, None).await;
    assert_eq!(first.payload["translated"], "哈喽世界");
    assert!(agent.reject(Some("too literal".into())));

    let second = review(&agent, Some(&first)).await;
    assert_eq!(second.payload["translated"], "你好，世界。");
    assert_eq!(second.payload["attempt"], 2);
    assert!(agent.approve());

    assert_eq!(join(handle).await.unwrap(), WorkflowOutcome::Completed);

    let memory = agent.working_memory();
    assert_eq!(memory.translation_results.len(), 1);
    assert_eq!(memory.translation_results[0].rejection_count, 1);
    assert!(memory.in_review.is_none());

    let retry_system = provider.tool_requests()[1].system.clone().unwrap();
    assert!(retry_system.contains("<original-sentence>Hello world.</original-sentence>"));
    assert!(retry_system.contains("<rejected-translated>哈喽世界</rejected-translated>"));
    assert!(retry_system.contains("too literal"));
}

#[tokio::test]
async fn e2e_review_gives_up_after_max_rejections() {
    let provider = Arc::new(ScriptedProvider::new(
        vec![tool_response(
            "translate",
            serde_json::json!({"src_string": "Hello world."}),
            "Translate.",
        )],
        vec!["A", "B"],
    ));
    let agent = build_agent(provider, Some(2));

    let handle = spawn_submit(&agent, "Hello world.");
    let first = review(&agent, None).await;
    agent.reject(None);
    review(&agent, Some(&first)).await;
    agent.reject(Some("still wrong".into()));

    let err = join(handle).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Tool(ToolError::ReviewExhausted { rejections: 2, .. })
    ));
    assert_eq!(agent.state(), WorkflowState::Error);
    assert!(agent.working_memory().translation_results.is_empty());

    let settled = agent.messages().last().cloned().unwrap();
    assert_eq!(settled.tool_status(), Some(ToolStatus::Rejected));
}

// ── E2E: Failures and control ────────────────────────────────────────────

#[tokio::test]
async fn e2e_mid_stream_error_keeps_partial_reasoning() {
    // Malformed tool input surfaces as an error event after the reasoning
    let provider = Arc::new(ScriptedProvider::new(
        vec![tool_response_raw("split", "{\"text\": ", "Plan: split.")],
        vec![],
    ));
    let agent = build_agent(provider, None);

    let err = agent.submit("Hello world.").await.unwrap_err();
    assert!(matches!(err, Error::Provider(ProviderError::Stream(_))));
    assert_eq!(agent.state(), WorkflowState::Error);

    let messages = agent.messages();
    assert!(matches!(
        &messages[1].body,
        MessageBody::Assistant { content: AssistantContent::Reasoning { text } } if text == "Plan: split."
    ));
    assert!(messages.iter().all(|m| m.tool_status().is_none()));
}

#[tokio::test]
async fn e2e_cancel_during_tool_execution() {
    // No tool reply is scripted, so the translate tool hangs in its model call
    let provider = Arc::new(ScriptedProvider::new(
        vec![tool_response(
            "translate",
            serde_json::json!({"src_string": "Hello world."}),
            "Translate.",
        )],
        vec![],
    ));
    let agent = build_agent(provider, None);

    let handle = spawn_submit(&agent, "Hello world.");
    let mut state = agent.subscribe_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == WorkflowState::ToolExecuting),
    )
    .await
    .unwrap()
    .unwrap();

    agent.cancel();
    assert_eq!(join(handle).await.unwrap(), WorkflowOutcome::Aborted);
    assert_eq!(agent.state(), WorkflowState::Abort);
    assert_eq!(
        agent.messages().last().unwrap().tool_status(),
        Some(ToolStatus::Pending)
    );
}

#[tokio::test]
async fn e2e_cancel_without_workflow_is_noop() {
    let agent = build_agent(Arc::new(ScriptedProvider::default()), None);
    agent.cancel();
    assert_eq!(agent.state(), WorkflowState::Idle);
    assert!(agent.messages().is_empty());
}

#[tokio::test]
async fn e2e_clear_then_new_conversation() {
    let provider = Arc::new(ScriptedProvider::new(
        vec![
            tool_response(
                "translate",
                serde_json::json!({"src_string": "Hello world."}),
                "Translate.",
            ),
            text_response("Hi there!", None),
        ],
        vec!["你好，世界。"],
    ));
    let agent = build_agent(provider.clone(), None);

    let stale = spawn_submit(&agent, "Hello world.");
    review(&agent, None).await;
    agent.clear();
    assert_eq!(join(stale).await.unwrap(), WorkflowOutcome::Aborted);
    assert_eq!(agent.state(), WorkflowState::Idle);

    // The fresh conversation starts from an empty log
    assert_eq!(agent.submit("Hi").await.unwrap(), WorkflowOutcome::Completed);
    let last_turn = provider.turn_requests().pop().unwrap();
    assert_eq!(last_turn.messages.len(), 1);
    assert_eq!(last_turn.messages[0].content, "Hi");
    assert_eq!(agent.working_memory().original_text, "Hi");
}
