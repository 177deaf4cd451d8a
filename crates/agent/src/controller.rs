//! Workflow controller — the public face of the agent.
//!
//! One [`Agent`] drives one conversation. `submit` runs a workflow to
//! completion, while `approve`, `reject`, `cancel` and `clear` may be called
//! concurrently from the UI.
//!
//! Clearing bumps the conversation generation. Work still in flight from an
//! older generation keeps running until it notices its cancellation, but
//! nothing it writes reaches the stores.

use crate::approval::DecisionGate;
use crate::context::{ContextStore, MemoryStore, MessageLog};
use crate::lock;
use crate::prompt::system_prompt;
use crate::scope::Scope;
use crate::stream_handler;
use glossa_config::{AppConfig, UnknownToolPolicy};
use glossa_core::agent::{Decision, PendingDecision, WorkflowState};
use glossa_core::error::{Error, Result};
use glossa_core::memory::WorkingMemory;
use glossa_core::message::{ContextMessage, ModelMessage};
use glossa_core::provider::Provider;
use glossa_core::tool::ToolRegistry;
use glossa_tools::{TranslationOptions, default_registry};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runtime settings for the workflow loop.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Model that drives the workflow turns
    pub reasoning_model: String,
    /// Model tools use for one-shot generation
    pub tool_model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Safety limit on model turns per submission
    pub max_turns: u32,
    pub unknown_tool: UnknownToolPolicy,
    pub system_prompt: String,
}

impl AgentOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            reasoning_model: config.models.reasoning.clone(),
            tool_model: config.models.tool.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            max_turns: config.agent.max_turns,
            unknown_tool: config.agent.unknown_tool,
            system_prompt: config
                .agent
                .system_prompt_override
                .clone()
                .unwrap_or_else(|| system_prompt(&config.translation.target_language)),
        }
    }
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// How a submission ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Completed,
    /// Stopped by `cancel` or `clear`
    Aborted,
}

#[derive(Clone)]
struct ActiveRun {
    generation: u64,
    cancel: CancellationToken,
}

pub struct Agent {
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) tools: ToolRegistry,
    pub(crate) options: AgentOptions,
    pub(crate) context: ContextStore,
    pub(crate) memory: MemoryStore,
    pub(crate) gate: DecisionGate,
    pub(crate) generation: Mutex<u64>,
    state: watch::Sender<WorkflowState>,
    active: Mutex<Option<ActiveRun>>,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, tools: ToolRegistry, options: AgentOptions) -> Self {
        let (state, _) = watch::channel(WorkflowState::Idle);
        Self {
            provider,
            tools,
            options,
            context: ContextStore::new(),
            memory: MemoryStore::new(),
            gate: DecisionGate::new(),
            generation: Mutex::new(0),
            state,
            active: Mutex::new(None),
        }
    }

    /// Build an agent with the built-in tools, configured from `config`.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>) -> Self {
        let tools = default_registry(&TranslationOptions {
            target_language: config.translation.target_language.clone(),
            max_rejections: config.translation.max_rejections,
        });
        Self::new(provider, tools, AgentOptions::from_config(config))
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    // ── Commands ──────────────────────────────────────────────────────────

    /// Run a workflow for `text` until the model stops calling tools.
    ///
    /// Returns [`Error::Busy`] if a workflow is already running. A cancelled
    /// or cleared run ends with [`WorkflowOutcome::Aborted`] rather than an
    /// error.
    pub async fn submit(&self, text: impl Into<String>) -> Result<WorkflowOutcome> {
        let text = text.into();
        let run = self.begin_run()?;
        let _guard = RunGuard {
            agent: self,
            generation: run.generation,
        };
        let scope = Scope::new(self, run.generation, run.cancel.clone());

        scope.set_state(WorkflowState::UserInput);
        scope.add_message(ContextMessage::user(&text));
        scope.reset_memory(&text);
        info!(
            generation = run.generation,
            chars = text.chars().count(),
            "Workflow started"
        );

        let result = self.run_loop(&scope).await;
        self.settle(&scope, result)
    }

    /// Publish how a run ended. A cancelled run is aborted even if its last
    /// turn finished cleanly.
    fn settle(&self, scope: &Scope<'_>, result: Result<u32>) -> Result<WorkflowOutcome> {
        let generation = scope.generation();
        let cancelled = scope.cancel_token().is_cancelled();
        match result {
            Ok(turns) if !cancelled => {
                scope.update_memory(|memory| memory.is_complete = true);
                scope.set_state(WorkflowState::WorkflowComplete);
                info!(generation, turns, "Workflow complete");
                Ok(WorkflowOutcome::Completed)
            }
            Err(e) if !cancelled && !e.is_cancelled() => {
                error!(generation, error = %e, "Workflow failed");
                scope.set_state(WorkflowState::Error);
                Err(e)
            }
            _ => {
                scope.set_state(WorkflowState::Abort);
                info!(generation, "Workflow aborted");
                Ok(WorkflowOutcome::Aborted)
            }
        }
    }

    async fn run_loop(&self, scope: &Scope<'_>) -> Result<u32> {
        let max_turns = self.options.max_turns;

        for turn in 1..=max_turns {
            debug!(turn, max_turns, "Starting model turn");
            let finish_reason = stream_handler::run_turn(scope).await?;

            if !finish_reason.wants_another_turn() || self.memory.snapshot().is_complete {
                return Ok(turn);
            }
        }

        warn!(max_turns, "Workflow hit the turn limit");
        Err(Error::TurnLimit { max_turns })
    }

    fn begin_run(&self) -> Result<ActiveRun> {
        // Lock order: generation, then active
        let generation = lock(&self.generation);
        let mut active = lock(&self.active);
        if active.is_some() {
            warn!("Submit refused, a workflow is already running");
            return Err(Error::Busy);
        }

        let run = ActiveRun {
            generation: *generation,
            cancel: CancellationToken::new(),
        };
        *active = Some(run.clone());
        Ok(run)
    }

    /// Approve the pending decision. Returns false if nothing is pending.
    pub fn approve(&self) -> bool {
        let generation = *lock(&self.generation);
        self.gate.resolve(generation, Decision::approved())
    }

    /// Reject the pending decision. Returns false if nothing is pending.
    pub fn reject(&self, reason: Option<String>) -> bool {
        let generation = *lock(&self.generation);
        self.gate.resolve(generation, Decision::rejected(reason))
    }

    /// Stop the running workflow. Does nothing when none is running.
    pub fn cancel(&self) {
        let active = lock(&self.active).clone();
        match active {
            Some(run) => {
                info!(generation = run.generation, "Cancelling workflow");
                run.cancel.cancel();
                Scope::new(self, run.generation, run.cancel).set_state(WorkflowState::Abort);
            }
            None => debug!("Cancel ignored, no workflow is running"),
        }
    }

    /// Start a fresh conversation.
    ///
    /// Cancels any running workflow, drops its pending decision and empties
    /// both stores.
    pub fn clear(&self) {
        let mut generation = lock(&self.generation);
        *generation += 1;

        if let Some(run) = lock(&self.active).take() {
            run.cancel.cancel();
        }
        self.gate.reset();
        self.context.clear();
        self.memory.reset(String::new());
        self.publish_state(WorkflowState::Idle);

        info!(generation = *generation, "Conversation cleared");
    }

    /// Alias of [`Agent::clear`] used at startup.
    pub fn init(&self) {
        self.clear();
    }

    pub(crate) fn publish_state(&self, state: WorkflowState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Workflow state changed");
        }
    }

    // ── Observers ─────────────────────────────────────────────────────────

    pub fn state(&self) -> WorkflowState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    pub fn messages(&self) -> MessageLog {
        self.context.messages()
    }

    pub fn subscribe_messages(&self) -> watch::Receiver<MessageLog> {
        self.context.subscribe()
    }

    /// The log as the model would see it on the next turn.
    pub fn model_messages(&self) -> Vec<ModelMessage> {
        self.context.to_model_messages()
    }

    pub fn working_memory(&self) -> Arc<WorkingMemory> {
        self.memory.snapshot()
    }

    pub fn subscribe_memory(&self) -> watch::Receiver<Arc<WorkingMemory>> {
        self.memory.subscribe()
    }

    pub fn pending_decision(&self) -> Option<PendingDecision> {
        self.gate.pending()
    }

    pub fn subscribe_pending(&self) -> watch::Receiver<Option<PendingDecision>> {
        self.gate.subscribe()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub fn generation(&self) -> u64 {
        *lock(&self.generation)
    }
}

/// Releases the active-run slot when `submit` returns or is dropped.
struct RunGuard<'a> {
    agent: &'a Agent,
    generation: u64,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut active = lock(&self.agent.active);
        if active
            .as_ref()
            .is_some_and(|run| run.generation == self.generation)
        {
            *active = None;
        }
    }
}
