//! The ReAct controller: observe the page, ask the LLM, act, repeat.
//!
//! One `execute_task` call runs until the LLM completes, an action fails, the
//! iteration cap is hit, or the run is cancelled. Only remote-call failures
//! surface as `Err`; every other outcome is an [`AgentRun`].

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::brain::ChatCapability;
use crate::config::AgentConfig;
use crate::directive::{Action, Completion, Directive, Reply};
use crate::dom::Detector;
use crate::error::{AgentError, ChatError};
use crate::executor::{ActionResult, ClickOptions, Executor, InputOptions};
use crate::types::{AgentStep, ChatMessage};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRun {
    pub success: bool,
    pub message: String,
    pub steps: Vec<AgentStep>,
    /// How the run completed, if it did.
    #[serde(skip)]
    pub completion: Option<Completion>,
}

pub struct Agent {
    chat: Arc<dyn ChatCapability>,
    detector: Detector,
    executor: Executor,
    config: AgentConfig,
    history: Vec<ChatMessage>,
    cancel: CancellationToken,
}

impl Agent {
    pub fn new(
        chat: Arc<dyn ChatCapability>,
        detector: Detector,
        executor: Executor,
        config: AgentConfig,
    ) -> Self {
        Self {
            chat,
            detector,
            executor,
            config,
            history: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the current (and any later) run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Arm a fresh token after a cancellation.
    pub fn reset_cancellation(&mut self) {
        self.cancel = CancellationToken::new();
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub async fn execute_task(&mut self, task: &str) -> Result<AgentRun, AgentError> {
        self.execute_task_with_progress(task, |_| {}).await
    }

    /// Run `task`, calling `on_progress` once per executed action.
    pub async fn execute_task_with_progress<F>(
        &mut self,
        task: &str,
        mut on_progress: F,
    ) -> Result<AgentRun, AgentError>
    where
        F: FnMut(&AgentStep) + Send,
    {
        info!("Starting task: {}", task);
        let mut steps: Vec<AgentStep> = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            if self.cancel.is_cancelled() {
                return Ok(failed("Task cancelled", steps));
            }

            // Observe
            let detection = self.detector.detect_elements().await;
            let elements_count = detection.total_count;
            if elements_count == 0 {
                warn!("No interactive elements on {}", detection.url);
                return Ok(failed(
                    format!(
                        "No interactive elements found on {}; cannot proceed",
                        detection.url
                    ),
                    steps,
                ));
            }
            let mut message = String::new();
            if iteration == 1 {
                message.push_str(&format!("Task: {task}\n\n"));
            }
            message.push_str(&format!(
                "Current URL: {}\n\nAvailable elements:\n{}",
                detection.url, detection.pseudo_html
            ));

            // Decide
            debug!("Iteration {}: asking LLM ({} elements)", iteration, elements_count);
            let reply = match self.ask(&message).await {
                Ok(Some(reply)) => reply,
                Ok(None) => return Ok(failed("Task cancelled", steps)),
                Err(ChatFailure::Timeout) => {
                    warn!("LLM call timed out");
                    return Err(AgentError::ChatTimeout {
                        timeout: self.config.chat_timeout(),
                        steps,
                    });
                }
                Err(ChatFailure::Error(source)) => {
                    warn!("LLM call failed: {}", source);
                    return Err(AgentError::ChatFailed { source, steps });
                }
            };
            self.remember(ChatMessage::user(message));
            self.remember(ChatMessage::assistant(reply.clone()));

            let directive = match Reply::classify(&reply) {
                Reply::Complete { kind, message } => {
                    info!("Task complete ({:?}): {}", kind, message);
                    return Ok(AgentRun {
                        success: true,
                        message,
                        steps,
                        completion: Some(kind),
                    });
                }
                Reply::Act(directive) => directive,
            };

            // Act
            let rendered = directive.to_string();
            info!("Step {}: {}", iteration, rendered);
            let result = self.dispatch(&directive).await;
            let step = AgentStep {
                iteration,
                action: rendered.clone(),
                result: result.message.clone(),
                success: result.success,
                elements_count,
            };
            on_progress(&step);
            steps.push(step);

            if !result.success {
                warn!("Step {} failed: {}", iteration, result.message);
                self.remember(ChatMessage::user(format!(
                    "Action {rendered} failed: {}",
                    result.message
                )));
                return Ok(failed(
                    format!("Action {rendered} failed: {}", result.message),
                    steps,
                ));
            }

            self.remember(ChatMessage::user(format!(
                "Action {rendered} completed: {}",
                result.message
            )));

            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(failed("Task cancelled", steps)),
                _ = tokio::time::sleep(self.config.settle_delay()) => {}
            }
        }

        warn!("Iteration cap reached ({})", self.config.max_iterations);
        Ok(failed(
            format!(
                "Reached maximum iterations ({}) without completing the task",
                self.config.max_iterations
            ),
            steps,
        ))
    }

    /// One chat call, bounded by the timeout. `Ok(None)` means cancelled.
    async fn ask(&self, message: &str) -> Result<Option<String>, ChatFailure> {
        let call = tokio::time::timeout(
            self.config.chat_timeout(),
            self.chat.chat(message, &self.history),
        );
        tokio::select! {
            _ = self.cancel.cancelled() => Ok(None),
            outcome = call => match outcome {
                Ok(Ok(reply)) => Ok(Some(reply)),
                Ok(Err(e)) => Err(ChatFailure::Error(e)),
                Err(_) => Err(ChatFailure::Timeout),
            },
        }
    }

    async fn dispatch(&self, directive: &Directive) -> ActionResult {
        let action = match Action::try_from(directive) {
            Ok(action) => action,
            Err(e) => return ActionResult::fail(e.to_string()),
        };

        let detector = &self.detector;
        match action {
            Action::Click { index } => {
                self.executor
                    .click_element(detector, index, ClickOptions::default())
                    .await
            }
            Action::Type { index, text } => {
                self.executor
                    .input_text(detector, index, &text, InputOptions::default())
                    .await
            }
            Action::Scroll { direction, amount } => self.executor.scroll(direction, amount).await,
            Action::Select { index, option } => {
                self.executor.select_option(detector, index, &option).await
            }
        }
    }

    fn remember(&mut self, message: ChatMessage) {
        self.history.push(message);
        if self.history.len() > self.config.max_history {
            let excess = self.history.len() - self.config.max_history;
            self.history.drain(..excess);
        }
    }
}

enum ChatFailure {
    Timeout,
    Error(ChatError),
}

fn failed(message: impl Into<String>, steps: Vec<AgentStep>) -> AgentRun {
    AgentRun {
        success: false,
        message: message.into(),
        steps,
        completion: None,
    }
}
