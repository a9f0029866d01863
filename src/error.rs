use std::time::Duration;

use thiserror::Error;

use crate::surface::NodeId;
use crate::types::AgentStep;

/// Errors raised by a [`PageSurface`](crate::surface::PageSurface) implementation.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The node handle no longer points at a connected element.
    #[error("node {0} is detached from the document")]
    Detached(NodeId),

    /// The page-side script threw or returned something unexpected.
    #[error("page script error: {0}")]
    Script(String),

    /// The browser connection itself failed.
    #[error("browser error: {0}")]
    Browser(String),

    #[error("malformed page response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The surface cannot perform this operation on the given node.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Errors from the reasoning capability.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("no content in LLM response: {0}")]
    EmptyResponse(String),

    #[error("{0}")]
    Other(String),
}

/// A directive that names a real action but cannot be dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("Unknown action '{0}'. Supported actions: click, type, scroll, select")]
    UnknownAction(String),

    #[error("Action '{action}' expects {expected} ({signature}), got {got}")]
    MissingParams {
        action: &'static str,
        signature: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Action '{action}': invalid {param}: {reason}")]
    InvalidParam {
        action: &'static str,
        param: &'static str,
        reason: String,
    },
}

/// Run-level failures of the agent. These are the only errors `execute_task`
/// returns; everything else ends as an unsuccessful [`AgentRun`](crate::agent::AgentRun).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM unreachable: {source}")]
    ChatFailed {
        #[source]
        source: ChatError,
        steps: Vec<AgentStep>,
    },

    #[error("LLM did not answer within {}ms", timeout.as_millis())]
    ChatTimeout {
        timeout: Duration,
        steps: Vec<AgentStep>,
    },
}

impl AgentError {
    /// Steps recorded before the remote call failed.
    pub fn steps(&self) -> &[AgentStep] {
        match self {
            AgentError::ChatFailed { steps, .. } | AgentError::ChatTimeout { steps, .. } => steps,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
