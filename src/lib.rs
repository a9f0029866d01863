//! In-page automation agent: detect the interactive elements of a web page,
//! let an LLM pick one action at a time, and execute it against the DOM.

pub mod agent;
pub mod brain;
pub mod config;
pub mod directive;
pub mod dom;
pub mod error;
pub mod executor;
pub mod fake_page;
pub mod hands;
pub mod surface;
pub mod types;

pub use agent::{Agent, AgentRun};
pub use brain::{ChatCapability, OpenAiChat};
pub use config::Config;
pub use directive::{Action, Completion, Directive, Reply, ScrollDirection};
pub use dom::{DetectedElement, DetectionResult, Detector};
pub use error::{AgentError, ChatError, ConfigError, DirectiveError, SurfaceError};
pub use executor::{ActionResult, ClickOptions, Executor, InputOptions};
pub use surface::PageSurface;
pub use types::{AgentStep, ChatMessage, Role};
