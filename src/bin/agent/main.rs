mod face;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use face::AgentEvent;
use pagepilot::hands::BrowserSession;
use pagepilot::surface::PageSurface;
use pagepilot::{Agent, AgentError, AgentRun, Config, Detector, Executor, OpenAiChat};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "agent", about = "Drive a browser page with an LLM, one action at a time")]
struct Args {
    /// Config file (defaults to the per-user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// DevTools endpoint of a running Chrome, e.g. http://127.0.0.1:9222
    #[arg(long)]
    attach: Option<String>,

    /// Launch Chrome without a window
    #[arg(long)]
    headless: bool,

    /// Page to open before the first task
    #[arg(long)]
    start_url: Option<String>,

    /// Run a single task and exit instead of serving the web UI
    #[arg(long)]
    task: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagepilot=info,agent=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(attach) = args.attach {
        config.browser.attach_url = Some(attach);
    }
    if args.headless {
        config.browser.headless = true;
    }
    if let Some(url) = args.start_url {
        config.browser.start_url = Some(url);
    }

    match args.task {
        Some(task) => run_once(&config, &task).await,
        None => serve(&config).await,
    }
}

fn build_agent(config: &Config, session: &BrowserSession) -> Result<Agent> {
    let surface: Arc<dyn PageSurface> = Arc::new(session.page());
    let chat = OpenAiChat::new(&config.llm, config.agent.history_window)?;
    Ok(Agent::new(
        Arc::new(chat),
        Detector::new(surface.clone(), config.detector.clone()),
        Executor::new(surface, config.executor.clone()),
        config.agent.clone(),
    ))
}

async fn run_once(config: &Config, task: &str) -> Result<()> {
    let session = BrowserSession::open(&config.browser).await?;
    let mut agent = build_agent(config, &session)?;

    let cancel = agent.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling task");
            cancel.cancel();
        }
    });

    let outcome = agent
        .execute_task_with_progress(task, |step| {
            let mark = if step.success { "ok" } else { "FAILED" };
            println!("[{}] {} -> {} ({})", step.iteration, step.action, step.result, mark);
        })
        .await;

    match outcome {
        Ok(run) if run.success => {
            println!("Done: {}", run.message);
            Ok(())
        }
        Ok(run) => anyhow::bail!("Task failed after {} steps: {}", run.steps.len(), run.message),
        Err(e) => Err(e.into()),
    }
}

async fn serve(config: &Config) -> Result<()> {
    info!("Starting pagepilot...");

    // Web UI first so the user sees something while Chrome starts.
    let (mut cmd_rx, event_tx) = face::start_server().await?;

    let session = BrowserSession::open(&config.browser).await?;
    let mut agent = build_agent(config, &session)?;
    info!("Agent ready. Waiting for commands...");
    let _ = event_tx.send(AgentEvent::Ready);

    while let Some(command) = cmd_rx.recv().await {
        info!("Received command: '{}'", command);
        run_task(&mut agent, &command, &event_tx).await;
    }

    Ok(())
}

async fn run_task(agent: &mut Agent, command: &str, events: &broadcast::Sender<AgentEvent>) {
    let _ = events.send(AgentEvent::Thinking);

    let outcome = agent
        .execute_task_with_progress(command, |step| {
            let _ = events.send(AgentEvent::Step { step: step.clone() });
            if !step.success {
                let _ = events.send(AgentEvent::StepError {
                    message: step.result.clone(),
                });
            } else {
                let _ = events.send(AgentEvent::Thinking);
            }
        })
        .await;

    let _ = events.send(outcome_event(outcome));
    let _ = events.send(AgentEvent::Ready);
}

fn outcome_event(outcome: Result<AgentRun, AgentError>) -> AgentEvent {
    match outcome {
        Ok(run) if run.success => {
            info!("Task complete: {}", run.message);
            AgentEvent::TaskComplete {
                summary: run.message,
                steps: run.steps.len(),
            }
        }
        Ok(run) => {
            warn!("Task failed: {}", run.message);
            AgentEvent::TaskError {
                message: run.message,
            }
        }
        Err(e) => {
            error!("Task aborted after {} steps: {:#}", e.steps().len(), e);
            AgentEvent::TaskError {
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagepilot::ChatError;

    #[test]
    fn test_outcome_event_maps_runs() {
        let run = AgentRun {
            success: true,
            message: "Sent".into(),
            steps: Vec::new(),
            completion: None,
        };
        assert!(matches!(
            outcome_event(Ok(run)),
            AgentEvent::TaskComplete { steps: 0, .. }
        ));

        let err = AgentError::ChatFailed {
            source: ChatError::Other("connection refused".into()),
            steps: Vec::new(),
        };
        match outcome_event(Err(err)) {
            AgentEvent::TaskError { message } => assert!(message.contains("connection refused")),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
