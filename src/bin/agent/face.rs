use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use pagepilot::AgentStep;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info};

/// Progress pushed to the page over SSE. The variant name is the event name.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    Step { step: AgentStep },
    StepError { message: String },
    TaskComplete { summary: String, steps: usize },
    TaskError { message: String },
    Thinking,
    Ready,
}

impl AgentEvent {
    fn name(&self) -> &'static str {
        match self {
            AgentEvent::Step { .. } => "step",
            AgentEvent::StepError { .. } => "step_error",
            AgentEvent::TaskComplete { .. } => "task_complete",
            AgentEvent::TaskError { .. } => "task_error",
            AgentEvent::Thinking => "thinking",
            AgentEvent::Ready => "ready",
        }
    }

    fn to_sse_event(&self) -> Event {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Event::default().event(self.name()).data(data)
    }
}

#[derive(Clone)]
struct AppState {
    cmd_tx: mpsc::Sender<String>,
    event_tx: broadcast::Sender<AgentEvent>,
}

#[derive(Deserialize)]
struct CommandPayload {
    command: String,
}

/// Bind the first free port in 3000..3010 and serve the UI in the background.
pub async fn start_server() -> Result<(mpsc::Receiver<String>, broadcast::Sender<AgentEvent>)> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<String>(1);
    let (event_tx, _) = broadcast::channel::<AgentEvent>(64);

    let state = Arc::new(AppState {
        cmd_tx,
        event_tx: event_tx.clone(),
    });

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/command", post(command_handler))
        .route("/events", get(sse_handler))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .with_state(state);

    let mut bound = None;
    for port in 3000..3010 {
        if let Ok(listener) = tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
            bound = Some((listener, port));
            break;
        }
    }
    let (listener, port) =
        bound.ok_or_else(|| anyhow!("Could not bind to any port 3000-3009"))?;

    info!("Web UI running at http://localhost:{}", port);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web UI stopped: {}", e);
        }
    });

    Ok((cmd_rx, event_tx))
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn command_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CommandPayload>,
) -> StatusCode {
    let command = payload.command.trim().to_string();
    if command.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    debug!("POST /command: {}", command);
    // At most one command waits behind the running task; more are refused.
    match state.cmd_tx.try_send(command) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::CONFLICT,
    }
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.event_tx.subscribe())
        .filter_map(|result| result.ok().map(|event| Ok::<_, Infallible>(event.to_sse_event())));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>pagepilot</title>
<style>
  body { font: 14px/1.5 system-ui, sans-serif; background: #111418; color: #e4e6eb; margin: 0; }
  main { max-width: 760px; margin: 40px auto; padding: 0 16px; }
  form { display: flex; gap: 8px; }
  input { flex: 1; padding: 10px; border-radius: 6px; border: 1px solid #333a44; background: #1a1f26; color: inherit; }
  button { padding: 10px 18px; border: 0; border-radius: 6px; background: #3b82f6; color: white; cursor: pointer; }
  button:disabled { opacity: .5; cursor: default; }
  #log { margin-top: 20px; list-style: none; padding: 0; }
  #log li { padding: 6px 10px; border-left: 3px solid #333a44; margin-bottom: 4px; background: #161a20; }
  #log li.ok { border-color: #22c55e; }
  #log li.fail { border-color: #ef4444; }
  #log li.done { border-color: #a855f7; }
  #status { color: #8b949e; margin-top: 8px; }
</style>
</head>
<body>
<main>
  <h1>pagepilot</h1>
  <form id="form">
    <input id="cmd" placeholder="Describe a task for the current page" autofocus>
    <button id="go">Run</button>
  </form>
  <div id="status">Idle</div>
  <ul id="log"></ul>
</main>
<script>
  const log = document.getElementById('log');
  const status = document.getElementById('status');
  const go = document.getElementById('go');
  const cmd = document.getElementById('cmd');

  function add(text, cls) {
    const li = document.createElement('li');
    li.textContent = text;
    if (cls) li.className = cls;
    log.appendChild(li);
  }

  document.getElementById('form').addEventListener('submit', async e => {
    e.preventDefault();
    const command = cmd.value.trim();
    if (!command) return;
    log.innerHTML = '';
    add('Task: ' + command);
    go.disabled = true;
    const res = await fetch('/command', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ command }),
    });
    if (res.status === 409) { add('Another task is still running', 'fail'); go.disabled = false; }
    cmd.value = '';
  });

  const es = new EventSource('/events');
  es.addEventListener('step', e => {
    const { step } = JSON.parse(e.data);
    add('#' + step.iteration + ' ' + step.action + ' - ' + step.result, step.success ? 'ok' : 'fail');
  });
  es.addEventListener('step_error', e => add(JSON.parse(e.data).message, 'fail'));
  es.addEventListener('task_complete', e => {
    const d = JSON.parse(e.data);
    add(d.summary + ' (' + d.steps + ' steps)', 'done');
  });
  es.addEventListener('task_error', e => add(JSON.parse(e.data).message, 'fail'));
  es.addEventListener('thinking', () => { status.textContent = 'Thinking...'; });
  es.addEventListener('ready', () => { status.textContent = 'Idle'; go.disabled = false; });
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payloads_are_tagged() {
        let event = AgentEvent::TaskComplete {
            summary: "Sent".into(),
            steps: 3,
        };
        assert_eq!(event.name(), "task_complete");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "task_complete");
        assert_eq!(json["steps"], 3);

        let json = serde_json::to_value(AgentEvent::Ready).unwrap();
        assert_eq!(json["event"], "ready");
    }
}
