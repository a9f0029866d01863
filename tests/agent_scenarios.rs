//! End-to-end runs of the agent loop against the in-memory page.

use std::sync::Arc;

use pagepilot::config::{AgentConfig, DetectorConfig, ExecutorConfig};
use pagepilot::fake_page::{FakeElement, FakePage};
use pagepilot::surface::{NodeId, PageSurface};
use pagepilot::{Agent, ChatCapability, ChatError, ChatMessage, Completion, Detector, Executor};
use parking_lot::Mutex;

struct Form {
    page: Arc<FakePage>,
    name: NodeId,
    priority: NodeId,
    save: NodeId,
}

fn form_page() -> Form {
    let page = Arc::new(FakePage::new("https://tracker.test/issues/new"));
    let root = page.root();
    let name = page.append(
        root,
        FakeElement::new("input")
            .attr("type", "text")
            .attr("placeholder", "Title"),
    );
    let priority = page.append(
        root,
        FakeElement::new("select")
            .attr("name", "priority")
            .option("Low", "low")
            .option("Medium", "medium")
            .option("High", "high"),
    );
    let save = page.append(root, FakeElement::new("button").text("Save"));
    page.append(root, FakeElement::new("p").text("Fields marked * are required"));
    Form {
        page,
        name,
        priority,
        save,
    }
}

fn agent_for(page: &Arc<FakePage>, chat: Arc<dyn ChatCapability>) -> Agent {
    let surface: Arc<dyn PageSurface> = page.clone();
    let config = AgentConfig {
        settle_delay_ms: 0,
        ..AgentConfig::default()
    };
    Agent::new(
        chat,
        Detector::new(surface.clone(), DetectorConfig::default()),
        Executor::new(surface, ExecutorConfig::immediate()),
        config,
    )
}

/// Replies in order; every message the agent sent is kept for inspection.
fn script(replies: &[&str]) -> (Arc<dyn ChatCapability>, Arc<Mutex<Vec<String>>>) {
    let replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let chat = move |message: &str, _history: &[ChatMessage]| -> Result<String, ChatError> {
        let mut log = log.lock();
        log.push(message.to_string());
        replies
            .get(log.len() - 1)
            .cloned()
            .ok_or_else(|| ChatError::Other("script exhausted".into()))
    };
    let chat: Arc<dyn ChatCapability> = Arc::new(chat);
    (chat, seen)
}

#[tokio::test]
async fn test_fills_and_submits_form() {
    let form = form_page();
    let (chat, seen) = script(&[
        r#"ACTION: type(0, "Crash on save")"#,
        r#"ACTION: select(1, "High")"#,
        "ACTION: click(2)",
        "DONE: Created the issue with high priority",
    ]);
    let mut agent = agent_for(&form.page, chat);

    let mut progress = Vec::new();
    let run = agent
        .execute_task_with_progress("File a high priority bug", |step| {
            progress.push(step.action.clone())
        })
        .await
        .unwrap();

    assert!(run.success, "{}", run.message);
    assert_eq!(run.message, "Created the issue with high priority");
    assert_eq!(run.completion, Some(Completion::Declared));
    assert_eq!(run.steps.len(), 3);
    assert!(run.steps.iter().all(|s| s.success && s.elements_count == 3));
    assert_eq!(
        progress,
        vec![r#"type(0, "Crash on save")"#, r#"select(1, "High")"#, "click(2)"]
    );

    assert_eq!(form.page.value(form.name), "Crash on save");
    assert_eq!(form.page.value(form.priority), "high");
    assert!(form.page.events(form.save).contains(&"click".to_string()));

    let seen = seen.lock();
    assert_eq!(seen.len(), 4);
    assert!(seen[0].starts_with("Task: File a high priority bug"));
    assert!(seen[0].contains(r#"[1]<select name="priority">"#));
    assert!(!seen[1].contains("Task:"));
    // Inventory is refreshed and reflects the typed value.
    assert!(seen[1].contains(r#"value="Crash on save""#));
}

#[tokio::test]
async fn test_stale_index_ends_run() {
    let form = form_page();
    let (chat, _) = script(&["ACTION: click(7)"]);
    let mut agent = agent_for(&form.page, chat);

    let run = agent.execute_task("Save the issue").await.unwrap();

    assert!(!run.success);
    assert_eq!(run.steps.len(), 1);
    assert!(!run.steps[0].success);
    assert!(run.message.contains("Element with index 7 not found"));
    assert!(form.page.event_log().is_empty());
    // The failure is in history so the next task knows about it.
    assert!(
        agent
            .history()
            .last()
            .unwrap()
            .content
            .starts_with("Action click(7) failed")
    );
}

#[tokio::test]
async fn test_element_removed_while_thinking() {
    let form = form_page();
    let page = form.page.clone();
    let save = form.save;
    let chat = move |_: &str, _: &[ChatMessage]| -> Result<String, ChatError> {
        page.detach(save);
        Ok("ACTION: click(2)".to_string())
    };
    let mut agent = agent_for(&form.page, Arc::new(chat));

    let run = agent.execute_task("Save").await.unwrap();

    assert!(!run.success);
    assert!(run.message.contains("detached"), "{}", run.message);
    assert!(form.page.events(save).is_empty());
}

#[tokio::test]
async fn test_question_completes_run() {
    let form = form_page();
    let (chat, _) = script(&["ASK: Which project should the issue go to?"]);
    let mut agent = agent_for(&form.page, chat);

    let run = agent.execute_task("File a bug").await.unwrap();

    assert!(run.success);
    assert_eq!(run.completion, Some(Completion::Question));
    assert_eq!(run.message, "Which project should the issue go to?");
    assert!(run.steps.is_empty());
}

#[tokio::test]
async fn test_unknown_action_is_a_failed_step() {
    let form = form_page();
    let (chat, _) = script(&["ACTION: hover(2)"]);
    let mut agent = agent_for(&form.page, chat);

    let run = agent.execute_task("Hover the save button").await.unwrap();

    assert!(!run.success);
    assert_eq!(run.steps[0].action, "hover(2)");
    assert!(run.message.contains("Unknown action 'hover'"));
}

#[tokio::test]
async fn test_chat_failure_keeps_steps() {
    let form = form_page();
    let (chat, _) = script(&[r#"ACTION: type(0, "Crash")"#]);
    let mut agent = agent_for(&form.page, chat);

    let err = agent.execute_task("File a bug").await.unwrap_err();

    assert!(err.to_string().contains("script exhausted"));
    assert_eq!(err.steps().len(), 1);
    assert_eq!(form.page.value(form.name), "Crash");
}
