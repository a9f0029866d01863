//! Performs one action against an element from the current detection pass.
//!
//! Every operation returns an [`ActionResult`]. Surface errors (a node that
//! disappeared mid-click, a script that threw) are folded into a failed
//! result with the underlying message kept.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::config::ExecutorConfig;
use crate::directive::ScrollDirection;
use crate::dom::{Detector, LinkInfo};
use crate::error::SurfaceError;
use crate::surface::{
    DomEvent, DomNode, KeyKind, NodeId, PageSurface, PointerKind, SelectOptionInfo,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClickOptions {
    pub click_count: u32,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self { click_count: 1 }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputOptions {
    /// Follow the value change with a keydown/keypress/keyup Enter sequence.
    pub press_enter: bool,
}

pub struct Executor {
    surface: Arc<dyn PageSurface>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(surface: Arc<dyn PageSurface>, config: ExecutorConfig) -> Self {
        Self { surface, config }
    }

    pub async fn click_element(
        &self,
        detector: &Detector,
        index: usize,
        options: ClickOptions,
    ) -> ActionResult {
        let Some(el) = detector.get_element(index) else {
            return not_found(index);
        };
        let page_url = detector.last().url.as_str();

        if let Some(href) = el.link.as_ref().and_then(|link| same_origin_link(link, page_url)) {
            return self
                .follow_link(&href)
                .await
                .unwrap_or_else(|e| ActionResult::fail(format!("Failed to navigate to {href}: {e}")));
        }

        match self.click_node(el.node.id, options.click_count.max(1)).await {
            Ok(()) => {
                info!("Clicked element {}", index);
                ActionResult::ok(format!("Clicked element {index} {}", describe(&el.node)))
            }
            Err(e) => ActionResult::fail(format!("Failed to click element {index}: {e}")),
        }
    }

    async fn click_node(&self, node: NodeId, count: u32) -> Result<(), SurfaceError> {
        self.surface.scroll_into_view(node).await?;
        tokio::time::sleep(self.config.scroll_settle()).await;

        // Coordinates are read after scrolling; the element has moved.
        let (x, y) = self.surface.bounding_rect(node).await?.center();
        for n in 0..count {
            if n > 0 {
                tokio::time::sleep(self.config.click_interval()).await;
            }
            for kind in [
                PointerKind::PointerDown,
                PointerKind::MouseDown,
                PointerKind::PointerUp,
                PointerKind::MouseUp,
                PointerKind::Click,
            ] {
                self.surface.dispatch(node, DomEvent::Pointer { kind, x, y }).await?;
            }
        }
        debug!("Dispatched {} click(s) at ({:.0}, {:.0})", count, x, y);
        Ok(())
    }

    async fn follow_link(&self, href: &str) -> Result<ActionResult, SurfaceError> {
        if let Some(router) = self.surface.client_navigate(href).await? {
            info!("Navigated to {} via {} router", href, router);
            return Ok(ActionResult::ok(format!(
                "Navigated to {href} via client-side router ({router})"
            )));
        }
        self.surface.navigate(href).await?;
        info!("Navigated to {} (full page load)", href);
        Ok(ActionResult::ok(format!("Navigated to {href}")))
    }

    pub async fn input_text(
        &self,
        detector: &Detector,
        index: usize,
        text: &str,
        options: InputOptions,
    ) -> ActionResult {
        let Some(el) = detector.get_element(index) else {
            return not_found(index);
        };

        let target = match (el.node.tag.as_str(), el.text_target) {
            ("iframe", Some(id)) => id,
            ("iframe", None) => {
                return ActionResult::fail(format!(
                    "No text input found inside frame element {index}"
                ));
            }
            (_, target) => target.unwrap_or(el.node.id),
        };

        match self.type_into(target, text, options).await {
            Ok(()) => {
                info!("Typed {} chars into element {}", text.chars().count(), index);
                ActionResult::ok(format!("Typed \"{text}\" into element {index}"))
            }
            Err(e) => ActionResult::fail(format!("Failed to type into element {index}: {e}")),
        }
    }

    async fn type_into(&self, node: NodeId, text: &str, options: InputOptions) -> Result<(), SurfaceError> {
        self.surface.scroll_into_view(node).await?;
        self.surface.focus(node).await?;
        self.surface.set_native_value(node, text).await?;
        self.surface.dispatch(node, DomEvent::Input).await?;
        self.surface.dispatch(node, DomEvent::Change).await?;

        if options.press_enter {
            for kind in [KeyKind::KeyDown, KeyKind::KeyPress, KeyKind::KeyUp] {
                self.surface
                    .dispatch(
                        node,
                        DomEvent::Key {
                            kind,
                            key: "Enter".to_string(),
                        },
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Scroll the window when the document is meaningfully taller than the
    /// viewport, otherwise the best scrollable container.
    pub async fn scroll(&self, direction: ScrollDirection, amount: Option<f64>) -> ActionResult {
        match self.try_scroll(direction, amount).await {
            Ok(result) => result,
            Err(e) => ActionResult::fail(format!("Failed to scroll {direction}: {e}")),
        }
    }

    async fn try_scroll(
        &self,
        direction: ScrollDirection,
        amount: Option<f64>,
    ) -> Result<ActionResult, SurfaceError> {
        let sign = match direction {
            ScrollDirection::Up => -1.0,
            ScrollDirection::Down => 1.0,
        };

        let metrics = self.surface.page_metrics().await?;
        if metrics.document_height > metrics.viewport_height + self.config.document_scroll_margin {
            let dy = amount.unwrap_or(metrics.viewport_height * self.config.scroll_ratio);
            self.surface.scroll_window(sign * dy).await?;
            info!("Scrolled window {} by {:.0}px", direction, dy);
            return Ok(ActionResult::ok(format!("Scrolled window {direction} by {dy:.0}px")));
        }

        let snapshot = self.surface.snapshot().await?;
        let mut candidates = Vec::new();
        collect_scrollable(&snapshot.root, &mut candidates);
        candidates.sort_by(|a, b| {
            let za = a.scroll.as_ref().map_or(0, |s| s.z_index);
            let zb = b.scroll.as_ref().map_or(0, |s| s.z_index);
            zb.cmp(&za).then_with(|| {
                let va = a.rect.visible_area(&snapshot.viewport);
                let vb = b.rect.visible_area(&snapshot.viewport);
                vb.total_cmp(&va)
            })
        });

        let Some(target) = candidates.first() else {
            return Ok(ActionResult::fail(format!(
                "Cannot scroll {direction}: the page fits the viewport and has no scrollable container"
            )));
        };

        let client_height = target.scroll.as_ref().map_or(0.0, |s| s.client_height);
        let dy = amount.unwrap_or(client_height * self.config.scroll_ratio);
        self.surface.scroll_element(target.id, sign * dy).await?;
        info!("Scrolled container {} {} by {:.0}px", target.id, direction, dy);
        Ok(ActionResult::ok(format!(
            "Scrolled {} {direction} by {dy:.0}px",
            describe(target)
        )))
    }

    pub async fn select_option(&self, detector: &Detector, index: usize, option_text: &str) -> ActionResult {
        let Some(el) = detector.get_element(index) else {
            return not_found(index);
        };
        if el.node.tag != "select" {
            return ActionResult::fail(format!(
                "Element {index} is not a select element (found <{}>)",
                el.node.tag
            ));
        }

        match self.try_select(el.node.id, option_text).await {
            Ok(Some(option)) => {
                info!("Selected '{}' in element {}", option.text.trim(), index);
                ActionResult::ok(format!(
                    "Selected option \"{}\" in element {index}",
                    option.text.trim()
                ))
            }
            Ok(None) => ActionResult::fail(format!(
                "Option \"{option_text}\" not found in element {index}. Available options: {}",
                self.option_list(el.node.id).await
            )),
            Err(e) => ActionResult::fail(format!("Failed to select option in element {index}: {e}")),
        }
    }

    async fn try_select(&self, node: NodeId, wanted: &str) -> Result<Option<SelectOptionInfo>, SurfaceError> {
        let options = self.surface.select_options(node).await?;
        let found = options
            .iter()
            .find(|o| o.text.trim() == wanted)
            .or_else(|| options.iter().find(|o| o.value == wanted));

        let Some(option) = found else {
            return Ok(None);
        };
        self.surface.select_index(node, option.index).await?;
        self.surface.dispatch(node, DomEvent::Change).await?;
        Ok(Some(option.clone()))
    }

    async fn option_list(&self, node: NodeId) -> String {
        match self.surface.select_options(node).await {
            Ok(options) => options
                .iter()
                .map(|o| o.text.trim().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            Err(_) => "(unavailable)".to_string(),
        }
    }

    /// Read-only listing of a select's options and current selection.
    pub async fn get_select_options(&self, detector: &Detector, index: usize) -> ActionResult {
        let Some(el) = detector.get_element(index) else {
            return not_found(index);
        };
        if el.node.tag != "select" {
            return ActionResult::fail(format!("Element {index} is not a select element"));
        }

        match self.surface.select_options(el.node.id).await {
            Ok(options) => {
                let selected = options.iter().find(|o| o.selected);
                let data = json!({
                    "options": options
                        .iter()
                        .map(|o| json!({"index": o.index, "text": o.text.trim(), "value": o.value}))
                        .collect::<Vec<_>>(),
                    "selectedIndex": selected.map(|o| o.index),
                    "selectedText": selected.map(|o| o.text.trim()),
                    "selectedValue": selected.map(|o| o.value.as_str()),
                });
                ActionResult::ok(format!("Element {index} has {} options", options.len())).with_data(data)
            }
            Err(e) => ActionResult::fail(format!("Failed to read options of element {index}: {e}")),
        }
    }

    /// Best effort; the element is not scrolled into view.
    pub async fn hover_element(&self, detector: &Detector, index: usize) -> ActionResult {
        let Some(el) = detector.get_element(index) else {
            return not_found(index);
        };
        let node = el.node.id;
        let hovered = async {
            self.surface.dispatch(node, DomEvent::MouseOver).await?;
            self.surface.dispatch(node, DomEvent::MouseEnter).await
        };
        match hovered.await {
            Ok(()) => ActionResult::ok(format!("Hovered element {index}")),
            Err(e) => ActionResult::fail(format!("Failed to hover element {index}: {e}")),
        }
    }
}

fn not_found(index: usize) -> ActionResult {
    ActionResult::fail(format!(
        "Element with index {index} not found. The page may have changed"
    ))
}

fn describe(node: &DomNode) -> String {
    let text: String = node.text.chars().take(40).collect();
    if text.is_empty() {
        format!("<{}>", node.tag)
    } else {
        format!("<{}> \"{}\"", node.tag, text)
    }
}

/// Absolute URL for `href` when following it stays on the page's origin and
/// is an ordinary navigation.
fn same_origin_link(link: &LinkInfo, page_url: &str) -> Option<String> {
    let href = link.href.trim();
    if link.opens_elsewhere
        || href.is_empty()
        || href.starts_with('#')
        || href.to_ascii_lowercase().starts_with("javascript:")
    {
        return None;
    }

    let base = Url::parse(page_url).ok()?;
    let target = base.join(href).ok()?;
    if target.origin() != base.origin() {
        return None;
    }
    Some(target.to_string())
}

fn collect_scrollable<'a>(node: &'a DomNode, out: &mut Vec<&'a DomNode>) {
    for child in &node.children {
        if child.hidden {
            continue;
        }
        if child.scroll.as_ref().is_some_and(|s| s.can_scroll()) {
            out.push(child);
        }
        collect_scrollable(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::fake_page::{FakeElement, FakePage};

    async fn setup(page: &Arc<FakePage>) -> (Detector, Executor) {
        let mut detector = Detector::new(page.clone(), DetectorConfig::default());
        detector.detect_elements().await;
        let executor = Executor::new(page.clone(), ExecutorConfig::immediate());
        (detector, executor)
    }

    #[tokio::test]
    async fn test_click_dispatches_pointer_sequence() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        let button = page.append(page.root(), FakeElement::new("button").text("Save"));
        let (detector, executor) = setup(&page).await;

        let result = executor.click_element(&detector, 0, ClickOptions::default()).await;
        assert!(result.success, "{}", result.message);
        assert_eq!(
            page.events(button),
            ["scrollIntoView", "pointerdown", "mousedown", "pointerup", "mouseup", "click"]
        );
    }

    #[tokio::test]
    async fn test_click_count() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        let cell = page.append(page.root(), FakeElement::new("div").clickable());
        let (detector, executor) = setup(&page).await;

        executor
            .click_element(&detector, 0, ClickOptions { click_count: 2 })
            .await;
        let clicks = page.events(cell).iter().filter(|e| *e == "click").count();
        assert_eq!(clicks, 2);
    }

    #[tokio::test]
    async fn test_click_missing_index() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        for _ in 0..10 {
            page.append(page.root(), FakeElement::new("button"));
        }
        let (detector, executor) = setup(&page).await;

        let result = executor.click_element(&detector, 999, ClickOptions::default()).await;
        assert!(!result.success);
        assert!(result.message.contains("999"));
    }

    #[tokio::test]
    async fn test_click_detached_element_fails_cleanly() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        let button = page.append(page.root(), FakeElement::new("button"));
        let (detector, executor) = setup(&page).await;
        page.detach(button);

        let result = executor.click_element(&detector, 0, ClickOptions::default()).await;
        assert!(!result.success);
        assert!(result.message.contains("detached"), "{}", result.message);
    }

    #[tokio::test]
    async fn test_link_uses_client_router() {
        let page = Arc::new(FakePage::new("https://app.test/projects"));
        page.set_router(Some("next"));
        let link = page.append(page.root(), FakeElement::new("a").attr("href", "/projects/7"));
        page.append(link, FakeElement::new("span").attr("role", "button").text("Open"));
        let (detector, executor) = setup(&page).await;

        let result = executor.click_element(&detector, 1, ClickOptions::default()).await;
        assert!(result.success);
        assert_eq!(page.routed(), ["https://app.test/projects/7"]);
        assert_eq!(page.url(), "https://app.test/projects/7");
        assert!(page.navigations().is_empty());
        assert!(page.events(link).is_empty());
    }

    #[tokio::test]
    async fn test_link_without_router_navigates() {
        let page = Arc::new(FakePage::new("https://app.test/projects"));
        page.append(page.root(), FakeElement::new("a").attr("href", "/members"));
        let (detector, executor) = setup(&page).await;

        let result = executor.click_element(&detector, 0, ClickOptions::default()).await;
        assert!(result.success);
        assert_eq!(page.navigations(), ["https://app.test/members"]);
    }

    #[tokio::test]
    async fn test_foreign_and_special_links_are_clicked() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        page.set_router(Some("next"));
        let external = page.append(page.root(), FakeElement::new("a").attr("href", "https://docs.example.com/"));
        let blank = page.append(
            page.root(),
            FakeElement::new("a").attr("href", "/report").attr("target", "_blank"),
        );
        let hash = page.append(page.root(), FakeElement::new("a").attr("href", "#section"));
        let (detector, executor) = setup(&page).await;

        for i in 0..3 {
            assert!(executor.click_element(&detector, i, ClickOptions::default()).await.success);
        }
        assert!(page.routed().is_empty());
        for node in [external, blank, hash] {
            assert!(page.events(node).contains(&"click".to_string()));
        }
    }

    #[tokio::test]
    async fn test_elements_inside_blank_or_download_links_are_clicked() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        page.set_router(Some("next"));
        let report = page.append(
            page.root(),
            FakeElement::new("a").attr("href", "/report").attr("target", "_blank"),
        );
        let open = page.append(report, FakeElement::new("button").text("Open report"));
        let export = page.append(page.root(), FakeElement::new("a").attr("href", "/export.csv").attr("download", ""));
        let csv = page.append(export, FakeElement::new("span").attr("role", "button").text("CSV"));
        let (detector, executor) = setup(&page).await;

        // [0] report link, [1] its button, [2] export link, [3] its span
        for i in [1, 3] {
            assert!(executor.click_element(&detector, i, ClickOptions::default()).await.success);
        }
        assert!(page.routed().is_empty());
        assert!(page.navigations().is_empty());
        assert_eq!(page.url(), "https://app.test/");
        for node in [open, csv] {
            assert!(page.events(node).contains(&"click".to_string()));
        }
    }

    #[tokio::test]
    async fn test_input_text_fires_events() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        let input = page.append(page.root(), FakeElement::new("input").attr("type", "text"));
        let (detector, executor) = setup(&page).await;

        let result = executor
            .input_text(&detector, 0, "Sprint Alpha", InputOptions::default())
            .await;
        assert!(result.success);
        assert_eq!(page.value(input), "Sprint Alpha");
        assert_eq!(page.focused(), Some(input));
        assert_eq!(page.events(input), ["scrollIntoView", "focus", "input", "change"]);
    }

    #[tokio::test]
    async fn test_input_text_with_enter() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        let input = page.append(page.root(), FakeElement::new("input").attr("type", "search"));
        let (detector, executor) = setup(&page).await;

        executor
            .input_text(&detector, 0, "bug", InputOptions { press_enter: true })
            .await;
        let events = page.events(input);
        assert_eq!(&events[events.len() - 3..], ["keydown", "keypress", "keyup"]);
    }

    #[tokio::test]
    async fn test_input_text_into_container_and_frame() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        let field = page.append(page.root(), FakeElement::new("div").attr("role", "textbox"));
        let nested = page.append(field, FakeElement::new("input"));
        let body = page
            .append_frame(page.root(), FakeElement::new("iframe"), true)
            .unwrap();
        let wrapper = page.append(body, FakeElement::new("div"));
        let editor = page.append(wrapper, FakeElement::new("div").attr("contenteditable", ""));
        let (detector, executor) = setup(&page).await;

        // [0] div[role=textbox], [1] its input, [2] iframe, [3] editor
        assert!(executor.input_text(&detector, 0, "owner", InputOptions::default()).await.success);
        assert_eq!(page.value(nested), "owner");

        assert!(executor.input_text(&detector, 2, "notes", InputOptions::default()).await.success);
        assert_eq!(page.text(editor), "notes");
    }

    #[tokio::test]
    async fn test_input_text_into_empty_frame_fails() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        let body = page.append_frame(page.root(), FakeElement::new("iframe"), true).unwrap();
        page.append(body, FakeElement::new("button"));
        let (detector, executor) = setup(&page).await;

        let result = executor.input_text(&detector, 0, "x", InputOptions::default()).await;
        assert!(!result.success);
        assert!(result.message.contains("inside frame"));
    }

    #[tokio::test]
    async fn test_input_text_into_non_text_element_fails_cleanly() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        page.append(page.root(), FakeElement::new("button"));
        let (detector, executor) = setup(&page).await;

        let result = executor.input_text(&detector, 0, "x", InputOptions::default()).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_scroll_window_when_document_is_tall() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        page.set_document_height(3000.0);
        let (_, executor) = setup(&page).await;

        let result = executor.scroll(ScrollDirection::Down, None).await;
        assert!(result.success);
        assert_eq!(page.scroll_y(), 576.0);
        executor.scroll(ScrollDirection::Up, Some(100.0)).await;
        assert_eq!(page.scroll_y(), 476.0);
    }

    #[tokio::test]
    async fn test_scroll_distance_follows_viewport() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        page.set_viewport(1024.0, 1000.0);
        page.set_document_height(5000.0);
        let (_, executor) = setup(&page).await;

        assert!(executor.scroll(ScrollDirection::Down, None).await.success);
        assert_eq!(page.scroll_y(), 800.0);
    }

    #[tokio::test]
    async fn test_scroll_prefers_top_container() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        let big = page.append(
            page.root(),
            FakeElement::new("div").rect(0.0, 0.0, 800.0, 600.0).scrollable(2000.0, 600.0),
        );
        let small_modal = page.append(
            page.root(),
            FakeElement::new("div")
                .rect(100.0, 100.0, 300.0, 200.0)
                .scrollable(900.0, 200.0)
                .z_index(50),
        );
        let bigger_flat = page.append(
            page.root(),
            FakeElement::new("div").rect(0.0, 0.0, 1280.0, 700.0).scrollable(1400.0, 700.0),
        );
        let (_, executor) = setup(&page).await;

        executor.scroll(ScrollDirection::Down, None).await;
        assert_eq!(page.scroll_top(small_modal), 160.0);
        assert_eq!(page.scroll_top(big), 0.0);
        assert_eq!(page.scroll_top(bigger_flat), 0.0);
    }

    #[tokio::test]
    async fn test_scroll_ranks_by_visible_area() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        let offscreen = page.append(
            page.root(),
            FakeElement::new("div").rect(0.0, 900.0, 1280.0, 700.0).scrollable(1400.0, 700.0),
        );
        let onscreen = page.append(
            page.root(),
            FakeElement::new("div").rect(0.0, 0.0, 400.0, 300.0).scrollable(900.0, 300.0),
        );
        let (_, executor) = setup(&page).await;

        executor.scroll(ScrollDirection::Down, Some(50.0)).await;
        assert_eq!(page.scroll_top(onscreen), 50.0);
        assert_eq!(page.scroll_top(offscreen), 0.0);
    }

    #[tokio::test]
    async fn test_scroll_without_surface_fails() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        page.append(page.root(), FakeElement::new("div").rect(0.0, 0.0, 100.0, 100.0));
        let (_, executor) = setup(&page).await;

        let result = executor.scroll(ScrollDirection::Down, None).await;
        assert!(!result.success);
        assert!(result.message.contains("no scrollable container"));
    }

    fn priority_page() -> (Arc<FakePage>, NodeId) {
        let page = Arc::new(FakePage::new("https://app.test/"));
        let select = page.append(
            page.root(),
            FakeElement::new("select")
                .option(" Low ", "p1")
                .option("Medium", "p2")
                .option("High", "p3"),
        );
        (page, select)
    }

    #[tokio::test]
    async fn test_select_by_text_then_value() {
        let (page, select) = priority_page();
        let (detector, executor) = setup(&page).await;

        assert!(executor.select_option(&detector, 0, "Low").await.success);
        assert_eq!(page.value(select), "p1");
        assert!(executor.select_option(&detector, 0, "p2").await.success);
        assert_eq!(page.value(select), "p2");
        assert!(page.events(select).iter().all(|e| e == "change"));
    }

    #[tokio::test]
    async fn test_select_is_case_sensitive() {
        let (page, _) = priority_page();
        let (detector, executor) = setup(&page).await;

        let result = executor.select_option(&detector, 0, "high").await;
        assert!(!result.success);
        assert!(result.message.contains("Available options: Low, Medium, High"));
    }

    #[tokio::test]
    async fn test_select_on_wrong_element() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        page.append(page.root(), FakeElement::new("button"));
        let (detector, executor) = setup(&page).await;

        let result = executor.select_option(&detector, 0, "High").await;
        assert!(!result.success);
        assert!(result.message.contains("not a select"));
    }

    #[tokio::test]
    async fn test_get_select_options_reports_selection() {
        let (page, _) = priority_page();
        let (detector, executor) = setup(&page).await;

        let before = executor.get_select_options(&detector, 0).await;
        assert_eq!(before.data.as_ref().unwrap()["selectedText"], serde_json::Value::Null);

        executor.select_option(&detector, 0, "Medium").await;
        let data = executor.get_select_options(&detector, 0).await.data.unwrap();
        assert_eq!(data["options"].as_array().unwrap().len(), 3);
        assert_eq!(data["options"][0]["text"], "Low");
        assert_eq!(data["selectedIndex"], 1);
        assert_eq!(data["selectedText"], "Medium");
        assert_eq!(data["selectedValue"], "p2");
    }

    #[tokio::test]
    async fn test_hover() {
        let page = Arc::new(FakePage::new("https://app.test/"));
        let menu = page.append(page.root(), FakeElement::new("button").text("Menu"));
        let (detector, executor) = setup(&page).await;

        assert!(executor.hover_element(&detector, 0).await.success);
        assert_eq!(page.events(menu), ["mouseover", "mouseenter"]);
        assert!(!executor.hover_element(&detector, 4).await.success);
    }
}
