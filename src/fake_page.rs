//! In-memory page used to exercise the detector, executor and agent without
//! a browser.
//!
//! ```
//! use pagepilot::fake_page::{FakeElement, FakePage};
//!
//! let page = FakePage::new("https://app.test/board");
//! let input = page.append(page.root(), FakeElement::new("input").attr("type", "text"));
//! assert_eq!(page.value(input), "");
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SurfaceError;
use crate::surface::{
    DomEvent, DomNode, FrameContent, NodeId, PageMetrics, PageSnapshot, PageSurface, Rect,
    ScrollBox, SelectOptionInfo, Viewport,
};

/// Builder for a fake element.
#[derive(Debug, Clone)]
pub struct FakeElement {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    hidden: bool,
    clickable: bool,
    rect: Rect,
    scroll: Option<ScrollBox>,
    options: Vec<(String, String)>,
    value: String,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            hidden: false,
            clickable: false,
            rect: Rect::new(10.0, 10.0, 120.0, 24.0),
            scroll: None,
            options: Vec::new(),
            value: String::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn clickable(mut self) -> Self {
        self.clickable = true;
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(x, y, width, height);
        self
    }

    /// Give the element `overflow-y: auto` with the given content/client heights.
    pub fn scrollable(mut self, scroll_height: f64, client_height: f64) -> Self {
        let z_index = self.scroll.as_ref().map_or(0, |s| s.z_index);
        self.scroll = Some(ScrollBox {
            overflow_y: "auto".to_string(),
            scroll_height,
            client_height,
            scroll_top: 0.0,
            z_index,
        });
        self
    }

    pub fn z_index(mut self, z: i32) -> Self {
        self.scroll.get_or_insert_with(ScrollBox::default).z_index = z;
        self
    }

    /// Add an `<option>` (for `<select>`); `text` is kept verbatim.
    pub fn option(mut self, text: &str, value: &str) -> Self {
        self.options.push((text.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum FakeFrame {
    SameOrigin(NodeId),
    CrossOrigin,
}

#[derive(Debug)]
struct FakeNode {
    el: FakeElement,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    frame: Option<FakeFrame>,
    detached: bool,
    selected: Option<usize>,
}

#[derive(Debug)]
struct FakeDom {
    url: String,
    viewport: Viewport,
    document_height: f64,
    scroll_y: f64,
    nodes: Vec<FakeNode>,
    router: Option<String>,
    routed: Vec<String>,
    navigations: Vec<String>,
    events: Vec<(NodeId, String)>,
    focused: Option<NodeId>,
}

impl FakeDom {
    fn node(&self, id: NodeId) -> Result<&FakeNode, SurfaceError> {
        match self.nodes.get(id as usize) {
            Some(n) if !n.detached => Ok(n),
            _ => Err(SurfaceError::Detached(id)),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut FakeNode, SurfaceError> {
        match self.nodes.get_mut(id as usize) {
            Some(n) if !n.detached => Ok(n),
            _ => Err(SurfaceError::Detached(id)),
        }
    }

    fn record(&mut self, id: NodeId, event: &str) {
        self.events.push((id, event.to_string()));
    }

    fn build(&self, id: NodeId) -> DomNode {
        let node = &self.nodes[id as usize];
        let el = &node.el;
        let mut attributes = el.attributes.clone();
        if matches!(el.tag.as_str(), "input" | "textarea") && !el.value.is_empty() {
            attributes.insert("value".to_string(), el.value.clone());
        }

        let mut out = DomNode {
            id,
            tag: el.tag.clone(),
            attributes,
            text: el.text.clone(),
            hidden: el.hidden,
            clickable: el.clickable,
            rect: el.rect,
            scroll: el.scroll.clone(),
            options: el.options.iter().map(|(t, _)| t.trim().to_string()).collect(),
            children: Vec::new(),
            frame: None,
        };
        if el.hidden {
            return out;
        }

        out.children = node
            .children
            .iter()
            .filter(|c| !self.nodes[**c as usize].detached)
            .map(|c| self.build(*c))
            .collect();
        out.frame = node.frame.map(|f| match f {
            FakeFrame::SameOrigin(root) => FrameContent::Accessible {
                root: Box::new(self.build(root)),
            },
            FakeFrame::CrossOrigin => FrameContent::Opaque,
        });
        out
    }

    fn push(&mut self, parent: Option<NodeId>, el: FakeElement) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(FakeNode {
            el,
            parent,
            children: Vec::new(),
            frame: None,
            detached: false,
            selected: None,
        });
        if let Some(p) = parent {
            self.nodes[p as usize].children.push(id);
        }
        id
    }

    fn mark_detached(&mut self, id: NodeId) {
        let node = &mut self.nodes[id as usize];
        node.detached = true;
        let mut pending = node.children.clone();
        if let Some(FakeFrame::SameOrigin(root)) = node.frame {
            pending.push(root);
        }
        for child in pending {
            self.mark_detached(child);
        }
    }
}

/// An in-memory [`PageSurface`]. All events fired through it are recorded.
#[derive(Debug)]
pub struct FakePage {
    dom: Mutex<FakeDom>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        let mut dom = FakeDom {
            url: url.to_string(),
            viewport: Viewport {
                width: 1280.0,
                height: 720.0,
            },
            document_height: 720.0,
            scroll_y: 0.0,
            nodes: Vec::new(),
            router: None,
            routed: Vec::new(),
            navigations: Vec::new(),
            events: Vec::new(),
            focused: None,
        };
        dom.push(None, FakeElement::new("body").rect(0.0, 0.0, 1280.0, 720.0));
        Self {
            dom: Mutex::new(dom),
        }
    }

    /// The document body.
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn append(&self, parent: NodeId, el: FakeElement) -> NodeId {
        self.dom.lock().push(Some(parent), el)
    }

    /// Append an iframe. Returns the body of its content document when the
    /// frame is same-origin.
    pub fn append_frame(&self, parent: NodeId, el: FakeElement, same_origin: bool) -> Option<NodeId> {
        let mut dom = self.dom.lock();
        let frame = dom.push(Some(parent), el);
        if same_origin {
            let body = dom.push(None, FakeElement::new("body"));
            dom.nodes[frame as usize].frame = Some(FakeFrame::SameOrigin(body));
            Some(body)
        } else {
            dom.nodes[frame as usize].frame = Some(FakeFrame::CrossOrigin);
            None
        }
    }

    /// Remove a node (and its subtree) from the document.
    pub fn detach(&self, node: NodeId) {
        let mut dom = self.dom.lock();
        if let Some(parent) = dom.nodes[node as usize].parent {
            dom.nodes[parent as usize].children.retain(|c| *c != node);
        }
        dom.mark_detached(node);
    }

    pub fn set_viewport(&self, width: f64, height: f64) {
        self.dom.lock().viewport = Viewport { width, height };
    }

    pub fn set_document_height(&self, height: f64) {
        self.dom.lock().document_height = height;
    }

    /// Install (or remove) a client-side router on the fake global scope.
    pub fn set_router(&self, name: Option<&str>) {
        self.dom.lock().router = name.map(String::from);
    }

    pub fn set_url(&self, url: &str) {
        self.dom.lock().url = url.to_string();
    }

    /// Current value; for a `<select>`, the value of the selected option.
    pub fn value(&self, node: NodeId) -> String {
        let dom = self.dom.lock();
        let n = &dom.nodes[node as usize];
        if n.el.tag == "select" {
            return n
                .selected
                .and_then(|i| n.el.options.get(i))
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
        }
        n.el.value.clone()
    }

    pub fn text(&self, node: NodeId) -> String {
        self.dom.lock().nodes[node as usize].el.text.clone()
    }

    /// Event names fired at `node`, in order.
    pub fn events(&self, node: NodeId) -> Vec<String> {
        self.dom
            .lock()
            .events
            .iter()
            .filter(|(id, _)| *id == node)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn event_log(&self) -> Vec<(NodeId, String)> {
        self.dom.lock().events.clone()
    }

    pub fn scroll_y(&self) -> f64 {
        self.dom.lock().scroll_y
    }

    pub fn scroll_top(&self, node: NodeId) -> f64 {
        self.dom.lock().nodes[node as usize]
            .el
            .scroll
            .as_ref()
            .map_or(0.0, |s| s.scroll_top)
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.dom.lock().focused
    }

    pub fn routed(&self) -> Vec<String> {
        self.dom.lock().routed.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.dom.lock().navigations.clone()
    }

    pub fn url(&self) -> String {
        self.dom.lock().url.clone()
    }
}

#[async_trait]
impl PageSurface for FakePage {
    async fn snapshot(&self) -> Result<PageSnapshot, SurfaceError> {
        let dom = self.dom.lock();
        Ok(PageSnapshot {
            url: dom.url.clone(),
            viewport: dom.viewport,
            root: dom.build(0),
        })
    }

    async fn scroll_into_view(&self, node: NodeId) -> Result<(), SurfaceError> {
        let mut dom = self.dom.lock();
        dom.node(node)?;
        dom.record(node, "scrollIntoView");
        Ok(())
    }

    async fn bounding_rect(&self, node: NodeId) -> Result<Rect, SurfaceError> {
        Ok(self.dom.lock().node(node)?.el.rect)
    }

    async fn focus(&self, node: NodeId) -> Result<(), SurfaceError> {
        let mut dom = self.dom.lock();
        dom.node(node)?;
        dom.focused = Some(node);
        dom.record(node, "focus");
        Ok(())
    }

    async fn dispatch(&self, node: NodeId, event: DomEvent) -> Result<(), SurfaceError> {
        let mut dom = self.dom.lock();
        dom.node(node)?;
        dom.record(node, event.name());
        Ok(())
    }

    async fn set_native_value(&self, node: NodeId, value: &str) -> Result<(), SurfaceError> {
        let mut dom = self.dom.lock();
        let n = dom.node_mut(node)?;
        match n.el.tag.as_str() {
            "input" | "textarea" => n.el.value = value.to_string(),
            _ if n.el.attributes.contains_key("contenteditable") => n.el.text = value.to_string(),
            tag => {
                return Err(SurfaceError::Unsupported(format!(
                    "<{tag}> has no value property"
                )));
            }
        }
        Ok(())
    }

    async fn select_options(&self, node: NodeId) -> Result<Vec<SelectOptionInfo>, SurfaceError> {
        let dom = self.dom.lock();
        let n = dom.node(node)?;
        if n.el.tag != "select" {
            return Err(SurfaceError::Unsupported(format!("<{}> has no options", n.el.tag)));
        }
        Ok(n.el
            .options
            .iter()
            .enumerate()
            .map(|(index, (text, value))| SelectOptionInfo {
                index,
                text: text.clone(),
                value: value.clone(),
                selected: n.selected == Some(index),
            })
            .collect())
    }

    async fn select_index(&self, node: NodeId, index: usize) -> Result<(), SurfaceError> {
        let mut dom = self.dom.lock();
        let n = dom.node_mut(node)?;
        if index >= n.el.options.len() {
            return Err(SurfaceError::Unsupported(format!(
                "option index {index} out of range"
            )));
        }
        n.selected = Some(index);
        Ok(())
    }

    async fn page_metrics(&self) -> Result<PageMetrics, SurfaceError> {
        let dom = self.dom.lock();
        Ok(PageMetrics {
            viewport_width: dom.viewport.width,
            viewport_height: dom.viewport.height,
            document_height: dom.document_height,
            scroll_y: dom.scroll_y,
        })
    }

    async fn scroll_window(&self, dy: f64) -> Result<(), SurfaceError> {
        let mut dom = self.dom.lock();
        let max = (dom.document_height - dom.viewport.height).max(0.0);
        dom.scroll_y = (dom.scroll_y + dy).clamp(0.0, max);
        Ok(())
    }

    async fn scroll_element(&self, node: NodeId, dy: f64) -> Result<(), SurfaceError> {
        let mut dom = self.dom.lock();
        let n = dom.node_mut(node)?;
        let Some(scroll) = n.el.scroll.as_mut() else {
            return Err(SurfaceError::Unsupported(format!("node {node} does not scroll")));
        };
        let max = (scroll.scroll_height - scroll.client_height).max(0.0);
        scroll.scroll_top = (scroll.scroll_top + dy).clamp(0.0, max);
        dom.record(node, "scroll");
        Ok(())
    }

    async fn client_navigate(&self, href: &str) -> Result<Option<String>, SurfaceError> {
        let mut dom = self.dom.lock();
        let Some(router) = dom.router.clone() else {
            return Ok(None);
        };
        dom.routed.push(href.to_string());
        dom.url = href.to_string();
        Ok(Some(router))
    }

    async fn navigate(&self, href: &str) -> Result<(), SurfaceError> {
        let mut dom = self.dom.lock();
        dom.navigations.push(href.to_string());
        dom.url = href.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_reflects_tree() {
        let page = FakePage::new("https://app.test/");
        let form = page.append(page.root(), FakeElement::new("form"));
        page.append(form, FakeElement::new("input").value("draft"));
        page.append(form, FakeElement::new("div").hidden());
        page.append_frame(page.root(), FakeElement::new("iframe"), false);

        let snap = page.snapshot().await.unwrap();
        assert_eq!(snap.root.children.len(), 2);
        let form = &snap.root.children[0];
        assert_eq!(form.children[0].attr("value"), Some("draft"));
        assert!(form.children[1].hidden);
        assert_eq!(snap.root.children[1].frame, Some(FrameContent::Opaque));
    }

    #[tokio::test]
    async fn test_detached_nodes_are_rejected() {
        let page = FakePage::new("https://app.test/");
        let button = page.append(page.root(), FakeElement::new("button"));
        page.detach(button);

        let err = page.focus(button).await.unwrap_err();
        assert!(matches!(err, SurfaceError::Detached(id) if id == button));
        let snap = page.snapshot().await.unwrap();
        assert!(snap.root.children.is_empty());
    }

    #[tokio::test]
    async fn test_window_scroll_is_clamped() {
        let page = FakePage::new("https://app.test/");
        page.set_document_height(1000.0);
        page.scroll_window(5000.0).await.unwrap();
        assert_eq!(page.scroll_y(), 280.0);
        page.scroll_window(-5000.0).await.unwrap();
        assert_eq!(page.scroll_y(), 0.0);
    }
}
