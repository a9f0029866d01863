use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::DetectorConfig;
use crate::surface::{DomNode, FrameContent, NodeId, PageSurface, PageSnapshot, Viewport};

/// Subtrees that never contain anything the agent can act on.
const SKIP: [&str; 7] = ["script", "style", "noscript", "template", "svg", "link", "meta"];

const INTERACTIVE_ROLES: [&str; 13] = [
    "button", "link", "checkbox", "radio", "tab", "menuitem", "option", "switch", "combobox",
    "textbox", "listbox", "treeitem", "searchbox",
];

/// Attributes worth showing to the LLM, in render order.
const SHOWN_ATTRS: [&str; 13] = [
    "type",
    "name",
    "id",
    "role",
    "placeholder",
    "aria-label",
    "title",
    "href",
    "value",
    "alt",
    "disabled",
    "checked",
    "contenteditable",
];

const TEXT_INPUT_TYPES: [&str; 8] = [
    "text", "search", "email", "url", "tel", "password", "number", "",
];

/// The anchor an element sits in (or is).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub href: String,
    /// `target="_blank"` or `download`: the browser opens it outside this page.
    pub opens_elsewhere: bool,
}

impl LinkInfo {
    fn of(node: &DomNode) -> Option<Self> {
        if node.tag != "a" {
            return None;
        }
        let href = node.attr("href")?;
        Some(Self {
            href: href.to_string(),
            opens_elsewhere: node
                .attr("target")
                .is_some_and(|t| t.eq_ignore_ascii_case("_blank"))
                || node.attr("download").is_some(),
        })
    }
}

/// An element indexed by the most recent detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedElement {
    pub index: usize,
    /// The node itself, without children or frame content.
    pub node: DomNode,
    /// Number of iframes between the top document and this element.
    pub frame_depth: usize,
    /// The element's own link or the nearest enclosing one.
    pub link: Option<LinkInfo>,
    /// Text control to type into when the element is a container or frame.
    pub text_target: Option<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    pub url: String,
    pub viewport: Viewport,
    pub total_count: usize,
    /// Compact, LLM-readable inventory. Not real markup.
    pub pseudo_html: String,
    pub elements: Vec<DetectedElement>,
}

/// Builds the indexed inventory of interactive elements.
///
/// Only the most recent pass is kept: every `detect_elements` call replaces
/// the previous index map entirely.
pub struct Detector {
    surface: Arc<dyn PageSurface>,
    config: DetectorConfig,
    last: DetectionResult,
}

impl Detector {
    pub fn new(surface: Arc<dyn PageSurface>, config: DetectorConfig) -> Self {
        Self {
            surface,
            config,
            last: DetectionResult::default(),
        }
    }

    /// Scan the page. Never fails: a page that cannot be read yields an empty
    /// result.
    pub async fn detect_elements(&mut self) -> &DetectionResult {
        self.last = match self.surface.snapshot().await {
            Ok(snapshot) => self.build(&snapshot),
            Err(e) => {
                warn!("DOM snapshot failed: {}", e);
                DetectionResult::default()
            }
        };
        debug!(
            "Detected {} interactive elements on {}",
            self.last.total_count, self.last.url
        );
        &self.last
    }

    /// Element assigned `index` by the latest pass.
    pub fn get_element(&self, index: usize) -> Option<&DetectedElement> {
        self.last.elements.get(index)
    }

    pub fn last(&self) -> &DetectionResult {
        &self.last
    }

    fn build(&self, snapshot: &PageSnapshot) -> DetectionResult {
        let mut elements = Vec::new();
        self.walk(&snapshot.root, 0, 0, None, &mut elements);

        DetectionResult {
            url: snapshot.url.clone(),
            viewport: snapshot.viewport,
            total_count: elements.len(),
            pseudo_html: self.render(&elements),
            elements,
        }
    }

    fn walk(
        &self,
        node: &DomNode,
        depth: usize,
        frame_depth: usize,
        link: Option<&LinkInfo>,
        out: &mut Vec<DetectedElement>,
    ) {
        if depth >= self.config.max_depth {
            return;
        }

        for child in &node.children {
            if child.hidden || SKIP.contains(&child.tag.as_str()) {
                continue;
            }

            let own_link = LinkInfo::of(child);
            let child_link = own_link.as_ref().or(link);

            if is_interactive(child) {
                out.push(DetectedElement {
                    index: out.len(),
                    node: shallow(child),
                    frame_depth,
                    link: child_link.cloned(),
                    text_target: text_target(child),
                });
            }

            self.walk(child, depth + 1, frame_depth, child_link, out);

            match &child.frame {
                Some(FrameContent::Accessible { root }) => {
                    self.walk(root, depth + 1, frame_depth + 1, None, out);
                }
                Some(FrameContent::Opaque) => {
                    debug!("Skipping cross-origin frame (node {})", child.id);
                }
                None => {}
            }
        }
    }

    fn render(&self, elements: &[DetectedElement]) -> String {
        let max = self.config.max_inventory_chars;
        let mut out = String::new();

        for (n, el) in elements.iter().enumerate() {
            let line = render_line(el, self.config.max_text_len);
            if out.len() + line.len() + 1 > max {
                out.push_str(&format!(
                    "... [truncated, {} more elements]",
                    elements.len() - n
                ));
                return out;
            }
            out.push_str(&line);
            out.push('\n');
        }

        if out.ends_with('\n') {
            out.pop();
        }
        out
    }
}

pub fn is_interactive(node: &DomNode) -> bool {
    match node.tag.as_str() {
        "a" => node.attr("href").is_some() || node.clickable,
        "button" | "textarea" | "select" | "summary" => true,
        "input" => node.attr("type") != Some("hidden"),
        "iframe" => node.frame_root().is_some(),
        _ => {
            is_content_editable(node)
                || node
                    .attr("role")
                    .is_some_and(|r| INTERACTIVE_ROLES.contains(&r))
                || node.clickable
                || node
                    .attr("tabindex")
                    .and_then(|t| t.trim().parse::<i32>().ok())
                    .is_some_and(|t| t >= 0)
        }
    }
}

pub fn is_text_like(node: &DomNode) -> bool {
    match node.tag.as_str() {
        "textarea" => true,
        "input" => {
            let ty = node.attr("type").unwrap_or("").to_ascii_lowercase();
            TEXT_INPUT_TYPES.contains(&ty.as_str())
        }
        _ => is_content_editable(node),
    }
}

/// First text control under a container or inside a frame document. `None`
/// for a control that is itself text-like.
fn text_target(node: &DomNode) -> Option<NodeId> {
    if node.tag == "iframe" {
        let root = node.frame_root()?;
        if is_text_like(root) {
            return Some(root.id);
        }
        return root.find_descendant(&is_text_like).map(|n| n.id);
    }
    if is_text_like(node) {
        return None;
    }
    node.find_descendant(&is_text_like).map(|n| n.id)
}

fn shallow(node: &DomNode) -> DomNode {
    DomNode {
        id: node.id,
        tag: node.tag.clone(),
        attributes: node.attributes.clone(),
        text: node.text.clone(),
        hidden: node.hidden,
        clickable: node.clickable,
        rect: node.rect,
        scroll: node.scroll.clone(),
        options: node.options.clone(),
        children: Vec::new(),
        frame: None,
    }
}

pub fn is_content_editable(node: &DomNode) -> bool {
    node.attr("contenteditable")
        .is_some_and(|v| v.is_empty() || v == "true" || v == "plaintext-only")
}

fn render_line(el: &DetectedElement, max_text: usize) -> String {
    let node = &el.node;
    let mut line = "  ".repeat(el.frame_depth);
    line.push_str(&format!("[{}]<{}", el.index, node.tag));

    for name in SHOWN_ATTRS {
        if let Some(value) = node.attr(name) {
            if value.is_empty() {
                line.push_str(&format!(" {name}"));
            } else {
                let value = shorten(value, max_text).replace('"', "'");
                line.push_str(&format!(" {name}=\"{value}\""));
            }
        }
    }

    if node.tag == "input" {
        line.push_str("/>");
        return line;
    }

    let body = match node.tag.as_str() {
        "select" => node
            .options
            .iter()
            .map(|o| shorten(o, 20))
            .collect::<Vec<_>>()
            .join("|"),
        "iframe" => "(frame)".to_string(),
        _ => shorten(&node.text, max_text),
    };
    line.push_str(&format!(">{}</{}>", body, node.tag));
    line
}

fn shorten(text: &str, max: usize) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() <= max {
        return text;
    }
    let mut short: String = text.chars().take(max.saturating_sub(3)).collect();
    short.push_str("...");
    short
}
