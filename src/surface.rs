//! The page automation surface: everything the detector and executor need
//! from a live page, and nothing more.
//!
//! A surface hands out [`NodeId`] handles through [`PageSurface::snapshot`].
//! Handles stay meaningful until the next snapshot; afterwards an
//! implementation is free to reject them with [`SurfaceError::Detached`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;

pub type NodeId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Area of the part of this rect that lies inside the viewport.
    pub fn visible_area(&self, viewport: &Viewport) -> f64 {
        let w = (self.x + self.width).min(viewport.width) - self.x.max(0.0);
        let h = (self.y + self.height).min(viewport.height) - self.y.max(0.0);
        if w <= 0.0 || h <= 0.0 { 0.0 } else { w * h }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Scroll geometry of an element whose content overflows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrollBox {
    pub overflow_y: String,
    pub scroll_height: f64,
    pub client_height: f64,
    pub scroll_top: f64,
    pub z_index: i32,
}

impl ScrollBox {
    pub fn can_scroll(&self) -> bool {
        matches!(self.overflow_y.as_str(), "auto" | "scroll" | "overlay")
            && self.scroll_height > self.client_height + 1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FrameContent {
    /// Same-origin document, readable from the parent.
    Accessible { root: Box<DomNode> },
    /// Cross-origin (or not yet loaded) document.
    Opaque,
}

/// One element as seen by [`PageSurface::snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomNode {
    pub id: NodeId,
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Collapsed text content, already shortened by the surface.
    pub text: String,
    /// `display:none`, `visibility:hidden` or the `hidden` attribute.
    pub hidden: bool,
    /// The element carries a click handler.
    pub clickable: bool,
    pub rect: Rect,
    pub scroll: Option<ScrollBox>,
    /// Visible option texts, for `<select>` only.
    pub options: Vec<String>,
    pub children: Vec<DomNode>,
    pub frame: Option<FrameContent>,
}

impl DomNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Accessible frame document root, if this node is a same-origin iframe.
    pub fn frame_root(&self) -> Option<&DomNode> {
        match &self.frame {
            Some(FrameContent::Accessible { root }) => Some(root),
            _ => None,
        }
    }

    /// Pre-order search over this node's descendants, entering accessible frames.
    pub fn find_descendant(&self, pred: &dyn Fn(&DomNode) -> bool) -> Option<&DomNode> {
        for child in self.children.iter().chain(self.frame_root()) {
            if child.hidden {
                continue;
            }
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(pred) {
                return Some(found);
            }
        }
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub viewport: Viewport,
    pub root: DomNode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetrics {
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub document_height: f64,
    pub scroll_y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOptionInfo {
    pub index: usize,
    pub text: String,
    pub value: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    PointerDown,
    MouseDown,
    PointerUp,
    MouseUp,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    KeyDown,
    KeyPress,
    KeyUp,
}

/// Synthetic events the executor can fire at a node.
#[derive(Debug, Clone, PartialEq)]
pub enum DomEvent {
    Pointer { kind: PointerKind, x: f64, y: f64 },
    MouseOver,
    MouseEnter,
    Input,
    Change,
    Key { kind: KeyKind, key: String },
}

impl DomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomEvent::Pointer { kind, .. } => match kind {
                PointerKind::PointerDown => "pointerdown",
                PointerKind::MouseDown => "mousedown",
                PointerKind::PointerUp => "pointerup",
                PointerKind::MouseUp => "mouseup",
                PointerKind::Click => "click",
            },
            DomEvent::MouseOver => "mouseover",
            DomEvent::MouseEnter => "mouseenter",
            DomEvent::Input => "input",
            DomEvent::Change => "change",
            DomEvent::Key { kind, .. } => match kind {
                KeyKind::KeyDown => "keydown",
                KeyKind::KeyPress => "keypress",
                KeyKind::KeyUp => "keyup",
            },
        }
    }
}

#[async_trait]
pub trait PageSurface: Send + Sync {
    /// Read the structure of the page, including same-origin frames.
    async fn snapshot(&self) -> Result<PageSnapshot, SurfaceError>;

    async fn scroll_into_view(&self, node: NodeId) -> Result<(), SurfaceError>;

    /// Current rect in the node's own frame viewport.
    async fn bounding_rect(&self, node: NodeId) -> Result<Rect, SurfaceError>;

    async fn focus(&self, node: NodeId) -> Result<(), SurfaceError>;

    async fn dispatch(&self, node: NodeId, event: DomEvent) -> Result<(), SurfaceError>;

    /// Assign a value through the element prototype's native setter, so that
    /// framework-managed inputs see the change.
    async fn set_native_value(&self, node: NodeId, value: &str) -> Result<(), SurfaceError>;

    async fn select_options(&self, node: NodeId) -> Result<Vec<SelectOptionInfo>, SurfaceError>;

    async fn select_index(&self, node: NodeId, index: usize) -> Result<(), SurfaceError>;

    async fn page_metrics(&self) -> Result<PageMetrics, SurfaceError>;

    async fn scroll_window(&self, dy: f64) -> Result<(), SurfaceError>;

    async fn scroll_element(&self, node: NodeId, dy: f64) -> Result<(), SurfaceError>;

    /// Push `href` through the host application's client-side router.
    /// Returns the router's name, or `None` when no router was found.
    async fn client_navigate(&self, href: &str) -> Result<Option<String>, SurfaceError>;

    /// Full page navigation.
    async fn navigate(&self, href: &str) -> Result<(), SurfaceError>;
}
