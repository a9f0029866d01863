//! Scripts injected into the page by [`ChromePage`](super::ChromePage).
//!
//! Node handles are indices into `window.__pagepilot.nodes`, which the
//! snapshot script rebuilds on every call. Same-origin frame documents are
//! registered in the top window's registry too. Every script returns a JSON
//! string; CDP hands primitives back by value, objects only by reference.

/// Structural read of the page. NON-DESTRUCTIVE: no attributes are written to
/// the DOM, the registry lives on `window`.
pub const SNAPSHOT_JS: &str = r#"
(() => {
  const SKIP = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'LINK', 'META', 'svg', 'SVG']);
  const KEEP = ['type', 'name', 'id', 'role', 'placeholder', 'aria-label', 'title', 'href', 'alt',
    'disabled', 'checked', 'contenteditable', 'tabindex', 'target', 'download'];
  const TEXT_TAGS = new Set(['a', 'button', 'summary', 'label', 'option', 'textarea', 'li', 'td', 'th']);
  const MAX_TEXT = 120;
  const MAX_DEPTH = 80;
  const reg = { nodes: [] };
  window.__pagepilot = reg;

  function visit(el, win, depth) {
    const id = reg.nodes.push(el) - 1;
    const tag = el.tagName.toLowerCase();
    const style = win.getComputedStyle(el);
    const hidden = el.hidden === true || style.display === 'none' || style.visibility === 'hidden';
    const attributes = {};
    for (const name of KEEP) {
      if (el.hasAttribute(name)) attributes[name] = el.getAttribute(name) || '';
    }
    if (tag === 'a' && el.href) attributes.href = String(el.href);
    if ((tag === 'input' || tag === 'textarea') && el.value) attributes.value = String(el.value).slice(0, MAX_TEXT);
    if (tag === 'input' && (el.type === 'checkbox' || el.type === 'radio')) {
      if (el.checked) attributes.checked = ''; else delete attributes.checked;
    }
    const r = el.getBoundingClientRect();
    const node = {
      id, tag, attributes, text: '', hidden,
      clickable: typeof el.onclick === 'function' || el.hasAttribute('onclick'),
      rect: { x: r.x, y: r.y, width: r.width, height: r.height },
      scroll: null, options: [], children: [], frame: null,
    };
    if (hidden) return node;

    const signal = TEXT_TAGS.has(tag) || el.children.length === 0 || el.hasAttribute('role')
      || node.clickable || el.hasAttribute('tabindex') || el.isContentEditable;
    if (signal) node.text = (el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim().slice(0, MAX_TEXT);

    if (el.clientHeight > 0 && el.scrollHeight > el.clientHeight + 1) {
      node.scroll = {
        overflowY: style.overflowY, scrollHeight: el.scrollHeight, clientHeight: el.clientHeight,
        scrollTop: el.scrollTop, zIndex: parseInt(style.zIndex, 10) || 0,
      };
    }
    if (tag === 'select') node.options = Array.from(el.options).map(o => (o.text || '').trim());

    if (tag === 'iframe' || tag === 'frame') {
      let doc = null;
      try { doc = el.contentDocument; } catch (e) { doc = null; }
      node.frame = doc && doc.body
        ? { kind: 'accessible', root: visit(doc.body, el.contentWindow, depth + 1) }
        : { kind: 'opaque' };
      return node;
    }

    if (depth < MAX_DEPTH) {
      for (const child of el.children) {
        if (SKIP.has(child.tagName)) continue;
        node.children.push(visit(child, win, depth + 1));
      }
    }
    return node;
  }

  const root = visit(document.body, window, 0);
  return JSON.stringify({
    url: location.href,
    viewport: { width: window.innerWidth, height: window.innerHeight },
    root,
  });
})()
"#;

/// Wrapper for per-node operations. `__NODE__` is the handle, `__BODY__` the
/// operation; the body sees `el` and its window `win`.
pub const NODE_JS: &str = r#"
(() => {
  try {
    const reg = window.__pagepilot;
    const el = reg && reg.nodes[__NODE__];
    if (!el || !el.isConnected) return JSON.stringify({ detached: true });
    const win = el.ownerDocument.defaultView;
    __BODY__
  } catch (e) {
    return JSON.stringify({ error: String((e && e.message) || e) });
  }
})()
"#;

pub const SCROLL_INTO_VIEW: &str = r#"
el.scrollIntoView({ block: 'center', inline: 'center', behavior: 'instant' });
return JSON.stringify({ ok: true });
"#;

pub const BOUNDING_RECT: &str = r#"
const r = el.getBoundingClientRect();
return JSON.stringify({ ok: true, value: { x: r.x, y: r.y, width: r.width, height: r.height } });
"#;

pub const FOCUS: &str = r#"
el.focus();
return JSON.stringify({ ok: true });
"#;

/// `__CTOR__` is the event constructor name, `__NAME__` the event type and
/// `__INIT__` the init dictionary.
pub const DISPATCH: &str = r#"
const init = Object.assign({ view: win }, __INIT__);
el.dispatchEvent(new win[__CTOR__](__NAME__, init));
return JSON.stringify({ ok: true });
"#;

/// Goes through the prototype setter so React-style value trackers notice.
pub const SET_NATIVE_VALUE: &str = r#"
const value = __VALUE__;
const tag = el.tagName;
if (tag === 'INPUT' || tag === 'TEXTAREA') {
  const proto = tag === 'INPUT' ? win.HTMLInputElement.prototype : win.HTMLTextAreaElement.prototype;
  Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, value);
} else if (el.isContentEditable) {
  el.textContent = value;
} else {
  return JSON.stringify({ error: '<' + tag.toLowerCase() + '> has no value property' });
}
return JSON.stringify({ ok: true });
"#;

pub const SELECT_OPTIONS: &str = r#"
if (el.tagName !== 'SELECT') return JSON.stringify({ error: '<' + el.tagName.toLowerCase() + '> has no options' });
return JSON.stringify({ ok: true, value: Array.from(el.options).map((o, i) => (
  { index: i, text: o.text, value: o.value, selected: o.selected }
)) });
"#;

pub const SELECT_INDEX: &str = r#"
const index = __INDEX__;
if (el.tagName !== 'SELECT') return JSON.stringify({ error: 'not a select element' });
if (index < 0 || index >= el.options.length) return JSON.stringify({ error: 'option index ' + index + ' out of range' });
Object.getOwnPropertyDescriptor(win.HTMLSelectElement.prototype, 'selectedIndex').set.call(el, index);
return JSON.stringify({ ok: true });
"#;

pub const SCROLL_ELEMENT: &str = r#"
el.scrollBy({ top: __DY__, behavior: 'instant' });
return JSON.stringify({ ok: true });
"#;

pub const PAGE_METRICS_JS: &str = r#"
(() => JSON.stringify({
  viewportWidth: window.innerWidth,
  viewportHeight: window.innerHeight,
  documentHeight: Math.max(
    document.documentElement ? document.documentElement.scrollHeight : 0,
    document.body ? document.body.scrollHeight : 0),
  scrollY: window.scrollY,
}))()
"#;

pub const SCROLL_WINDOW_JS: &str = r#"
(() => { window.scrollBy({ top: __DY__, behavior: 'instant' }); return JSON.stringify({ ok: true }); })()
"#;

/// Push a same-origin path through whichever client-side router is exposed on
/// `window`. Returns the router's name, or null.
pub const CLIENT_NAVIGATE_JS: &str = r#"
(() => {
  const u = new URL(__HREF__, location.href);
  const path = u.pathname + u.search + u.hash;
  const w = window;
  try {
    if (w.next && w.next.router && typeof w.next.router.push === 'function') {
      w.next.router.push(path);
      return JSON.stringify({ router: 'next' });
    }
    if (w.$nuxt && w.$nuxt.$router && typeof w.$nuxt.$router.push === 'function') {
      w.$nuxt.$router.push(path);
      return JSON.stringify({ router: 'nuxt' });
    }
    if (w.__ROUTER__ && typeof w.__ROUTER__.navigate === 'function') {
      w.__ROUTER__.navigate(path);
      return JSON.stringify({ router: 'router' });
    }
    if (w.__ROUTER__ && typeof w.__ROUTER__.push === 'function') {
      w.__ROUTER__.push(path);
      return JSON.stringify({ router: 'router' });
    }
  } catch (e) {
    return JSON.stringify({ router: null, error: String((e && e.message) || e) });
  }
  return JSON.stringify({ router: null });
})()
"#;
