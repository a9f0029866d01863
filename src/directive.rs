//! The textual contract between the LLM and the agent.
//!
//! ```text
//! ACTION: <name>(<arg>[, <arg>]*)   args: bare int | "quoted string" | bare token
//! DONE: <message>
//! ASK: <question>
//! ```
//!
//! Parsing is lenient on purpose: a reply that carries neither a marker nor a
//! directive is taken as an implicit completion rather than an error.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::DirectiveError;

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:action)[*`\s]*:[*`\s]*([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid regex")
});

/// Phrases that declare the task finished when no marker or directive is present.
const COMPLETION_PHRASES: [&str; 6] = [
    "task complete",
    "task is complete",
    "task has been complete",
    "task finished",
    "task is finished",
    "task has been finished",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i64),
    Str(String),
    Token(String),
}

impl Param {
    /// The parameter as free text, whatever its lexical form.
    pub fn as_text(&self) -> String {
        match self {
            Param::Int(n) => n.to_string(),
            Param::Str(s) | Param::Token(s) => s.clone(),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Int(n) => write!(f, "{n}"),
            Param::Str(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Param::Token(s) => f.write_str(s),
        }
    }
}

/// A syntactically valid `ACTION:` line. The name is not checked here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub params: Vec<Param>,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(f, "{}({})", self.name, params.join(", "))
    }
}

/// Find the first `ACTION: name(...)` in `text`.
pub fn parse_directive(text: &str) -> Option<Directive> {
    let caps = ACTION_RE.captures(text)?;
    let name = caps.get(1)?.as_str().to_string();
    let rest = &text[caps.get(0)?.end()..];
    let params = parse_args(rest)?;
    Some(Directive { name, params })
}

/// Positional arguments up to the closing paren. `None` if it never closes.
fn parse_args(rest: &str) -> Option<Vec<Param>> {
    let mut params = Vec::new();
    let mut token = String::new();
    let mut quoted: Option<String> = None;
    // Parens nested inside a bare token, e.g. `Sprint (Q3)`.
    let mut depth = 0usize;
    let mut chars = rest.chars();

    loop {
        let c = chars.next()?;
        match c {
            '"' | '\'' if quoted.is_none() && token.trim().is_empty() => {
                quoted = Some(read_quoted(&mut chars, c)?);
            }
            '(' if quoted.is_none() => {
                depth += 1;
                token.push(c);
            }
            ')' if depth > 0 => {
                depth -= 1;
                token.push(c);
            }
            ',' if depth == 0 => params.push(finish_param(&mut token, quoted.take())),
            ')' => {
                if !params.is_empty() || quoted.is_some() || !token.trim().is_empty() {
                    params.push(finish_param(&mut token, quoted.take()));
                }
                return Some(params);
            }
            // Anything between a closing quote and the next separator is noise.
            _ if quoted.is_some() => {}
            _ => token.push(c),
        }
    }
}

fn read_quoted(chars: &mut std::str::Chars<'_>, quote: char) -> Option<String> {
    let mut out = String::new();
    loop {
        match chars.next()? {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            c if c == quote => return Some(out),
            c => out.push(c),
        }
    }
}

fn finish_param(token: &mut String, quoted: Option<String>) -> Param {
    let raw = std::mem::take(token);
    if let Some(s) = quoted {
        return Param::Str(s);
    }
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(n) => Param::Int(n),
        Err(_) => Param::Token(raw.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// `DONE:` marker or an explicit completion phrase.
    Declared,
    /// `ASK:` marker; the LLM needs input from the user.
    Question,
    /// Nothing recognisable in the reply.
    Implicit,
}

/// What the agent should do with one LLM reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Complete { kind: Completion, message: String },
    Act(Directive),
}

impl Reply {
    pub fn classify(text: &str) -> Reply {
        let head = text.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '`' | '#'));

        if let Some(rest) = strip_marker(head, "DONE") {
            return Reply::Complete {
                kind: Completion::Declared,
                message: marker_message(rest, text),
            };
        }
        if let Some(rest) = strip_marker(head, "ASK") {
            return Reply::Complete {
                kind: Completion::Question,
                message: marker_message(rest, text),
            };
        }

        if let Some(directive) = parse_directive(text) {
            return Reply::Act(directive);
        }

        let lower = text.to_lowercase();
        let kind = if COMPLETION_PHRASES.iter().any(|p| lower.contains(p)) {
            Completion::Declared
        } else {
            Completion::Implicit
        };
        Reply::Complete {
            kind,
            message: text.to_string(),
        }
    }
}

/// `DONE: x` / `done - x` / a reply that is only `DONE`, case-insensitive.
/// A sentence that merely starts with the word ("Done typing...") is not a
/// marker.
fn strip_marker<'a>(head: &'a str, marker: &str) -> Option<&'a str> {
    let prefix = head.get(..marker.len())?;
    if !prefix.eq_ignore_ascii_case(marker) {
        return None;
    }
    let rest = head[marker.len()..].trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '`'));
    if rest.is_empty() || rest.starts_with([':', '-']) {
        Some(rest)
    } else {
        None
    }
}

fn marker_message(rest: &str, full: &str) -> String {
    let msg = rest
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | '*'))
        .trim();
    if msg.is_empty() {
        full.trim().to_string()
    } else {
        msg.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl FromStr for ScrollDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            other => Err(format!("expected 'up' or 'down', got '{other}'")),
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
        })
    }
}

/// A directive checked against the action signatures.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click { index: usize },
    Type { index: usize, text: String },
    Scroll { direction: ScrollDirection, amount: Option<f64> },
    Select { index: usize, option: String },
}

impl TryFrom<&Directive> for Action {
    type Error = DirectiveError;

    fn try_from(d: &Directive) -> Result<Self, Self::Error> {
        let p = &d.params;
        match d.name.to_ascii_lowercase().as_str() {
            "click" => {
                arity(p, "click", 1, "index")?;
                Ok(Action::Click {
                    index: index_param("click", &p[0])?,
                })
            }
            "type" => {
                arity(p, "type", 2, "index, text")?;
                Ok(Action::Type {
                    index: index_param("type", &p[0])?,
                    text: join_text(&p[1..]),
                })
            }
            "scroll" => {
                arity(p, "scroll", 1, "direction")?;
                let direction = p[0]
                    .as_text()
                    .parse()
                    .map_err(|reason| DirectiveError::InvalidParam {
                        action: "scroll",
                        param: "direction",
                        reason,
                    })?;
                let amount = match p.get(1) {
                    Some(Param::Int(n)) if *n > 0 => Some(*n as f64),
                    Some(other) => {
                        return Err(DirectiveError::InvalidParam {
                            action: "scroll",
                            param: "amount",
                            reason: format!("expected a positive integer, got {other}"),
                        });
                    }
                    None => None,
                };
                Ok(Action::Scroll { direction, amount })
            }
            "select" => {
                arity(p, "select", 2, "index, optionText")?;
                Ok(Action::Select {
                    index: index_param("select", &p[0])?,
                    option: join_text(&p[1..]),
                })
            }
            _ => Err(DirectiveError::UnknownAction(d.name.clone())),
        }
    }
}

fn arity(
    params: &[Param],
    action: &'static str,
    expected: usize,
    signature: &'static str,
) -> Result<(), DirectiveError> {
    if params.len() < expected {
        return Err(DirectiveError::MissingParams {
            action,
            signature,
            expected,
            got: params.len(),
        });
    }
    Ok(())
}

fn index_param(action: &'static str, param: &Param) -> Result<usize, DirectiveError> {
    let parsed = match param {
        Param::Int(n) => usize::try_from(*n).ok(),
        Param::Str(s) | Param::Token(s) => s.trim().parse::<usize>().ok(),
    };
    parsed.ok_or_else(|| DirectiveError::InvalidParam {
        action,
        param: "index",
        reason: format!("expected a non-negative integer, got {param}"),
    })
}

/// Unquoted text containing commas arrives split; put it back together.
fn join_text(params: &[Param]) -> String {
    params.iter().map(Param::as_text).collect::<Vec<_>>().join(", ")
}
