// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Classifies one raw model completion.
//!
//! Accepted shapes:
//!
//! ```text
//! <tool_call>{"tool": "browser_navigate", "input": {"url": "https://example.com"}}</tool_call>
//! <tool_call name="browser_navigate" input_string="{&quot;url&quot;: &quot;…&quot;}"/>
//! <final_answer> … </final_answer>
//! ```

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use scout_tools::ToolRegistry;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool: String,
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalAnswer {
    /// Inner text of the final-answer block, surrounding whitespace trimmed.
    pub text: String,
    /// The whole completion the block came from.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    ToolInvocation(ToolInvocation),
    FinalAnswer(FinalAnswer),
    Malformed(ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("the reply contains both a <tool_call> and a <final_answer>; send exactly one of them")]
    Ambiguous,
    #[error("the reply contains neither a complete <tool_call>…</tool_call> nor a <final_answer>…</final_answer> block")]
    MissingMarker,
    #[error("unknown tool '{name}'. Available: {available}")]
    UnknownTool { name: String, available: String },
    #[error("invalid tool call{}: {detail}", .tool.as_ref().map(|t| format!(" for '{t}'")).unwrap_or_default())]
    SchemaMismatch { tool: Option<String>, detail: String },
}

const OPEN_TAG: &str = "<tool_call>";
const CLOSE_TAG: &str = "</tool_call>";

fn self_closing_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?s)<tool_call\s+([^>]*?)/>").unwrap_or_else(|e| panic!("tool_call regex: {e}"))
    })
}

fn final_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?s)<final_answer>(.*?)</final_answer>").unwrap_or_else(|e| panic!("final_answer regex: {e}"))
    })
}

fn attr_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"(?s)([a-zA-Z_]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap_or_else(|e| panic!("attr regex: {e}"))
    })
}

fn fence_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$").unwrap_or_else(|e| panic!("fence regex: {e}"))
    })
}

/// Raw tool request before registry lookup.
enum ToolBlock {
    /// A complete JSON value read straight after the opening tag.
    Value(Value),
    /// Body text up to the first closing tag, for lenient parsing.
    Json(String),
    Attributes { name: Option<String>, input: Option<String> },
}

/// Locate the tool request and the byte range it spans in `raw`.
fn find_tool_block(raw: &str) -> Option<(ToolBlock, Range<usize>)> {
    if let Some(open) = raw.find(OPEN_TAG) {
        let body_start = open + OPEN_TAG.len();
        if let Some((block, end)) = tagged_body(&raw[body_start..]) {
            return Some((block, open..body_start + end));
        }
    }
    self_closing_re().captures(raw).and_then(|c| {
        let span = c.get(0)?.range();
        let mut name = None;
        let mut input = None;
        for a in attr_re().captures_iter(&c[1]) {
            let value = a.get(2).or_else(|| a.get(3)).map(|m| unescape_html(m.as_str()));
            match &a[1] {
                "name" | "tool" => name = value,
                "input" | "input_string" | "args" => input = value,
                _ => {}
            }
        }
        Some((ToolBlock::Attributes { name, input }, span))
    })
}

/// Body of a `<tool_call>` block; `rest` starts right after the opening tag.
/// Returns the block and the offset just past its closing tag.
///
/// The body is first read as exactly one JSON value, so a closing tag inside
/// a string argument stays part of the argument.  Only when that fails is the
/// text up to the first closing tag handed to the lenient path.
fn tagged_body(rest: &str) -> Option<(ToolBlock, usize)> {
    let lead = rest.len() - rest.trim_start().len();
    let mut values = serde_json::Deserializer::from_str(&rest[lead..]).into_iter::<Value>();
    if let Some(Ok(value)) = values.next() {
        let after = lead + values.byte_offset();
        let gap = rest[after..].len() - rest[after..].trim_start().len();
        if rest[after + gap..].starts_with(CLOSE_TAG) {
            return Some((ToolBlock::Value(value), after + gap + CLOSE_TAG.len()));
        }
    }
    rest.find(CLOSE_TAG)
        .map(|end| (ToolBlock::Json(rest[..end].to_string()), end + CLOSE_TAG.len()))
}

/// Classify one completion.  Pure: the registry is only read.
pub fn parse_response(raw: &str, registry: &ToolRegistry) -> Parsed {
    let tool_block = find_tool_block(raw);
    // Tags quoted inside tool arguments do not count as a final answer.
    let final_block = match &tool_block {
        Some((_, span)) => final_re()
            .captures(&raw[..span.start])
            .or_else(|| final_re().captures(&raw[span.end..]))
            .map(|c| c[1].trim().to_string()),
        None => final_re().captures(raw).map(|c| c[1].trim().to_string()),
    };

    match (tool_block.map(|(block, _)| block), final_block) {
        (Some(_), Some(_)) => Parsed::Malformed(ParseError::Ambiguous),
        (None, None) => Parsed::Malformed(ParseError::MissingMarker),
        (None, Some(text)) => Parsed::FinalAnswer(FinalAnswer { text, raw: raw.to_string() }),
        (Some(block), None) => match resolve_tool_block(block, registry) {
            Ok(inv) => Parsed::ToolInvocation(inv),
            Err(e) => Parsed::Malformed(e),
        },
    }
}

/// Split a `{"tool": …, "input": …}` object into name and raw arguments.
fn name_and_args(value: Value) -> Result<(String, Value), ParseError> {
    let Value::Object(mut obj) = value else {
        return Err(ParseError::SchemaMismatch {
            tool: None,
            detail: "the tool_call body must be a JSON object like {\"tool\": \"…\", \"input\": {…}}".into(),
        });
    };
    let name = ["tool", "name"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(|v| v.as_str()).map(str::to_string))
        .ok_or_else(|| ParseError::SchemaMismatch {
            tool: None,
            detail: "missing string field \"tool\"".into(),
        })?;
    let args = ["input", "args", "arguments"]
        .iter()
        .find_map(|k| obj.remove(*k))
        .unwrap_or(Value::Null);
    Ok((name, args))
}

fn resolve_tool_block(block: ToolBlock, registry: &ToolRegistry) -> Result<ToolInvocation, ParseError> {
    let (name, raw_args) = match block {
        ToolBlock::Value(value) => name_and_args(value)?,
        ToolBlock::Json(body) => {
            let value = parse_json_lenient(&body).map_err(|detail| ParseError::SchemaMismatch { tool: None, detail })?;
            name_and_args(value)?
        }
        ToolBlock::Attributes { name, input } => {
            let name = name.ok_or_else(|| ParseError::SchemaMismatch {
                tool: None,
                detail: "missing name attribute".into(),
            })?;
            let args = match input {
                Some(text) if !text.trim().is_empty() => parse_json_lenient(&text)
                    .map_err(|detail| ParseError::SchemaMismatch { tool: Some(name.clone()), detail })?,
                _ => Value::Null,
            };
            (name, args)
        }
    };

    if !registry.contains(&name) {
        return Err(ParseError::UnknownTool { name, available: registry.names().join(", ") });
    }

    // Some models send the input object as a JSON-encoded string.
    let raw_args = match raw_args {
        Value::String(s) if s.trim_start().starts_with('{') => parse_json_lenient(&s).unwrap_or(Value::String(s)),
        other => other,
    };

    match registry.validate(&name, raw_args) {
        Some(Ok(args)) => {
            debug!(tool = %name, "parsed tool call");
            Ok(ToolInvocation { tool: name, args })
        }
        Some(Err(e)) => Err(ParseError::SchemaMismatch { tool: Some(name), detail: e.to_string() }),
        None => Err(ParseError::UnknownTool { name, available: registry.names().join(", ") }),
    }
}

/// Parse JSON, unwrapping a Markdown code fence and trying a few cheap
/// repairs for truncated or sloppy output.
fn parse_json_lenient(text: &str) -> Result<Value, String> {
    let body = match fence_re().captures(text) {
        Some(c) => c[1].to_string(),
        None => text.trim().to_string(),
    };
    match serde_json::from_str::<Value>(&body) {
        Ok(v) => Ok(v),
        Err(first) => attempt_json_repair(&body).ok_or_else(|| format!("body is not valid JSON ({first})")),
    }
}

fn attempt_json_repair(json_str: &str) -> Option<Value> {
    // 1. Trailing commas before a closing bracket
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    let trailing = TRAILING.get_or_init(|| Regex::new(r",\s*([}\]])").unwrap_or_else(|e| panic!("repair regex: {e}")));
    let repaired = trailing.replace_all(json_str, "$1").to_string();
    if let Ok(v) = serde_json::from_str::<Value>(&repaired) {
        return Some(v);
    }

    // 2. Output cut off after a complete value: close every open brace.
    // An open string means the cut fell inside an argument, which is not
    // recoverable without guessing its content.
    if repaired.chars().filter(|&c| c == '"').count() % 2 == 1 {
        return None;
    }
    let mut completed = repaired;
    let open = completed.chars().filter(|&c| c == '{').count();
    let close = completed.chars().filter(|&c| c == '}').count();
    for _ in close..open {
        completed.push('}');
    }
    serde_json::from_str::<Value>(&completed).ok()
}

fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
