// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Simplified DOM: visible text plus a numbered list of interactive
//! elements the model can refer to by `agent-id`.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

/// An interactive element found in the document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageElement {
    /// Stable id within one snapshot: `e1`, `e2`, …
    pub agent_id: String,
    pub tag: String,
    pub text: String,
    pub href: Option<String>,
    pub input_type: Option<String>,
    pub placeholder: Option<String>,
    pub aria_label: Option<String>,
    pub role: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    /// Option labels of a `<select>`.
    pub options: Vec<String>,
    /// Message of an `alert`/`confirm`/`prompt` opened by its `onclick`.
    pub dialog: Option<String>,
}

impl PageElement {
    /// ARIA role, explicit or implied by the tag.
    pub fn effective_role(&self) -> Option<&str> {
        if let Some(r) = self.role.as_deref() {
            return Some(r);
        }
        match (self.tag.as_str(), self.input_type.as_deref()) {
            ("a", _) if self.href.is_some() => Some("link"),
            ("button", _) => Some("button"),
            ("input", Some("submit" | "button" | "reset")) => Some("button"),
            ("input", Some("checkbox")) => Some("checkbox"),
            ("input", Some("radio")) => Some("radio"),
            ("input", _) | ("textarea", _) => Some("textbox"),
            ("select", _) => Some("combobox"),
            _ => None,
        }
    }

    /// Name a user would read: aria-label, then text, then value.
    pub fn accessible_name(&self) -> Option<&str> {
        self.aria_label
            .as_deref()
            .or(if self.text.is_empty() { None } else { Some(self.text.as_str()) })
            .or(self.value.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Playwright locator expression for this element.
    pub fn locator(&self) -> String {
        let is_field = matches!(self.tag.as_str(), "input" | "textarea" | "select")
            && !matches!(self.effective_role(), Some("button"));
        if is_field {
            if let Some(label) = &self.aria_label {
                return format!("page.getByLabel('{}')", js_escape(label));
            }
            if let Some(ph) = &self.placeholder {
                return format!("page.getByPlaceholder('{}')", js_escape(ph));
            }
        }
        if let (Some(role), Some(name)) = (self.effective_role(), self.accessible_name()) {
            return format!("page.getByRole('{}', {{ name: '{}' }})", role, js_escape(name));
        }
        if let Some(id) = &self.id {
            return format!("page.locator('#{}')", js_escape(id));
        }
        if let Some(name) = &self.name {
            return format!("page.locator('{}[name=\"{}\"]')", self.tag, js_escape(name));
        }
        format!("page.locator('{}')", self.tag)
    }

    fn render(&self) -> String {
        let mut line = format!("[{}] {}", self.agent_id, self.tag);
        if !self.text.is_empty() {
            let _ = write!(line, " \"{}\"", self.text);
        }
        let attrs = [
            ("href", &self.href),
            ("type", &self.input_type),
            ("placeholder", &self.placeholder),
            ("aria-label", &self.aria_label),
            ("role", &self.role),
        ];
        for (k, v) in attrs {
            if let Some(v) = v {
                let _ = write!(line, " {k}=\"{v}\"");
            }
        }
        if !self.options.is_empty() {
            let _ = write!(line, " options=\"{}\"", self.options.join(" | "));
        }
        if let Some(msg) = &self.dialog {
            let _ = write!(line, " opens-dialog=\"{msg}\"");
        }
        line
    }
}

/// Escape a string for a single-quoted JavaScript literal.
pub(crate) fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[derive(Debug, Clone)]
pub struct SimplifiedDom {
    pub url: String,
    pub title: String,
    /// Whitespace-normalised visible text (uncapped).
    pub text: String,
    pub elements: Vec<PageElement>,
}

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|e| panic!("bad built-in regex {pattern}: {e}")))
}

fn title_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    re(&R, r"(?is)<title[^>]*>(.*?)</title\s*>")
}

fn script_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    re(&R, r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<!--.*?-->")
}

fn element_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    re(
        &R,
        r#"(?is)<a\b(?P<a>[^>]*)>(?P<at>.*?)</a\s*>|<button\b(?P<b>[^>]*)>(?P<bt>.*?)</button\s*>|<textarea\b(?P<t>[^>]*)>(?P<tt>.*?)</textarea\s*>|<select\b(?P<s>[^>]*)>(?:(?P<st>.*?)</select\s*>)?|<input\b(?P<i>[^>]*)>|<(?P<rtag>[a-z][a-z0-9]*)\b(?P<r>[^>]*\brole\s*=[^>]*)>(?P<rt>[^<]*)"#,
    )
}

fn attr_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    re(&R, r#"(?s)([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
}

fn option_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    re(&R, r"(?is)<option\b[^>]*>([^<]*)")
}

fn dialog_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    re(&R, r#"(?i)\b(?:alert|confirm|prompt)\s*\(\s*(?:"([^"]*)"|'([^']*)')"#)
}

fn tag_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    re(&R, r"(?s)<[^>]*>")
}

fn parse_attrs(raw: &str) -> HashMap<String, String> {
    attr_re()
        .captures_iter(raw)
        .map(|c| {
            let value = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4)).map(|m| m.as_str()).unwrap_or("");
            (c[1].to_ascii_lowercase(), decode_entities(value))
        })
        .collect()
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn inner_text(html: &str) -> String {
    squash(&decode_entities(&tag_re().replace_all(html, " ")))
}

impl SimplifiedDom {
    pub fn parse(url: &str, html: &str, max_elements: usize) -> Self {
        let cleaned = script_re().replace_all(html, " ");
        let title = title_re().captures(&cleaned).map(|c| inner_text(&c[1])).unwrap_or_default();

        let mut elements = Vec::new();
        for caps in element_re().captures_iter(&cleaned) {
            if elements.len() >= max_elements {
                break;
            }
            let (tag, attrs, text) = if let Some(a) = caps.name("a") {
                ("a".to_string(), a.as_str(), caps.name("at").map(|m| m.as_str()).unwrap_or(""))
            } else if let Some(b) = caps.name("b") {
                ("button".to_string(), b.as_str(), caps.name("bt").map(|m| m.as_str()).unwrap_or(""))
            } else if let Some(t) = caps.name("t") {
                ("textarea".to_string(), t.as_str(), caps.name("tt").map(|m| m.as_str()).unwrap_or(""))
            } else if let Some(s) = caps.name("s") {
                ("select".to_string(), s.as_str(), "")
            } else if let Some(i) = caps.name("i") {
                ("input".to_string(), i.as_str(), "")
            } else if let (Some(t), Some(r)) = (caps.name("rtag"), caps.name("r")) {
                (t.as_str().to_ascii_lowercase(), r.as_str(), caps.name("rt").map(|m| m.as_str()).unwrap_or(""))
            } else {
                continue;
            };

            let options: Vec<String> = caps
                .name("st")
                .map(|m| option_re().captures_iter(m.as_str()).map(|c| inner_text(&c[1])).collect())
                .unwrap_or_default();
            let mut attrs = parse_attrs(attrs);
            let dialog = attrs.get("onclick").and_then(|js| {
                dialog_re().captures(js).and_then(|c| c.get(1).or_else(|| c.get(2))).map(|m| m.as_str().to_string())
            });
            if tag == "input" && attrs.get("type").map(|t| t == "hidden").unwrap_or(false) {
                continue;
            }
            elements.push(PageElement {
                agent_id: format!("e{}", elements.len() + 1),
                tag,
                text: inner_text(text),
                href: attrs.remove("href"),
                input_type: attrs.remove("type"),
                placeholder: attrs.remove("placeholder"),
                aria_label: attrs.remove("aria-label"),
                role: attrs.remove("role"),
                id: attrs.remove("id"),
                name: attrs.remove("name"),
                value: attrs.remove("value"),
                options,
                dialog,
            });
        }

        let text = squash(&html2text::from_read(cleaned.as_bytes(), 100));
        Self { url: url.to_string(), title, text, elements }
    }

    /// Find an element by agent-id, then by exact accessible name, then by
    /// case-insensitive accessible name.
    pub fn find(&self, target: &str) -> Option<&PageElement> {
        let target = target.trim();
        self.elements
            .iter()
            .find(|e| e.agent_id == target)
            .or_else(|| self.elements.iter().find(|e| e.accessible_name() == Some(target)))
            .or_else(|| {
                let lower = target.to_lowercase();
                self.elements
                    .iter()
                    .find(|e| e.accessible_name().map(|n| n.to_lowercase() == lower).unwrap_or(false))
            })
    }

    /// Whitespace-insensitive text containment check.
    pub fn contains_text(&self, needle: &str) -> bool {
        let needle = squash(needle);
        !needle.is_empty() && (self.text.contains(&needle) || self.title.contains(&needle))
    }

    /// Render for the model, with page text capped at `text_chars` characters.
    pub fn render(&self, text_chars: usize) -> String {
        let mut out = format!("URL: {}\nTitle: {}\n\n--- Page text ---\n", self.url, self.title);
        let snippet: String = self.text.chars().take(text_chars).collect();
        out.push_str(&snippet);
        if self.text.chars().count() > text_chars {
            out.push_str(" …[truncated]");
        }
        let _ = write!(out, "\n\n--- Interactive elements ({}) ---\n", self.elements.len());
        for e in &self.elements {
            out.push_str(&e.render());
            out.push('\n');
        }
        out
    }
}
