// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fmt;

use regex::Regex;
use serde_json::Value;

/// How many successful invocations a tool may have in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Unbounded,
    /// At most one successful invocation; later attempts are rule violations.
    Once,
}

/// Primitive type a parameter value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub description: &'static str,
    /// Other keys models commonly use for this parameter.
    pub aliases: &'static [&'static str],
}

impl ParamSpec {
    pub fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self { name, ty, required: true, description, aliases: &[] }
    }

    pub fn optional(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self { name, ty, required: false, description, aliases: &[] }
    }

    pub fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }
}

/// Everything the loop and the prompt need to know about a tool, detached
/// from its implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    pub cardinality: Cardinality,
    pub requires: Vec<&'static str>,
}

impl ToolSpec {
    /// One-line signature for prompts: `name(url: string, timeout?: integer)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| format!("{}{}: {}", p.name, if p.required { "" } else { "?" }, p.ty))
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

/// Convert a simple shell glob pattern to a [`Regex`].
/// Only `*` (match anything) and `?` (match one char) are supported.
pub(crate) fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn integer_rejects_fractions() {
        assert!(ParamType::Integer.accepts(&json!(3)));
        assert!(!ParamType::Integer.accepts(&json!(3.5)));
        assert!(ParamType::Number.accepts(&json!(3.5)));
    }

    #[test]
    fn signature_marks_optional_params() {
        let spec = ToolSpec {
            name: "file_search".into(),
            description: String::new(),
            parameters: vec![
                ParamSpec::required("pattern", ParamType::String, ""),
                ParamSpec::optional("limit", ParamType::Integer, ""),
            ],
            cardinality: Cardinality::Unbounded,
            requires: vec![],
        };
        assert_eq!(spec.signature(), "file_search(pattern: string, limit?: integer)");
    }

    #[test]
    fn glob_star_and_question_mark() {
        let re = glob_to_regex("*.spec.ts").unwrap();
        assert!(re.is_match("login.spec.ts"));
        assert!(!re.is_match("login.spec.js"));
        let re = glob_to_regex("plan?.md").unwrap();
        assert!(re.is_match("plan1.md"));
        assert!(!re.is_match("plan12.md"));
    }
}
