// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! File names for persisted artifacts.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// `<domain>-<page>-plan.md` for the page at `url`.
///
/// The domain is the host (with port, `:` → `-`); the page is the path with
/// `/` → `-`, or `home` for the root.
pub fn plan_file_name(url: &Url) -> String {
    let mut domain = url.host_str().unwrap_or("local").to_string();
    if let Some(port) = url.port() {
        domain = format!("{domain}:{port}");
    }
    let domain = domain.replace(':', "-");

    let path = url.path().trim_matches('/');
    let page = if path.is_empty() { "home".to_string() } else { path.replace('/', "-") };
    format!("{domain}-{page}-plan.md")
}

fn test_name_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"\btest\(\s*['"`]([^'"`]+)['"`]"#).unwrap_or_else(|e| panic!("test name regex: {e}"))
    })
}

/// Name of the first `test('…')` in a generated script.
pub fn scenario_name(script: &str) -> Option<&str> {
    test_name_re().captures(script).and_then(|c| c.get(1)).map(|m| m.as_str().trim())
}

/// Lowercase, ASCII alphanumerics only, runs of anything else become one `-`.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if dash && !out.is_empty() {
                out.push('-');
            }
            dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            dash = true;
        }
    }
    out
}

/// `<slug>.spec.ts` for a generated script.
pub fn test_file_name(script: &str) -> String {
    let slug = scenario_name(script).map(slugify).unwrap_or_default();
    let slug = if slug.is_empty() { "scenario".to_string() } else { slug };
    format!("{slug}.spec.ts")
}
