// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use regex::Regex;

use crate::parser::FinalAnswer;

pub const PLAN_BEGIN: &str = "<<<BEGIN_PLAN_MD>>>";
pub const PLAN_END: &str = "<<<END_PLAN_MD>>>";
pub const TEST_BEGIN: &str = "<<<BEGIN_TEST>>>";
pub const TEST_END: &str = "<<<END_TEST>>>";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("missing {which} marker {marker}")]
    MissingSentinel { which: &'static str, marker: String },
    #[error("{0} appears again before the end marker")]
    UnbalancedSentinels(String),
    #[error("nothing between {0} and its end marker")]
    EmptyPayload(String),
    #[error("payload is missing the required section: {0}")]
    MissingSection(String),
}

/// A rule the extracted payload has to satisfy.
#[derive(Debug, Clone)]
pub enum SectionRule {
    /// A Markdown heading (`#`…`######`) whose text contains this name,
    /// compared case-insensitively.
    Heading(String),
    /// A regex that must match somewhere in the payload; `label` names it
    /// in error messages.
    Pattern { label: String, regex: Regex },
}

impl SectionRule {
    fn satisfied_by(&self, payload: &str) -> bool {
        match self {
            SectionRule::Heading(name) => {
                let needle = name.to_lowercase();
                payload.lines().any(|line| {
                    let t = line.trim_start();
                    let level = t.chars().take_while(|&c| c == '#').count();
                    (1..=6).contains(&level) && t[level..].to_lowercase().contains(&needle)
                })
            }
            SectionRule::Pattern { regex, .. } => regex.is_match(payload),
        }
    }

    fn label(&self) -> &str {
        match self {
            SectionRule::Heading(name) => name,
            SectionRule::Pattern { label, .. } => label,
        }
    }
}

/// Sentinels plus the rules one kind of artifact must satisfy.
#[derive(Debug, Clone)]
pub struct OutputContract {
    pub begin: String,
    pub end: String,
    pub sections: Vec<SectionRule>,
}

impl OutputContract {
    /// Markdown test plan.
    pub fn plan() -> Self {
        Self {
            begin: PLAN_BEGIN.into(),
            end: PLAN_END.into(),
            sections: vec![SectionRule::Heading("Overview".into()), SectionRule::Heading("Scenarios".into())],
        }
    }

    /// Generated browser test: needs a named test and a numbered step list.
    pub fn test_script() -> Self {
        let patterns = [
            ("scenario name", r#"\btest\(\s*['"`][^'"`]+['"`]"#),
            ("step list", r"(?m)^\s*//\s*1[.)]"),
        ];
        Self {
            begin: TEST_BEGIN.into(),
            end: TEST_END.into(),
            sections: patterns
                .into_iter()
                .filter_map(|(label, p)| {
                    Regex::new(p).ok().map(|regex| SectionRule::Pattern { label: label.into(), regex })
                })
                .collect(),
        }
    }

    /// Pull the payload out of a final answer.
    ///
    /// The inner text of the final-answer block is searched first; when it
    /// has no begin marker the whole completion is searched, since models
    /// often emit the bracketed payload before the final-answer tag.
    pub fn extract(&self, answer: &FinalAnswer) -> Result<String, ExtractionError> {
        let source = if answer.text.contains(&self.begin) { &answer.text } else { &answer.raw };
        self.extract_from(source)
    }

    pub fn extract_from(&self, text: &str) -> Result<String, ExtractionError> {
        let start = text.find(&self.begin).ok_or_else(|| ExtractionError::MissingSentinel {
            which: "begin",
            marker: self.begin.clone(),
        })? + self.begin.len();
        let rest = &text[start..];
        let stop = rest.find(&self.end).ok_or_else(|| ExtractionError::MissingSentinel {
            which: "end",
            marker: self.end.clone(),
        })?;
        let body = &rest[..stop];
        if body.contains(&self.begin) {
            return Err(ExtractionError::UnbalancedSentinels(self.begin.clone()));
        }

        let payload = body.trim();
        if payload.is_empty() {
            return Err(ExtractionError::EmptyPayload(self.begin.clone()));
        }
        if let Some(missing) = self.sections.iter().find(|r| !r.satisfied_by(payload)) {
            return Err(ExtractionError::MissingSection(missing.label().to_string()));
        }
        Ok(payload.to_string())
    }

    /// Instruction appended to corrective observations.
    pub fn reminder(&self) -> String {
        let labels: Vec<&str> = self.sections.iter().map(|s| s.label()).collect();
        format!(
            "Put the complete document between {} and {} (each on its own line), include: {}, \
             then close with <final_answer>…</final_answer>.",
            self.begin,
            self.end,
            labels.join(", ")
        )
    }
}
