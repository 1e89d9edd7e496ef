// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! File-system tools confined to one workspace directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use crate::policy::{glob_to_regex, ParamSpec, ParamType};
use crate::tool::{Tool, ToolCall, ToolOutput};

const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules"];
const DEFAULT_SEARCH_LIMIT: usize = 200;

/// Directory every file-system tool resolves paths against.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    /// Directories the write tools may not touch.
    reserved: Vec<PathBuf>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), reserved: Vec::new() }
    }

    /// Refuse writes under `dir`.  Relative paths are taken from the
    /// current directory, the same way output paths are.
    pub fn reserve(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.reserved.push(std::path::absolute(&dir).unwrap_or(dir));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied path.  Relative paths are joined onto the
    /// root; `..` components and absolute paths outside the root are refused.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, String> {
        let p = Path::new(raw.trim());
        if p.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(format!("path '{raw}' may not contain '..'"));
        }
        let full = if p.is_absolute() { p.to_path_buf() } else { self.root.join(p) };
        if !full.starts_with(&self.root) {
            return Err(format!("path '{raw}' is outside the workspace {}", self.root.display()));
        }
        Ok(full)
    }

    /// Like [`Workspace::resolve`], but also refuses reserved directories.
    pub fn resolve_for_write(&self, raw: &str) -> Result<PathBuf, String> {
        let full = self.resolve(raw)?;
        let abs = std::path::absolute(&full).unwrap_or_else(|_| full.clone());
        if let Some(dir) = self.reserved.iter().find(|d| abs.starts_with(d)) {
            return Err(format!(
                "path '{raw}' is inside the reserved output directory {}; the validated result is saved there after the run",
                dir.display()
            ));
        }
        Ok(full)
    }

    fn display(&self, p: &Path) -> String {
        p.strip_prefix(&self.root).unwrap_or(p).display().to_string()
    }
}

fn path_arg(ws: &Workspace, call: &ToolCall, key: &str) -> Result<PathBuf, ToolOutput> {
    match call.str_arg(key) {
        Some(raw) => ws.resolve(raw).map_err(|e| ToolOutput::err(&call.id, e)),
        None => Ok(ws.root.clone()),
    }
}

fn write_path_arg(ws: &Workspace, call: &ToolCall, key: &str) -> Result<PathBuf, ToolOutput> {
    match call.str_arg(key) {
        Some(raw) => ws.resolve_for_write(raw).map_err(|e| ToolOutput::err(&call.id, e)),
        None => Err(ToolOutput::err(&call.id, format!("missing '{key}'"))),
    }
}

fn skipped(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().map(|n| SKIP_DIRS.contains(&n)).unwrap_or(false)
}

// ── list_directory ───────────────────────────────────────────────────────────

pub struct ListDirectoryTool(pub Workspace);

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str { "list_directory" }

    fn description(&self) -> &str {
        "List the entries of a directory (one level). Directories have a trailing /."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("path", ParamType::String, "Directory path relative to the workspace")]
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let dir = match path_arg(&self.0, call, "path") {
            Ok(p) => p,
            Err(out) => return out,
        };
        debug!(path = %dir.display(), "list_directory tool");

        let mut rd = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) => return ToolOutput::err(&call.id, format!("cannot list {}: {e}", self.0.display(&dir))),
        };
        let mut entries = Vec::new();
        loop {
            match rd.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().to_string();
                    let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                    entries.push(if is_dir { format!("{name}/") } else { name });
                }
                Ok(None) => break,
                Err(e) => return ToolOutput::err(&call.id, format!("cannot list {}: {e}", self.0.display(&dir))),
            }
        }
        entries.sort();
        if entries.is_empty() {
            ToolOutput::ok(&call.id, "(empty directory)")
        } else {
            ToolOutput::ok(&call.id, entries.join("\n"))
        }
    }
}

// ── create_directory ─────────────────────────────────────────────────────────

pub struct CreateDirectoryTool(pub Workspace);

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str { "create_directory" }

    fn description(&self) -> &str {
        "Create a directory, including missing parents. Succeeds if it already exists."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("path", ParamType::String, "Directory path relative to the workspace")]
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let dir = match write_path_arg(&self.0, call, "path") {
            Ok(p) => p,
            Err(out) => return out,
        };
        debug!(path = %dir.display(), "create_directory tool");
        match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => ToolOutput::ok(&call.id, format!("created {}", self.0.display(&dir))),
            Err(e) => ToolOutput::err(&call.id, format!("cannot create {}: {e}", self.0.display(&dir))),
        }
    }
}

// ── read_file ────────────────────────────────────────────────────────────────

pub struct ReadFileTool(pub Workspace);

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str { "read_file" }

    fn description(&self) -> &str {
        "Read a UTF-8 text file and return its full contents."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("path", ParamType::String, "File path relative to the workspace")]
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let file = match path_arg(&self.0, call, "path") {
            Ok(p) => p,
            Err(out) => return out,
        };
        debug!(path = %file.display(), "read_file tool");
        match tokio::fs::read_to_string(&file).await {
            Ok(text) => ToolOutput::ok(&call.id, text),
            Err(e) => ToolOutput::err(&call.id, format!("cannot read {}: {e}", self.0.display(&file))),
        }
    }
}

// ── create_file ──────────────────────────────────────────────────────────────

pub struct CreateFileTool(pub Workspace);

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str { "create_file" }

    fn description(&self) -> &str {
        "Write a text file, creating parent directories and replacing any existing file."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("path", ParamType::String, "File path relative to the workspace"),
            ParamSpec::required("content", ParamType::String, "Full file contents"),
        ]
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let file = match write_path_arg(&self.0, call, "path") {
            Ok(p) => p,
            Err(out) => return out,
        };
        let content = call.str_arg("content").unwrap_or("");
        debug!(path = %file.display(), bytes = content.len(), "create_file tool");

        if let Some(parent) = file.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolOutput::err(&call.id, format!("cannot create {}: {e}", self.0.display(parent)));
            }
        }
        match tokio::fs::write(&file, content).await {
            Ok(()) => ToolOutput::ok(
                &call.id,
                format!("wrote {} bytes to {}", content.len(), self.0.display(&file)),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("cannot write {}: {e}", self.0.display(&file))),
        }
    }
}

// ── file_search ──────────────────────────────────────────────────────────────

pub struct FileSearchTool(pub Workspace);

#[async_trait]
impl Tool for FileSearchTool {
    fn name(&self) -> &str { "file_search" }

    fn description(&self) -> &str {
        "Find files whose name matches a glob pattern (* and ?), searching recursively. \
         Skips .git/, target/ and node_modules/."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("pattern", ParamType::String, "File-name glob, e.g. '*.spec.ts'"),
            ParamSpec::optional("root", ParamType::String, "Directory to search (default: workspace root)"),
            ParamSpec::optional("limit", ParamType::Integer, "Maximum results (default 200)"),
        ]
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let pattern = call.str_arg("pattern").unwrap_or("*");
        let name_pattern = pattern.rsplit('/').next().unwrap_or(pattern);
        let re = match glob_to_regex(name_pattern) {
            Some(re) => re,
            None => return ToolOutput::err(&call.id, format!("invalid pattern '{pattern}'")),
        };
        let root = match path_arg(&self.0, call, "root") {
            Ok(p) => p,
            Err(out) => return out,
        };
        let limit = call.args.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize).unwrap_or(DEFAULT_SEARCH_LIMIT);
        debug!(pattern = %pattern, root = %root.display(), "file_search tool");

        let mut hits: Vec<String> = WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| !skipped(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_str().map(|n| re.is_match(n)).unwrap_or(false))
            .map(|e| self.0.display(e.path()))
            .take(limit)
            .collect();
        hits.sort();

        if hits.is_empty() {
            ToolOutput::ok(&call.id, "(no matches)")
        } else {
            ToolOutput::ok(&call.id, hits.join("\n"))
        }
    }
}

// ── text_search ──────────────────────────────────────────────────────────────

pub struct TextSearchTool(pub Workspace);

#[async_trait]
impl Tool for TextSearchTool {
    fn name(&self) -> &str { "text_search" }

    fn description(&self) -> &str {
        "Search text files under a path for a literal string. Returns path:line: text for each hit."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("query", ParamType::String, "Literal text to look for"),
            ParamSpec::optional("path", ParamType::String, "File or directory to search (default: workspace root)"),
            ParamSpec::optional("limit", ParamType::Integer, "Maximum hits (default 200)"),
        ]
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let query = call.str_arg("query").unwrap_or("");
        if query.is_empty() {
            return ToolOutput::err(&call.id, "query must not be empty");
        }
        let root = match path_arg(&self.0, call, "path") {
            Ok(p) => p,
            Err(out) => return out,
        };
        let limit = call.args.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize).unwrap_or(DEFAULT_SEARCH_LIMIT);
        debug!(query = %query, root = %root.display(), "text_search tool");

        let mut hits = Vec::new();
        'files: for entry in WalkDir::new(&root).into_iter().filter_entry(|e| !skipped(e)).filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            // Binary or unreadable files are skipped.
            let Ok(text) = std::fs::read_to_string(entry.path()) else { continue };
            for (n, line) in text.lines().enumerate() {
                if line.contains(query) {
                    hits.push(format!("{}:{}: {}", self.0.display(entry.path()), n + 1, line.trim()));
                    if hits.len() >= limit {
                        break 'files;
                    }
                }
            }
        }

        if hits.is_empty() {
            ToolOutput::ok(&call.id, "(no matches)")
        } else {
            ToolOutput::ok(&call.id, hits.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::*;

    fn call(args: Value) -> ToolCall {
        let map: Map<String, Value> = args.as_object().cloned().unwrap_or_default();
        ToolCall::new("t1", "fs", map)
    }

    #[test]
    fn resolve_refuses_parent_components() {
        let ws = Workspace::new("/work");
        assert!(ws.resolve("../etc/passwd").is_err());
        assert!(ws.resolve("/etc/passwd").is_err());
        assert_eq!(ws.resolve("specs/a.md").unwrap(), PathBuf::from("/work/specs/a.md"));
        assert_eq!(ws.resolve("/work/x").unwrap(), PathBuf::from("/work/x"));
    }

    #[tokio::test]
    async fn writes_into_reserved_dirs_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path()).reserve(dir.path().join("specs"));

        let out = CreateFileTool(ws.clone())
            .execute(&call(json!({"path": "specs/shop.test-home-plan.md", "content": "half a plan"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("reserved output directory"), "{}", out.content);
        assert!(!dir.path().join("specs").exists());

        let out = CreateDirectoryTool(ws.clone()).execute(&call(json!({"path": "specs/drafts"}))).await;
        assert!(out.is_error);

        let out = CreateFileTool(ws).execute(&call(json!({"path": "notes/specs.md", "content": "ok"}))).await;
        assert!(!out.is_error, "{}", out.content);
    }

    #[tokio::test]
    async fn create_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let out = CreateFileTool(ws.clone())
            .execute(&call(json!({"path": "nested/note.txt", "content": "hello"})))
            .await;
        assert!(!out.is_error, "{}", out.content);

        let out = ReadFileTool(ws).execute(&call(json!({"path": "nested/note.txt"}))).await;
        assert_eq!(out.content, "hello");
    }

    #[tokio::test]
    async fn read_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = ReadFileTool(Workspace::new(dir.path())).execute(&call(json!({"path": "nope.md"}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn list_directory_marks_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("specs")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let out = ListDirectoryTool(Workspace::new(dir.path())).execute(&call(json!({"path": "."}))).await;
        assert_eq!(out.content, "a.txt\nspecs/");
    }

    #[tokio::test]
    async fn create_directory_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CreateDirectoryTool(Workspace::new(dir.path()));
        assert!(!tool.execute(&call(json!({"path": "tests/e2e"}))).await.is_error);
        assert!(!tool.execute(&call(json!({"path": "tests/e2e"}))).await.is_error);
        assert!(dir.path().join("tests/e2e").is_dir());
    }

    #[tokio::test]
    async fn file_search_matches_names_and_skips_git() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tests")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("tests/login.spec.ts"), "").unwrap();
        std::fs::write(dir.path().join(".git/x.spec.ts"), "").unwrap();
        std::fs::write(dir.path().join("tests/readme.md"), "").unwrap();

        let out = FileSearchTool(Workspace::new(dir.path()))
            .execute(&call(json!({"pattern": "**/*.spec.ts"})))
            .await;
        assert_eq!(out.content, "tests/login.spec.ts");
    }

    #[tokio::test]
    async fn text_search_reports_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plan.md"), "# Plan\n## Test Scenarios\n").unwrap();
        let out = TextSearchTool(Workspace::new(dir.path()))
            .execute(&call(json!({"query": "Scenarios"})))
            .await;
        assert_eq!(out.content, "plan.md:2: ## Test Scenarios");
    }
}
