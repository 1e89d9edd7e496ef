// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::session::{Interaction, PageSession};
use crate::policy::{Cardinality, ParamSpec, ParamType};
use crate::tool::{Tool, ToolCall, ToolOutput};

pub const PLANNER_SETUP: &str = "planner_setup_page";
pub const GENERATOR_SETUP: &str = "generator_setup_page";

const ANY_SETUP: &[&str] = &[PLANNER_SETUP, GENERATOR_SETUP];
const GENERATOR_ONLY: &[&str] = &[GENERATOR_SETUP];

fn outcome(call: &ToolCall, result: anyhow::Result<String>) -> ToolOutput {
    match result {
        Ok(text) => ToolOutput::ok(&call.id, text),
        Err(e) => ToolOutput::err(&call.id, format!("{e:#}")),
    }
}

const URL_ALIASES: &[&str] = &["href", "target", "page"];

/// `url` is optional once the session knows the page under test.
fn url_param(session: &PageSession) -> Vec<ParamSpec> {
    let spec = match session.start_url() {
        Some(_) => ParamSpec::optional(
            "url",
            ParamType::String,
            "Absolute URL (or path relative to the current page); defaults to the page under test",
        ),
        None => ParamSpec::required("url", ParamType::String, "Absolute URL (or path relative to the current page)"),
    };
    vec![spec.with_aliases(URL_ALIASES)]
}

fn url_arg<'a>(session: &'a PageSession, call: &'a ToolCall) -> &'a str {
    call.str_arg("url").or(session.start_url()).unwrap_or("")
}

fn element_param() -> ParamSpec {
    ParamSpec::required("element", ParamType::String, "agent-id from the latest snapshot (e.g. e3) or the element's visible name")
}

// ── setup ────────────────────────────────────────────────────────────────────

pub struct PlannerSetupPageTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for PlannerSetupPageTool {
    fn name(&self) -> &str { PLANNER_SETUP }

    fn description(&self) -> &str {
        "Open the page under test and start the exploration session. Call exactly once, first."
    }

    fn parameters(&self) -> Vec<ParamSpec> { url_param(&self.0) }

    fn cardinality(&self) -> Cardinality { Cardinality::Once }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let url = url_arg(&self.0, call);
        debug!(url = %url, "planner_setup_page tool");
        outcome(call, self.0.open(url).await)
    }
}

pub struct GeneratorSetupPageTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for GeneratorSetupPageTool {
    fn name(&self) -> &str { GENERATOR_SETUP }

    fn description(&self) -> &str {
        "Open the page under test and start recording actions for the test script. Call exactly once, first."
    }

    fn parameters(&self) -> Vec<ParamSpec> { url_param(&self.0) }

    fn cardinality(&self) -> Cardinality { Cardinality::Once }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let url = url_arg(&self.0, call);
        debug!(url = %url, "generator_setup_page tool");
        outcome(call, self.0.open(url).await)
    }
}

// ── navigation ───────────────────────────────────────────────────────────────

pub struct NavigateTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for NavigateTool {
    fn name(&self) -> &str { "browser_navigate" }
    fn description(&self) -> &str { "Load another URL in the current session." }
    fn parameters(&self) -> Vec<ParamSpec> { url_param(&self.0) }
    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        outcome(call, self.0.navigate(url_arg(&self.0, call)).await)
    }
}

pub struct NavigateBackTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for NavigateBackTool {
    fn name(&self) -> &str { "browser_navigate_back" }
    fn description(&self) -> &str { "Return to the previous page." }
    fn parameters(&self) -> Vec<ParamSpec> { Vec::new() }
    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        outcome(call, self.0.back().await)
    }
}

pub struct SnapshotTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for SnapshotTool {
    fn name(&self) -> &str { "browser_snapshot" }

    fn description(&self) -> &str {
        "Return the current page as visible text plus a numbered list of interactive elements \
         ([e1], [e2], …). Element tools address elements by these ids."
    }

    fn parameters(&self) -> Vec<ParamSpec> { Vec::new() }
    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        outcome(call, self.0.snapshot().await)
    }
}

// ── element interaction ──────────────────────────────────────────────────────

pub struct ClickTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for ClickTool {
    fn name(&self) -> &str { "browser_click" }
    fn description(&self) -> &str { "Click an element. Links are followed." }
    fn parameters(&self) -> Vec<ParamSpec> { vec![element_param()] }
    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let target = call.str_arg("element").unwrap_or("");
        outcome(call, self.0.interact(target, Interaction::Click).await)
    }
}

pub struct TypeTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for TypeTool {
    fn name(&self) -> &str { "browser_type" }
    fn description(&self) -> &str { "Fill a text field with the given text." }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![element_param(), ParamSpec::required("text", ParamType::String, "Text to enter")]
    }

    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let target = call.str_arg("element").unwrap_or("");
        let text = call.str_arg("text").unwrap_or("").to_string();
        outcome(call, self.0.interact(target, Interaction::Type(text)).await)
    }
}

pub struct PressKeyTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for PressKeyTool {
    fn name(&self) -> &str { "browser_press_key" }
    fn description(&self) -> &str { "Press a key (e.g. Enter, Tab) while an element is focused." }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![element_param(), ParamSpec::required("key", ParamType::String, "Key name, e.g. Enter")]
    }

    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let target = call.str_arg("element").unwrap_or("");
        let key = call.str_arg("key").unwrap_or("").to_string();
        outcome(call, self.0.interact(target, Interaction::PressKey(key)).await)
    }
}

pub struct HoverTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for HoverTool {
    fn name(&self) -> &str { "browser_hover" }
    fn description(&self) -> &str { "Hover the pointer over an element." }
    fn parameters(&self) -> Vec<ParamSpec> { vec![element_param()] }
    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let target = call.str_arg("element").unwrap_or("");
        outcome(call, self.0.interact(target, Interaction::Hover).await)
    }
}

pub struct SelectOptionTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for SelectOptionTool {
    fn name(&self) -> &str { "browser_select_option" }
    fn description(&self) -> &str { "Choose an option of a select element by its label." }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![element_param(), ParamSpec::required("value", ParamType::String, "Option label to select")]
    }

    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let target = call.str_arg("element").unwrap_or("");
        let value = call.str_arg("value").unwrap_or("").to_string();
        outcome(call, self.0.interact(target, Interaction::Select(value)).await)
    }
}

pub struct FileUploadTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for FileUploadTool {
    fn name(&self) -> &str { "browser_file_upload" }
    fn description(&self) -> &str { "Attach a file to a file input. The path is used as written in the test." }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![element_param(), ParamSpec::required("path", ParamType::String, "Path of the file to upload")]
    }

    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let target = call.str_arg("element").unwrap_or("");
        let path = call.str_arg("path").unwrap_or("").to_string();
        outcome(call, self.0.interact(target, Interaction::Upload(path)).await)
    }
}

pub struct DragTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for DragTool {
    fn name(&self) -> &str { "browser_drag" }
    fn description(&self) -> &str { "Drag one element onto another." }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("source", ParamType::String, "Element to drag (agent-id or visible name)"),
            ParamSpec::required("target", ParamType::String, "Element to drop onto (agent-id or visible name)"),
        ]
    }

    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let source = call.str_arg("source").unwrap_or("");
        let target = call.str_arg("target").unwrap_or("");
        outcome(call, self.0.drag(source, target).await)
    }
}

pub struct HandleDialogTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for HandleDialogTool {
    fn name(&self) -> &str { "browser_handle_dialog" }

    fn description(&self) -> &str {
        "Accept or dismiss the dialog opened by the last click. For prompts, promptText is entered before accepting."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("accept", ParamType::Boolean, "true to accept, false to dismiss"),
            ParamSpec::optional("promptText", ParamType::String, "Text for a prompt dialog"),
        ]
    }

    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let accept = call.args.get("accept").and_then(|v| v.as_bool()).unwrap_or(true);
        outcome(call, self.0.handle_dialog(accept, call.str_arg("promptText")).await)
    }
}

// ── assertions and logs ──────────────────────────────────────────────────────

pub struct VerifyTextVisibleTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for VerifyTextVisibleTool {
    fn name(&self) -> &str { "browser_verify_text_visible" }
    fn description(&self) -> &str { "Assert that the given text is visible on the current page." }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("text", ParamType::String, "Exact text expected on the page")]
    }

    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        outcome(call, self.0.verify_text(call.str_arg("text").unwrap_or("")).await)
    }
}

pub struct VerifyElementVisibleTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for VerifyElementVisibleTool {
    fn name(&self) -> &str { "browser_verify_element_visible" }
    fn description(&self) -> &str { "Assert that an element is present on the current page." }
    fn parameters(&self) -> Vec<ParamSpec> { vec![element_param()] }
    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        outcome(call, self.0.verify_element(call.str_arg("element").unwrap_or("")).await)
    }
}

pub struct VerifyValueTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for VerifyValueTool {
    fn name(&self) -> &str { "browser_verify_value" }
    fn description(&self) -> &str { "Assert the current value of a form field." }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![element_param(), ParamSpec::required("value", ParamType::String, "Expected field value")]
    }

    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let target = call.str_arg("element").unwrap_or("");
        outcome(call, self.0.verify_value(target, call.str_arg("value").unwrap_or("")).await)
    }
}

pub struct VerifyListVisibleTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for VerifyListVisibleTool {
    fn name(&self) -> &str { "browser_verify_list_visible" }
    fn description(&self) -> &str { "Assert that every listed text is visible on the current page." }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("items", ParamType::Array, "Texts of the expected list items")]
    }

    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let items: Vec<String> = call
            .args
            .get("items")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())).collect())
            .unwrap_or_default();
        outcome(call, self.0.verify_list(&items).await)
    }
}

pub struct WaitForTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for WaitForTool {
    fn name(&self) -> &str { "browser_wait_for" }
    fn description(&self) -> &str { "Wait until a text is visible, or hidden with state \"hidden\"." }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("text", ParamType::String, "Text to wait for"),
            ParamSpec::optional("state", ParamType::String, "\"visible\" (default) or \"hidden\""),
        ]
    }

    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let gone = match call.str_arg("state").unwrap_or("visible") {
            "visible" => false,
            "hidden" => true,
            other => return ToolOutput::err(&call.id, format!("state must be \"visible\" or \"hidden\", got \"{other}\"")),
        };
        outcome(call, self.0.wait_for(call.str_arg("text").unwrap_or(""), gone).await)
    }
}

pub struct ConsoleMessagesTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for ConsoleMessagesTool {
    fn name(&self) -> &str { "browser_console_messages" }
    fn description(&self) -> &str { "List console messages logged by the page." }
    fn parameters(&self) -> Vec<ParamSpec> { Vec::new() }
    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self.0.current_url().await {
            Some(url) => ToolOutput::ok(
                &call.id,
                format!("(no console messages: {url} was loaded without running scripts)"),
            ),
            None => ToolOutput::err(&call.id, "no page is open; call a setup tool first"),
        }
    }
}

pub struct NetworkRequestsTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for NetworkRequestsTool {
    fn name(&self) -> &str { "browser_network_requests" }
    fn description(&self) -> &str { "List the requests made in this session with their status codes." }
    fn parameters(&self) -> Vec<ParamSpec> { Vec::new() }
    fn requires(&self) -> &[&'static str] { ANY_SETUP }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        ToolOutput::ok(&call.id, self.0.network_log().await)
    }
}

pub struct GeneratorReadLogTool(pub Arc<PageSession>);

#[async_trait]
impl Tool for GeneratorReadLogTool {
    fn name(&self) -> &str { "generator_read_log" }

    fn description(&self) -> &str {
        "Return every recorded action with the test code that reproduces it, in order. \
         Read this before writing the final test."
    }

    fn parameters(&self) -> Vec<ParamSpec> { Vec::new() }
    fn requires(&self) -> &[&'static str] { GENERATOR_ONLY }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let actions = self.0.actions().await;
        if actions.is_empty() {
            return ToolOutput::err(&call.id, "no actions have been logged yet; perform the scenario steps first");
        }
        let lines: Vec<String> = actions
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{}. Action: {} | Code: {}", i + 1, a.action, a.code))
            .collect();
        ToolOutput::ok(&call.id, lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::*;
    use crate::builtin::page::fetch::StaticFetcher;
    use scout_config::PageConfig;

    fn call(name: &str, args: Value) -> ToolCall {
        let map: Map<String, Value> = args.as_object().cloned().unwrap_or_default();
        ToolCall::new("c1", name, map)
    }

    fn session() -> Arc<PageSession> {
        let fetcher = StaticFetcher::new().with_page(
            "https://app.test/login",
            r#"<title>Login</title><input name="user" placeholder="Username"><button>Log in</button>"#,
        );
        Arc::new(PageSession::new(Arc::new(fetcher), PageConfig::default()))
    }

    #[test]
    fn setup_tools_are_one_shot_and_others_require_setup() {
        let s = session();
        assert_eq!(PlannerSetupPageTool(s.clone()).cardinality(), Cardinality::Once);
        assert_eq!(GeneratorSetupPageTool(s.clone()).cardinality(), Cardinality::Once);
        assert_eq!(SnapshotTool(s.clone()).requires(), ANY_SETUP);
        assert_eq!(GeneratorReadLogTool(s).requires(), &[GENERATOR_SETUP]);
    }

    #[tokio::test]
    async fn setup_with_bad_url_is_tool_error() {
        let out = PlannerSetupPageTool(session()).execute(&call(PLANNER_SETUP, json!({"url": "not a url"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("invalid URL"));
    }

    #[tokio::test]
    async fn generator_flow_produces_readable_log() {
        let s = session();
        GeneratorSetupPageTool(s.clone())
            .execute(&call(GENERATOR_SETUP, json!({"url": "https://app.test/login"})))
            .await;
        SnapshotTool(s.clone()).execute(&call("browser_snapshot", json!({}))).await;
        let typed = TypeTool(s.clone())
            .execute(&call("browser_type", json!({"element": "e1", "text": "alice"})))
            .await;
        assert!(!typed.is_error, "{}", typed.content);
        ClickTool(s.clone()).execute(&call("browser_click", json!({"element": "Log in"}))).await;

        let log = GeneratorReadLogTool(s).execute(&call("generator_read_log", json!({}))).await;
        let lines: Vec<&str> = log.content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2. Action: Type into textbox 'e1' | Code: await page.getByPlaceholder('Username').fill('alice');");
        assert!(lines[2].contains("getByRole('button', { name: 'Log in' }).click()"));
    }

    #[test]
    fn url_is_optional_only_with_a_start_url() {
        let bare = PlannerSetupPageTool(session()).parameters();
        assert!(bare[0].required);
        assert_eq!(bare[0].aliases, URL_ALIASES);

        let s = Arc::new(
            PageSession::new(Arc::new(StaticFetcher::new()), PageConfig::default()).with_start_url("https://app.test/"),
        );
        assert!(!NavigateTool(s).parameters()[0].required);
    }

    #[tokio::test]
    async fn setup_without_url_opens_the_start_url() {
        let fetcher = StaticFetcher::new()
            .with_page("https://app.test/login", "<title>Login</title>")
            .with_page("https://app.test/help", "<title>Help</title>");
        let s = Arc::new(
            PageSession::new(Arc::new(fetcher), PageConfig::default()).with_start_url("https://app.test/login"),
        );

        let args = crate::validate_args(&GeneratorSetupPageTool(s.clone()).parameters(), json!({})).unwrap();
        let out = GeneratorSetupPageTool(s.clone()).execute(&ToolCall::new("c1", GENERATOR_SETUP, args)).await;
        assert!(!out.is_error, "{}", out.content);

        let args = crate::validate_args(&NavigateTool(s.clone()).parameters(), json!({"href": "/help"})).unwrap();
        NavigateTool(s.clone()).execute(&ToolCall::new("c2", "browser_navigate", args)).await;
        assert_eq!(s.current_url().await.as_deref(), Some("https://app.test/help"));

        NavigateTool(s.clone()).execute(&call("browser_navigate", json!({}))).await;
        assert_eq!(s.current_url().await.as_deref(), Some("https://app.test/login"));
    }

    #[tokio::test]
    async fn new_tools_require_setup_and_log_actions() {
        let fetcher = StaticFetcher::new().with_page(
            "https://app.test/form",
            r#"<title>Form</title><select aria-label="Plan"><option>Free</option><option>Pro</option></select>
               <button onclick="alert('Saved')">Save</button><p>Terms apply</p>"#,
        );
        let s = Arc::new(PageSession::new(Arc::new(fetcher), PageConfig::default()));
        assert_eq!(SelectOptionTool(s.clone()).requires(), ANY_SETUP);
        assert_eq!(HandleDialogTool(s.clone()).requires(), ANY_SETUP);
        assert_eq!(ConsoleMessagesTool(s.clone()).requires(), ANY_SETUP);

        GeneratorSetupPageTool(s.clone())
            .execute(&call(GENERATOR_SETUP, json!({"url": "https://app.test/form"})))
            .await;
        SnapshotTool(s.clone()).execute(&call("browser_snapshot", json!({}))).await;
        let out = SelectOptionTool(s.clone())
            .execute(&call("browser_select_option", json!({"element": "Plan", "value": "Pro"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        ClickTool(s.clone()).execute(&call("browser_click", json!({"element": "Save"}))).await;
        let out = HandleDialogTool(s.clone()).execute(&call("browser_handle_dialog", json!({"accept": true}))).await;
        assert!(!out.is_error, "{}", out.content);
        let out = VerifyListVisibleTool(s.clone())
            .execute(&call("browser_verify_list_visible", json!({"items": ["Terms apply"]})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        let out = WaitForTool(s.clone())
            .execute(&call("browser_wait_for", json!({"text": "Terms apply", "state": "gone"})))
            .await;
        assert!(out.is_error);

        let console = ConsoleMessagesTool(s.clone()).execute(&call("browser_console_messages", json!({}))).await;
        assert!(console.content.contains("without running scripts"));

        let log = GeneratorReadLogTool(s).execute(&call("generator_read_log", json!({}))).await;
        let lines: Vec<&str> = log.content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].ends_with("await page.getByLabel('Plan').selectOption('Pro');"));
        assert!(lines[2].ends_with("page.once('dialog', dialog => dialog.accept());"));
        assert!(lines[3].contains("getByRole('button', { name: 'Save' }).click()"));
    }

    #[tokio::test]
    async fn empty_log_is_an_error() {
        let out = GeneratorReadLogTool(session()).execute(&call("generator_read_log", json!({}))).await;
        assert!(out.is_error);
    }
}
