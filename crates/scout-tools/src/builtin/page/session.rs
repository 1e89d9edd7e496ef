// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use scout_config::PageConfig;

use super::dom::{js_escape, PageElement, SimplifiedDom};
use super::fetch::PageFetcher;

/// One user-visible step plus the test code that reproduces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    pub action: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEntry {
    pub method: String,
    pub url: String,
    pub status: u16,
}

/// Element interaction requested by the model.
#[derive(Debug, Clone)]
pub enum Interaction {
    Click,
    Type(String),
    PressKey(String),
    Hover,
    Select(String),
    Upload(String),
}

/// Dialog opened by a recorded click and not yet answered.
#[derive(Debug, Clone)]
struct PendingDialog {
    message: String,
    /// Position of the click in the action log; the handler goes before it.
    action_index: usize,
}

#[derive(Default)]
struct PageState {
    url: Option<Url>,
    dom: Option<SimplifiedDom>,
    history: Vec<Url>,
    /// A snapshot of the current document has been shown to the model.
    snapshot_taken: bool,
    snapshots: u32,
    actions: Vec<ActionEntry>,
    network: Vec<NetworkEntry>,
    /// Field values entered on the current document, by agent-id.
    values: HashMap<String, String>,
    dialog: Option<PendingDialog>,
}

/// Browsing state for one run.  Every page tool of the run holds an `Arc`
/// to the same session.
pub struct PageSession {
    fetcher: Arc<dyn PageFetcher>,
    cfg: PageConfig,
    start_url: Option<String>,
    state: Mutex<PageState>,
}

impl PageSession {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cfg: PageConfig) -> Self {
        Self { fetcher, cfg, start_url: None, state: Mutex::new(PageState::default()) }
    }

    /// The page under test, used when a setup or navigate call leaves out its URL.
    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_url = Some(url.into());
        self
    }

    pub fn start_url(&self) -> Option<&str> {
        self.start_url.as_deref()
    }

    /// Start a fresh session at `url`, discarding any previous history and logs.
    pub async fn open(&self, url: &str) -> anyhow::Result<String> {
        let target = Url::parse(url.trim()).with_context(|| format!("invalid URL '{url}'"))?;
        let mut st = self.state.lock().await;
        *st = PageState::default();
        let summary = self.load(&mut st, target.clone()).await?;
        record(&mut st, format!("Open {target}"), format!("await page.goto('{}');", js_escape(target.as_str())));
        Ok(summary)
    }

    pub async fn navigate(&self, url: &str) -> anyhow::Result<String> {
        let mut st = self.state.lock().await;
        let current = st.url.clone().ok_or_else(no_page)?;
        let target = current.join(url.trim()).with_context(|| format!("invalid URL '{url}'"))?;
        let summary = self.load(&mut st, target.clone()).await?;
        st.history.push(current);
        record(&mut st, format!("Navigate to {target}"), format!("await page.goto('{}');", js_escape(target.as_str())));
        Ok(summary)
    }

    pub async fn back(&self) -> anyhow::Result<String> {
        let mut st = self.state.lock().await;
        st.url.as_ref().ok_or_else(no_page)?;
        let previous = st.history.pop().ok_or_else(|| anyhow!("no previous page in history"))?;
        let summary = self.load(&mut st, previous).await?;
        record(&mut st, "Go back".into(), "await page.goBack();".into());
        Ok(summary)
    }

    pub async fn snapshot(&self) -> anyhow::Result<String> {
        let mut st = self.state.lock().await;
        let rendered = st.dom.as_ref().ok_or_else(no_page)?.render(self.cfg.snapshot_text_chars);
        st.snapshot_taken = true;
        st.snapshots += 1;
        Ok(rendered)
    }

    pub async fn interact(&self, target: &str, interaction: Interaction) -> anyhow::Result<String> {
        let mut st = self.state.lock().await;
        let element = element_in(&st, target, true)?;
        let label = label(&element);
        let loc = element.locator();
        let (verb, code) = match &interaction {
            Interaction::Click => ("Click", format!("await {loc}.click();")),
            Interaction::Type(text) => ("Type into", format!("await {loc}.fill('{}');", js_escape(text))),
            Interaction::PressKey(key) => ("Press key on", format!("await {loc}.press('{}');", js_escape(key))),
            Interaction::Hover => ("Hover", format!("await {loc}.hover();")),
            Interaction::Select(choice) => {
                if element.tag != "select" {
                    bail!("{label} is not a select element");
                }
                if !element.options.is_empty() && !element.options.iter().any(|o| o == choice) {
                    bail!("{label} has no option '{choice}'; options are: {}", element.options.join(", "));
                }
                ("Select option in", format!("await {loc}.selectOption('{}');", js_escape(choice)))
            }
            Interaction::Upload(path) => {
                if element.tag != "input" || element.input_type.as_deref() != Some("file") {
                    bail!("{label} is not a file input");
                }
                ("Upload file to", format!("await {loc}.setInputFiles('{}');", js_escape(path)))
            }
        };
        debug!(element = %element.agent_id, action = verb, "page interaction");
        record(&mut st, format!("{verb} {label}"), code.clone());
        match &interaction {
            Interaction::Type(v) | Interaction::Select(v) => {
                st.values.insert(element.agent_id.clone(), v.clone());
            }
            Interaction::Click => {
                if let Some(message) = element.dialog.clone() {
                    let action_index = st.actions.len() - 1;
                    st.dialog = Some(PendingDialog { message: message.clone(), action_index });
                    return Ok(format!(
                        "Recorded: {verb} {label}.\nCode: {code}\nA dialog opened: '{message}'. \
                         Answer it with browser_handle_dialog."
                    ));
                }
            }
            _ => {}
        }

        // Following a link is the one interaction a plain document load can reproduce.
        if let (Interaction::Click, "a", Some(href)) = (&interaction, element.tag.as_str(), &element.href) {
            if !href.starts_with('#') && !href.starts_with("javascript:") {
                let current = st.url.clone().ok_or_else(no_page)?;
                let next = current.join(href).with_context(|| format!("invalid link target '{href}'"))?;
                let summary = self.load(&mut st, next).await?;
                st.history.push(current);
                return Ok(format!("Clicked {label}.\n{summary}\nCode: {code}"));
            }
        }

        Ok(format!(
            "Recorded: {verb} {label}.\nCode: {code}\nNote: pages are loaded without running scripts, \
             so the document did not change."
        ))
    }

    pub async fn verify_text(&self, text: &str) -> anyhow::Result<String> {
        let mut st = self.state.lock().await;
        let dom = st.dom.as_ref().ok_or_else(no_page)?;
        if !dom.contains_text(text) {
            bail!("text '{}' is not visible on {}", text.trim(), dom.url);
        }
        let code = format!("await expect(page.getByText('{}')).toBeVisible();", js_escape(text.trim()));
        record(&mut st, format!("Verify text '{}' is visible", text.trim()), code.clone());
        Ok(format!("Text '{}' is visible.\nCode: {code}", text.trim()))
    }

    pub async fn drag(&self, source: &str, target: &str) -> anyhow::Result<String> {
        let mut st = self.state.lock().await;
        let from = element_in(&st, source, true)?;
        let to = element_in(&st, target, true)?;
        let code = format!("await {}.dragTo({});", from.locator(), to.locator());
        record(&mut st, format!("Drag {} to {}", label(&from), label(&to)), code.clone());
        Ok(format!("Recorded: Drag {} to {}.\nCode: {code}", label(&from), label(&to)))
    }

    /// Answer the dialog opened by the last dialog-triggering click.  The
    /// handler is logged before that click, where a test has to register it.
    pub async fn handle_dialog(&self, accept: bool, prompt_text: Option<&str>) -> anyhow::Result<String> {
        let mut st = self.state.lock().await;
        let pending = st.dialog.take().ok_or_else(|| anyhow!("no dialog is open"))?;
        let (verb, answer) = match (accept, prompt_text) {
            (true, Some(text)) => ("Accept", format!("dialog.accept('{}')", js_escape(text))),
            (true, None) => ("Accept", "dialog.accept()".to_string()),
            (false, _) => ("Dismiss", "dialog.dismiss()".to_string()),
        };
        let code = format!("page.once('dialog', dialog => {answer});");
        let index = pending.action_index.min(st.actions.len());
        st.actions.insert(
            index,
            ActionEntry { action: format!("{verb} dialog '{}'", pending.message), code: code.clone() },
        );
        Ok(format!("{verb}ed dialog '{}'.\nCode: {code}", pending.message))
    }

    pub async fn verify_element(&self, target: &str) -> anyhow::Result<String> {
        let mut st = self.state.lock().await;
        let element = element_in(&st, target, false)?;
        let code = format!("await expect({}).toBeVisible();", element.locator());
        record(&mut st, format!("Verify {} is visible", label(&element)), code.clone());
        Ok(format!("{} is visible.\nCode: {code}", label(&element)))
    }

    /// Compare against what was typed or selected in this session, falling
    /// back to the field's initial `value` attribute.
    pub async fn verify_value(&self, target: &str, expected: &str) -> anyhow::Result<String> {
        let mut st = self.state.lock().await;
        let element = element_in(&st, target, false)?;
        let actual = st
            .values
            .get(&element.agent_id)
            .cloned()
            .or_else(|| element.value.clone())
            .unwrap_or_default();
        if actual != expected {
            bail!("{} has value '{actual}', expected '{expected}'", label(&element));
        }
        let code = format!("await expect({}).toHaveValue('{}');", element.locator(), js_escape(expected));
        record(&mut st, format!("Verify {} has value '{expected}'", label(&element)), code.clone());
        Ok(format!("{} has value '{expected}'.\nCode: {code}", label(&element)))
    }

    /// Every item must be visible; nothing is recorded if one is missing.
    pub async fn verify_list(&self, items: &[String]) -> anyhow::Result<String> {
        let mut st = self.state.lock().await;
        let dom = st.dom.as_ref().ok_or_else(no_page)?;
        if items.is_empty() {
            bail!("no list items given");
        }
        let missing: Vec<&str> = items.iter().map(|i| i.trim()).filter(|i| !dom.contains_text(i)).collect();
        if !missing.is_empty() {
            bail!("not visible on {}: {}", dom.url, missing.join(", "));
        }
        let mut codes = Vec::new();
        for item in items.iter().map(|i| i.trim()) {
            let code = format!("await expect(page.getByText('{}')).toBeVisible();", js_escape(item));
            record(&mut st, format!("Verify list item '{item}' is visible"), code.clone());
            codes.push(code);
        }
        Ok(format!("All {} items are visible.\nCode:\n{}", items.len(), codes.join("\n")))
    }

    /// Check that `text` is present (or absent when `gone`).  The document
    /// does not change by itself, so this never actually waits.
    pub async fn wait_for(&self, text: &str, gone: bool) -> anyhow::Result<String> {
        let mut st = self.state.lock().await;
        let dom = st.dom.as_ref().ok_or_else(no_page)?;
        let text = text.trim();
        let present = dom.contains_text(text);
        if present == gone {
            let state = if gone { "still visible" } else { "not visible" };
            bail!("text '{text}' is {state} on {}", dom.url);
        }
        let (state, matcher) = if gone { ("hidden", "toBeHidden") } else { ("visible", "toBeVisible") };
        let code = format!("await expect(page.getByText('{}')).{matcher}();", js_escape(text));
        record(&mut st, format!("Wait for text '{text}' to be {state}"), code.clone());
        Ok(format!("Text '{text}' is {state}.\nCode: {code}"))
    }

    pub async fn network_log(&self) -> String {
        let st = self.state.lock().await;
        if st.network.is_empty() {
            return "(no requests recorded)".into();
        }
        st.network
            .iter()
            .map(|n| format!("{} {} => {}", n.method, n.url, n.status))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn actions(&self) -> Vec<ActionEntry> {
        self.state.lock().await.actions.clone()
    }

    pub async fn snapshot_count(&self) -> u32 {
        self.state.lock().await.snapshots
    }

    pub async fn current_url(&self) -> Option<String> {
        self.state.lock().await.url.as_ref().map(|u| u.to_string())
    }

    async fn load(&self, st: &mut PageState, url: Url) -> anyhow::Result<String> {
        let page = self.fetcher.fetch(&url).await?;
        st.network.push(NetworkEntry { method: "GET".into(), url: url.to_string(), status: page.status });
        let dom = SimplifiedDom::parse(page.url.as_str(), &page.body, self.cfg.max_elements);
        let summary = format!(
            "Loaded {} (status {}, title '{}', {} interactive elements). Take a browser_snapshot to inspect it.",
            page.url,
            page.status,
            dom.title,
            dom.elements.len()
        );
        st.url = Some(page.url);
        st.dom = Some(dom);
        st.snapshot_taken = false;
        st.values.clear();
        st.dialog = None;
        Ok(summary)
    }
}

/// Look up an element of the current document.  Interactions need a
/// snapshot first since agent-ids come from it.
fn element_in(st: &PageState, target: &str, needs_snapshot: bool) -> anyhow::Result<PageElement> {
    let dom = st.dom.as_ref().ok_or_else(no_page)?;
    if needs_snapshot && !st.snapshot_taken {
        bail!("take a browser_snapshot of this page first; elements are addressed by its agent-ids");
    }
    dom.find(target)
        .cloned()
        .ok_or_else(|| anyhow!("no element '{target}' on {}; check the agent-ids in the latest snapshot", dom.url))
}

fn label(element: &PageElement) -> String {
    format!(
        "{} '{}'",
        element.effective_role().unwrap_or(element.tag.as_str()),
        element.accessible_name().unwrap_or(element.agent_id.as_str())
    )
}

fn record(st: &mut PageState, action: String, code: String) {
    st.actions.push(ActionEntry { action, code });
}

fn no_page() -> anyhow::Error {
    anyhow!("no page is open; call a setup tool first")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::page::fetch::StaticFetcher;

    fn session() -> PageSession {
        let fetcher = StaticFetcher::new()
            .with_page(
                "https://shop.test/",
                r#"<title>Home</title><a href="/cart">Cart</a><button>Subscribe</button><p>Best prices</p>"#,
            )
            .with_page("https://shop.test/cart", "<title>Cart</title><p>Your cart is empty</p>");
        PageSession::new(Arc::new(fetcher), PageConfig::default())
    }

    #[tokio::test]
    async fn open_records_goto_and_request() {
        let s = session();
        let msg = s.open("https://shop.test/").await.unwrap();
        assert!(msg.contains("status 200"));
        let actions = s.actions().await;
        assert_eq!(actions[0].code, "await page.goto('https://shop.test/');");
        assert!(s.network_log().await.contains("GET https://shop.test/ => 200"));
    }

    #[tokio::test]
    async fn tools_before_open_fail() {
        let s = session();
        assert!(s.snapshot().await.is_err());
        assert!(s.navigate("/cart").await.is_err());
    }

    #[tokio::test]
    async fn interaction_needs_snapshot() {
        let s = session();
        s.open("https://shop.test/").await.unwrap();
        let err = s.interact("e2", Interaction::Click).await.unwrap_err();
        assert!(err.to_string().contains("snapshot"));
    }

    #[tokio::test]
    async fn clicking_link_follows_it_and_back_returns() {
        let s = session();
        s.open("https://shop.test/").await.unwrap();
        s.snapshot().await.unwrap();
        let msg = s.interact("Cart", Interaction::Click).await.unwrap();
        assert!(msg.contains("title 'Cart'"));
        assert_eq!(s.current_url().await.as_deref(), Some("https://shop.test/cart"));

        s.back().await.unwrap();
        assert_eq!(s.current_url().await.as_deref(), Some("https://shop.test/"));
        let codes: Vec<String> = s.actions().await.into_iter().map(|a| a.code).collect();
        assert_eq!(codes[1], "await page.getByRole('link', { name: 'Cart' }).click();");
        assert_eq!(codes[2], "await page.goBack();");
    }

    #[tokio::test]
    async fn button_click_is_recorded_only() {
        let s = session();
        s.open("https://shop.test/").await.unwrap();
        s.snapshot().await.unwrap();
        let msg = s.interact("e2", Interaction::Click).await.unwrap();
        assert!(msg.starts_with("Recorded: Click button 'Subscribe'"));
        assert_eq!(s.current_url().await.as_deref(), Some("https://shop.test/"));
    }

    #[tokio::test]
    async fn verify_text_records_assertion() {
        let s = session();
        s.open("https://shop.test/").await.unwrap();
        assert!(s.verify_text("Best prices").await.is_ok());
        assert!(s.verify_text("Sold out").await.is_err());
        let last = s.actions().await.pop().unwrap();
        assert_eq!(last.code, "await expect(page.getByText('Best prices')).toBeVisible();");
    }

    fn form_session() -> PageSession {
        let fetcher = StaticFetcher::new().with_page(
            "https://shop.test/checkout",
            r#"<title>Checkout</title><h2>Basket</h2><ul><li>Blue mug</li><li>Red mug</li></ul>
               <input name="coupon" placeholder="Coupon" value="WELCOME">
               <select aria-label="Shipping"><option>Standard</option><option>Express</option></select>
               <input type="file" aria-label="Receipt">
               <div role="listitem">Blue mug</div><div role="region" aria-label="Basket">Drop here</div>
               <button onclick="return confirm('Empty the basket?')">Clear</button>"#,
        );
        PageSession::new(Arc::new(fetcher), PageConfig::default())
    }

    async fn opened_form() -> PageSession {
        let s = form_session();
        s.open("https://shop.test/checkout").await.unwrap();
        s.snapshot().await.unwrap();
        s
    }

    fn codes(actions: Vec<ActionEntry>) -> Vec<String> {
        actions.into_iter().map(|a| a.code).collect()
    }

    #[tokio::test]
    async fn select_checks_options_and_tracks_value() {
        let s = opened_form().await;
        let err = s.interact("Shipping", Interaction::Select("Overnight".into())).await.unwrap_err();
        assert!(err.to_string().contains("Standard, Express"));
        assert!(s.interact("e1", Interaction::Select("x".into())).await.is_err());

        s.interact("Shipping", Interaction::Select("Express".into())).await.unwrap();
        s.verify_value("Shipping", "Express").await.unwrap();
        assert_eq!(
            codes(s.actions().await)[1..],
            [
                "await page.getByLabel('Shipping').selectOption('Express');".to_string(),
                "await expect(page.getByLabel('Shipping')).toHaveValue('Express');".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn verify_value_uses_typed_text_then_initial_value() {
        let s = opened_form().await;
        s.verify_value("e1", "WELCOME").await.unwrap();
        s.interact("e1", Interaction::Type("SPRING".into())).await.unwrap();
        let err = s.verify_value("e1", "WELCOME").await.unwrap_err();
        assert!(err.to_string().contains("has value 'SPRING'"));
    }

    #[tokio::test]
    async fn upload_needs_file_input() {
        let s = opened_form().await;
        assert!(s.interact("e1", Interaction::Upload("r.pdf".into())).await.is_err());
        let msg = s.interact("Receipt", Interaction::Upload("fixtures/r.pdf".into())).await.unwrap();
        assert!(msg.contains("await page.getByLabel('Receipt').setInputFiles('fixtures/r.pdf');"));
    }

    #[tokio::test]
    async fn drag_records_both_locators() {
        let s = opened_form().await;
        let msg = s.drag("Blue mug", "Basket").await.unwrap();
        assert!(msg.contains(
            "await page.getByRole('listitem', { name: 'Blue mug' }).dragTo(page.getByRole('region', { name: 'Basket' }));"
        ));
        assert!(s.drag("Blue mug", "Trash").await.is_err());
    }

    #[tokio::test]
    async fn dialog_handler_is_logged_before_the_click() {
        let s = opened_form().await;
        assert!(s.handle_dialog(true, None).await.is_err());

        let msg = s.interact("Clear", Interaction::Click).await.unwrap();
        assert!(msg.contains("A dialog opened: 'Empty the basket?'"));
        s.handle_dialog(false, None).await.unwrap();

        let actions = s.actions().await;
        assert_eq!(actions[1].action, "Dismiss dialog 'Empty the basket?'");
        assert_eq!(actions[1].code, "page.once('dialog', dialog => dialog.dismiss());");
        assert_eq!(actions[2].code, "await page.getByRole('button', { name: 'Clear' }).click();");
        assert!(s.handle_dialog(true, None).await.is_err());
    }

    #[tokio::test]
    async fn list_and_wait_checks_record_nothing_on_failure() {
        let s = opened_form().await;
        let err = s.verify_list(&["Blue mug".into(), "Green mug".into()]).await.unwrap_err();
        assert!(err.to_string().contains("Green mug"));
        assert_eq!(s.actions().await.len(), 1);

        s.verify_list(&["Blue mug".into(), "Red mug".into()]).await.unwrap();
        s.wait_for("Basket", false).await.unwrap();
        s.wait_for("Sold out", true).await.unwrap();
        assert!(s.wait_for("Basket", true).await.is_err());
        let codes = codes(s.actions().await);
        assert_eq!(codes.len(), 5);
        assert_eq!(codes[3], "await expect(page.getByText('Basket')).toBeVisible();");
        assert_eq!(codes[4], "await expect(page.getByText('Sold out')).toBeHidden();");
    }

    #[tokio::test]
    async fn verify_element_does_not_need_snapshot() {
        let s = form_session();
        s.open("https://shop.test/checkout").await.unwrap();
        let msg = s.verify_element("Clear").await.unwrap();
        assert!(msg.contains("await expect(page.getByRole('button', { name: 'Clear' })).toBeVisible();"));
        assert!(s.verify_element("Pay now").await.is_err());
    }

    #[test]
    fn start_url_is_optional() {
        assert!(session().start_url().is_none());
        assert_eq!(session().with_start_url("https://shop.test/").start_url(), Some("https://shop.test/"));
    }

    #[tokio::test]
    async fn reopening_resets_logs() {
        let s = session();
        s.open("https://shop.test/").await.unwrap();
        s.navigate("/cart").await.unwrap();
        s.open("https://shop.test/cart").await.unwrap();
        assert_eq!(s.actions().await.len(), 1);
        assert_eq!(s.snapshot_count().await, 0);
    }
}
