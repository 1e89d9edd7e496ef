// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

/// Loop scenarios for [`AgentLoop`].
///
/// Uses ScriptedMockClient and in-memory tools with call counters so every
/// scenario is deterministic and needs no network access.
#[cfg(test)]
mod agent_tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use scout_config::AgentConfig;
    use scout_model::{ModelError, Role, ScriptedMockClient};
    use scout_tools::{Cardinality, ParamSpec, ParamType, Tool, ToolCall, ToolOutput, ToolRegistry};

    use crate::{AgentEvent, AgentLoop, ErrorKind, OutputContract, RunError};

    // ── Helpers ───────────────────────────────────────────────────────────────

    const PLAN_ANSWER: &str = "<final_answer>\n<<<BEGIN_PLAN_MD>>>\n# Shop Test Plan\n\n\
        ## Application Overview\n\nA small shop.\n\n## Test Scenarios\n\n### 1. Open the home page\n\
        <<<END_PLAN_MD>>>\n</final_answer>";

    fn call(tool: &str, input: &str) -> String {
        format!("<tool_call>{{\"tool\": \"{tool}\", \"input\": {input}}}</tool_call>")
    }

    fn setup_call() -> String {
        call("setup", r#"{"url": "https://shop.test/"}"#)
    }

    fn look_call() -> String {
        call("look", "{}")
    }

    /// One-shot setup tool.
    #[derive(Clone, Default)]
    struct SetupTool {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Tool for SetupTool {
        fn name(&self) -> &str { "setup" }
        fn description(&self) -> &str { "open the page" }
        fn parameters(&self) -> Vec<ParamSpec> {
            vec![ParamSpec::required("url", ParamType::String, "page url")]
        }
        fn cardinality(&self) -> Cardinality { Cardinality::Once }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ToolOutput::ok(&call.id, format!("opened {}", call.str_arg("url").unwrap_or("")))
        }
    }

    /// Needs `setup` first; optionally cancels the run on its n-th call.
    #[derive(Clone, Default)]
    struct LookTool {
        calls: Arc<AtomicU32>,
        cancel_on: Option<(u32, CancellationToken)>,
        body: Option<String>,
    }

    #[async_trait]
    impl Tool for LookTool {
        fn name(&self) -> &str { "look" }
        fn description(&self) -> &str { "describe the page" }
        fn parameters(&self) -> Vec<ParamSpec> { Vec::new() }
        fn requires(&self) -> &[&'static str] { &["setup"] }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((at, token)) = &self.cancel_on {
                if n == *at {
                    token.cancel();
                }
            }
            ToolOutput::ok(&call.id, self.body.clone().unwrap_or_else(|| "a heading and a button".into()))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str { "broken" }
        fn description(&self) -> &str { "always fails" }
        fn parameters(&self) -> Vec<ParamSpec> { Vec::new() }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::err(&call.id, "element not found")
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str { "slow" }
        fn description(&self) -> &str { "never finishes in time" }
        fn parameters(&self) -> Vec<ParamSpec> { Vec::new() }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            ToolOutput::ok(&call.id, "late")
        }
    }

    struct Fixture {
        setup: SetupTool,
        look: LookTool,
    }

    impl Fixture {
        fn new() -> Self {
            Self { setup: SetupTool::default(), look: LookTool::default() }
        }

        fn registry(&self) -> ToolRegistry {
            let mut reg = ToolRegistry::new();
            reg.register(self.setup.clone());
            reg.register(self.look.clone());
            reg.register(BrokenTool);
            reg.register(SlowTool);
            reg
        }

        fn agent(&self, model: &ScriptedMockClient, config: AgentConfig) -> AgentLoop {
            AgentLoop::new(
                Arc::new(model.clone()),
                Arc::new(self.registry()),
                Arc::new(config),
                OutputContract::plan(),
                "You are a test planner.",
            )
        }
    }

    fn fast_config() -> AgentConfig {
        AgentConfig { retry_backoff_ms: 1, ..AgentConfig::default() }
    }

    fn observations(messages: &[scout_model::Message]) -> Vec<&str> {
        messages.iter().filter(|m| m.role == Role::Observation).map(|m| m.content.as_str()).collect()
    }

    // ── Successful runs ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn scripted_run_returns_bracketed_payload() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::new([setup_call(), look_call(), PLAN_ANSWER.to_string()]);
        let agent = fx.agent(&model, fast_config());

        let ok = agent.run("explore https://shop.test/", &CancellationToken::new()).await.unwrap();

        assert!(ok.payload.starts_with("# Shop Test Plan"));
        assert!(ok.payload.ends_with("### 1. Open the home page"));
        assert_eq!(ok.state.iteration_count, 3);
        assert_eq!(ok.state.tool_calls, 2);
        assert!(ok.state.terminal);
        assert!(ok.state.invoked_once.contains("setup"));
        assert!(ok.state.succeeded.contains("look"));
        // system + task + 2 × (reply, observation) + final reply
        assert_eq!(ok.conversation.len(), 7);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn model_sees_system_prompt_then_task() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::new([PLAN_ANSWER]);
        let agent = fx.agent(&model, fast_config());

        agent.run("explore https://shop.test/", &CancellationToken::new()).await.unwrap();

        let first = model.requests.lock().unwrap()[0].clone();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].role, Role::System);
        assert_eq!(first[0].content, "You are a test planner.");
        assert_eq!(first[1].role, Role::User);
        assert_eq!(first[1].content, "explore https://shop.test/");
    }

    #[tokio::test]
    async fn observations_carry_tool_and_iteration() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::new([setup_call(), look_call(), PLAN_ANSWER.to_string()]);
        let agent = fx.agent(&model, fast_config());

        let ok = agent.run("go", &CancellationToken::new()).await.unwrap();

        let obs = observations(ok.conversation.messages());
        assert_eq!(obs.len(), 2);
        assert!(obs[0].starts_with("<observation tool='setup' iteration='1' status='ok'>"));
        assert!(obs[0].contains("opened https://shop.test/"));
        assert!(obs[1].starts_with("<observation tool='look' iteration='2' status='ok'>"));
    }

    #[tokio::test]
    async fn conversation_grows_every_iteration() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::new([setup_call(), "hmm".to_string(), setup_call(), look_call()]);
        let agent = fx.agent(&model, AgentConfig { max_iterations: 4, ..fast_config() });

        let err = agent.run("go", &CancellationToken::new()).await.unwrap_err();

        let requests = model.requests.lock().unwrap().clone();
        let lengths: Vec<usize> = requests.iter().map(|r| r.len()).collect();
        assert_eq!(lengths, vec![2, 4, 6, 8]);
        assert_eq!(err.conversation.len(), 10);
    }

    // ── Invocation policy ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn one_shot_tool_runs_once_and_second_call_is_a_rule_violation() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::new([setup_call(), setup_call(), PLAN_ANSWER.to_string()]);
        let agent = fx.agent(&model, fast_config());

        let ok = agent.run("go", &CancellationToken::new()).await.unwrap();

        assert_eq!(fx.setup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ok.state.tool_calls, 1);
        let obs = observations(ok.conversation.messages());
        assert!(obs[1].starts_with("<observation tool='setup' iteration='2' status='rule-violation'>"));
        assert!(obs[1].contains("only be called once"));
        assert_eq!(ok.state.last_error.as_ref().map(|e| e.kind), Some(ErrorKind::RuleViolation));
    }

    #[tokio::test]
    async fn prerequisite_must_have_succeeded() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::new([look_call(), setup_call(), look_call(), PLAN_ANSWER.to_string()]);
        let agent = fx.agent(&model, fast_config());

        let ok = agent.run("go", &CancellationToken::new()).await.unwrap();

        assert_eq!(fx.look.calls.load(Ordering::SeqCst), 1);
        let obs = observations(ok.conversation.messages());
        assert!(obs[0].contains("status='rule-violation'"));
        assert!(obs[0].contains("needs a successful call to setup first"));
        assert!(obs[2].contains("tool='look' iteration='3' status='ok'"));
    }

    #[tokio::test]
    async fn tool_error_is_observed_and_run_continues() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::new([call("broken", "{}"), PLAN_ANSWER.to_string()]);
        let agent = fx.agent(&model, fast_config());

        let ok = agent.run("go", &CancellationToken::new()).await.unwrap();

        let obs = observations(ok.conversation.messages());
        assert!(obs[0].contains("tool='broken' iteration='1' status='error'"));
        assert!(obs[0].contains("element not found"));
        assert!(!ok.state.succeeded.contains("broken"));
        assert_eq!(ok.state.iteration_count, 2);
    }

    #[tokio::test]
    async fn long_tool_output_is_capped() {
        let mut fx = Fixture::new();
        fx.look.body = Some("x".repeat(1000));
        let model = ScriptedMockClient::new([setup_call(), look_call(), PLAN_ANSWER.to_string()]);
        let agent = fx.agent(&model, AgentConfig { observation_char_cap: 100, ..fast_config() });

        let ok = agent.run("go", &CancellationToken::new()).await.unwrap();

        let obs = observations(ok.conversation.messages());
        assert!(obs[1].contains("900 characters omitted"));
        assert!(obs[1].len() < 300);
    }

    // ── Corrections ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn reply_without_markers_gets_format_correction() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::new(["I will now open the page.", PLAN_ANSWER]);
        let agent = fx.agent(&model, fast_config());

        let ok = agent.run("go", &CancellationToken::new()).await.unwrap();

        let obs = observations(ok.conversation.messages());
        assert!(obs[0].starts_with("<observation tool='none' iteration='1' status='format-error'>"));
        assert!(obs[0].contains("Reply with exactly one"));
        assert_eq!(ok.state.iteration_count, 2);
        assert_eq!(ok.state.tool_calls, 0);
    }

    #[tokio::test]
    async fn missing_end_sentinel_is_corrected_not_terminal() {
        let fx = Fixture::new();
        let truncated = "<final_answer>\n<<<BEGIN_PLAN_MD>>>\n## Overview\n## Scenarios\n</final_answer>";
        let model = ScriptedMockClient::new([truncated, PLAN_ANSWER]);
        let agent = fx.agent(&model, fast_config());

        let ok = agent.run("go", &CancellationToken::new()).await.unwrap();

        assert_eq!(model.calls(), 2);
        assert_eq!(ok.state.iteration_count, 2);
        let obs = observations(ok.conversation.messages());
        assert_eq!(obs.len(), 1);
        assert!(obs[0].contains("status='format-error'"));
        assert!(obs[0].contains("missing end marker <<<END_PLAN_MD>>>"));
        assert!(obs[0].contains("<<<BEGIN_PLAN_MD>>> and <<<END_PLAN_MD>>>"));
    }

    #[tokio::test]
    async fn missing_section_is_corrected() {
        let fx = Fixture::new();
        let thin = "<final_answer><<<BEGIN_PLAN_MD>>>\n## Overview\nshop\n<<<END_PLAN_MD>>></final_answer>";
        let model = ScriptedMockClient::new([thin, PLAN_ANSWER]);
        let agent = fx.agent(&model, fast_config());

        let ok = agent.run("go", &CancellationToken::new()).await.unwrap();

        let obs = observations(ok.conversation.messages());
        assert!(obs[0].contains("missing the required section: Scenarios"));
        assert!(ok.payload.contains("## Test Scenarios"));
    }

    // ── Terminal failures ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn budget_bounds_model_calls_exactly() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::repeating("Let me think about this page some more.");
        let agent = fx.agent(&model, AgentConfig { max_iterations: 5, ..fast_config() });

        let err = agent.run("go", &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.error, RunError::BudgetExceeded { limit: 5 });
        assert_eq!(err.kind(), ErrorKind::BudgetExceeded);
        assert_eq!(model.calls(), 5);
        assert_eq!(err.state.iteration_count, 5);
        assert!(err.state.terminal);
    }

    #[tokio::test]
    async fn cancellation_after_second_iteration_stops_before_third_tool() {
        let token = CancellationToken::new();
        let mut fx = Fixture::new();
        fx.look.cancel_on = Some((1, token.clone()));
        let mut script = vec![setup_call()];
        script.extend(std::iter::repeat(look_call()).take(8));
        script.push(PLAN_ANSWER.to_string());
        let model = ScriptedMockClient::new(script);
        let agent = fx.agent(&model, fast_config());

        let err = agent.run("go", &token).await.unwrap_err();

        assert_eq!(err.error, RunError::Cancelled);
        assert_eq!(err.state.iteration_count, 2);
        assert_eq!(err.state.tool_calls, 2);
        assert_eq!(fx.look.calls.load(Ordering::SeqCst), 1);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_calls_model() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::new([PLAN_ANSWER]);
        let agent = fx.agent(&model, fast_config());
        let token = CancellationToken::new();
        token.cancel();

        let err = agent.run("go", &token).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(model.calls(), 0);
        assert_eq!(err.conversation.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_are_retried_then_fatal() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::with_results([
            Err(ModelError::Transport("connection refused".into())),
            Err(ModelError::Transport("connection refused".into())),
            Err(ModelError::Transport("connection refused".into())),
            Ok(PLAN_ANSWER.to_string()),
        ]);
        let agent = fx.agent(&model, AgentConfig { model_retry_budget: 2, ..fast_config() });

        let err = agent.run("go", &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err.error, RunError::ModelUnavailable { attempts: 3, .. }));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(model.calls(), 3);
        assert_eq!(err.state.iteration_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_within_one_iteration() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::with_results([
            Err(ModelError::Endpoint { status: 503, body: "loading model".into() }),
            Ok(PLAN_ANSWER.to_string()),
        ]);
        let agent = fx.agent(&model, fast_config());

        let ok = agent.run("go", &CancellationToken::new()).await.unwrap();

        assert_eq!(model.calls(), 2);
        assert_eq!(ok.state.iteration_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn model_timeouts_exhaust_retries() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::repeating(PLAN_ANSWER).with_delay(Duration::from_secs(300));
        let agent = fx.agent(
            &model,
            AgentConfig { model_timeout_secs: 10, model_retry_budget: 1, ..fast_config() },
        );

        let err = agent.run("go", &CancellationToken::new()).await.unwrap_err();

        match err.error {
            RunError::ModelUnavailable { attempts, message } => {
                assert_eq!(attempts, 2);
                assert!(message.contains("timed out after 10s"), "{message}");
            }
            other => panic!("expected ModelUnavailable, got {other:?}"),
        }
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tool_timeout_streak_is_fatal() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::repeating(call("slow", "{}"));
        let agent = fx.agent(&model, AgentConfig { tool_timeout_secs: 5, tool_retry_budget: 1, ..fast_config() });

        let err = agent.run("go", &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.error, RunError::ToolTimeouts { tool: "slow".into(), count: 2 });
        assert_eq!(err.state.iteration_count, 1);
        let obs = observations(err.conversation.messages());
        assert_eq!(obs.len(), 1);
        assert!(obs[0].contains("tool='slow' iteration='1' status='timeout'"));
    }

    // ── Events ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn events_trace_the_run() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::new([setup_call(), setup_call(), PLAN_ANSWER.to_string()]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let agent = fx.agent(&model, fast_config()).with_events(tx);

        agent.run("go", &CancellationToken::new()).await.unwrap();
        drop(agent);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        let started = events.iter().filter(|e| matches!(e, AgentEvent::IterationStarted { .. })).count();
        assert_eq!(started, 3);
        assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolCallStarted { tool, .. } if tool == "setup")));
        assert!(events
            .iter()
            .any(|e| matches!(e, AgentEvent::RuleViolation { iteration: 2, tool, .. } if tool == "setup")));
        assert!(matches!(events.last(), Some(AgentEvent::Completed { iterations: 3 })));
    }

    #[tokio::test]
    async fn failure_emits_failed_event() {
        let fx = Fixture::new();
        let model = ScriptedMockClient::repeating("still thinking");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let agent = fx.agent(&model, AgentConfig { max_iterations: 2, ..fast_config() }).with_events(tx);

        agent.run("go", &CancellationToken::new()).await.unwrap_err();
        drop(agent);

        let mut last = None;
        while let Some(ev) = rx.recv().await {
            last = Some(ev);
        }
        assert!(matches!(last, Some(AgentEvent::Failed { kind: ErrorKind::BudgetExceeded, .. })));
    }
}
