//! Integration tests for the agent runtime.
//!
//! These tests drive real agents over a real mailbox and knowledge store.
//! Reasoning is scripted so every run is deterministic.

use agentnet_agents::{
    run_receive_loop, Agent, AgentContext, AgentServices, ArchitectAgent, DeveloperAgent,
    Mailbox, ResearchAgent, ReviewAgent, SecurityAgent, StaticTrendFeed, TrendItem,
    LATEST_TRENDS_KEY,
};
use agentnet_common::{Message, NetworkError, Result, Role};
use agentnet_knowledge::{KnowledgeStore, MemoryBackend};
use agentnet_llm::ScriptedClient;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct Harness {
    services: AgentServices,
    llm: Arc<ScriptedClient>,
    backend: Arc<MemoryBackend>,
    active: watch::Sender<bool>,
}

impl Harness {
    async fn new(llm: ScriptedClient) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let knowledge = Arc::new(KnowledgeStore::open(backend.clone()).await.unwrap());
        let llm = Arc::new(llm);
        let (active, active_rx) = watch::channel(true);
        let services = AgentServices::new(
            Arc::new(Mailbox::for_all_roles()),
            knowledge,
            llm.clone(),
            active_rx,
        );
        Self {
            services,
            llm,
            backend,
            active,
        }
    }

    fn ctx(&self, role: Role) -> AgentContext {
        self.services.context(role)
    }

    fn mailbox(&self) -> &Arc<Mailbox> {
        &self.services.mailbox
    }

    fn knowledge(&self) -> &Arc<KnowledgeStore> {
        &self.services.knowledge
    }

    fn stop(&self) {
        let _ = self.active.send(false);
        self.mailbox().close();
    }

    async fn next_for(&self, role: Role) -> Message {
        tokio::time::timeout(Duration::from_secs(2), self.mailbox().receive(role))
            .await
            .expect("timed out waiting for message")
            .expect("mailbox closed")
    }
}

fn task(to: Role, task: &str, context: Value) -> Message {
    Message::new(Role::Coordinator, to, json!({ "task": task, "context": context }))
}

// ============================================================================
// Mailbox Routing Tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_receivers_only_see_their_own_messages() {
    let mailbox = Arc::new(Mailbox::for_all_roles());
    let per_role = 25;

    let mut receivers = vec![];
    for role in Role::ALL {
        let mailbox = mailbox.clone();
        receivers.push(tokio::spawn(async move {
            let mut got = vec![];
            for _ in 0..per_role {
                let m = tokio::time::timeout(Duration::from_secs(2), mailbox.receive(role))
                    .await
                    .unwrap()
                    .unwrap();
                got.push(m);
            }
            (role, got)
        }));
    }

    for i in 0..per_role {
        for role in Role::ALL {
            mailbox
                .enqueue(Message::new(Role::Coordinator, role, json!({ "n": i })))
                .unwrap();
        }
    }

    for handle in receivers {
        let (role, got) = handle.await.unwrap();
        assert_eq!(got.len(), per_role);
        assert!(got.iter().all(|m| m.to() == role));
    }
    for role in Role::ALL {
        assert_eq!(mailbox.pending(role), 0);
    }
}

#[tokio::test]
async fn test_higher_priority_delivered_first() {
    let mailbox = Mailbox::for_all_roles();
    mailbox
        .enqueue(Message::new(Role::Coordinator, Role::Architect, json!({"p": 5})).with_priority(5))
        .unwrap();
    mailbox
        .enqueue(Message::new(Role::Coordinator, Role::Architect, json!({"p": 1})).with_priority(1))
        .unwrap();

    assert_eq!(mailbox.receive(Role::Architect).await.unwrap().priority(), 1);
    assert_eq!(mailbox.receive(Role::Architect).await.unwrap().priority(), 5);
}

// ============================================================================
// Role Behavior Tests
// ============================================================================

#[tokio::test]
async fn test_researcher_stores_trends_and_reports() {
    let llm = ScriptedClient::with_responses([
        "Project name: CrateScope\nProblem: audits are slow\nStack: Rust\n\
         Project name: PromptLint\nProblem: prompts drift",
    ]);
    let h = Harness::new(llm).await;
    let feed = Arc::new(StaticTrendFeed::new(vec![
        TrendItem::new("llm-router", 900).with_topics(["AI"]),
        TrendItem::new("tiny-chain", 10).with_topics(["web3"]),
    ]));
    let researcher = ResearchAgent::new(h.ctx(Role::Researcher), feed);

    researcher
        .handle(task(
            Role::Researcher,
            "analyze_trends",
            json!({"focus_areas": ["AI", "web3"], "min_stars": 100}),
        ))
        .await
        .unwrap();

    let stored = h.knowledge().retrieve(LATEST_TRENDS_KEY).await.unwrap();
    assert_eq!(stored["trends"].as_array().unwrap().len(), 1);
    assert!(stored["analysis"].as_str().unwrap().contains("CrateScope"));
    assert!(stored["timestamp"].is_string());
    assert!(h.knowledge().entry(LATEST_TRENDS_KEY).await.unwrap().persistent);

    let reply = h.next_for(Role::Coordinator).await;
    assert_eq!(reply.from(), Role::Researcher);
    assert_eq!(reply.get("status"), Some(&json!("completed")));
    let suggestions = reply.payload()["trends"]["project_suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0]["name"], "CrateScope");

    let prompt = &h.llm.prompts()[0];
    assert!(prompt.contains("llm-router"));
    assert!(!prompt.contains("tiny-chain"));
}

#[tokio::test]
async fn test_researcher_persistence_failure_still_reports() {
    let h = Harness::new(ScriptedClient::with_responses(["no ideas today"])).await;
    h.backend.set_failing(true);
    let researcher = ResearchAgent::new(h.ctx(Role::Researcher), Arc::new(StaticTrendFeed::default()));

    researcher
        .handle(task(Role::Researcher, "analyze_trends", Value::Null))
        .await
        .unwrap();

    assert!(h.knowledge().retrieve(LATEST_TRENDS_KEY).await.is_some());
    let reply = h.next_for(Role::Coordinator).await;
    // Unparseable suggestions degrade to an empty list.
    assert_eq!(reply.payload()["trends"]["project_suggestions"], json!([]));
}

#[tokio::test]
async fn test_architect_reports_design() {
    let h = Harness::new(ScriptedClient::with_responses([
        "Component: gateway\nComponent: worker pool\nInterface: HTTP\nData flow: gateway -> pool",
    ]))
    .await;
    let architect = ArchitectAgent::new(h.ctx(Role::Architect));

    architect
        .handle(task(Role::Architect, "design_system", json!({"project": "CrateScope"})))
        .await
        .unwrap();

    let reply = h.next_for(Role::Coordinator).await;
    assert_eq!(reply.from(), Role::Architect);
    assert_eq!(reply.payload()["architecture"]["components"], json!(["gateway", "worker pool"]));
    assert!(h.llm.prompts()[0].contains("CrateScope"));
}

#[tokio::test]
async fn test_developer_hands_code_to_reviewer() {
    let h = Harness::new(ScriptedClient::with_responses([
        "Sure:\n```rust\npub fn login() -> bool { true }\n```",
    ]))
    .await;
    let developer = DeveloperAgent::new(h.ctx(Role::Developer));
    let context = json!({"feature": "login"});

    developer
        .handle(task(Role::Developer, "implement_feature", context.clone()))
        .await
        .unwrap();

    let handoff = h.next_for(Role::Reviewer).await;
    assert_eq!(handoff.from(), Role::Developer);
    assert_eq!(handoff.get("code"), Some(&json!("pub fn login() -> bool { true }")));
    assert_eq!(handoff.get("context"), Some(&context));
}

#[tokio::test]
async fn test_reviewer_reports_and_ignores_empty_code() {
    let h = Harness::new(ScriptedClient::with_responses([
        "Issue: no tests\nSuggestion: add a unit test\nApproval: no",
    ]))
    .await;
    let reviewer = ReviewAgent::new(h.ctx(Role::Reviewer));

    reviewer
        .handle(Message::new(Role::Developer, Role::Reviewer, json!({"code": "   "})))
        .await
        .unwrap();
    assert_eq!(h.llm.calls(), 0);

    reviewer
        .handle(Message::new(
            Role::Developer,
            Role::Reviewer,
            json!({"code": "fn f() {}", "context": {"feature": "f"}}),
        ))
        .await
        .unwrap();

    let reply = h.next_for(Role::Coordinator).await;
    assert_eq!(reply.payload()["review"]["issues"], json!(["no tests"]));
    assert_eq!(reply.payload()["review"]["approval"], json!(false));
}

#[tokio::test]
async fn test_security_reports_audit() {
    let h = Harness::new(ScriptedClient::with_responses([
        "Vulnerability: secrets in logs\nRecommendation: redact tokens\nRisk level: medium",
    ]))
    .await;
    let security = SecurityAgent::new(h.ctx(Role::Security));

    security
        .handle(task(Role::Security, "security_audit", json!({"service": "api"})))
        .await
        .unwrap();

    let reply = h.next_for(Role::Coordinator).await;
    assert_eq!(reply.payload()["audit"]["risk_level"], "medium");
    assert_eq!(reply.get("status"), Some(&json!("completed")));
}

#[tokio::test]
async fn test_unknown_task_is_ignored() {
    let h = Harness::new(ScriptedClient::new()).await;
    let agents: Vec<Box<dyn Agent>> = vec![
        Box::new(ArchitectAgent::new(h.ctx(Role::Architect))),
        Box::new(DeveloperAgent::new(h.ctx(Role::Developer))),
        Box::new(SecurityAgent::new(h.ctx(Role::Security))),
        Box::new(ResearchAgent::new(
            h.ctx(Role::Researcher),
            Arc::new(StaticTrendFeed::default()),
        )),
    ];

    for agent in &agents {
        agent
            .handle(task(agent.role(), "water_plants", Value::Null))
            .await
            .unwrap();
        agent
            .handle(Message::new(Role::Coordinator, agent.role(), json!({})))
            .await
            .unwrap();
    }

    assert_eq!(h.llm.calls(), 0);
    for role in Role::ALL {
        assert_eq!(h.mailbox().pending(role), 0);
    }
}

// ============================================================================
// Receive Loop Tests
// ============================================================================

#[tokio::test]
async fn test_developer_reasoning_failure_sends_nothing_and_continues() {
    let llm = ScriptedClient::new();
    llm.push_failure("quota exceeded");
    llm.push_response("```python\nprint('second')\n```");
    let h = Harness::new(llm).await;

    let developer: Arc<dyn Agent> = Arc::new(DeveloperAgent::new(h.ctx(Role::Developer)));
    let loop_handle = tokio::spawn(run_receive_loop(developer));

    h.mailbox()
        .enqueue(task(Role::Developer, "implement_feature", json!({"feature": "first"})))
        .unwrap();
    h.mailbox()
        .enqueue(task(Role::Developer, "implement_feature", json!({"feature": "second"})))
        .unwrap();

    let handoff = h.next_for(Role::Reviewer).await;
    assert_eq!(handoff.get("code"), Some(&json!("print('second')")));
    assert_eq!(handoff.get("context"), Some(&json!({"feature": "second"})));
    assert_eq!(h.llm.calls(), 2);
    assert_eq!(h.mailbox().pending(Role::Reviewer), 0);

    h.stop();
    let result = tokio::time::timeout(Duration::from_secs(2), loop_handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_stop_releases_blocked_loop() {
    let h = Harness::new(ScriptedClient::new()).await;
    let architect: Arc<dyn Agent> = Arc::new(ArchitectAgent::new(h.ctx(Role::Architect)));
    let loop_handle = tokio::spawn(run_receive_loop(architect));

    tokio::time::sleep(Duration::from_millis(20)).await;
    h.stop();

    let result = tokio::time::timeout(Duration::from_secs(2), loop_handle)
        .await
        .expect("loop did not stop")
        .unwrap();
    assert!(result.is_ok());
}

/// An agent that fails in a configurable way.
struct FailingAgent {
    ctx: AgentContext,
    fatal: bool,
    handled: AtomicUsize,
}

#[async_trait]
impl Agent for FailingAgent {
    fn role(&self) -> Role {
        self.ctx.role()
    }

    fn context(&self) -> &AgentContext {
        &self.ctx
    }

    fn system_prompt(&self) -> &str {
        "Failing agent for testing"
    }

    async fn handle(&self, _message: Message) -> Result<()> {
        self.handled.fetch_add(1, Ordering::SeqCst);
        if self.fatal {
            Err(NetworkError::Config("broken invariant".into()))
        } else {
            Err(NetworkError::Feed("feed offline".into()))
        }
    }
}

#[tokio::test]
async fn test_fatal_error_ends_loop() {
    let h = Harness::new(ScriptedClient::new()).await;
    let agent = Arc::new(FailingAgent {
        ctx: h.ctx(Role::Security),
        fatal: true,
        handled: AtomicUsize::new(0),
    });
    h.mailbox().enqueue(task(Role::Security, "security_audit", Value::Null)).unwrap();
    h.mailbox().enqueue(task(Role::Security, "security_audit", Value::Null)).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), run_receive_loop(agent.clone()))
        .await
        .unwrap();

    assert!(matches!(
        result,
        Err(NetworkError::AgentLoop { role: Role::Security, .. })
    ));
    assert_eq!(agent.handled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_recoverable_errors_keep_loop_running() {
    let h = Harness::new(ScriptedClient::new()).await;
    let agent = Arc::new(FailingAgent {
        ctx: h.ctx(Role::Researcher),
        fatal: false,
        handled: AtomicUsize::new(0),
    });
    for _ in 0..3 {
        h.mailbox().enqueue(task(Role::Researcher, "analyze_trends", Value::Null)).unwrap();
    }
    h.mailbox().close();

    let result = tokio::time::timeout(Duration::from_secs(2), run_receive_loop(agent.clone()))
        .await
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(agent.handled.load(Ordering::SeqCst), 3);
}
