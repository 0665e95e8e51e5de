//! The coordinator: a periodic plan-decide-delegate loop.
//!
//! Each cycle reads the advisory state and the latest trend research, asks
//! the reasoning service for a situation analysis and then for decisions,
//! and sends one message per decision. It never waits for replies. Replies
//! arrive later through [`Agent::handle`] and update the advisory state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentnet_agents::base::render;
use agentnet_agents::{
    parse_or_degrade, Agent, AgentContext, Parsed, ProjectSuggestion, SituationAnalysis,
    LATEST_TRENDS_KEY,
};
use agentnet_common::{Message, NetworkError, Result, Role, DEFAULT_PRIORITY};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::CoordinatorConfig;

pub const ANALYZE_TRENDS: &str = "analyze_trends";

const COORDINATOR_SYSTEM_PROMPT: &str = r#"You are the coordinator of a team of specialized agents: architect, researcher, developer, reviewer and security. Your role is to:

1. Assess how well the team is using its capacity
2. Decide which tasks matter most right now
3. Assign each task to exactly one agent

When asked for decisions, write one block per decision:
Task: <design_system | analyze_trends | implement_feature | security_audit>
Agent: <architect | researcher | developer | reviewer | security>
Priority: <1 is most urgent>
Context: <what the agent needs to know>
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorState {
    /// No active projects yet. Cycles still run and request discovery.
    Idle,
    Cycling,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Assigned,
    Completed,
}

/// The coordinator's cached, possibly stale, view of the network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryState {
    pub active_projects: BTreeMap<String, ProjectSuggestion>,
    pub agent_status: BTreeMap<Role, AgentStatus>,
    /// Latest reported result per role
    pub latest_results: BTreeMap<Role, Value>,
}

impl AdvisoryState {
    fn new() -> Self {
        Self {
            agent_status: Role::ALL
                .into_iter()
                .map(|role| (role, AgentStatus::Idle))
                .collect(),
            ..Default::default()
        }
    }
}

/// What a cycle saw before deciding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSnapshot {
    pub advisory: AdvisoryState,
    pub latest_trends: Option<Value>,
}

/// Outcome of one decision cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub snapshot: CycleSnapshot,
    pub analysis: Parsed<SituationAnalysis>,
    pub decisions_sent: usize,
    pub discovery_requested: bool,
}

pub struct CoordinatorAgent {
    ctx: AgentContext,
    config: CoordinatorConfig,
    interval: Duration,
    advisory: Mutex<AdvisoryState>,
    last_report: Mutex<Option<CycleReport>>,
    cycles: AtomicU64,
    stopped: AtomicBool,
    system_prompt: Option<String>,
}

impl CoordinatorAgent {
    pub fn new(ctx: AgentContext, config: CoordinatorConfig) -> Self {
        Self {
            ctx,
            interval: config.cycle_interval(),
            config,
            advisory: Mutex::new(AdvisoryState::new()),
            last_report: Mutex::new(None),
            cycles: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Override the configured cycle interval.
    pub fn with_cycle_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        if self.stopped.load(Ordering::SeqCst) || !self.ctx.is_active() {
            CoordinatorState::Stopped
        } else if self.advisory.lock().active_projects.is_empty() {
            CoordinatorState::Idle
        } else {
            CoordinatorState::Cycling
        }
    }

    pub fn advisory(&self) -> AdvisoryState {
        self.advisory.lock().clone()
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.lock().clone()
    }

    /// Number of cycles that completed, including aborted ones.
    pub fn cycles_run(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    fn set_status(&self, role: Role, status: AgentStatus) {
        self.advisory.lock().agent_status.insert(role, status);
    }

    fn request_discovery(&self) -> Result<()> {
        info!(role = %Role::Coordinator, "No active projects, requesting trend analysis");
        self.ctx.send(
            Role::Researcher,
            json!({
                "task": ANALYZE_TRENDS,
                "priority": DEFAULT_PRIORITY,
                "context": {
                    "focus_areas": self.config.focus_areas,
                    "min_stars": self.config.min_stars,
                },
            }),
            DEFAULT_PRIORITY,
        )?;
        self.set_status(Role::Researcher, AgentStatus::Assigned);
        Ok(())
    }

    /// Run one decision cycle.
    ///
    /// A reasoning failure aborts the cycle and is returned. Decisions that
    /// cannot be delivered are logged and skipped.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(cycle, "Starting decision cycle");

        let discovery_requested = if self.advisory.lock().active_projects.is_empty() {
            self.request_discovery()?;
            true
        } else {
            false
        };

        let snapshot = CycleSnapshot {
            advisory: self.advisory(),
            latest_trends: self.ctx.knowledge().retrieve(LATEST_TRENDS_KEY).await,
        };
        let latest = snapshot
            .latest_trends
            .as_ref()
            .map(render)
            .unwrap_or_else(|| "None".to_string());

        let analysis_prompt = format!(
            "Given the current system state:\n\
             Active Projects: {}\n\
             Agent Status: {}\n\
             Latest Research: {latest}\n\n\
             Please analyze:\n\
             1. Current system efficiency\n\
             2. Resource allocation\n\
             3. Priority tasks\n\
             4. Potential bottlenecks\n\n\
             Provide structured analysis for coordination.",
            render(&json!(snapshot.advisory.active_projects)),
            render(&json!(snapshot.advisory.agent_status)),
        );
        let analysis_text = self.ctx.think(self.system_prompt(), &analysis_prompt).await?;
        let analysis = parse_or_degrade(
            Role::Coordinator,
            "situation analysis",
            self.ctx.parser().situation_analysis(&analysis_text),
        );

        let decisions_prompt = format!(
            "Based on:\n\
             System State: {}\n\
             Latest Research: {latest}\n\n\
             Determine:\n\
             1. What tasks should be prioritized?\n\
             2. How should resources be allocated?\n\
             3. What agents should be assigned to what tasks?\n\
             4. Are there any urgent interventions needed?\n\n\
             Provide specific, actionable decisions in a structured format.",
            render(&json!(analysis.value)),
        );
        let decisions_text = self.ctx.think(self.system_prompt(), &decisions_prompt).await?;
        let decisions = parse_or_degrade(
            Role::Coordinator,
            "decisions",
            self.ctx.parser().decisions(&decisions_text),
        );

        let mut decisions_sent = 0;
        for decision in decisions.value {
            let payload = json!({
                "task": decision.task,
                "context": decision.context,
                "priority": decision.priority,
            });
            match self.ctx.send(decision.target, payload, decision.priority) {
                Ok(()) => {
                    self.set_status(decision.target, AgentStatus::Assigned);
                    decisions_sent += 1;
                }
                Err(e) => {
                    warn!(to = %decision.target, task = %decision.task, error = %e, "Decision not delivered");
                }
            }
        }

        info!(
            cycle,
            decisions_sent,
            discovery_requested,
            analysis_degraded = analysis.degraded,
            "Decision cycle complete"
        );

        let report = CycleReport {
            snapshot,
            analysis,
            decisions_sent,
            discovery_requested,
        };
        *self.last_report.lock() = Some(report.clone());
        Ok(report)
    }

    /// Run decision cycles on a fixed interval until the network stops.
    ///
    /// The first cycle runs immediately. A cycle in progress always
    /// finishes before the stop signal is observed.
    pub async fn control_loop(self: Arc<Self>) -> Result<()> {
        let mut active = self.ctx.active_signal();
        let mut interval = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "Coordinator control loop started");

        loop {
            if !*active.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {
                    match self.run_cycle().await {
                        Ok(_) => {}
                        Err(e) if e.is_recoverable() => {
                            warn!(error = %e, "Decision cycle aborted");
                        }
                        Err(e) => {
                            error!(error = %e, "Coordinator control loop failed");
                            self.stopped.store(true, Ordering::SeqCst);
                            return Err(NetworkError::agent_loop(Role::Coordinator, e.to_string()));
                        }
                    }
                }
                changed = active.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.stopped.store(true, Ordering::SeqCst);
        info!("Coordinator control loop stopped");
        Ok(())
    }

    fn record_result(&self, from: Role, message: &Message) {
        let mut advisory = self.advisory.lock();
        advisory.agent_status.insert(from, AgentStatus::Completed);

        for key in ["trends", "architecture", "review", "audit"] {
            if let Some(result) = message.get(key) {
                advisory.latest_results.insert(from, result.clone());
            }
        }

        let suggestions = message
            .get("trends")
            .and_then(|t| t.get("project_suggestions"))
            .and_then(Value::as_array);
        for raw in suggestions.into_iter().flatten() {
            match serde_json::from_value::<ProjectSuggestion>(raw.clone()) {
                Ok(project) if !project.name.trim().is_empty() => {
                    advisory.active_projects.insert(project.name.clone(), project);
                }
                _ => debug!(suggestion = %raw, "Skipping unnamed project suggestion"),
            }
        }
    }
}

#[async_trait]
impl Agent for CoordinatorAgent {
    fn role(&self) -> Role {
        Role::Coordinator
    }

    fn context(&self) -> &AgentContext {
        &self.ctx
    }

    fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(COORDINATOR_SYSTEM_PROMPT)
    }

    async fn handle(&self, message: Message) -> Result<()> {
        let from = message.from();
        let is_result = message.get("status").and_then(Value::as_str) == Some("completed")
            || ["trends", "architecture", "review", "audit"]
                .iter()
                .any(|key| message.get(key).is_some());

        if !is_result {
            debug!(from = %from, "Ignoring message without a result");
            return Ok(());
        }

        self.record_result(from, &message);
        let projects = self.advisory.lock().active_projects.len();
        info!(from = %from, active_projects = projects, "Recorded agent result");
        Ok(())
    }
}
