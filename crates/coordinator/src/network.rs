//! Network supervisor.
//!
//! A [`Network`] owns the mailbox and the knowledge store, builds one agent
//! per role, and runs every receive loop plus the coordinator's control loop
//! in a single `JoinSet`. The first loop to fail unrecoverably (including a
//! panic) brings the whole network down.

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentnet_agents::{
    run_receive_loop, Agent, AgentServices, ArchitectAgent, DeveloperAgent, JsonFileFeed, Mailbox,
    ResearchAgent, ResponseParser, ReviewAgent, SecurityAgent, StaticTrendFeed, TrendFeed,
};
use agentnet_common::{NetworkError, Result, Role};
use agentnet_knowledge::KnowledgeStore;
use agentnet_llm::{build_llm_client, LlmClient};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::NetworkConfig;
use crate::coordinator::CoordinatorAgent;

/// Announcements kept in memory. Older ones are dropped first.
pub const MAX_ANNOUNCEMENTS: usize = 100;

/// An operator-visible line of text. Not addressed to any role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

type LoopExit = (Role, Result<()>);

pub struct Network {
    config: NetworkConfig,
    mailbox: Arc<Mailbox>,
    knowledge: Arc<KnowledgeStore>,
    coordinator: Arc<CoordinatorAgent>,
    agents: Vec<Arc<dyn Agent>>,
    active: watch::Sender<bool>,
    announcements: Mutex<VecDeque<Announcement>>,
    grace: Duration,
    started: AtomicBool,
}

/// Builder for [`Network`]. Anything not supplied is built from config.
pub struct NetworkBuilder {
    config: NetworkConfig,
    llm: Option<Arc<dyn LlmClient>>,
    feed: Option<Arc<dyn TrendFeed>>,
    knowledge: Option<Arc<KnowledgeStore>>,
    parser: Option<Arc<dyn ResponseParser>>,
    cycle_interval: Option<Duration>,
    grace: Option<Duration>,
}

impl NetworkBuilder {
    pub fn llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn feed(mut self, feed: Arc<dyn TrendFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn knowledge(mut self, knowledge: Arc<KnowledgeStore>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Cycle interval finer than the config's whole seconds.
    pub fn cycle_interval(mut self, interval: Duration) -> Self {
        self.cycle_interval = Some(interval);
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.grace = Some(grace);
        self
    }

    pub async fn build(self) -> Result<Network> {
        let config = self.config;
        config.validate()?;

        let llm = match self.llm {
            Some(llm) => llm,
            None => build_llm_client(&config.llm)?,
        };
        let feed: Arc<dyn TrendFeed> = match (self.feed, &config.research.trends_file) {
            (Some(feed), _) => feed,
            (None, Some(path)) => Arc::new(JsonFileFeed::new(path.clone())),
            (None, None) => {
                warn!("No trends_file configured, researcher will see an empty feed");
                Arc::new(StaticTrendFeed::default())
            }
        };
        let knowledge = match self.knowledge {
            Some(knowledge) => knowledge,
            None => Arc::new(KnowledgeStore::new(&config.knowledge).await?),
        };

        let mailbox = Arc::new(Mailbox::for_all_roles());
        let (active, active_rx) = watch::channel(true);

        let mut services = AgentServices::new(mailbox.clone(), knowledge.clone(), llm, active_rx)
            .with_settings(config.agent_settings());
        if let Some(parser) = self.parser {
            services = services.with_parser(parser);
        }

        let mut coordinator =
            CoordinatorAgent::new(services.context(Role::Coordinator), config.coordinator.clone());
        if let Some(interval) = self.cycle_interval {
            coordinator = coordinator.with_cycle_interval(interval);
        }
        let coordinator = Arc::new(coordinator);

        let agents: Vec<Arc<dyn Agent>> = vec![
            coordinator.clone(),
            Arc::new(ArchitectAgent::new(services.context(Role::Architect))),
            Arc::new(ResearchAgent::new(services.context(Role::Researcher), feed)),
            Arc::new(DeveloperAgent::new(services.context(Role::Developer))),
            Arc::new(ReviewAgent::new(services.context(Role::Reviewer))),
            Arc::new(SecurityAgent::new(services.context(Role::Security))),
        ];

        info!(
            agents = agents.len(),
            store = %knowledge.describe(),
            "Agent network built"
        );

        Ok(Network {
            grace: self.grace.unwrap_or_else(|| config.shutdown_grace()),
            config,
            mailbox,
            knowledge,
            coordinator,
            agents,
            active,
            announcements: Mutex::new(VecDeque::new()),
            started: AtomicBool::new(false),
        })
    }
}

impl Network {
    pub fn builder(config: NetworkConfig) -> NetworkBuilder {
        NetworkBuilder {
            config,
            llm: None,
            feed: None,
            knowledge: None,
            parser: None,
            cycle_interval: None,
            grace: None,
        }
    }

    /// Build a network entirely from config.
    pub async fn new(config: NetworkConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeStore> {
        &self.knowledge
    }

    pub fn coordinator(&self) -> &Arc<CoordinatorAgent> {
        &self.coordinator
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Run every agent until [`Network::stop`] is called or a loop fails.
    ///
    /// Returns the first fatal loop error. After stopping, loops get the
    /// shutdown grace period to finish; whatever is still running is aborted.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NetworkError::Config("network already started".into()));
        }
        if !self.is_active() {
            return Ok(());
        }

        let mut tasks: JoinSet<LoopExit> = JoinSet::new();
        for agent in &self.agents {
            let role = agent.role();
            tasks.spawn(supervised(role, run_receive_loop(agent.clone())));
        }
        tasks.spawn(supervised(
            Role::Coordinator,
            self.coordinator.clone().control_loop(),
        ));
        info!(tasks = tasks.len(), "Agent network started");

        let mut active = self.active.subscribe();
        let mut failure: Option<NetworkError> = None;
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(joined) => {
                        if let Some(err) = loop_failure(joined) {
                            failure = Some(err);
                            self.stop();
                            break;
                        }
                    }
                    None => break,
                },
                changed = active.changed() => {
                    if changed.is_err() || !*active.borrow() {
                        break;
                    }
                }
            }
        }

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                if let Some(err) = loop_failure(joined) {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
            }
        };
        if tokio::time::timeout(self.grace, drain).await.is_err() {
            warn!(
                remaining = tasks.len(),
                grace = ?self.grace,
                "Agents still running after grace period, aborting"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        self.stop();
        info!("Agent network stopped");
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Signal every loop to stop and release blocked receivers.
    pub fn stop(&self) {
        let was_active = self.active.send_replace(false);
        self.mailbox.close();
        if was_active {
            info!("Stopping agent network");
        }
    }

    /// Record an operator-visible announcement.
    pub fn broadcast(&self, text: impl Into<String>) {
        let announcement = Announcement {
            timestamp: Utc::now(),
            text: text.into(),
        };
        info!(announcement = %announcement.text, "Broadcast");

        let mut log = self.announcements.lock();
        log.push_back(announcement);
        while log.len() > MAX_ANNOUNCEMENTS {
            log.pop_front();
        }
    }

    /// Announcements, oldest first.
    pub fn announcements(&self) -> Vec<Announcement> {
        self.announcements.lock().iter().cloned().collect()
    }
}

/// Run a loop, turning a panic into an `AgentLoop` error for its role.
async fn supervised<F>(role: Role, fut: F) -> LoopExit
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => (role, result),
        Err(panic) => (role, Err(NetworkError::agent_loop(role, panic_message(&*panic)))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// The network-level error for a finished loop, if it failed.
fn loop_failure(joined: std::result::Result<LoopExit, JoinError>) -> Option<NetworkError> {
    match joined {
        Ok((role, Ok(()))) => {
            debug!(role = %role, "Agent loop exited");
            None
        }
        Ok((role, Err(e))) => {
            error!(role = %role, error = %e, "Agent loop failed");
            Some(match e {
                NetworkError::AgentLoop { .. } => e,
                other => NetworkError::agent_loop(role, other.to_string()),
            })
        }
        Err(e) if e.is_cancelled() => None,
        Err(e) => {
            error!(error = %e, "Agent task failed outside its loop");
            None
        }
    }
}
