//! Research agent - trend discovery and project ideas.

use std::sync::Arc;

use agentnet_common::{Message, Result, Role, DEFAULT_PRIORITY};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::base::{ignore, render, Agent, AgentContext};
use crate::parsing::parse_or_degrade;
use crate::trends::{TrendFeed, TrendQuery};

pub const ANALYZE_TRENDS: &str = "analyze_trends";

/// Knowledge key holding the most recent trend analysis.
pub const LATEST_TRENDS_KEY: &str = "latest_trends";

const RESEARCH_SYSTEM_PROMPT: &str = r#"You are a technology researcher in a team of cooperating agents. Your role is to:

1. Study trending open-source projects and spot emerging patterns
2. Propose concrete project ideas that build on those trends
3. Favor ideas that solve real problems and are technically feasible

Label each idea with "Project name:", "Problem:", "Features:", "Stack:" and "Challenges:" lines.
"#;

/// Researcher: turns trend data into project suggestions.
pub struct ResearchAgent {
    ctx: AgentContext,
    feed: Arc<dyn TrendFeed>,
    system_prompt: Option<String>,
}

impl ResearchAgent {
    pub fn new(ctx: AgentContext, feed: Arc<dyn TrendFeed>) -> Self {
        Self {
            ctx,
            feed,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    async fn analyze_trends(&self, message: &Message) -> Result<()> {
        let query = TrendQuery::from_context(&message.context());
        info!(
            role = %self.role(),
            focus_areas = ?query.focus_areas,
            min_stars = query.min_stars,
            "Processing trend analysis task"
        );

        let trends = self.feed.fetch(&query).await?;
        let trends_json = serde_json::to_value(&trends)?;

        let prompt = format!(
            "Given these trending GitHub projects:\n{}\n\n\
             Please analyze these trends and suggest 3 innovative project ideas that:\n\
             1. Build upon these trends\n\
             2. Solve real problems\n\
             3. Are technically feasible\n\
             4. Have potential for impact\n\n\
             For each suggestion, provide:\n\
             - Project name\n\
             - Problem it solves\n\
             - Key features\n\
             - Technical stack\n\
             - Potential challenges",
            render(&trends_json)
        );
        let analysis = self.ctx.think(self.system_prompt(), &prompt).await?;

        self.ctx
            .remember(
                LATEST_TRENDS_KEY,
                json!({
                    "trends": trends_json,
                    "analysis": analysis,
                    "timestamp": Utc::now().to_rfc3339(),
                }),
                true,
            )
            .await;

        let suggestions = parse_or_degrade(
            self.role(),
            "project suggestions",
            self.ctx.parser().project_suggestions(&analysis),
        );
        info!(
            role = %self.role(),
            trends = trends.len(),
            suggestions = suggestions.value.len(),
            degraded = suggestions.degraded,
            "Trend analysis complete"
        );

        self.ctx.send(
            Role::Coordinator,
            json!({
                "trends": {
                    "trends": trends_json,
                    "analysis": analysis,
                    "project_suggestions": suggestions.value,
                },
                "status": "completed",
            }),
            DEFAULT_PRIORITY,
        )
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn role(&self) -> Role {
        Role::Researcher
    }

    fn context(&self) -> &AgentContext {
        &self.ctx
    }

    fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(RESEARCH_SYSTEM_PROMPT)
    }

    async fn handle(&self, message: Message) -> Result<()> {
        match message.task() {
            Some(ANALYZE_TRENDS) => self.analyze_trends(&message).await,
            _ => ignore(self.role(), &message),
        }
    }
}
