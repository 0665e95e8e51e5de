//! Turning free-text reasoning output into typed structures.
//!
//! [`LineParser`] first looks for an embedded JSON object that carries the
//! shape's own keys, then falls back to line prefixes such as `Task:` or
//! `Project name:`. Callers wrap results in [`parse_or_degrade`] so a bad
//! response yields defaults instead of an error.

use agentnet_common::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("response is empty")]
    Empty,

    #[error("no {0} found in response")]
    NoStructure(&'static str),

    #[error("embedded JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coordinator's reading of the current situation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SituationAnalysis {
    #[serde(default)]
    pub efficiency: String,
    #[serde(default, alias = "resource_allocation")]
    pub resources: String,
    #[serde(default)]
    pub priorities: String,
    #[serde(default)]
    pub bottlenecks: String,
}

impl Default for SituationAnalysis {
    fn default() -> Self {
        Self {
            efficiency: "unknown".into(),
            resources: String::new(),
            priorities: String::new(),
            bottlenecks: String::new(),
        }
    }
}

/// One task assignment chosen by the coordinator for this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub task: String,
    pub target: Role,
    pub priority: u32,
    pub context: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSuggestion {
    pub name: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub challenges: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureDesign {
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub data_flow: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeReview {
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Withheld unless the reviewer says otherwise.
    #[serde(default)]
    pub approval: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        [Self::Critical, Self::High, Self::Medium, Self::Low]
            .into_iter()
            .find(|level| label.contains(level.as_str()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityAudit {
    #[serde(default)]
    pub vulnerabilities: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

/// Converts reasoning output into the shape each role expects.
pub trait ResponseParser: Send + Sync {
    fn situation_analysis(&self, text: &str) -> Result<SituationAnalysis, ParseError>;
    /// Decisions naming an unknown role are dropped.
    fn decisions(&self, text: &str) -> Result<Vec<Decision>, ParseError>;
    fn project_suggestions(&self, text: &str) -> Result<Vec<ProjectSuggestion>, ParseError>;
    fn architecture(&self, text: &str) -> Result<ArchitectureDesign, ParseError>;
    fn code_review(&self, text: &str) -> Result<CodeReview, ParseError>;
    fn security_audit(&self, text: &str) -> Result<SecurityAudit, ParseError>;
    /// Source code from fenced blocks, or the whole response if it has none.
    fn code(&self, text: &str) -> Result<String, ParseError>;
}

/// A parse result that may have fallen back to defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub degraded: bool,
}

/// Replace a parse failure with `T::default()`, flagged as degraded.
pub fn parse_or_degrade<T: Default>(
    role: Role,
    what: &str,
    result: Result<T, ParseError>,
) -> Parsed<T> {
    match result {
        Ok(value) => Parsed {
            value,
            degraded: false,
        },
        Err(e) => {
            warn!(role = %role, shape = what, error = %e, "Unparseable response, using defaults");
            Parsed {
                value: T::default(),
                degraded: true,
            }
        }
    }
}

/// Default parser: embedded JSON first, then labelled lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineParser;

impl LineParser {
    pub fn new() -> Self {
        Self
    }
}

fn non_empty(text: &str) -> Result<&str, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(ParseError::Empty)
    } else {
        Ok(trimmed)
    }
}

/// The text between the first `{` and the last `}`, if it parses.
fn embedded_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Embedded JSON that names at least one of `keys`.
///
/// Stray braces such as an echoed `{}` or a quoted `fn f() {}` do not count.
fn shaped_json(text: &str, keys: &[&str]) -> Option<Value> {
    embedded_json(text).filter(|json| {
        json.as_object()
            .is_some_and(|object| keys.iter().any(|key| object.contains_key(*key)))
    })
}

/// Normalized lines with list bullets and emphasis stripped.
fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim()
                .trim_matches('*')
                .trim()
        })
        .filter(|line| !line.is_empty())
}

/// The value after `label:` when `line` starts with it, ignoring case.
fn field<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = line[label.len()..].trim_start_matches('*').trim_start();
    rest.strip_prefix(':').map(|value| value.trim().trim_matches('*').trim())
}

/// Like [`field`], trying each spelling of the label in turn.
fn any_field<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    labels.iter().find_map(|label| field(line, label))
}

/// `n.` at the start of a line, followed by whitespace or nothing.
fn numbered_section(line: &str, n: usize) -> Option<&str> {
    line.strip_prefix(&format!("{n}."))
        .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        .map(str::trim)
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    ["yes", "true", "approve", "approved", "lgtm", "pass"]
        .iter()
        .any(|word| value.starts_with(word))
}

/// The array under the first of `keys` present in `value`.
fn json_array<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter().find_map(|key| value.get(*key)).and_then(Value::as_array)
}

fn value_as_u32(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.unwrap_or(1).max(1)
}

fn decision_from_json(raw: &Value) -> Option<Decision> {
    let task = raw.get("task")?.as_str()?.trim().to_string();
    let target = ["target", "agent", "role", "to"]
        .iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_str))?
        .parse::<Role>()
        .ok()?;
    Some(Decision {
        task,
        target,
        priority: value_as_u32(raw.get("priority")),
        context: raw.get("context").cloned().unwrap_or(Value::Null),
    })
}

/// A decision under construction from labelled lines.
#[derive(Default)]
struct PendingDecision {
    task: Option<String>,
    target: Option<String>,
    priority: u32,
    context: Value,
}

impl PendingDecision {
    fn finish(self) -> Option<Decision> {
        let task = self.task?;
        let target = match self.target?.parse::<Role>() {
            Ok(role) => role,
            Err(_) => return None,
        };
        Some(Decision {
            task,
            target,
            priority: self.priority.max(1),
            context: self.context,
        })
    }
}

impl ResponseParser for LineParser {
    fn situation_analysis(&self, text: &str) -> Result<SituationAnalysis, ParseError> {
        let text = non_empty(text)?;
        let keys = ["efficiency", "resources", "resource_allocation", "priorities", "bottlenecks"];
        if let Some(json) = shaped_json(text, &keys) {
            return Ok(serde_json::from_value(json)?);
        }

        // Numbered sections 1. to 4., each running until the next.
        let mut sections: [Vec<&str>; 4] = Default::default();
        let mut current: Option<usize> = None;
        for line in lines(text) {
            let numbered = (1..=4).find_map(|n| numbered_section(line, n).map(|rest| (n, rest)));
            match numbered {
                Some((n, rest)) => {
                    current = Some(n - 1);
                    if !rest.is_empty() {
                        sections[n - 1].push(rest);
                    }
                }
                None => {
                    if let Some(idx) = current {
                        sections[idx].push(line);
                    }
                }
            }
        }

        if current.is_none() {
            return Err(ParseError::NoStructure("numbered analysis sections"));
        }

        let [efficiency, resources, priorities, bottlenecks] = sections.map(|s| s.join("\n"));
        Ok(SituationAnalysis {
            efficiency,
            resources,
            priorities,
            bottlenecks,
        })
    }

    fn decisions(&self, text: &str) -> Result<Vec<Decision>, ParseError> {
        let text = non_empty(text)?;
        if let Some(json) = embedded_json(text) {
            if let Some(items) = json_array(&json, &["decisions", "tasks"]) {
                return Ok(items.iter().filter_map(decision_from_json).collect());
            }
            if let Some(decision) = decision_from_json(&json) {
                return Ok(vec![decision]);
            }
        }

        let mut decisions = Vec::new();
        let mut pending: Option<PendingDecision> = None;
        for line in lines(text) {
            if let Some(task) = field(line, "Task") {
                if let Some(done) = pending.take().and_then(PendingDecision::finish) {
                    decisions.push(done);
                }
                pending = Some(PendingDecision {
                    task: Some(task.to_string()),
                    priority: 1,
                    ..Default::default()
                });
            } else if let Some(current) = pending.as_mut() {
                if let Some(agent) = field(line, "Agent") {
                    current.target = Some(agent.to_string());
                } else if let Some(priority) = field(line, "Priority") {
                    current.priority = priority.parse().unwrap_or(1);
                } else if let Some(context) = field(line, "Context") {
                    current.context = Value::String(context.to_string());
                }
            }
        }
        if let Some(done) = pending.take().and_then(PendingDecision::finish) {
            decisions.push(done);
        }

        if decisions.is_empty() && !lines(text).any(|l| field(l, "Task").is_some()) {
            return Err(ParseError::NoStructure("Task: lines"));
        }
        Ok(decisions)
    }

    fn project_suggestions(&self, text: &str) -> Result<Vec<ProjectSuggestion>, ParseError> {
        let text = non_empty(text)?;
        if let Some(json) = embedded_json(text) {
            if let Some(items) = json_array(&json, &["project_suggestions", "projects", "suggestions"]) {
                return Ok(items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect());
            }
        }

        let mut suggestions = Vec::new();
        let mut current: Option<ProjectSuggestion> = None;
        for line in lines(text) {
            if let Some(name) = field(line, "Project name") {
                suggestions.extend(current.take());
                current = Some(ProjectSuggestion {
                    name: name.to_string(),
                    ..Default::default()
                });
                continue;
            }
            let Some(project) = current.as_mut() else {
                continue;
            };
            if let Some(v) = field(line, "Problem") {
                project.problem = v.to_string();
            } else if let Some(v) = field(line, "Features") {
                project.features = v.to_string();
            } else if let Some(v) = field(line, "Stack") {
                project.stack = v.to_string();
            } else if let Some(v) = field(line, "Challenges") {
                project.challenges = v.to_string();
            }
        }
        suggestions.extend(current);

        if suggestions.is_empty() {
            return Err(ParseError::NoStructure("Project name: lines"));
        }
        Ok(suggestions)
    }

    fn architecture(&self, text: &str) -> Result<ArchitectureDesign, ParseError> {
        let text = non_empty(text)?;
        if let Some(json) = shaped_json(text, &["components", "interfaces", "data_flow"]) {
            return Ok(serde_json::from_value(json)?);
        }

        let mut design = ArchitectureDesign::default();
        for line in lines(text) {
            if let Some(v) = any_field(line, &["Component", "Components"]) {
                design.components.push(v.to_string());
            } else if let Some(v) = any_field(line, &["Interface", "Interfaces"]) {
                design.interfaces.push(v.to_string());
            } else if let Some(v) = field(line, "Data flow") {
                design.data_flow.push(v.to_string());
            }
        }

        if design == ArchitectureDesign::default() {
            return Err(ParseError::NoStructure("Component:/Interface:/Data flow: lines"));
        }
        Ok(design)
    }

    fn code_review(&self, text: &str) -> Result<CodeReview, ParseError> {
        let text = non_empty(text)?;
        if let Some(json) = shaped_json(text, &["issues", "suggestions", "approval"]) {
            return Ok(serde_json::from_value(json)?);
        }

        let mut review = CodeReview::default();
        let mut labelled = false;
        for line in lines(text) {
            if let Some(v) = any_field(line, &["Issue", "Issues"]) {
                review.issues.push(v.to_string());
                labelled = true;
            } else if let Some(v) = any_field(line, &["Suggestion", "Suggestions"]) {
                review.suggestions.push(v.to_string());
                labelled = true;
            } else if let Some(v) = field(line, "Approval") {
                review.approval = parse_flag(v);
                labelled = true;
            }
        }

        if !labelled {
            return Err(ParseError::NoStructure("Issue:/Suggestion:/Approval: lines"));
        }
        Ok(review)
    }

    fn security_audit(&self, text: &str) -> Result<SecurityAudit, ParseError> {
        let text = non_empty(text)?;
        if let Some(json) = shaped_json(text, &["vulnerabilities", "recommendations", "risk_level"]) {
            return Ok(serde_json::from_value(json)?);
        }

        let mut audit = SecurityAudit::default();
        let mut labelled = false;
        for line in lines(text) {
            if let Some(v) = any_field(line, &["Vulnerability", "Vulnerabilities"]) {
                audit.vulnerabilities.push(v.to_string());
                labelled = true;
            } else if let Some(v) = any_field(line, &["Recommendation", "Recommendations"]) {
                audit.recommendations.push(v.to_string());
                labelled = true;
            } else if let Some(v) = field(line, "Risk level").or_else(|| field(line, "Risk")) {
                if let Some(level) = RiskLevel::from_label(v) {
                    audit.risk_level = level;
                }
                labelled = true;
            }
        }

        if !labelled {
            return Err(ParseError::NoStructure("Vulnerability:/Recommendation:/Risk: lines"));
        }
        Ok(audit)
    }

    fn code(&self, text: &str) -> Result<String, ParseError> {
        let text = non_empty(text)?;

        let mut blocks = Vec::new();
        let mut current: Option<Vec<&str>> = None;
        for line in text.lines() {
            if line.trim_start().starts_with("```") {
                match current.take() {
                    Some(block) => blocks.push(block.join("\n")),
                    None => current = Some(Vec::new()),
                }
            } else if let Some(block) = current.as_mut() {
                block.push(line);
            }
        }
        // An unterminated fence still counts.
        if let Some(block) = current {
            blocks.push(block.join("\n"));
        }

        if blocks.is_empty() {
            return Ok(text.to_string());
        }
        Ok(blocks.join("\n\n"))
    }
}
