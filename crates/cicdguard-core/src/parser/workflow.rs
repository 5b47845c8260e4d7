use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;

/// One step of a workflow job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    pub uses: Option<String>,
    pub run: Option<String>,
}

/// A job with its runner labels and steps, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowJob {
    pub id: String,
    pub name: String,
    pub runs_on: Vec<String>,
    /// Reusable workflow called by the job (`jobs.<id>.uses`).
    #[serde(default)]
    pub uses: Option<String>,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowJob {
    /// Natural key of the runner node this job runs on.
    pub fn runner_key(&self) -> String {
        self.runs_on.join(",")
    }

    pub fn is_self_hosted(&self) -> bool {
        self.runs_on.iter().any(|label| label == "self-hosted")
    }

    /// False for jobs that only call a reusable workflow; the called
    /// workflow picks the runner.
    pub fn has_known_runner(&self) -> bool {
        !self.runs_on.is_empty()
    }
}

/// A parsed GitHub Actions workflow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDoc {
    pub name: String,
    pub source_file: String,
    pub triggers: Vec<String>,
    pub jobs: Vec<WorkflowJob>,
}

impl WorkflowDoc {
    /// Trigger events as stored on the workflow node.
    pub fn trigger_summary(&self) -> String {
        self.triggers.join(",")
    }
}

/// Parser for GitHub Actions workflow YAML files.
pub struct WorkflowParser;

impl WorkflowParser {
    pub fn parse_file(path: &Path) -> Result<WorkflowDoc> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;
        Self::parse(&content, path.to_string_lossy().to_string())
    }

    /// Parse workflow YAML. A missing `name` falls back to the source path.
    pub fn parse(content: &str, source_file: String) -> Result<WorkflowDoc> {
        let yaml: Value = serde_yaml::from_str(content).context("Failed to parse YAML")?;

        let name = yaml
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| source_file.clone());

        let jobs = yaml
            .get("jobs")
            .and_then(|v| v.as_mapping())
            .context("No 'jobs' section found in workflow")?;

        let jobs = jobs
            .iter()
            .map(|(job_id, config)| {
                let job_id = job_id.as_str().unwrap_or("unknown");
                Self::parse_job(job_id, config)
            })
            .collect();

        Ok(WorkflowDoc {
            name,
            triggers: Self::parse_triggers(&yaml),
            source_file,
            jobs,
        })
    }

    fn parse_triggers(yaml: &Value) -> Vec<String> {
        match yaml.get("on") {
            Some(Value::String(event)) => vec![event.clone()],
            Some(Value::Sequence(events)) => events
                .iter()
                .filter_map(|e| e.as_str().map(String::from))
                .collect(),
            Some(Value::Mapping(map)) => map
                .keys()
                .filter_map(|e| e.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn parse_job(job_id: &str, config: &Value) -> WorkflowJob {
        let name = config
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(job_id)
            .to_string();

        let runs_on = config
            .get("runs-on")
            .map(Self::parse_runs_on)
            .unwrap_or_default();

        let uses = config
            .get("uses")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string());

        let steps = config
            .get("steps")
            .and_then(|v| v.as_sequence())
            .map(|steps| steps.iter().map(Self::parse_step).collect())
            .unwrap_or_default();

        WorkflowJob {
            id: job_id.to_string(),
            name,
            runs_on,
            uses,
            steps,
        }
    }

    /// `runs-on` may be a label, a list of labels, or a `{group, labels}` map.
    fn parse_runs_on(value: &Value) -> Vec<String> {
        match value {
            Value::String(label) => vec![label.clone()],
            Value::Sequence(labels) => labels
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            Value::Mapping(_) => {
                let mut labels = value
                    .get("labels")
                    .map(Self::parse_runs_on)
                    .unwrap_or_default();
                if let Some(group) = value.get("group").and_then(|v| v.as_str()) {
                    labels.push(format!("group:{}", group));
                }
                labels
            }
            _ => Vec::new(),
        }
    }

    fn parse_step(step: &Value) -> WorkflowStep {
        let uses = step
            .get("uses")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string());

        let run = step.get("run").and_then(|v| v.as_str()).map(String::from);

        let name = step
            .get("name")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| uses.clone())
            .or_else(|| {
                run.as_deref()
                    .and_then(|r| r.lines().map(str::trim).find(|l| !l.is_empty()))
                    .map(String::from)
            })
            .unwrap_or_else(|| "Unnamed step".to_string());

        WorkflowStep { name, uses, run }
    }
}
