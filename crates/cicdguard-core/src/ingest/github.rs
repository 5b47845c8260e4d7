use super::{IngestOptions, IngestReport, Ingestor};
use crate::error::GuardResult;
use crate::graph::NodeHandle;
use crate::inventory::Inventory;
use crate::parser::{WorkflowDoc, WorkflowParser};
use crate::rules::actions;
use crate::schema::{
    ActionAction, ActionCommand, ActionJob, ActionRunner, ActionStep, ActionWorkflow,
    GithubOrganization, GithubRepository, NodeKind, Relation, Visibility,
};
use crate::snapshot::{GitHubSnapshot, TeamSnapshot};
use crate::store::GraphStore;
use tracing::{info, warn};

/// Ingest one organization/repository scan.
pub fn ingest_github<S: GraphStore>(
    inventory: &mut Inventory<S>,
    snapshot: &GitHubSnapshot,
    options: IngestOptions,
) -> GuardResult<IngestReport> {
    let mut ingestor = Ingestor::new(inventory, options);
    let org_name = snapshot.organization.name.clone();
    info!(organization = %org_name, repository = %snapshot.repository.name, "Ingesting GitHub scan");

    let org = ingestor.upsert(&snapshot.organization)?;
    let repo = ingestor.upsert(&snapshot.repository)?;
    ingestor.connect(org, Relation::PartOf, repo)?;

    for source in &snapshot.workflows {
        let doc = match WorkflowParser::parse(&source.content, source.path.clone()) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(path = %source.path, error = %err, "Skipping unparsable workflow");
                ingestor.report.skipped += 1;
                ingestor.report.problems.push(format!("{}: {:#}", source.path, err));
                continue;
            }
        };
        let result = ingestor.workflow(repo, snapshot.repository.visibility, &doc);
        ingestor.skip_recoverable(&source.path, result)?;
    }

    for team in &snapshot.teams {
        let result = ingestor.team(org, team);
        ingestor.skip_recoverable(&format!("team '{}'", team.team.name), result)?;
    }

    let findings = actions::evaluate_permissions(
        &org_name,
        &snapshot.repository.name,
        snapshot.workflow_permissions.as_ref(),
        snapshot.action_permissions.as_ref(),
    );
    ingestor.apply(findings)?;

    Ok(ingestor.finish())
}

/// Ingest workflow files read from disk for one repository.
///
/// The organization and repository are known only by name here, so an
/// already scanned node keeps its attributes. The repository's visibility is
/// replaced when `repository.visibility` is not [`Visibility::Unknown`].
pub fn ingest_workflows<S: GraphStore>(
    inventory: &mut Inventory<S>,
    organization: Option<&GithubOrganization>,
    repository: &GithubRepository,
    docs: &[WorkflowDoc],
    options: IngestOptions,
) -> GuardResult<IngestReport> {
    let mut ingestor = Ingestor::new(inventory, options);

    let (repo, visibility) = ingestor.merge_repository(repository)?;
    if let Some(organization) = organization {
        let org = ingestor.ensure(organization)?;
        ingestor.connect(org, Relation::PartOf, repo)?;
    }

    for doc in docs {
        let result = ingestor.workflow(repo, visibility, doc);
        ingestor.skip_recoverable(&doc.source_file, result)?;
    }

    Ok(ingestor.finish())
}

impl<S: GraphStore> Ingestor<'_, S> {
    /// Upsert a repository over its stored record, keeping the scanned
    /// security flags. Returns the handle and the effective visibility.
    fn merge_repository(
        &mut self,
        repository: &GithubRepository,
    ) -> GuardResult<(NodeHandle, Visibility)> {
        let stored = match self.inventory.find(NodeKind::GithubRepository, &repository.name)? {
            Some(handle) => self.inventory.record_of::<GithubRepository>(handle)?,
            None => None,
        };
        let merged = match stored {
            Some(mut stored) => {
                if repository.visibility != Visibility::Unknown {
                    stored.visibility = repository.visibility;
                }
                stored
            }
            None => repository.clone(),
        };
        let handle = self.upsert(&merged)?;
        Ok((handle, merged.visibility))
    }

    fn workflow(
        &mut self,
        repo: NodeHandle,
        visibility: Visibility,
        doc: &WorkflowDoc,
    ) -> GuardResult<()> {
        let workflow = self.upsert(&ActionWorkflow {
            name: doc.name.clone(),
            trigger: doc.trigger_summary(),
        })?;
        self.connect(workflow, Relation::Contains, repo)?;

        for job in &doc.jobs {
            let job_node = self.upsert(&ActionJob {
                name: job.name.clone(),
            })?;
            self.connect(job_node, Relation::Have, workflow)?;

            if job.has_known_runner() {
                let runner = self.upsert(&ActionRunner {
                    labels: job.runner_key(),
                })?;
                self.connect(runner, Relation::RunsOn, job_node)?;
            }

            for step in &job.steps {
                let step_node = self.upsert(&ActionStep {
                    name: step.name.clone(),
                })?;
                self.connect(step_node, Relation::Executes, job_node)?;

                if let Some(uses) = &step.uses {
                    let action = self.upsert(&ActionAction { name: uses.clone() })?;
                    self.connect(action, Relation::Uses, step_node)?;
                } else if let Some(run) = step.run.as_deref().filter(|r| !r.trim().is_empty()) {
                    let command = self.upsert(&ActionCommand {
                        command: run.to_string(),
                    })?;
                    self.connect(command, Relation::Runs, step_node)?;
                }
            }
        }

        self.apply(actions::evaluate_workflow(visibility, doc))
    }

    fn team(&mut self, org: NodeHandle, snapshot: &TeamSnapshot) -> GuardResult<()> {
        let team = self.upsert(&snapshot.team)?;
        self.connect(org, Relation::Has, team)?;

        for repository in &snapshot.repositories {
            let result = self
                .upsert(repository)
                .and_then(|repo| self.connect(team, Relation::Contributes, repo));
            let what = format!("team {} repository '{}'", snapshot.team.name, repository.name);
            self.skip_recoverable(&what, result)?;
        }

        for member in &snapshot.members {
            let result = self
                .upsert(member)
                .and_then(|user| self.connect(team, Relation::Member, user));
            let what = format!("team {} member '{}'", snapshot.team.name, member.name);
            self.skip_recoverable(&what, result)?;
        }
        Ok(())
    }
}
