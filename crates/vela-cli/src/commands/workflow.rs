//! Workflow commands - control the delivery workflow of an application

use clap::Subcommand;
use vela_kube::workflow::{self, ResumeOutcome, RollbackOutcome};

use crate::display::success;
use crate::error::Result;
use crate::factory::{Factory, NamespaceArgs};

#[derive(Subcommand, Debug)]
pub enum WorkflowCommand {
    /// Suspend a running workflow
    Suspend {
        /// Application name
        app: String,

        /// Only this step of the workflow
        #[arg(short, long)]
        step: Option<String>,

        #[command(flatten)]
        namespace: NamespaceArgs,
    },

    /// Resume a suspended workflow
    Resume {
        /// Application name
        app: String,

        /// Only this step of the workflow
        #[arg(short, long)]
        step: Option<String>,

        #[command(flatten)]
        namespace: NamespaceArgs,
    },

    /// Terminate a workflow
    Terminate {
        /// Application name
        app: String,

        #[command(flatten)]
        namespace: NamespaceArgs,
    },

    /// Restart a workflow, or re-run it from a step
    Restart {
        /// Application name
        app: String,

        /// Re-run from this step
        #[arg(short, long)]
        step: Option<String>,

        #[command(flatten)]
        namespace: NamespaceArgs,
    },

    /// Roll an application back to its last succeeded revision
    Rollback {
        /// Application name
        app: String,

        #[command(flatten)]
        namespace: NamespaceArgs,
    },
}

fn done_message(action: &str, app: &str, step: Option<&str>) -> String {
    match step {
        Some(step) => format!("Successfully {} workflow {} from step {}", action, app, step),
        None => format!("Successfully {} workflow: {}", action, app),
    }
}

/// Empty `--step` values mean the whole workflow
fn step_filter(step: &Option<String>) -> Option<&str> {
    step.as_deref().filter(|s| !s.is_empty())
}

/// Run a workflow subcommand
pub async fn run(factory: &Factory, command: WorkflowCommand) -> Result<()> {
    match command {
        WorkflowCommand::Suspend { app, step, namespace } => {
            let namespace = factory.namespace(&namespace)?;
            let step = step_filter(&step);
            workflow::suspend(&factory.store().await?, &namespace, &app, step).await?;
            success(done_message("suspend", &app, step));
        }
        WorkflowCommand::Resume { app, step, namespace } => {
            let namespace = factory.namespace(&namespace)?;
            let step = step_filter(&step);
            match workflow::resume(&factory.store().await?, &namespace, &app, step).await? {
                ResumeOutcome::Resumed => success(done_message("resume", &app, step)),
                ResumeOutcome::NotSuspended => println!("workflow {} is not suspended.", app),
            }
        }
        WorkflowCommand::Terminate { app, namespace } => {
            let namespace = factory.namespace(&namespace)?;
            workflow::terminate(&factory.store().await?, &namespace, &app).await?;
            success(done_message("terminate", &app, None));
        }
        WorkflowCommand::Restart { app, step, namespace } => {
            let namespace = factory.namespace(&namespace)?;
            let step = step_filter(&step);
            workflow::restart(&factory.store().await?, &namespace, &app, step).await?;
            success(done_message("restart", &app, step));
        }
        WorkflowCommand::Rollback { app, namespace } => {
            let namespace = factory.namespace(&namespace)?;
            match workflow::rollback(&factory.store().await?, &namespace, &app).await? {
                RollbackOutcome::LatestRevision(revision) => success(format!(
                    "Successfully rollback workflow of {} to the latest revision {}",
                    app, revision
                )),
                RollbackOutcome::Published {
                    revision,
                    publish_version,
                } => success(format!(
                    "Successfully rollback application {} to revision {} (PublishVersion: {})",
                    app, revision, publish_version
                )),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_message() {
        assert_eq!(done_message("suspend", "web", None), "Successfully suspend workflow: web");
        assert_eq!(
            done_message("restart", "web", Some("deploy-prod")),
            "Successfully restart workflow web from step deploy-prod"
        );
    }

    #[test]
    fn test_empty_step_means_whole_workflow() {
        assert_eq!(step_filter(&Some(String::new())), None);
        assert_eq!(step_filter(&Some("deploy".to_string())), Some("deploy"));
        assert_eq!(step_filter(&None), None);
    }
}
