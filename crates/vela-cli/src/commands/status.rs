//! Status command - show the state of an application

use clap::Args;
use console::style;
use vela_core::Application;
use vela_kube::ApplicationStore;

use crate::display::{OutputFormat, print_structured};
use crate::error::Result;
use crate::factory::{Factory, NamespaceArgs};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Application name
    pub name: String,

    #[command(flatten)]
    pub namespace: NamespaceArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

/// Run the status command
pub async fn run(factory: &Factory, args: StatusArgs) -> Result<()> {
    let namespace = factory.namespace(&args.namespace)?;
    let store = factory.store().await?;
    let app = store.get(&namespace, &args.name).await?;

    if print_structured(&app.status, args.output)? {
        return Ok(());
    }
    print!("{}", summary(&app));
    Ok(())
}

/// Human readable summary of phase, workflow, services and latest revision
fn summary(app: &Application) -> String {
    let mut out = String::new();
    let phase = match app.phase() {
        "" => "unknown",
        phase => phase,
    };

    out.push_str("About:\n\n");
    out.push_str(&format!("  Name:       {}\n", app.metadata.name.as_deref().unwrap_or("")));
    out.push_str(&format!("  Namespace:  {}\n", app.metadata.namespace.as_deref().unwrap_or("")));
    if let Some(created) = &app.metadata.creation_timestamp {
        out.push_str(&format!("  Created at: {}\n", created.0.format("%Y-%m-%d %H:%M:%S %z")));
    }
    out.push_str(&format!("  Status:     {}\n", phase));
    if let Some(version) = app.publish_version() {
        out.push_str(&format!("  Publish:    {}\n", version));
    }

    let Some(status) = &app.status else {
        return out;
    };

    if let Some(revision) = &status.latest_revision {
        out.push_str(&format!("  Revision:   {}\n", revision.name));
    }

    if let Some(workflow) = &status.workflow {
        out.push_str("\nWorkflow:\n\n");
        out.push_str(&format!("  Phase:      {}\n", workflow.status.as_deref().unwrap_or("")));
        out.push_str(&format!("  Finished:   {}\n", workflow.finished));
        out.push_str(&format!("  Suspend:    {}\n", workflow.suspend));
        out.push_str(&format!("  Terminated: {}\n", workflow.terminated));
        if let Some(message) = workflow.message.as_deref().filter(|m| !m.is_empty()) {
            out.push_str(&format!("  Message:    {}\n", message));
        }
    }

    if !status.services.is_empty() {
        out.push_str("\nServices:\n\n");
        for service in &status.services {
            let health = if service.healthy {
                style("Healthy").green().to_string()
            } else {
                style("Unhealthy").red().to_string()
            };
            out.push_str(&format!("  - Name: {}\n", service.name));
            out.push_str(&format!(
                "    Cluster: {}  Namespace: {}\n",
                service.cluster.as_deref().unwrap_or("local"),
                service.namespace.as_deref().unwrap_or("")
            ));
            if let Some(component) = app.component(&service.name) {
                out.push_str(&format!("    Type: {}\n", component.component_type));
            }
            match service.message.as_deref().filter(|m| !m.is_empty()) {
                Some(message) => out.push_str(&format!("    {} {}\n", health, message)),
                None => out.push_str(&format!("    {}\n", health)),
            }
            if !service.traits.is_empty() {
                out.push_str("    Traits:\n");
                for t in &service.traits {
                    let mark = if t.healthy { style("✓").green() } else { style("✗").red() };
                    out.push_str(&format!("      {} {}", mark, t.trait_type));
                    if let Some(message) = t.message.as_deref().filter(|m| !m.is_empty()) {
                        out.push_str(&format!(": {}", message));
                    }
                    out.push('\n');
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::{ApplicationSpec, ApplicationStatus, ComponentStatus, RevisionRef};

    #[test]
    fn test_summary_without_status() {
        let mut app = Application::new("web", ApplicationSpec::default());
        app.metadata.namespace = Some("default".into());
        let text = summary(&app);
        assert!(text.contains("Name:       web"));
        assert!(text.contains("Status:     unknown"));
        assert!(!text.contains("Services"));
    }

    #[test]
    fn test_summary_with_services() {
        let mut app = Application::new("web", ApplicationSpec::default());
        app.status = Some(ApplicationStatus {
            status: Some("running".into()),
            services: vec![ComponentStatus {
                name: "frontend".into(),
                namespace: Some("default".into()),
                healthy: true,
                ..Default::default()
            }],
            latest_revision: Some(RevisionRef {
                name: "web-v2".into(),
                revision: 2,
                revision_hash: String::new(),
            }),
            ..Default::default()
        });
        let text = summary(&app);
        assert!(text.contains("Status:     running"));
        assert!(text.contains("Revision:   web-v2"));
        assert!(text.contains("- Name: frontend"));
        assert!(text.contains("Cluster: local  Namespace: default"));
    }
}
