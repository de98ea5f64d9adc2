//! Adopt command - wrap existing workloads into an application

use std::path::PathBuf;

use clap::Args;
use vela_kube::ApplicationStore;
use vela_kube::adopt::{self, DEFAULT_TYPE, WorkloadRef};

use crate::display::success;
use crate::error::Result;
use crate::factory::{Factory, NamespaceArgs};

#[derive(Args, Debug)]
pub struct AdoptArgs {
    /// Workloads to adopt, as `type/name` or `name`
    #[arg(required = true)]
    pub resources: Vec<String>,

    /// Name of the application, `<first workload>-adopted` by default
    #[arg(long)]
    pub app_name: Option<String>,

    /// Type of workloads given without one
    #[arg(short = 't', long = "type", default_value = DEFAULT_TYPE)]
    pub resource_type: String,

    /// Apply the application instead of writing it to a file
    #[arg(long)]
    pub apply: bool,

    #[command(flatten)]
    pub namespace: NamespaceArgs,
}

/// Run the adopt command
pub async fn run(factory: &Factory, args: AdoptArgs) -> Result<()> {
    let refs = args
        .resources
        .iter()
        .map(|r| WorkloadRef::parse(r, &args.resource_type))
        .collect::<vela_kube::Result<Vec<_>>>()?;
    let namespace = factory.namespace(&args.namespace)?;

    let client = factory.client().await?;
    let objects = adopt::fetch_workloads(&client, &namespace, &refs).await?;
    let app_name = args.app_name.clone().unwrap_or_else(|| adopt::default_app_name(&refs));
    let app = adopt::build_application(&app_name, &namespace, &objects);

    if args.apply {
        factory.store().await?.apply(&app).await?;
        success(format!("Application {}/{} adopted {} workload(s)", namespace, app_name, objects.len()));
        return Ok(());
    }

    let path = PathBuf::from(format!("{}.yaml", app_name));
    std::fs::write(&path, serde_yaml::to_string(&app)?)?;
    success(format!("Application written to {}", path.display()));
    println!("Run 'vela up -f {}' to deploy it", path.display());
    Ok(())
}
