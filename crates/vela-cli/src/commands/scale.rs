//! Scale command - set the replicas of a component

use clap::Args;
use vela_kube::actions;

use crate::display::success;
use crate::error::Result;
use crate::factory::{Factory, NamespaceArgs};

#[derive(Args, Debug)]
pub struct ScaleArgs {
    /// Application name
    pub app: String,

    /// Component to scale
    pub component: String,

    /// Number of replicas
    #[arg(long)]
    pub replicas: u32,

    #[command(flatten)]
    pub namespace: NamespaceArgs,
}

/// Run the scale command
pub async fn run(factory: &Factory, args: ScaleArgs) -> Result<()> {
    let namespace = factory.namespace(&args.namespace)?;
    let store = factory.store().await?;
    actions::scale(&store, &namespace, &args.app, &args.component, args.replicas).await?;
    success(format!(
        "component {} of application {}/{} scaled to {} replica(s)",
        args.component, namespace, args.app, args.replicas
    ));
    Ok(())
}
