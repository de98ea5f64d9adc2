//! vela - the KubeVela command line

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;
mod factory;

use commands::{
    addon, adopt, apprev, config, cuex, def, delete, dryrun, env, install, list, livediff, pods, ql, registry, scale,
    status, up, version, workflow,
};
use error::Result;
use factory::Factory;

/// Environment variable holding the log filter
const LOG_ENV: &str = "VELA_LOG";

#[derive(Parser)]
#[command(name = "vela")]
#[command(author = "KubeVela Contributors")]
#[command(version)]
#[command(about = "Deliver and operate applications on Kubernetes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Path to the kubeconfig file
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install or upgrade the KubeVela control plane
    Install(install::InstallArgs),

    /// Uninstall the KubeVela control plane
    Uninstall(install::UninstallArgs),

    /// Deploy an application from a file, or re-run an existing one
    Up(up::UpArgs),

    /// List applications
    #[command(alias = "list")]
    Ls(list::ListArgs),

    /// Show the status of an application
    Status(status::StatusArgs),

    /// Delete applications
    Delete(delete::DeleteArgs),

    /// Scale a component of an application
    Scale(scale::ScaleArgs),

    /// Execute a command in a pod of an application
    Exec(pods::ExecArgs),

    /// Forward a local port to a pod of an application
    PortForward(pods::PortForwardArgs),

    /// Print the logs of a pod of an application
    Logs(pods::LogsArgs),

    /// Render an application locally without deploying it
    DryRun(dryrun::DryRunArgs),

    /// Compare a local application with the deployed one
    LiveDiff(livediff::LiveDiffArgs),

    /// Manage addons
    #[command(subcommand)]
    Addon(addon::AddonCommand),

    /// Manage addon registries
    #[command(subcommand)]
    Registry(registry::TopRegistryCommand),

    /// Manage environments
    #[command(subcommand)]
    Env(env::EnvCommand),

    /// List trait definitions
    Trait(def::TraitArgs),

    /// List component definitions
    Component(def::ComponentArgs),

    /// Inspect definitions
    #[command(subcommand)]
    Def(def::DefCommand),

    /// Manage configs
    #[command(subcommand)]
    Config(config::ConfigCommand),

    /// Manage config templates
    #[command(subcommand)]
    ConfigTemplate(config::ConfigTemplateCommand),

    /// Adopt existing workloads into an application
    Adopt(adopt::AdoptArgs),

    /// Manage application revisions
    #[command(subcommand)]
    Apprev(apprev::ApprevCommand),

    /// Operate the delivery workflow of an application
    #[command(subcommand)]
    Workflow(workflow::WorkflowCommand),

    /// Run VelaQL queries and manage views
    Ql(ql::QlArgs),

    /// Evaluate CUE files
    #[command(subcommand)]
    Cuex(cuex::CuexCommand),

    /// Print version information
    Version(version::VersionArgs),
}

fn init_logging(debug: bool) {
    let fallback = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the command; the returned code is the process exit code
async fn run(cli: Cli) -> Result<i32> {
    let factory = Factory::new(cli.kubeconfig, cli.context);
    let f = &factory;

    match cli.command {
        Commands::Install(args) => install::install(f, args).await?,
        Commands::Uninstall(args) => install::uninstall(f, args).await?,
        Commands::Up(args) => up::run(f, args).await?,
        Commands::Ls(args) => list::run(f, args).await?,
        Commands::Status(args) => status::run(f, args).await?,
        Commands::Delete(args) => delete::run(f, args).await?,
        Commands::Scale(args) => scale::run(f, args).await?,
        Commands::Exec(args) => return pods::exec(f, args).await,
        Commands::PortForward(args) => pods::port_forward(f, args).await?,
        Commands::Logs(args) => pods::logs(f, args).await?,
        Commands::DryRun(args) => dryrun::run(f, args).await?,
        Commands::LiveDiff(args) => livediff::run(f, args).await?,
        Commands::Addon(command) => addon::run(f, command).await?,
        Commands::Registry(command) => registry::run_top(f, command)?,
        Commands::Env(command) => env::run(f, command)?,
        Commands::Trait(args) => def::traits(f, args).await?,
        Commands::Component(args) => def::components(f, args).await?,
        Commands::Def(command) => def::run(f, command).await?,
        Commands::Config(command) => config::run(f, command).await?,
        Commands::ConfigTemplate(command) => config::run_template(f, command).await?,
        Commands::Adopt(args) => adopt::run(f, args).await?,
        Commands::Apprev(command) => apprev::run(f, command).await?,
        Commands::Workflow(command) => workflow::run(f, command).await?,
        Commands::Ql(args) => ql::run(f, args).await?,
        Commands::Cuex(command) => cuex::run(command).await?,
        Commands::Version(args) => version::run(&args),
    }
    Ok(exit_codes::SUCCESS)
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are reported through clap errors too
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    if cli.debug {
        // SAFETY: We're the only thread at this point (start of main)
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    init_logging(cli.debug);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start runtime: {}", e);
            std::process::exit(exit_codes::ERROR);
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}
