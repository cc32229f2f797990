use crate::demo::{run_costs, run_demo, run_resolve, run_validate, CostsArgs, ResolveArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use configurator::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Product Configurator",
    about = "Resolve product configurations, material eligibility, labor, and pricing",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Resolve one configuration and print components, materials, labor, and prices
    Resolve(ResolveArgs),
    /// Check a rule catalog and list every configuration error
    Validate(CatalogArgs),
    /// Recompute labor costs for every product in one business unit
    Costs(CostsArgs),
    /// Walk through the built-in fence catalog
    Demo,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct CatalogArgs {
    /// JSON rule catalog. Defaults to the built-in sample catalog.
    #[arg(long)]
    pub(crate) rules: Option<PathBuf>,
    /// Material catalog CSV export merged over the catalog's materials
    #[arg(long)]
    pub(crate) materials: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Resolve(args) => run_resolve(args),
        Command::Validate(args) => run_validate(args),
        Command::Costs(args) => run_costs(args),
        Command::Demo => run_demo(),
    }
}
