use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use jobweaver::config::Config;
use jobweaver::presentation::cli::commands::{CleanupCommand, ListCommand, NewCommand, RunCommand, RunOptions, ShowCommand, SubmitCommand};
use jobweaver::presentation::cli::{Cli, Commands};

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("jobweaver=debug,info")
    } else {
        EnvFilter::new("jobweaver=info")
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let config = Config::from_env();
    let run_dir = cli.store_dir.join("runs");

    match cli.command {
        Commands::New { name } => NewCommand::execute(&cli.store_dir, &name),
        Commands::Submit { name, header, command, job_name, depends } => {
            SubmitCommand::execute(&cli.store_dir, &name, header, command, job_name, depends)
        }
        Commands::Show { name } => ShowCommand::execute(&cli.store_dir, &run_dir, &name),
        Commands::Run { name, backend, workers, gpus, exclude_tags, block, monitor } => {
            let options = RunOptions {
                backend: backend.into(),
                num_workers: workers,
                gpu_ids: gpus,
                exclude_tags: jobweaver::value_objects::Tags::from_iter(exclude_tags),
                block,
                monitor,
            };
            RunCommand::execute(&cli.store_dir, &run_dir, &name, &options, &config)
        }
        Commands::List => ListCommand::execute(&cli.store_dir),
        Commands::Cleanup => CleanupCommand::execute(&config),
    }
}
