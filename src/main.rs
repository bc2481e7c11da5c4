use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scriptorium::build::{build_site, check, BuildReport};
use scriptorium::config::{Config, Overrides};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "scriptorium")]
#[command(about = "Static site generator for a technical blog")]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every published post, index, and the feed
    Build {
        /// Directory holding `scriptorium.yaml`, or any directory below it
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Output directory (default: `_output` next to the project file)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Threads used to parse posts
        #[arg(long)]
        threads: Option<usize>,

        /// Hold back posts dated in the future
        #[arg(long)]
        exclude_future: bool,
    },

    /// Load every post and report problems without writing anything
    Check {
        /// Directory holding `scriptorium.yaml`, or any directory below it
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let default_filter = match cli.verbose {
        true => "scriptorium=debug",
        false => "scriptorium=info",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Build {
            project,
            output,
            threads,
            exclude_future,
        } => {
            let config = Config::from_directory(
                &project,
                &Overrides {
                    output_directory: output,
                    threads,
                    exclude_future,
                },
            )
            .context("loading configuration")?;
            let report = build_site(&config).context("building site")?;
            print_report(&report);
            println!(
                "wrote {} posts and {} index pages to {}",
                report.written.post_pages,
                report.written.index_pages,
                config.output_directory.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { project } => {
            let config = Config::from_directory(&project, &Overrides::default())
                .context("loading configuration")?;
            let report = check(&config).context("checking posts")?;
            print_report(&report);
            println!("{} posts, {} published", report.posts, report.published);
            Ok(match report.failures.is_empty() {
                true => ExitCode::SUCCESS,
                false => ExitCode::FAILURE,
            })
        }
    }
}

fn print_report(report: &BuildReport) {
    for failure in &report.failures {
        println!("skipped {}: {}", failure.path.display(), failure.error);
    }
    for cycle in &report.cycles {
        println!("{} ({})", cycle, cycle.members.join(" -> "));
    }
}
