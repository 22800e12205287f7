use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;

use pagefeed::config::Config;
use pagefeed::feed::Fetcher;
use pagefeed::pipeline::{run_target, write_feed};

#[derive(Parser, Debug)]
#[command(name = "pagefeed", about = "Generate RSS feeds from regulator announcement pages")]
struct Args {
    /// Configuration file (missing file uses the built-in target)
    #[arg(long, value_name = "FILE", default_value = "pagefeed.toml")]
    config: PathBuf,

    /// Only process the target with this name
    #[arg(long, value_name = "NAME")]
    target: Option<String>,

    /// Write the feed here instead of the target's configured path
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the feed to stdout instead of writing a file
    #[arg(long, conflicts_with = "output")]
    stdout: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pagefeed=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    config.validate()?;

    let targets = config.select(args.target.as_deref())?;
    check_single_target(&args, targets.len())?;

    let fetcher = Fetcher::new(&config.fetch).context("Failed to build HTTP client")?;

    for target in targets {
        let report = run_target(&fetcher, target, Utc::now()).await?;

        if args.stdout {
            print!("{}", report.xml);
            continue;
        }

        let path = args.output.as_deref().unwrap_or(&target.output);
        write_feed(path, &report.xml)
            .with_context(|| format!("Failed to write feed for target '{}'", target.name))?;
        println!(
            "Wrote {} with {} items ({}).",
            path.display(),
            report.items,
            report.kind
        );
    }

    Ok(())
}

/// `--output` and `--stdout` each produce one document, so they need one target.
fn check_single_target(args: &Args, selected: usize) -> Result<()> {
    if selected == 1 {
        return Ok(());
    }
    if args.output.is_some() {
        anyhow::bail!("--output needs exactly one target; use --target to pick one");
    }
    if args.stdout {
        anyhow::bail!("--stdout needs exactly one target; use --target to pick one");
    }
    Ok(())
}
