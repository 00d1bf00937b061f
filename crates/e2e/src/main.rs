//! Portal E2E suite entry point
//!
//! Run with: cargo run --package portal-e2e -- --project desktop

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use portal_e2e::artifacts::package_results;
use portal_e2e::auth::{Credentials, FormLogin};
use portal_e2e::playwright::{Browser, LaunchOptions, PlaywrightFactory};
use portal_e2e::runner::parse_project;
use portal_e2e::{E2eError, E2eResult, MenuTopology, SuiteConfig, SuiteRunner};

#[derive(Parser, Debug)]
#[command(name = "portal-e2e")]
#[command(about = "End-to-end suite for the customer portal")]
#[command(version)]
struct Args {
    /// Suite configuration file (defaults apply when absent)
    #[arg(short, long, default_value = "portal-e2e.yaml")]
    config: PathBuf,

    /// Projects to run: mobile, tablet, desktop (repeatable)
    #[arg(short, long)]
    project: Vec<String>,

    /// Run only checks whose name contains this text
    #[arg(short, long)]
    filter: Option<String>,

    /// Menu topology YAML (overrides the config file)
    #[arg(long)]
    topology: Option<PathBuf>,

    /// Portal base URL (overrides config and PORTAL_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Parallel serial groups; keep at 1 unless the account allows more sessions
    #[arg(short, long)]
    workers: Option<usize>,

    /// Extra attempts per failing check
    #[arg(long)]
    retries: Option<u32>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Skip screenshot comparison
    #[arg(long)]
    no_visual: bool,

    /// Capture screenshots without comparing, then make them the baselines
    #[arg(long)]
    update_baselines: bool,

    /// Skip the HTTP reachability check
    #[arg(long)]
    no_preflight: bool,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pack the output directory into artifacts.tar.gz after the run
    #[arg(long)]
    package: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let directive = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args, config)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            let code = if matches!(e, E2eError::Configuration(_) | E2eError::PlaywrightNotFound) {
                2
            } else {
                1
            };
            std::process::exit(code);
        }
    }
}

fn build_config(args: &Args) -> E2eResult<SuiteConfig> {
    let mut config = SuiteConfig::load(&args.config)?;
    config.apply_env()?;

    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if !args.project.is_empty() {
        config.projects = args
            .project
            .iter()
            .map(|p| parse_project(p))
            .collect::<E2eResult<Vec<_>>>()?;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(retries) = args.retries {
        config.retries = retries;
    }
    if let Some(browser) = &args.browser {
        config.browser.browser = browser.parse::<Browser>()?;
    }
    if args.headed {
        config.browser.headless = false;
    }
    if args.no_visual {
        config.visual.enabled = false;
    }
    if args.no_preflight {
        config.preflight = false;
    }
    if let Some(topology) = &args.topology {
        config.topology_path = Some(topology.clone());
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn async_main(args: Args, config: SuiteConfig) -> E2eResult<bool> {
    // Missing credentials abort before any browser starts.
    let credentials = Credentials::from_env(&config.credentials)?;
    let topology = MenuTopology::load(config.topology_path.as_deref())?;

    let factory = PlaywrightFactory::new(
        config.browser.clone(),
        LaunchOptions {
            base_url: config.base_url.clone(),
            action_timeout_ms: config.timeouts.action_ms,
            navigation_timeout_ms: config.timeouts.navigation_ms,
        },
    )?;
    let authenticator = FormLogin::new(credentials, config.login.clone(), config.timeouts.clone());

    let output_dir = config.output_dir.clone();
    let runner = SuiteRunner::new(config, topology, Arc::new(factory), Arc::new(authenticator))?
        .with_filter(args.filter.clone())
        .with_baseline_updates(args.update_baselines);

    let results = runner.run().await?;

    if args.update_baselines {
        runner.update_baselines()?;
    }

    runner.write_results(&results)?;

    if args.package {
        let bundle = package_results(&output_dir, &output_dir.join("artifacts.tar.gz"))?;
        info!("Artifacts: {} ({} files)", bundle.path.display(), bundle.files);
    }

    Ok(results.success())
}
