use anyhow::Context;
use prbot::{CiTool, Config, GitHub, Integrator, UpdateOutcome, parse_args, sweep_pull_requests};
use tracing::info;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let spec = match parse_args(std::env::args()) {
        Ok(spec) => spec,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    let config = Config::load(&spec.config_path)?;
    let sweep = spec.sweep_spec(&config);

    info!("Initializing worker");
    let integrator = Integrator::new(CiTool::new(&config.working_dir, &config.ci_tool_dir))
        .force(spec.force)
        .dry_run(spec.dry_run);

    let token = config.token()?;
    let forge = GitHub::with_token(token).context("Failed to authenticate to GitHub")?;

    let report = sweep_pull_requests(&sweep, &forge, &integrator).await?;

    info!(
        "Swept {} PRs against {}@{}: {} created, {} updated, {} unchanged",
        report.outcomes.len(),
        report.base.branch,
        report.base.short_sha(),
        report.count(|o| matches!(o, UpdateOutcome::Created)),
        report.count(|o| matches!(o, UpdateOutcome::Updated { .. })),
        report.count(|o| matches!(o, UpdateOutcome::Unchanged { .. })),
    );

    Ok(())
}
