use chrono::Utc;
use clap::Parser;
use contribgraph::activity::GitLabActivitySource;
use contribgraph::job::{Job, JobConfig};
use contribgraph::{AppConfig, Error};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path of the generated SVG, overrides the configured output path
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();

    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}");
            if let Error::MissingSetting(_) = err {
                log::error!("set HOST_URL to your GitLab URL and ACCESS_TOKEN to a personal access token");
            }
            return ExitCode::FAILURE;
        }
    };

    if let Some(output) = cli.output {
        config.output_path = output;
    }

    let source = match GitLabActivitySource::from_config(&config) {
        Ok(source) => source,
        Err(err) => {
            log::error!("failed to create GitLab client: {err}");
            return ExitCode::FAILURE;
        }
    };

    log::info!("connecting to GitLab at {}", config.host_url);

    let job = Job::new(JobConfig::from(&config), source);
    let outcome = job.run(Utc::now().date_naive()).await;

    log::debug!("{outcome}");

    ExitCode::from(outcome.exit_code())
}
