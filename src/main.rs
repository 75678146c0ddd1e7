use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use scrapewatch::api::ScrapeJob;
use scrapewatch::config::AppConfig;
use scrapewatch::context::AppContext;
use scrapewatch::logging::{self, LogConfig};
use scrapewatch::tracker::{JobProgress, ProgressUpdate, status};

#[derive(Parser)]
#[command(name = "scrapewatch")]
#[command(about = "Live progress watcher for WebScraper jobs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Args, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    auth_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    verbose: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a scrape job for a project
    Start {
        project_id: Uuid,

        /// Follow the job's live progress after starting
        #[arg(long)]
        watch: bool,
    },
    /// Follow a job's live progress until it finishes
    Watch { job_id: Uuid },
    /// Fetch a job's current server-side state
    Status {
        job_id: Uuid,

        #[arg(long)]
        json: bool,
    },
    /// List a project's jobs, newest first
    Jobs { project_id: Uuid },
    /// Cancel a pending or running job
    Cancel { job_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::new(Some(&cli.overrides))?;
    logging::init(LogConfig {
        json: false,
        verbose: config.verbose,
    });

    let ctx = AppContext::new(config).context("Failed to initialize backend client")?;

    match cli.command {
        Commands::Start { project_id, watch } => {
            let job = ctx
                .api
                .start_scrape(project_id)
                .await
                .context("Failed to start scrape job")?;
            println!("Started job {} for project {}", job.id, job.project_id);
            if watch {
                watch_job(&ctx, job.id).await?;
            }
        }
        Commands::Watch { job_id } => watch_job(&ctx, job_id).await?,
        Commands::Status { job_id, json } => {
            let job = ctx.api.job(job_id).await.context("Failed to fetch job")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&job)?);
            } else {
                print_job(&job);
            }
        }
        Commands::Jobs { project_id } => {
            let jobs = ctx
                .api
                .project_jobs(project_id)
                .await
                .context("Failed to list jobs")?;
            if jobs.is_empty() {
                println!("No jobs for project {project_id}");
            }
            for job in jobs {
                print_job(&job);
            }
        }
        Commands::Cancel { job_id } => {
            ctx.api
                .cancel_job(job_id)
                .await
                .context("Failed to cancel job")?;
            println!("Cancelled job {job_id}");
        }
    }

    Ok(())
}

/// Track one job and print a progress line whenever something changes,
/// until the job reaches a terminal state or Ctrl-C.
async fn watch_job(ctx: &AppContext, job_id: Uuid) -> Result<()> {
    // A watch attached mid-run shouldn't start from zero: seed the counters
    // from the server snapshot, then let the stream take over.
    let job = ctx.api.job(job_id).await.context("Failed to fetch job")?;
    if job.status.is_terminal() {
        print_job(&job);
        return Ok(());
    }

    let job_key = job_id.to_string();
    let locator = ctx
        .api
        .progress_endpoint(&job_key)
        .context("Failed to derive progress endpoint")?;
    ctx.tracker.start_tracking(&job_key, &locator).await;
    ctx.tracker
        .update_progress(
            &job_key,
            ProgressUpdate {
                pages_discovered: Some(job.pages_discovered),
                pages_scraped: Some(job.pages_scraped),
                pages_failed: Some(job.pages_failed),
                ..Default::default()
            },
        )
        .await;

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut last_line = String::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Detaching from job {job_id}");
                break;
            }
            _ = ticker.tick() => {
                let Some(progress) = ctx.tracker.progress(&job_key).await else {
                    break;
                };
                let line = render_progress(&progress);
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
                if is_terminal(&progress.status) {
                    break;
                }
            }
        }
    }

    ctx.tracker.stop_tracking(&job_key).await;
    Ok(())
}

fn render_progress(progress: &JobProgress) -> String {
    format!(
        "[{}] {}/{} pages scraped, {} failed ({:.1}%) {}",
        progress.status,
        progress.pages_scraped,
        progress.pages_discovered,
        progress.pages_failed,
        progress.progress,
        progress.current_url.as_deref().unwrap_or("-"),
    )
}

fn is_terminal(job_status: &str) -> bool {
    matches!(
        job_status,
        status::COMPLETED | status::FAILED | status::CANCELLED | status::ERROR
    )
}

fn print_job(job: &ScrapeJob) {
    let finished = job
        .completed_at
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}  {:?}  discovered={} scraped={} failed={}  finished={}",
        job.id, job.status, job.pages_discovered, job.pages_scraped, job.pages_failed, finished
    );
    if let Some(error) = &job.error_message {
        println!("  error: {error}");
    }
}
