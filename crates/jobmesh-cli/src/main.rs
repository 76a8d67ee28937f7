use anyhow::Result;
use clap::{Parser, Subcommand};
use jobmesh_adapters::{build_adapters, SourceRegistry};
use jobmesh_aggregate::Aggregator;
use jobmesh_core::{JobSearchQuery, JobSource, JobType, PostedWithin, RemoteType};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "jobmesh-cli")]
#[command(about = "Multi-board job search aggregation")]
struct Cli {
    /// Path to a sources.yaml registry; defaults to every known board.
    #[arg(long, global = true)]
    registry: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Query every enabled board, merge and dedup the results.
    Search {
        #[arg(long)]
        keywords: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// remote, hybrid or onsite; repeatable.
        #[arg(long = "remote")]
        remote_types: Vec<RemoteType>,
        /// full-time, part-time, contract or internship; repeatable.
        #[arg(long = "job-type")]
        job_types: Vec<JobType>,
        #[arg(long)]
        salary_min: Option<i64>,
        #[arg(long)]
        salary_max: Option<i64>,
        /// past-day, past-3-days, past-week or past-month.
        #[arg(long)]
        posted_within: Option<PostedWithin>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Emit the full outcome as JSON instead of a summary listing.
        #[arg(long)]
        json: bool,
    },
    /// Fetch one job by board and board-native id.
    Details { source: JobSource, external_id: String },
    /// List the boards the current registry enables.
    Sources,
}

fn load_registry(path: Option<&str>) -> Result<SourceRegistry> {
    match path {
        Some(path) => SourceRegistry::from_yaml_file(path),
        None => Ok(SourceRegistry::all_enabled()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let registry = load_registry(cli.registry.as_deref())?;
    let aggregator = Aggregator::new(build_adapters(&registry)?);

    match cli.command {
        Commands::Search {
            keywords,
            location,
            remote_types,
            job_types,
            salary_min,
            salary_max,
            posted_within,
            page,
            limit,
            json,
        } => {
            let query = JobSearchQuery {
                keywords,
                location,
                remote_types,
                job_types,
                salary_min,
                salary_max,
                posted_within,
                page,
                limit,
            };
            let outcome = aggregator.search(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                for job in &outcome.jobs {
                    println!(
                        "[{}] {} @ {} ({}) posted={} id={}",
                        job.source,
                        job.title,
                        job.company,
                        job.location,
                        job.posted_date.date_naive(),
                        job.external_id
                    );
                }
                println!(
                    "search complete: total={} sources={} failures={}",
                    outcome.total,
                    outcome.sources.join(","),
                    outcome.failures.len()
                );
                for failure in &outcome.failures {
                    eprintln!("source {} failed: {}", failure.source, failure.message);
                }
            }
        }
        Commands::Details { source, external_id } => {
            match aggregator.get_job_details(source, &external_id).await? {
                Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
                None => eprintln!("no job {external_id} on {source}"),
            }
        }
        Commands::Sources => {
            for source in aggregator.sources() {
                println!("{source}");
            }
        }
    }

    Ok(())
}
