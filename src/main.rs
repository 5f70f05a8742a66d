use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use sentiment_workflow::config::WorkflowConfig;
use sentiment_workflow::domain::TableId;
use sentiment_workflow::observability::{init_logging, metrics, metrics_push};
use sentiment_workflow::pipeline::{dag, TaskState, WorkflowRun};

#[derive(Parser)]
#[command(name = "sentiment_workflow")]
#[command(about = "Financial headline sentiment workflow: ingest, clean, train and predict")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file; built-in defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole workflow in dependency order
    Run,
    /// Run a single task against the current warehouse state
    Task {
        /// Task id, e.g. gcs_to_bq, preprocess_text, ml_predict
        task_id: String,
    },
    /// Print the execution order and edges
    Graph,
    /// Print rows of a warehouse table
    Show {
        /// Table as dataset.table
        table: String,
        /// Maximum rows to print
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn print_run(run: &WorkflowRun) {
    println!("\n📊 Workflow run {} ({}):", run.run_id, run.workflow_id);
    for task in &run.tasks {
        let icon = match task.state {
            TaskState::Success => "✅",
            TaskState::Failed => "❌",
            TaskState::UpstreamFailed => "⏭️ ",
            TaskState::Pending => "⏳",
        };
        print!("   {} {} [{}] {}ms", icon, task.task_id, task.state, task.duration_ms);
        if let Some(result) = &task.result {
            print!(" - {}", result.message);
        }
        if let Some(error) = &task.error {
            print!(" - {}", error);
        }
        println!();
    }
    if let Some(duration) = run.duration() {
        println!("   Duration: {}ms", duration.num_milliseconds());
    }
}

async fn push_metrics(config: &WorkflowConfig, instance: &str) {
    if let Some(url) = &config.metrics.pushgateway_url {
        if let Err(e) = metrics_push::push_to_gateway(url, &config.metrics.job, instance).await {
            warn!("Failed to push metrics: {}", e);
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<bool> {
    let config = WorkflowConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Graph => {
            let workflow = dag::sentiment_workflow(&config, config.blob_store())?;
            println!("🗺️  Workflow {}", workflow.id());
            for (i, task_id) in workflow.execution_order()?.into_iter().enumerate() {
                println!("   {}. {}", i + 1, task_id);
            }
            for (up, down) in workflow.edges() {
                println!("   {} >> {}", up, down);
            }
            Ok(true)
        }
        Commands::Show { table, limit } => {
            let id: TableId = table.parse()?;
            let warehouse = config.open_warehouse()?;
            let data = warehouse.read_table(&id).await?;
            println!("📋 {} ({} rows)", id, data.num_rows());
            println!("   {}", data.column_names().join(" | "));
            for row in data.rows.iter().take(limit) {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                println!("   {}", cells.join(" | "));
            }
            Ok(true)
        }
        Commands::Run => {
            metrics::init();
            let warehouse = config.open_warehouse()?;
            let workflow = dag::sentiment_workflow(&config, config.blob_store())?;

            println!("🚀 Running workflow {}...", workflow.id());
            let run = workflow.run(warehouse.as_ref()).await?;
            print_run(&run);
            push_metrics(&config, &run.run_id.to_string()).await;

            match run.first_failure() {
                None => {
                    println!("🎉 Workflow completed successfully!");
                    Ok(true)
                }
                Some((task_id, e)) => {
                    println!("💥 Workflow failed at '{}': {}", task_id, e);
                    Ok(false)
                }
            }
        }
        Commands::Task { task_id } => {
            metrics::init();
            let warehouse = config.open_warehouse()?;
            let workflow = dag::sentiment_workflow(&config, config.blob_store())?;

            println!("🔄 Running task {}...", task_id);
            let outcome = workflow.run_task(&task_id, warehouse.as_ref()).await;
            push_metrics(&config, &task_id).await;

            let result = outcome?;
            println!("✅ {}", result.message);
            for (key, value) in &result.metadata {
                println!("   {}: {}", key, value);
            }
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(Path::new("logs"));
    info!("sentiment_workflow starting");

    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
