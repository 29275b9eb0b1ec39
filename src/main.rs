use tabular_agent::{
    AgentConfig, AnswerKind, CacheStats, DataAgent, DatasetHandle, InMemoryAnswerCache, LlmClient,
    LocalArtifactStore, QuestionService,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabular-agent")]
#[command(about = "Ask natural-language questions about a CSV file")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question about a CSV file
    Ask {
        /// Path to the CSV file
        csv: PathBuf,

        /// The question in natural language
        question: String,

        /// Namespace for stored artifacts (default: the file stem)
        #[arg(long)]
        file_id: Option<String>,

        /// Directory for charts and result documents (or set TABULAR_AGENT_ARTIFACT_DIR)
        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        /// Model name (or set OPENAI_MODEL)
        #[arg(long)]
        model: Option<String>,
    },
    /// Print the columns of a CSV file as the agent sees them
    Columns {
        /// Path to the CSV file
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = AgentConfig::from_env()?;

    match args.command {
        Commands::Ask {
            csv,
            question,
            file_id,
            artifact_dir,
            model,
        } => {
            if let Some(dir) = artifact_dir {
                config.artifact_dir = dir;
            }
            if let Some(model) = model {
                config.model = model;
            }
            let file_id = match file_id {
                Some(id) => id,
                None => csv
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "default".to_string()),
            };

            info!("Using model {} with artifacts in {}", config.model, config.artifact_dir.display());
            let llm = LlmClient::from_config(&config)?;
            let store = LocalArtifactStore::new(config.artifact_dir.clone(), config.public_url.clone());
            let agent = DataAgent::new(Arc::new(llm), Arc::new(store), config.preview_rows);
            let service = QuestionService::new(
                agent,
                Arc::new(InMemoryAnswerCache::new()),
                Arc::new(CacheStats::default()),
            );

            let answer = service.process_question(&file_id, &csv, &question).await;
            println!("{}", answer.text);
            if answer.kind == AnswerKind::Image {
                println!("\n(image reference)");
            }
        }
        Commands::Columns { csv } => {
            let (dataset, report) = DatasetHandle::load_csv(&csv)?;
            for column in dataset.list_columns(tabular_agent::data_store::RELATION_NAME)? {
                println!("{}", column);
            }
            println!(
                "\n{} rows loaded, {} malformed rows dropped{}",
                report.rows,
                report.dropped_rows,
                if report.lossy_decoding { " (decoded as Latin-1)" } else { "" }
            );
        }
    }

    Ok(())
}
