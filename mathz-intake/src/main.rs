//! `mathz`: classify, explain and file math problems from the terminal.
//!
//! ```text
//! mathz classify "Resolva a equação: 2x + 5 = 13"
//! mathz submit --collection Provas "Calcule a derivada de x^3"
//! mathz collections delete Provas
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use mathz_core::collections::NewCollection;
use mathz_core::{CollectionId, StructuredExplanation};
use mathz_intake::telemetry::init_tracing;
use mathz_intake::{AppConfig, IntakePipeline, Submission};
use mathz_llm::{ExplainOutcome, LlmClient};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "mathz", version, about = "Math problem intake")]
struct Cli {
    /// Config file (defaults to $MATHZ_CONFIG, then ./mathz.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify a problem without calling the model.
    Classify {
        /// Problem text; read from stdin when omitted.
        text: Option<String>,
    },
    /// Generate a step-by-step explanation without storing it.
    Explain {
        /// Problem text; read from stdin when omitted.
        text: Option<String>,
    },
    /// Classify, explain and store a problem.
    Submit {
        /// Target collection by name; repeatable. Defaults to the default collection.
        #[arg(long = "collection", short = 'c')]
        collections: Vec<String>,
        /// Problem text; read from stdin when omitted.
        text: Option<String>,
    },
    /// Manage collections.
    #[command(subcommand)]
    Collections(CollectionsCommand),
}

#[derive(Debug, Subcommand)]
enum CollectionsCommand {
    /// List collections with problem counts.
    List,
    /// Create a collection.
    Create {
        /// Display name, unique case-insensitively.
        name: String,
        /// Optional description.
        #[arg(long, default_value = "")]
        description: String,
        /// Hex color such as `#3B82F6`; picked from the palette when omitted.
        #[arg(long)]
        color: Option<String>,
        /// Icon name; picked from the icon set when omitted.
        #[arg(long)]
        icon: Option<String>,
    },
    /// Delete a collection, moving its sole members to the default one.
    Delete {
        /// Collection name.
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&config.core.general)?;

    let client = LlmClient::from_config(&config.llm)?;
    if !client.is_available() {
        warn!("No model provider configured; explain and submit will fail");
    }
    let pipeline = IntakePipeline::from_config(&config, Arc::new(client))?;

    match cli.command {
        Command::Classify { text } => {
            let text = problem_text(text)?;
            let result = pipeline.classify(&text);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "{} (confidence {:.2}, difficulty {}/5)",
                    result.category.display_name(),
                    result.confidence,
                    result.difficulty_level
                );
                if !result.tags.is_empty() {
                    println!("tags: {}", result.tags.join(", "));
                }
            }
        }
        Command::Explain { text } => {
            let text = problem_text(text)?;
            let cancel = cancel_on_ctrl_c();
            match pipeline.explain(&text, &cancel).await? {
                ExplainOutcome::Done {
                    explanation,
                    degraded,
                    ..
                } => print_explanation(&explanation, degraded, cli.json)?,
                ExplainOutcome::Cancelled { attempts_made } => {
                    info!(attempts_made, "Cancelled");
                    eprintln!("cancelled");
                }
            }
        }
        Command::Submit { collections, text } => {
            let text = problem_text(text)?;
            let targets = resolve_collections(&pipeline, &collections)?;
            let cancel = cancel_on_ctrl_c();
            match pipeline.submit(&text, &targets, &cancel).await? {
                Submission::Stored {
                    problem, degraded, ..
                } => {
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&problem)?);
                    } else {
                        println!(
                            "stored {} as {}",
                            problem.id,
                            problem.classification.category.display_name()
                        );
                        if let Some(explanation) = &problem.explanation {
                            print_explanation(explanation, degraded, false)?;
                        }
                    }
                }
                Submission::Cancelled { .. } => eprintln!("cancelled; nothing stored"),
            }
        }
        Command::Collections(command) => run_collections(&pipeline, command, cli.json)?,
    }

    Ok(())
}

fn run_collections(
    pipeline: &IntakePipeline,
    command: CollectionsCommand,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        CollectionsCommand::List => {
            let summaries = pipeline.collections()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
                return Ok(());
            }
            for summary in summaries {
                let c = &summary.collection;
                let marker = if c.is_default {
                    "*"
                } else if c.is_system {
                    "+"
                } else {
                    " "
                };
                println!("{marker} {:<24} {:>5}  {}", c.name, summary.problem_count, c.icon);
            }
        }
        CollectionsCommand::Create {
            name,
            description,
            color,
            icon,
        } => {
            let collection = pipeline.create_collection(NewCollection {
                name,
                description,
                color,
                icon,
            })?;
            println!("created {} ({})", collection.name, collection.id);
        }
        CollectionsCommand::Delete { name } => {
            let collection = pipeline
                .find_collection(&name)?
                .with_context(|| format!("collection '{name}' not found"))?;
            let report = pipeline.delete_collection(collection.id)?;
            println!(
                "deleted {}: {} moved to default, {} kept elsewhere",
                report.collection, report.problems_migrated, report.problems_detached
            );
        }
    }
    Ok(())
}

fn resolve_collections(
    pipeline: &IntakePipeline,
    names: &[String],
) -> anyhow::Result<Vec<CollectionId>> {
    names
        .iter()
        .map(|name| match pipeline.find_collection(name)? {
            Some(collection) => Ok(collection.id),
            None => bail!("collection '{name}' not found"),
        })
        .collect()
}

fn problem_text(arg: Option<String>) -> anyhow::Result<String> {
    if let Some(text) = arg {
        return Ok(text);
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading problem from stdin")?;
    Ok(buf)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

fn print_explanation(
    explanation: &StructuredExplanation,
    degraded: bool,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(explanation)?);
        return Ok(());
    }
    if degraded {
        eprintln!("(model output did not follow the step format)");
    }
    for (i, step) in explanation.steps.iter().enumerate() {
        println!("Passo {}: {}", i + 1, step.title);
        for line in [&step.explanation, &step.calculation, &step.result] {
            if !line.is_empty() {
                println!("  {line}");
            }
        }
    }
    if let Some(verification) = &explanation.verification {
        println!("Verificação: {verification}");
    }
    println!("Resposta final: {}", explanation.final_answer);
    Ok(())
}
