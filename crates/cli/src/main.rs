use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csf_agents::ChatOrchestrator;
use csf_api::{build_orchestrator, AppConfig};
use csf_core::{
    build_prompt, classify_intent, ChatRequest, HyphenPolicy, ResponseSanitizer,
    SYSTEM_INSTRUCTION,
};
use csf_observability::init_tracing;
use csf_retrieval::{
    join_passages, HashEmbeddingModel, ReferenceIndex, ReferenceRetriever, DEFAULT_TOP_K,
};

#[derive(Debug, Parser)]
#[command(name = "csf")]
#[command(about = "NIST CSF assistant CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the intent label for a message.
    Classify { message: String },
    /// Sanitize model output read from stdin.
    Sanitize {
        #[arg(long, default_value = "strip_all")]
        hyphens: String,
    },
    /// Print the prompt that would be sent for a message.
    Prompt {
        message: String,
        #[arg(long)]
        reference_root: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    Refs {
        #[command(subcommand)]
        command: RefsCommand,
    },
    /// Interactive chat through the configured language model.
    Chat {
        #[arg(long)]
        reference_root: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum RefsCommand {
    Search {
        query: String,
        #[arg(long)]
        reference_root: PathBuf,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("csf_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Classify { message } => {
            println!("{}", classify_intent(&message).as_str());
        }
        Command::Sanitize { hyphens } => {
            let policy = HyphenPolicy::parse(&hyphens)
                .with_context(|| format!("invalid --hyphens value: {hyphens}"))?;
            let mut raw = String::new();
            io::stdin().read_to_string(&mut raw)?;
            println!("{}", ResponseSanitizer::new(policy).sanitize(&raw));
        }
        Command::Prompt {
            message,
            reference_root,
            top_k,
        } => {
            let reference = match reference_root {
                Some(root) => {
                    let passages = load_index(&root)?.search(&message, top_k.max(1))?;
                    (!passages.is_empty()).then(|| join_passages(&passages))
                }
                None => None,
            };
            println!(
                "{}",
                build_prompt(&message, SYSTEM_INSTRUCTION, reference.as_deref())
            );
        }
        Command::Refs { command } => match command {
            RefsCommand::Search {
                query,
                reference_root,
                limit,
            } => {
                let hits = load_index(&reference_root)?.search_scored(&query, limit.max(1));
                println!("{}", serde_json::to_string_pretty(&hits)?);
            }
        },
        Command::Chat { reference_root } => {
            let mut config = AppConfig::from_env().context("invalid configuration")?;
            if reference_root.is_some() {
                config.reference_root = reference_root;
            }
            run_chat(build_orchestrator(&config)?).await?;
        }
    }

    Ok(())
}

fn load_index(root: &Path) -> Result<ReferenceIndex> {
    ReferenceIndex::from_dir(root, Some(Arc::new(HashEmbeddingModel::default())))
        .with_context(|| format!("failed loading reference index from {}", root.display()))
}

async fn run_chat(orchestrator: ChatOrchestrator) -> Result<()> {
    println!(
        "NIST CSF chat ({}). type 'exit' to quit.",
        orchestrator.model_id()
    );

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        match orchestrator.handle_chat(ChatRequest::new(message)).await {
            Ok(reply) => println!("\n[{}]\n{}\n", reply.agent_mode.as_str(), reply.response),
            Err(error) => eprintln!("\nerror: {}\n", csf_agents::error_chain(&error)),
        }
    }

    Ok(())
}
