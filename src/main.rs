use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use neuragent_agent::{AgentFactory, AgentKind, RunLimits};
use neuragent_core::config::AppConfig;
use neuragent_core::traits::{CompletionService, FileStore, SearchService};
use neuragent_tools::LocalFileStore;

const DEFAULT_CONFIG: &str = "neuragent.toml";

#[derive(Parser)]
#[command(name = "neuragent", version, about = "Graph-driven research and executor agents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server (default)
    Serve,
    /// Run a single prompt through an agent and exit
    Run {
        /// Agent workflow to use
        #[arg(short, long, default_value = "researcher")]
        agent: AgentKind,
        /// Extra context added to the conversation as a system message
        #[arg(long)]
        context: Option<String>,
        /// Print the full reply as JSON
        #[arg(long)]
        json: bool,
        /// The prompt to send to the agent (read from stdin when omitted)
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Print an agent's workflow graph in Graphviz DOT format
    Graph {
        agent: AgentKind,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "neuragent", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_directive())),
        )
        .with_target(false)
        .init();

    if config.llm.api_key.is_none() {
        warn!("No LLM API key configured; completion requests will be unauthenticated");
    }

    let factory = Arc::new(build_factory(&config)?);

    match cli.command {
        None | Some(Commands::Serve) => {
            info!(bind = %config.service.bind_addr(), "Starting HTTP gateway");
            let server = neuragent_gateway::GatewayServer::new(config, factory);
            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Some(Commands::Run {
            agent,
            context,
            json,
            prompt,
        }) => {
            let mut text = prompt.join(" ");
            if text.is_empty() {
                // Read from stdin
                text = io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            if text.trim().is_empty() {
                anyhow::bail!("No prompt given");
            }

            let reply = factory.run(agent, &text, context.as_deref()).await?;
            for err in &reply.errors {
                warn!(node = %err.node, error = %err.message, "Node reported an error");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                println!("{}", reply.result);
            }
        }
        Some(Commands::Graph { agent }) => {
            print!("{}", factory.graph_dot(agent, &config.viz.graph_layout));
        }
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Some(Commands::Completions { .. }) => unreachable!("handled before config load"),
    }

    Ok(())
}

/// File settings (when the file exists), then environment overrides.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let mut config = if path.exists() {
        AppConfig::load(path)?
    } else {
        if path != Path::new(DEFAULT_CONFIG) {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        AppConfig::default()
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

fn build_factory(config: &AppConfig) -> anyhow::Result<AgentFactory> {
    let llm: Arc<dyn CompletionService> = Arc::from(neuragent_llm::create_client(&config.llm));
    let search: Arc<dyn SearchService> = Arc::from(neuragent_tools::create_search(&config.tools));
    let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::default());
    info!(
        model = %config.llm.model,
        search_engine = search.engine(),
        "Agent collaborators ready"
    );

    Ok(AgentFactory::new(
        llm,
        search,
        files,
        RunLimits::from_config(&config.agent),
    )?)
}
