use anyhow::Result;
use clap::{Parser, Subcommand};
use console::{style, Term};
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use burrow::agent::AnthropicAgent;
use burrow::config::Config;
use burrow::store::workspace::DEFAULT_AGENT;
use burrow::store::{Role, Workspace};
use burrow::Session;

/// Chat with a tool-using agent confined to a workspace directory.
#[derive(Parser, Debug)]
#[command(name = "burrow", version, about)]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an interactive chat session
    Chat {
        /// Workspace directory (defaults to the configured workspace)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
        /// Agent name
        #[arg(short, long, default_value = DEFAULT_AGENT)]
        agent: String,
        /// Thread id to continue (a new one is generated if omitted)
        #[arg(short, long)]
        thread: Option<String>,
    },
    /// Send one prompt and print the answer
    Ask {
        #[arg(short, long)]
        workspace: Option<PathBuf>,
        #[arg(short, long, default_value = DEFAULT_AGENT)]
        agent: String,
        /// Continue an existing thread
        #[arg(short, long)]
        thread: Option<String>,
        prompt: String,
    },
    /// List the agents configured in a workspace
    Agents {
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },
    /// Print a stored conversation thread
    History {
        #[arg(short, long)]
        workspace: Option<PathBuf>,
        #[arg(short, long)]
        thread: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_workspace(config: &Config, dir: Option<PathBuf>) -> Result<Workspace> {
    let dir = dir.unwrap_or_else(|| config.workspace_dir());
    Workspace::open(&dir)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Command::Chat {
            workspace,
            agent,
            thread,
        } => chat(&config, workspace, &agent, thread).await,
        Command::Ask {
            workspace,
            agent,
            thread,
            prompt,
        } => ask(&config, workspace, &agent, thread, &prompt).await,
        Command::Agents { workspace } => {
            let ws = open_workspace(&config, workspace)?;
            let agents = ws.list_agents()?;
            if agents.is_empty() {
                println!("No agents in {}", ws.root().display());
            }
            for name in agents {
                println!("{name}");
            }
            Ok(())
        }
        Command::History { workspace, thread } => {
            let ws = open_workspace(&config, workspace)?;
            for message in ws.conversations().load(&thread)? {
                let who = match message.role {
                    Role::User => style("You").cyan().bold(),
                    Role::Assistant => style("Agent").green().bold(),
                    Role::System => style("System").dim(),
                    Role::Tool => style("Tool").dim(),
                };
                println!("{who} [{}]", message.timestamp.format("%Y-%m-%d %H:%M:%S"));
                for call in &message.tool_calls {
                    println!("  {} {}", style("+").green(), call.name);
                }
                println!("{}\n", message.content);
            }
            Ok(())
        }
    }
}

fn session(
    config: &Config,
    workspace: Option<PathBuf>,
    agent_name: &str,
    thread: Option<String>,
) -> Result<Session<Term>> {
    let ws = open_workspace(config, workspace)?;
    let agent_config = ws.resolve_agent(agent_name)?;
    let agent = AnthropicAgent::new(&agent_config, config)?;
    Ok(Session::new(
        ws,
        Arc::new(agent),
        thread,
        config.sandbox,
        config.render.spinner_interval(),
        Term::stdout(),
    ))
}

async fn chat(
    config: &Config,
    workspace: Option<PathBuf>,
    agent_name: &str,
    thread: Option<String>,
) -> Result<()> {
    let mut session = session(config, workspace, agent_name, thread)?;
    println!(
        "Chat session started (agent: {}, thread: {})",
        session.agent_name(),
        session.thread_id()
    );
    println!("Type 'exit' or Ctrl+C to quit.\n");

    let mut editor = rustyline::DefaultEditor::new()?;
    loop {
        let line = match editor.readline("You> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => return Err(err.into()),
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if matches!(prompt.to_lowercase().as_str(), "exit" | "quit") {
            println!("Goodbye!");
            break;
        }
        let _ = editor.add_history_entry(prompt);
        session.turn(prompt).await?;
    }
    Ok(())
}

async fn ask(
    config: &Config,
    workspace: Option<PathBuf>,
    agent_name: &str,
    thread: Option<String>,
    prompt: &str,
) -> Result<()> {
    let mut session = session(config, workspace, agent_name, thread)?;
    let result = session.ask(prompt).await?;
    if let Some(error) = result.error {
        anyhow::bail!("{error}");
    }
    println!("{}", result.response);
    Ok(())
}
