//! Branchloom CLI: drives the conversation engine against stored sessions.
//!
//! Commands:
//! - `init`: Create the config file and data directory
//! - `new` / `list` / `remove`: Session management
//! - `say` / `reply` / `regen` / `edit`: Add and complete turns
//! - `delete` / `restore` / `move` / `select`: Reshape and navigate the tree
//! - `tree` / `validate` / `repair`: Inspect and fix structure
//! - `preview`: Show the exact context a model call would receive

use branchloom_config::AppConfig;
use clap::{CommandFactory, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "branchloom",
    about = "Branchloom: branching conversation engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config file and data directory
    Init,

    /// Start a new session
    New {
        /// Session title
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List stored sessions
    List,

    /// Delete a stored session
    Remove {
        session: String,
        /// Skip the confirmation notice
        #[arg(long)]
        confirm: bool,
    },

    /// Add a user turn and a pending assistant reply
    Say {
        session: String,
        text: String,
        /// Parent node (defaults to the active leaf)
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Fill in a pending assistant reply
    Reply {
        session: String,
        node: String,
        text: String,
        /// Mark the reply as failed instead of complete
        #[arg(long)]
        error: bool,
    },

    /// Start an alternative reply next to (or under) a node
    Regen { session: String, node: String },

    /// Replace a node's content
    Edit {
        session: String,
        node: String,
        text: String,
    },

    /// Disable a node and its branch (or remove it with --hard)
    Delete {
        session: String,
        node: String,
        /// Remove the subtree from the session permanently
        #[arg(long)]
        hard: bool,
    },

    /// Re-enable a soft-deleted branch
    Restore { session: String, node: String },

    /// Move a node (and its branch) under a new parent
    Move {
        session: String,
        node: String,
        new_parent: String,
    },

    /// Switch to the branch through a node
    Select { session: String, node: String },

    /// Print the session tree
    Tree { session: String },

    /// Check structural integrity
    Validate { session: String },

    /// Repair structural problems
    Repair { session: String },

    /// Show the assembled context for a node
    Preview {
        session: String,
        /// Agent template (JSON)
        #[arg(short, long)]
        template: Option<std::path::PathBuf>,
        /// Node being generated (defaults to the active leaf)
        #[arg(long)]
        target: Option<String>,
        /// User profile text
        #[arg(long, conflicts_with = "profile_file")]
        profile: Option<String>,
        /// Read the user profile from a file
        #[arg(long)]
        profile_file: Option<std::path::PathBuf>,
        /// Print the assembled context as JSON
        #[arg(long)]
        json: bool,
        /// Print only the provenance-free wire messages as JSON
        #[arg(long, conflicts_with = "json")]
        wire: bool,
    },

    /// Validate the configuration file
    Config,

    /// Generate shell completions
    Completions { shell: clap_complete::Shell },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let loaded = AppConfig::load();

    // Initialize tracing
    let (level, json) = match &loaded {
        Ok(config) => (config.logging.level.clone(), config.logging.json),
        Err(_) => ("info".to_string(), false),
    };
    let filter = if cli.verbose { "debug".to_string() } else { level };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Init => return commands::init::run().await,
        Commands::Config => return commands::config_cmd::validate().await,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "branchloom", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = loaded.map_err(|e| format!("Failed to load config: {e}"))?;
    let store = commands::open_store(&config).await?;
    let store = store.as_ref();

    match cli.command {
        Commands::New { title } => commands::session::new(store, title).await?,
        Commands::List => commands::session::list(store).await?,
        Commands::Remove { session, confirm } => {
            commands::session::remove(store, &session, confirm).await?
        }
        Commands::Say {
            session,
            text,
            parent,
        } => commands::node::say(store, &session, &text, parent.as_deref()).await?,
        Commands::Reply {
            session,
            node,
            text,
            error,
        } => commands::node::reply(store, &session, &node, &text, error).await?,
        Commands::Regen { session, node } => commands::node::regen(store, &session, &node).await?,
        Commands::Edit {
            session,
            node,
            text,
        } => commands::node::edit(store, &session, &node, &text).await?,
        Commands::Delete {
            session,
            node,
            hard,
        } => commands::node::delete(store, &session, &node, hard).await?,
        Commands::Restore { session, node } => {
            commands::node::restore(store, &session, &node).await?
        }
        Commands::Move {
            session,
            node,
            new_parent,
        } => commands::node::move_node(store, &session, &node, &new_parent).await?,
        Commands::Select { session, node } => {
            commands::node::select(store, &session, &node).await?
        }
        Commands::Tree { session } => commands::inspect::tree(store, &session).await?,
        Commands::Validate { session } => commands::inspect::validate(store, &session).await?,
        Commands::Repair { session } => commands::inspect::repair(store, &session).await?,
        Commands::Preview {
            session,
            template,
            target,
            profile,
            profile_file,
            json,
            wire,
        } => {
            let options = commands::preview::PreviewOptions {
                template,
                target,
                profile,
                profile_file,
                json,
                wire,
            };
            commands::preview::run(&config, store, &session, options).await?
        }
        Commands::Init | Commands::Config | Commands::Completions { .. } => {}
    }

    Ok(())
}
