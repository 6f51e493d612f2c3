//! Treemirror CLI - mirror a remote repository's file tree to local disk.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use console::Term;
use tracing_subscriber::EnvFilter;
use treemirror::discovery::DiscoveryStrategy;

#[derive(Parser)]
#[command(name = "treemirror")]
#[command(version)]
#[command(about = "Mirror a remote repository's file tree without git")]
#[command(
    long_about = "Treemirror reproduces the file tree of a remote repository on local disk \
using only its web surfaces: the structured tree API when available, rendered pages \
otherwise. Existing files are never overwritten, binary files are skipped, and \
per-file failures are counted instead of aborting the run."
)]
#[command(after_long_help = r#"EXAMPLES
    Mirror the default branch (main, falling back to master):
        $ treemirror mirror acme/widgets

    Mirror a branch into a chosen directory:
        $ treemirror mirror https://github.com/acme/widgets/tree/release/1.x ./widgets-1.x

    Scrape rendered pages only, one request at a time, through a proxy:
        $ treemirror mirror acme/widgets --strategy scrape --exclusive-session --proxy proxy.corp:8080

    See what would be mirrored:
        $ treemirror mirror acme/widgets --dry-run

    Generate shell completions:
        $ treemirror completions bash > ~/.local/share/bash-completion/completions/treemirror

CONFIGURATION
    Treemirror reads configuration from:
      1. ~/.config/treemirror/config.toml (or $XDG_CONFIG_HOME/treemirror/config.toml)
      2. ./treemirror.toml
      3. Environment variables (TREEMIRROR_<SECTION>__<KEY>, e.g. TREEMIRROR_NETWORK__PROXY)
      4. .env file in current directory
    Command-line flags override all of them.

ENVIRONMENT VARIABLES
    TREEMIRROR_NETWORK__PROXY               Proxy URL (host:port or scheme://host:port)
    TREEMIRROR_NETWORK__TIMEOUT_SECS        Per-request timeout (default: 20)
    TREEMIRROR_NETWORK__EXCLUSIVE_SESSION   Serialize every request (default: false)
    TREEMIRROR_SYNC__CONCURRENCY            Concurrent file workers (default: 5)
    TREEMIRROR_ENDPOINTS__WEB_BASE          Rendered-page host (default: https://github.com/)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror a repository into a local directory
    Mirror(MirrorArgs),
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Discovery strategy as accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Structured API first, scraping if it is unavailable
    Auto,
    /// Structured tree API only
    Api,
    /// Rendered directory pages only
    Scrape,
}

impl From<StrategyArg> for DiscoveryStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Auto => DiscoveryStrategy::Auto,
            StrategyArg::Api => DiscoveryStrategy::Api,
            StrategyArg::Scrape => DiscoveryStrategy::Scrape,
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
struct MirrorArgs {
    /// Repository reference: owner/name or a repository URL (prompted for when omitted)
    repo: Option<String>,

    /// Destination directory (default: the repository name)
    dest: Option<PathBuf>,

    /// Branch to mirror (default: main, falling back to master)
    #[arg(short, long)]
    branch: Option<String>,

    /// Maximum concurrent file workers (default from config or 5)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Discovery strategy (default from config or auto)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Per-request timeout in seconds (default from config or 20)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Outbound proxy, e.g. proxy.corp:8080
    #[arg(long)]
    proxy: Option<String>,

    /// Skip TLS certificate verification from the start
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Serialize every request through one session
    #[arg(short = 'x', long)]
    exclusive_session: bool,

    /// Proactive pacing in requests per second
    #[arg(long)]
    rps: Option<u32>,

    /// Discover and report without downloading or writing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing for non-TTY mode (structured logging)
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("treemirror=info,treemirror_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(shell)?;
        }
        Commands::Mirror(args) => {
            let config = config::Config::load();
            let shutdown_flag = shutdown::setup_shutdown_handler();
            commands::mirror::handle_mirror(args, &config, shutdown_flag).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mirror_flags_parse() {
        let cli = Cli::try_parse_from([
            "treemirror",
            "mirror",
            "acme/widgets",
            "out",
            "--branch",
            "dev",
            "-c",
            "3",
            "--strategy",
            "scrape",
            "--exclusive-session",
            "--dry-run",
        ])
        .unwrap();

        let Commands::Mirror(args) = cli.command else {
            panic!("expected mirror command");
        };
        assert_eq!(args.repo.as_deref(), Some("acme/widgets"));
        assert_eq!(args.dest, Some(PathBuf::from("out")));
        assert_eq!(args.branch.as_deref(), Some("dev"));
        assert_eq!(args.concurrency, Some(3));
        assert!(matches!(args.strategy, Some(StrategyArg::Scrape)));
        assert!(args.exclusive_session);
        assert!(args.dry_run);
        assert!(!args.json);
    }

    #[test]
    fn repo_is_optional() {
        let cli = Cli::try_parse_from(["treemirror", "mirror"]).unwrap();
        let Commands::Mirror(args) = cli.command else {
            panic!("expected mirror command");
        };
        assert!(args.repo.is_none());
        assert!(args.dest.is_none());
    }

    #[test]
    fn strategy_arg_maps_to_library_strategy() {
        assert_eq!(DiscoveryStrategy::from(StrategyArg::Auto), DiscoveryStrategy::Auto);
        assert_eq!(DiscoveryStrategy::from(StrategyArg::Api), DiscoveryStrategy::Api);
        assert_eq!(DiscoveryStrategy::from(StrategyArg::Scrape), DiscoveryStrategy::Scrape);
    }
}
