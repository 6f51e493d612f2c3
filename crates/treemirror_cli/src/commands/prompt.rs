//! Terminal prompts: the mirror target when none was given, and proxy
//! credentials when the proxy demands them.

use std::io;
use std::path::PathBuf;

use console::{Term, style};
use treemirror::gateway::ProxyCredentials;

/// Source of answers for interactive questions.
pub(crate) trait Prompter {
    fn line(&mut self, prompt: &str) -> io::Result<String>;

    /// Read without echo.
    fn secret(&mut self, prompt: &str) -> io::Result<String>;

    fn notice(&mut self, message: &str);
}

/// Prompts on stderr so stdout stays clean for `--json`.
pub(crate) struct TermPrompter {
    term: Term,
}

impl TermPrompter {
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Prompter for TermPrompter {
    fn line(&mut self, prompt: &str) -> io::Result<String> {
        self.term.write_str(prompt)?;
        self.term.read_line()
    }

    fn secret(&mut self, prompt: &str) -> io::Result<String> {
        self.term.write_str(prompt)?;
        self.term.read_secure_line()
    }

    fn notice(&mut self, message: &str) {
        self.term.write_line(message).ok();
    }
}

/// What to mirror, as answered interactively.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MirrorTarget {
    pub repo: String,
    pub branch: Option<String>,
    pub dest: Option<PathBuf>,
}

fn non_empty(answer: String) -> Option<String> {
    let trimmed = answer.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Ask for the repository, then the branch, then the destination.
pub(crate) fn ask_target(prompter: &mut impl Prompter) -> io::Result<MirrorTarget> {
    let repo = non_empty(prompter.line("Repository URL or owner/name: ")?).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "no repository was entered")
    })?;
    let branch = non_empty(prompter.line("Branch (Enter for main): ")?);
    let dest = non_empty(prompter.line("Output directory (Enter for the repository name): ")?)
        .map(PathBuf::from);

    Ok(MirrorTarget { repo, branch, dest })
}

/// Ask for proxy credentials. An empty username gives up.
///
/// `default_host` is offered when the user leaves the host blank.
pub(crate) fn ask_proxy_credentials(
    prompter: &mut impl Prompter,
    attempt: u32,
    max_attempts: u32,
    default_host: Option<&str>,
) -> Option<ProxyCredentials> {
    prompter.notice(&format!(
        "{} Proxy authentication required (attempt {attempt}/{max_attempts})",
        style("!").yellow().bold()
    ));

    let username = non_empty(prompter.line("Proxy username (Enter to give up): ").ok()?)?;
    let password = prompter.secret("Proxy password: ").ok()?;
    let host_prompt = match default_host {
        Some(host) => format!("Proxy host:port [{host}]: "),
        None => "Proxy host:port: ".to_string(),
    };
    let host = non_empty(prompter.line(&host_prompt).ok()?)
        .or_else(|| default_host.map(str::to_string))?;

    Some(ProxyCredentials {
        username,
        password,
        host,
    })
}
