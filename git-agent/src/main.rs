//! `ga`: AI-powered commit message generator.
//!
//! `ga commit` lets a model inspect the staged changes through read-only
//! tools, prints the proposed message, asks for confirmation and commits.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use git_agent::agent::{Agent, AgentError};
use git_agent::core::hooks::Hooks;
use git_agent::exit_codes;
use git_agent::io::config::{AgentConfig, DEFAULT_CONFIG_FILE, load_config};
use git_agent::io::git::Git;
use git_agent::io::llm::{ModelError, OpenRouter, OpenRouterConfig};
use git_agent::io::prompt::PromptBuilder;
use git_agent::logging;
use git_agent::tools::{ToolContext, ToolSet};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "ga",
    version,
    about = "AI-powered commit message generator"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a commit message for the staged changes and commit them.
    Commit(CommitArgs),
}

#[derive(Args, Debug)]
struct CommitArgs {
    /// API key for the model provider.
    #[arg(short = 'k', long, env = "GA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model to use [default: anthropic/claude-3.5-haiku]
    #[arg(short, long, env = "GA_MODEL")]
    model: Option<String>,

    /// Maximum completion tokens per request [default: 8192]
    #[arg(short = 't', long, env = "GA_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Model API request timeout in seconds [default: 30]
    #[arg(long, env = "GA_TIMEOUT")]
    timeout: Option<u64>,

    /// Additional instruction for the agent (repeatable).
    #[arg(
        short = 'i',
        long = "instruction",
        env = "GA_INSTRUCTIONS",
        value_delimiter = '\n'
    )]
    instructions: Vec<String>,

    /// Show token usage and timing for every step.
    #[arg(short, long, env = "GA_VERBOSE")]
    verbose: bool,

    /// Commit without the confirmation prompt.
    #[arg(short = 'y', long, env = "GA_NO_INTERACTIVE")]
    non_interactive: bool,

    /// Config file (defaults to .ga.toml in the working directory, if present).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let Command::Commit(args) = cli.command;
    logging::init(args.verbose);

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    if let Err(err) = cmd_commit(args, &cancel).await {
        if cancel.is_cancelled() {
            eprintln!("Interrupted; nothing was committed.");
            std::process::exit(exit_codes::INTERRUPTED);
        }
        eprintln!("Error: {err:#}");
        std::process::exit(exit_codes::FAILURE);
    }
}

async fn cmd_commit(args: CommitArgs, cancel: &CancellationToken) -> Result<()> {
    let workdir = std::env::current_dir().context("resolve working directory")?;
    let config = resolve_config(&args, &workdir)?;
    let api_key = args
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or(ModelError::MissingApiKey)?;

    let model = OpenRouter::new(OpenRouterConfig {
        api_key,
        api_url: config.api_url.clone(),
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        timeout: config.timeout(),
    })?;
    let system_prompt = PromptBuilder::new()?.build(&config.instructions)?;
    let tools = ToolSet::standard(ToolContext {
        workdir: workdir.clone(),
        command_timeout: config.command_timeout(),
        output_limit_bytes: config.tool_output_limit_bytes,
    })?;
    let agent = Agent::new(Arc::new(model), tools, system_prompt)
        .with_hooks(console_hooks(args.verbose))
        .with_max_iterations(config.max_iterations);

    if args.verbose {
        print_session_header(&config);
    }
    println!("Analyzing changes...");

    let message = match agent.run(cancel).await {
        Ok(message) => message,
        Err(AgentError::ModelReported(reason)) => bail!("{reason}"),
        Err(err) => return Err(err).context("agent run failed"),
    };

    println!("\nGenerated commit message:\n{message}");

    if !args.non_interactive && !confirm(cancel).await? {
        println!("Message not committed.");
        return Ok(());
    }
    if cancel.is_cancelled() {
        bail!("interrupted before commit");
    }

    commit(workdir, message).await?;
    println!("Successfully committed.");
    Ok(())
}

/// Commit the index with `message`; an empty index is an error.
async fn commit(workdir: PathBuf, message: String) -> Result<()> {
    let git = Git::new(workdir);
    let committed = tokio::task::spawn_blocking(move || git.commit_staged(&message))
        .await
        .context("join commit task")?
        .context("commit")?;
    if !committed {
        bail!("nothing staged to commit");
    }
    Ok(())
}

/// File config overlaid with flags and `GA_*` variables.
fn resolve_config(args: &CommitArgs, workdir: &Path) -> Result<AgentConfig> {
    let path = match &args.config {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} not found", path.display());
            }
            path.clone()
        }
        None => workdir.join(DEFAULT_CONFIG_FILE),
    };
    let mut config = load_config(&path)?;

    if let Some(model) = &args.model {
        config.model.clone_from(model);
    }
    if let Some(max_tokens) = args.max_tokens {
        config.max_tokens = max_tokens;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    config.instructions.extend(args.instructions.iter().cloned());

    config.validate().context("invalid options")?;
    info!(model = %config.model, path = %path.display(), "configuration resolved");
    Ok(config)
}

fn console_hooks(verbose: bool) -> Hooks {
    let mut hooks = Hooks::new();
    hooks.on_agent_content(|turn| println!("\nAgent: {}", turn.message.text().trim()));
    hooks.on_before_tool_call(|call| println!("  Tool: {}({})", call.name, call.arguments));
    if verbose {
        hooks.on_after_step(|turn| {
            println!(
                "  Info: Used Tokens: {}, Time spent: {}s",
                turn.usage.completion_tokens,
                turn.usage.seconds_since(Utc::now())
            );
        });
    }
    hooks.on_suggestion(|suggestion| println!("\nSuggestion:\n{suggestion}"));
    hooks
}

fn print_session_header(config: &AgentConfig) {
    println!("=== Git Agent Session Started ===");
    println!("Start Time: {}", Utc::now().format("%H:%M:%S"));
    println!("Max Tokens: {}", config.max_tokens);
    println!("Model: {}", config.model);
    if !config.instructions.is_empty() {
        println!("Instructions: {}", config.instructions.join(", "));
    }
    println!();
}

/// Ask before committing. Anything but `n`/`no` confirms; end of input declines.
async fn confirm(cancel: &CancellationToken) -> Result<bool> {
    print!("\nCommit with this message? [Y/n]: ");
    std::io::stdout().flush().context("flush stdout")?;

    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    let read = tokio::select! {
        biased;
        () = cancel.cancelled() => bail!("interrupted"),
        read = stdin.read_line(&mut line) => read.context("read confirmation")?,
    };
    if read == 0 {
        return Ok(false);
    }
    let answer = line.trim().to_lowercase();
    Ok(answer != "n" && answer != "no")
}

fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("interrupt received, cancelling run");
        cancel.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(err = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(err = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use git_agent::test_support::TestRepo;

    use super::*;

    fn commit_args(argv: &[&str]) -> CommitArgs {
        let mut full = vec!["ga", "commit"];
        full.extend_from_slice(argv);
        let Command::Commit(args) = Cli::parse_from(full).command;
        args
    }

    #[test]
    fn parse_commit_flags() {
        let args = commit_args(&[
            "-k", "key", "-m", "openai/gpt-4o", "-t", "1024", "--timeout", "5", "-i", "be terse",
            "-i", "mention tickets", "-v", "-y",
        ]);
        assert_eq!(args.api_key.as_deref(), Some("key"));
        assert_eq!(args.model.as_deref(), Some("openai/gpt-4o"));
        assert_eq!(args.max_tokens, Some(1024));
        assert_eq!(args.timeout, Some(5));
        assert_eq!(args.instructions, vec!["be terse", "mention tickets"]);
        assert!(args.verbose);
        assert!(args.non_interactive);
    }

    #[test]
    fn flags_override_config_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            temp.path().join(DEFAULT_CONFIG_FILE),
            "model = \"from/file\"\nmax_tokens = 100\ninstructions = [\"from file\"]\n",
        )
        .expect("write");

        let args = commit_args(&["-t", "200", "-i", "from flag"]);
        let config = resolve_config(&args, temp.path()).expect("config");
        assert_eq!(config.model, "from/file");
        assert_eq!(config.max_tokens, 200);
        assert_eq!(config.instructions, vec!["from file", "from flag"]);
    }

    #[tokio::test]
    async fn commit_without_staged_changes_fails() {
        let repo = TestRepo::new().expect("repo");
        repo.write_file("notes.txt", "unstaged\n").expect("write");

        let err = commit(repo.path().to_path_buf(), "docs: add notes".to_string())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nothing staged"));
        assert!(repo.log_subjects().expect("log").is_empty());
    }

    #[tokio::test]
    async fn commit_applies_the_message_to_the_index() {
        let repo = TestRepo::new().expect("repo");
        repo.write_file("notes.txt", "hello\n").expect("write");
        repo.stage("notes.txt").expect("stage");

        commit(repo.path().to_path_buf(), "docs: add notes".to_string())
            .await
            .expect("commit");
        assert_eq!(repo.log_subjects().expect("log"), vec!["docs: add notes"]);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let args = commit_args(&["--config", "/definitely/missing.toml"]);
        let err = resolve_config(&args, temp.path()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
