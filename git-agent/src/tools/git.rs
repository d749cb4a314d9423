use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::{Tool, ToolContext, ToolError, parse_args};
use crate::io::git::Git;

/// Subcommands the model may run.
pub const READ_ONLY_SUBCOMMANDS: &[&str] = &[
    "diff", "status", "log", "show", "branch", "rev-list", "ls-files", "rev-parse", "describe",
    "tag",
];

/// Options that write files or run external programs, refused everywhere.
const FORBIDDEN_OPTIONS: &[&str] = &["--output", "--ext-diff", "--no-index"];

const BRANCH_WRITE_OPTIONS: &[&str] = &[
    "--delete",
    "--move",
    "--copy",
    "--force",
    "--set-upstream-to",
    "--unset-upstream",
    "--edit-description",
    "--track",
    "--no-track",
    "--create-reflog",
    "--recurse-submodules",
];
const BRANCH_WRITE_SHORT: &str = "dDmMcCfut";

const TAG_WRITE_OPTIONS: &[&str] = &[
    "--delete",
    "--annotate",
    "--sign",
    "--no-sign",
    "--local-user",
    "--force",
    "--message",
    "--file",
    "--edit",
    "--create-reflog",
];
const TAG_WRITE_SHORT: &str = "dasufmFe";

/// Options that put `branch`/`tag` in list mode, making positional arguments
/// patterns or commits instead of names to create. `-l` is checked separately.
const LIST_OPTIONS: &[&str] = &[
    "--list",
    "--contains",
    "--no-contains",
    "--merged",
    "--no-merged",
    "--points-at",
];

#[derive(Debug, Deserialize)]
struct GitArgs {
    args: Vec<String>,
}

/// Result of one git invocation, serialized for the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitOutput {
    pub exit_code: i32,
    pub output: String,
    pub error: String,
}

/// `git_command`: run an allowlisted, read-only git command.
pub struct GitCommand;

impl Tool for GitCommand {
    fn name(&self) -> &'static str {
        "git_command"
    }

    fn description(&self) -> &'static str {
        "Execute a safe, read-only Git command to retrieve repository information \
         (e.g. diff, status, log)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "args": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Git command arguments (e.g. ['status', '--porcelain'] or ['log', '--oneline', '-5'])"
                }
            },
            "required": ["args"]
        })
    }

    fn call(&self, ctx: &ToolContext, input: &str) -> Result<String, ToolError> {
        let args: GitArgs = parse_args(input)?;
        check_read_only(&args.args)?;

        let out = Git::new(&ctx.workdir)
            .run_bounded(&args.args, ctx.command_timeout, ctx.output_limit_bytes)
            .map_err(ToolError::Exec)?;
        if out.timed_out {
            return Err(ToolError::Timeout(ctx.command_timeout));
        }

        let output = GitOutput {
            exit_code: out.status.code().unwrap_or(-1),
            output: out.stdout_text("git"),
            error: out.stderr_text("git"),
        };
        debug!(exit_code = output.exit_code, "git command finished");
        Ok(serde_json::to_string(&output)?)
    }
}

/// Reject anything that is not a read-only git invocation, before spawning.
pub fn check_read_only(args: &[String]) -> Result<(), ToolError> {
    let Some(subcommand) = args.first() else {
        return Err(ToolError::DisallowedCommand(
            "there should be at least 1 subcommand".to_string(),
        ));
    };
    if !READ_ONLY_SUBCOMMANDS.contains(&subcommand.as_str()) {
        return Err(ToolError::DisallowedCommand(format!(
            "only read-only subcommands are available: {}",
            READ_ONLY_SUBCOMMANDS.join(", ")
        )));
    }

    let rest = &args[1..];
    for arg in rest {
        if FORBIDDEN_OPTIONS.iter().any(|opt| matches_option(arg, opt)) {
            return Err(ToolError::DisallowedCommand(format!(
                "option {arg} is not allowed"
            )));
        }
    }

    match subcommand.as_str() {
        "branch" => check_listing(subcommand, rest, BRANCH_WRITE_OPTIONS, BRANCH_WRITE_SHORT),
        "tag" => check_listing(subcommand, rest, TAG_WRITE_OPTIONS, TAG_WRITE_SHORT),
        _ => Ok(()),
    }
}

fn check_listing(
    subcommand: &str,
    args: &[String],
    long: &[&str],
    short: &str,
) -> Result<(), ToolError> {
    let mut listing = false;
    let mut positional = None;
    let mut after_separator = false;

    for arg in args {
        if after_separator || !arg.starts_with('-') || arg == "-" {
            if positional.is_none() {
                positional = Some(arg);
            }
            continue;
        }
        if arg == "--" {
            after_separator = true;
            continue;
        }
        if long.iter().any(|opt| matches_option(arg, opt))
            || (!arg.starts_with("--") && arg[1..].chars().any(|c| short.contains(c)))
        {
            return Err(ToolError::DisallowedCommand(format!(
                "{subcommand} {arg} modifies the repository"
            )));
        }
        if LIST_OPTIONS.iter().any(|opt| matches_option(arg, opt))
            || (!arg.starts_with("--") && arg[1..].contains('l'))
        {
            listing = true;
        }
    }

    match positional {
        Some(name) if !listing => Err(ToolError::DisallowedCommand(format!(
            "{subcommand} {name} would create a {subcommand}; use --list to filter"
        ))),
        _ => Ok(()),
    }
}

/// True if `arg` names the long `option`, with or without `=value`.
///
/// git accepts any unambiguous prefix of a long option, so `--unset-ups`
/// counts as `--unset-upstream`.
fn matches_option(arg: &str, option: &str) -> bool {
    let Some(name) = arg.strip_prefix("--") else {
        return false;
    };
    let name = name.split_once('=').map_or(name, |(name, _)| name);
    !name.is_empty()
        && option
            .strip_prefix("--")
            .is_some_and(|full| full.starts_with(name))
}
