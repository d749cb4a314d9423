use ::glob::{MatchOptions, Pattern};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{Tool, ToolContext, ToolError, display_path, parse_args};
use crate::core::path::clean_path;

#[derive(Debug, Deserialize)]
struct GlobArgs {
    pattern: String,
}

/// `glob`: sorted files matching a shell-style pattern under the working directory.
pub struct GlobFiles;

impl Tool for GlobFiles {
    fn name(&self) -> &'static str {
        "glob"
    }

    fn description(&self) -> &'static str {
        "Find files matching glob patterns. Useful for finding test files, configuration files, \
         or files of specific types."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "A glob pattern to match files, e.g. '*.txt' for text files or 'src/**/*_test.*' for test files."
                }
            },
            "required": ["pattern"]
        })
    }

    fn call(&self, ctx: &ToolContext, input: &str) -> Result<String, ToolError> {
        let args: GlobArgs = parse_args(input)?;
        let rel = clean_path(&args.pattern)?;

        let root = Pattern::escape(&ctx.workdir.to_string_lossy());
        let full = format!("{root}/{}", rel.to_string_lossy());
        let options = MatchOptions {
            require_literal_leading_dot: true,
            ..MatchOptions::new()
        };
        let paths = ::glob::glob_with(&full, options).map_err(|source| ToolError::Pattern {
            pattern: args.pattern.clone(),
            source,
        })?;

        let mut matches = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) => matches.push(display_path(&ctx.workdir, &path)),
                Err(err) => debug!(err = %err, "skipping unreadable glob entry"),
            }
        }
        if matches.is_empty() {
            return Err(ToolError::NoMatches(args.pattern));
        }
        matches.sort();

        Ok(serde_json::to_string(&matches)?)
    }
}
