use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use walkdir::WalkDir;

use super::{Tool, ToolContext, ToolError, display_path, io_error, is_git_dir, parse_args};
use crate::core::path::clean_path;

#[derive(Debug, Deserialize)]
struct GrepArgs {
    pattern: String,
    #[serde(default)]
    path: String,
}

/// `grep`: regex search over a file or a directory tree.
///
/// Matches are reported as `path:lineNumber:line`, paths relative to the
/// working directory.
pub struct Grep;

impl Tool for Grep {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn description(&self) -> &'static str {
        "Search file contents with a regular expression. Each match is reported as \
         'path:lineNumber:line'."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "A regular expression for searching the contents of files."
                },
                "path": {
                    "type": "string",
                    "description": "The path to the file or directory to search in. If it is a directory, the search will be recursive."
                }
            },
            "required": ["pattern", "path"]
        })
    }

    fn call(&self, ctx: &ToolContext, input: &str) -> Result<String, ToolError> {
        let args: GrepArgs = parse_args(input)?;
        let regex = Regex::new(&args.pattern)?;
        let rel = clean_path(&args.path)?;
        let target = ctx.resolve(&rel);

        let metadata = match fs::metadata(&target) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ToolError::NotFound(args.path));
            }
            Err(err) => return Err(io_error(format!("check path {}", rel.display()), err)),
        };

        let mut matches = Vec::new();
        if metadata.is_dir() {
            let walker = WalkDir::new(&target)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| !is_git_dir(e));
            for entry in walker {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                match fs::read(entry.path()) {
                    Ok(bytes) => scan(&ctx.workdir, entry.path(), &bytes, &regex, &mut matches),
                    Err(err) => debug!(path = %entry.path().display(), err = %err, "skipping unreadable file"),
                }
            }
        } else {
            let bytes = fs::read(&target)
                .map_err(|err| io_error(format!("read file {}", rel.display()), err))?;
            scan(&ctx.workdir, &target, &bytes, &regex, &mut matches);
        }

        if matches.is_empty() {
            return Err(ToolError::NoMatches(args.pattern));
        }
        Ok(serde_json::to_string(&matches)?)
    }
}

fn scan(root: &Path, path: &Path, bytes: &[u8], regex: &Regex, matches: &mut Vec<String>) {
    let Ok(text) = std::str::from_utf8(bytes) else {
        debug!(path = %path.display(), "skipping non-UTF-8 file");
        return;
    };
    let shown = display_path(root, path);
    for (index, line) in text.lines().enumerate() {
        if regex.is_match(line) {
            matches.push(format!("{shown}:{}:{line}", index + 1));
        }
    }
}
