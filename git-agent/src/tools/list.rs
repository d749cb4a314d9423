use serde::Deserialize;
use serde_json::{Value, json};
use walkdir::WalkDir;

use super::{Tool, ToolContext, ToolError, display_path, is_git_dir, parse_args};
use crate::core::path::clean_path;

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default)]
    path: String,
}

/// `list_files`: recursive listing, directories suffixed with `/`.
pub struct ListFiles;

impl Tool for ListFiles {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List entries of a directory recursively. If no path is provided, list entries of the \
         current directory. Directories end with '/'."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The relative path of the directory to list. Defaults to the current directory when empty."
                }
            },
            "required": ["path"]
        })
    }

    fn call(&self, ctx: &ToolContext, input: &str) -> Result<String, ToolError> {
        let args: ListArgs = parse_args(input)?;
        let rel = clean_path(&args.path)?;
        let root = ctx.resolve(&rel);
        if !root.exists() {
            return Err(ToolError::NotFound(args.path));
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(&root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_git_dir(e));
        for entry in walker {
            let entry = entry?;
            let mut name = display_path(&root, entry.path());
            if entry.file_type().is_dir() {
                name.push('/');
            }
            entries.push(name);
        }

        Ok(serde_json::to_string(&entries)?)
    }
}
