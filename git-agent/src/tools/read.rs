use std::fs;
use std::io::ErrorKind;

use serde::Deserialize;
use serde_json::{Value, json};

use super::{Tool, ToolContext, ToolError, io_error, parse_args};
use crate::core::path::clean_path;

#[derive(Debug, Deserialize)]
struct ReadArgs {
    path: String,
}

/// `read_file`: whole file contents as text.
pub struct ReadFile;

impl Tool for ReadFile {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a given relative file path. Use this when you want to see what's \
         inside a file. Do not use this with directory names."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The relative path of a file in the working directory"
                }
            },
            "required": ["path"]
        })
    }

    fn call(&self, ctx: &ToolContext, input: &str) -> Result<String, ToolError> {
        let args: ReadArgs = parse_args(input)?;
        let rel = clean_path(&args.path)?;
        match fs::read(ctx.resolve(&rel)) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ToolError::NotFound(args.path)),
            Err(err) => Err(io_error(format!("read file {}", rel.display()), err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, ToolContext) {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("src")).expect("mkdir");
        fs::write(temp.path().join("src/lib.rs"), "pub fn answer() -> u32 { 42 }\n")
            .expect("write");
        let ctx = ToolContext::new(temp.path());
        (temp, ctx)
    }

    #[test]
    fn reads_file_relative_to_workdir() {
        let (_temp, ctx) = setup();
        let out = ReadFile
            .call(&ctx, r#"{"path": "./src/../src/lib.rs"}"#)
            .expect("read");
        assert_eq!(out, "pub fn answer() -> u32 { 42 }\n");
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_temp, ctx) = setup();
        let err = ReadFile.call(&ctx, r#"{"path": "nope.txt"}"#).unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn traversal_is_rejected() {
        let (_temp, ctx) = setup();
        for input in [r#"{"path": "../secret"}"#, r#"{"path": "/etc/passwd"}"#] {
            let err = ReadFile.call(&ctx, input).unwrap_err();
            assert!(err.to_string().contains("path traversal found"), "{err}");
        }
    }

    #[test]
    fn directory_is_an_io_error() {
        let (_temp, ctx) = setup();
        let err = ReadFile.call(&ctx, r#"{"path": "src"}"#).unwrap_err();
        assert!(matches!(err, ToolError::Io { .. }));
    }

    #[test]
    fn missing_path_argument_is_invalid() {
        let (_temp, ctx) = setup();
        let err = ReadFile.call(&ctx, "{}").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
