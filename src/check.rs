//! Check file parser.
//!
//! A check file holds one or more expectations to assert against a rendered
//! plan:
//!
//! ```text
//! ===
//! alb is public
//! ===
//! -var env=foo
//! -target=module.frontend_router.module.alb
//! ---
//! + module.frontend_router.module.alb.aws_alb.alb
//!       internal: "false"
//!       subnets.{ident}: "subnet-55555555"
//! ---
//!       tags.component: "foo"
//! ```
//!
//! The lines between the header and the first `---` are extra arguments for
//! the plan command, one or more per line, whitespace-separated. Each
//! `---`-separated block after that is an expectation template searched for
//! independently in the plan output. A check with no blocks only asserts
//! that the plan command succeeds.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    /// Extra arguments appended to the plan command line.
    pub args: Vec<String>,
    /// Expectation templates, each searched for independently.
    pub blocks: Vec<String>,
    pub file_path: PathBuf,
    pub start_line: usize,
}

pub fn parse_check_file(path: &Path) -> Result<Vec<Check>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::ReadCheck {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(parse_check_content(&content, path))
}

pub fn parse_check_content(content: &str, path: &Path) -> Vec<Check> {
    let mut checks = Vec::new();
    let lines: Vec<&str> = content.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        if !is_header_separator(lines[i]) {
            i += 1;
            continue;
        }

        let start_line = i + 1;
        i += 1;
        if i >= lines.len() {
            break;
        }
        let name = lines[i].trim().to_string();

        i += 1;
        if i >= lines.len() || !is_header_separator(lines[i]) {
            continue;
        }
        i += 1;

        // Argument lines until the first --- separator or the next header
        let mut args = Vec::new();
        while i < lines.len() && !is_dash_separator(lines[i]) && !is_header_separator(lines[i]) {
            args.extend(lines[i].split_whitespace().map(str::to_string));
            i += 1;
        }

        // Expectation blocks, separated by further --- lines
        let mut blocks = Vec::new();
        while i < lines.len() && is_dash_separator(lines[i]) {
            i += 1;
            let mut block_lines = Vec::new();
            while i < lines.len() && !is_dash_separator(lines[i]) && !is_header_separator(lines[i])
            {
                block_lines.push(lines[i]);
                i += 1;
            }
            while block_lines.last().map(|s| s.trim().is_empty()).unwrap_or(false) {
                block_lines.pop();
            }
            if !block_lines.is_empty() {
                blocks.push(block_lines.join("\n"));
            }
        }

        checks.push(Check {
            name,
            args,
            blocks,
            file_path: path.to_path_buf(),
            start_line,
        });
    }

    checks
}

fn is_header_separator(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| c == '=')
}

fn is_dash_separator(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| c == '-')
}
