//! Plan invocation and check execution.
//!
//! Each check file gets its own scratch directory in which the provisioning
//! engine is (optionally) initialised once, after which every check runs its
//! own plan command and searches the rendered output for its expectation
//! blocks. With a pre-captured plan (`--input`) the subprocess is skipped
//! entirely and all checks match against the same text.

use crate::check::{parse_check_file, Check};
use crate::error::{Error, Result};
use crate::template::Pattern;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Provisioning engine binary, e.g. `terraform`.
    pub engine: String,
    /// Directory holding the root configuration to plan.
    pub module_dir: PathBuf,
    /// KEY=VALUE pairs passed as `-var` on every plan.
    pub vars: Vec<String>,
    /// Variable files passed as `-var-file` on every plan.
    pub var_files: Vec<PathBuf>,
    /// Extra environment for the engine process.
    pub env: Vec<(String, String)>,
    /// Run `<engine> init <module-dir>` in the scratch dir before planning.
    pub init: bool,
}

impl PlanConfig {
    fn plan_args(&self, check_args: &[String]) -> Vec<String> {
        let mut args = vec!["plan".to_string(), "-no-color".to_string()];
        for var in &self.vars {
            args.push("-var".to_string());
            args.push(var.clone());
        }
        for file in &self.var_files {
            args.push(format!("-var-file={}", file.display()));
        }
        args.extend(check_args.iter().cloned());
        args.push(self.module_dir.display().to_string());
        args
    }
}

/// Where the plan text comes from.
pub enum PlanSource {
    /// Invoke the engine per check.
    Engine(PlanConfig),
    /// Pre-captured plan output; no subprocess.
    Captured(String),
}

impl PlanSource {
    pub fn from_input_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::ReadInput {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(PlanSource::Captured(normalize_output(text.as_bytes())))
    }
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub check: Check,
    pub passed: bool,
    /// The first expectation block that was not found, if any.
    pub failed_block: Option<String>,
    pub actual_output: Option<String>,
    pub error: Option<String>,
    pub elapsed: Duration,
    pub file: String,
}

#[derive(Debug, Clone)]
pub struct FileResult {
    pub file_path: PathBuf,
    pub name: String,
    pub results: Vec<CheckResult>,
    pub setup_error: Option<String>,
    pub elapsed: Duration,
}

impl FileResult {
    pub fn passed(&self) -> bool {
        self.setup_error.is_none() && self.results.iter().all(|r| r.passed)
    }

    pub fn passed_checks(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    CheckStart { file: String, name: String },
    CheckComplete(Box<CheckResult>),
}

fn run_command(
    program: &str,
    args: &[String],
    work_dir: &Path,
    env_vars: &[(String, String)],
) -> (String, i32) {
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(work_dir);
    for (key, value) in env_vars {
        cmd.env(key, value);
    }

    match cmd.output() {
        Ok(output) => {
            let mut combined = output.stdout;
            combined.extend_from_slice(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            (normalize_output(&combined), exit_code)
        }
        Err(e) => (format!("Failed to execute {}: {}", program, e), -1),
    }
}

/// Strip ANSI escapes (in case the engine ignores `-no-color`), normalize
/// line endings and drop trailing newlines.
fn normalize_output(raw: &[u8]) -> String {
    let stripped = strip_ansi_escapes::strip(raw);
    let text = String::from_utf8_lossy(&stripped).replace("\r\n", "\n");
    text.trim_end_matches('\n').to_string()
}

fn match_blocks(check: &Check, output: &str) -> (bool, Option<String>, Option<String>) {
    for block in &check.blocks {
        let pattern = match Pattern::compile(block) {
            Ok(p) => p,
            Err(e) => return (false, Some(block.clone()), Some(e.to_string())),
        };
        match pattern.search(output) {
            Ok(Some(_)) => {}
            Ok(None) => return (false, Some(block.clone()), None),
            Err(e) => return (false, Some(block.clone()), Some(e.to_string())),
        }
    }
    (true, None, None)
}

fn run_check(check: &Check, source: &PlanSource, work_dir: &Path, file: &str) -> CheckResult {
    let start = Instant::now();

    let output = match source {
        PlanSource::Captured(text) => text.clone(),
        PlanSource::Engine(config) => {
            let args = config.plan_args(&check.args);
            let (output, exit_code) = run_command(&config.engine, &args, work_dir, &config.env);
            if exit_code != 0 {
                return CheckResult {
                    check: check.clone(),
                    passed: false,
                    failed_block: None,
                    actual_output: Some(output),
                    error: Some(format!(
                        "{} plan exited with code {}",
                        config.engine, exit_code
                    )),
                    elapsed: start.elapsed(),
                    file: file.to_string(),
                };
            }
            output
        }
    };

    let (passed, failed_block, error) = match_blocks(check, &output);

    CheckResult {
        check: check.clone(),
        passed,
        failed_block,
        actual_output: Some(output),
        error,
        elapsed: start.elapsed(),
        file: file.to_string(),
    }
}

pub fn run_check_file(
    file_path: &Path,
    name: &str,
    source: &PlanSource,
    pattern: Option<&str>,
    progress_tx: Option<&Sender<ProgressEvent>>,
) -> FileResult {
    let start = Instant::now();

    let checks = match parse_check_file(file_path) {
        Ok(checks) => checks,
        Err(e) => {
            return FileResult {
                file_path: file_path.to_path_buf(),
                name: name.to_string(),
                results: vec![],
                setup_error: Some(e.to_string()),
                elapsed: start.elapsed(),
            };
        }
    };

    // Scratch directory for engine runs; never touches the caller's cwd
    let temp_dir = match TempDir::with_prefix(format!("planmatch_{}_", name.replace('/', "_"))) {
        Ok(d) => d,
        Err(e) => {
            return FileResult {
                file_path: file_path.to_path_buf(),
                name: name.to_string(),
                results: vec![],
                setup_error: Some(format!("Failed to create scratch dir: {}", e)),
                elapsed: start.elapsed(),
            };
        }
    };
    let work_dir = temp_dir
        .path()
        .canonicalize()
        .unwrap_or_else(|_| temp_dir.path().to_path_buf());

    if let PlanSource::Engine(config) = source {
        if config.init {
            let args = vec![
                "init".to_string(),
                config.module_dir.display().to_string(),
            ];
            let (output, exit_code) = run_command(&config.engine, &args, &work_dir, &config.env);
            if exit_code != 0 {
                return FileResult {
                    file_path: file_path.to_path_buf(),
                    name: name.to_string(),
                    results: vec![],
                    setup_error: Some(format!(
                        "{} init exited with code {}:\n{}",
                        config.engine, exit_code, output
                    )),
                    elapsed: start.elapsed(),
                };
            }
        }
    }

    let file_matches = pattern.is_none_or(|pat| name.contains(pat));

    let mut results = Vec::new();
    for check in &checks {
        if let Some(pat) = pattern {
            // Match if either the file name or the check name contains it
            if !file_matches && !check.name.contains(pat) {
                continue;
            }
        }

        if let Some(tx) = progress_tx {
            let _ = tx.send(ProgressEvent::CheckStart {
                file: name.to_string(),
                name: check.name.clone(),
            });
        }

        let result = run_check(check, source, &work_dir, name);
        if let Some(tx) = progress_tx {
            let _ = tx.send(ProgressEvent::CheckComplete(Box::new(result.clone())));
        }
        results.push(result);
    }

    FileResult {
        file_path: file_path.to_path_buf(),
        name: name.to_string(),
        results,
        setup_error: None,
        elapsed: start.elapsed(),
    }
}
