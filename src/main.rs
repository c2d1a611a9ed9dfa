use clap::Parser;
use planmatch::check::parse_check_file;
use planmatch::cli::Cli;
use planmatch::discover::discover_check_files;
use planmatch::output::Output;
use planmatch::plan::{run_check_file, FileResult, PlanConfig, PlanSource, ProgressEvent};
use rayon::prelude::*;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

fn main() -> anyhow::Result<()> {
    // Reset SIGPIPE handler to default (terminate) so piping to head/tail works correctly
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    let cli = Cli::parse();

    let use_color = !cli.no_color && atty::is(atty::Stream::Stdout);
    let mut output = Output::new(use_color);

    let root = cli
        .check_root
        .canonicalize()
        .unwrap_or(cli.check_root.clone());

    if cli.list {
        list_checks(&root, cli.pattern.as_deref(), &mut output)?;
        return Ok(());
    }

    let files = discover_check_files(&root)?;
    if files.is_empty() {
        eprintln!("No check files found");
        std::process::exit(1);
    }

    let source = match &cli.input {
        Some(path) => PlanSource::from_input_file(path)?,
        None => PlanSource::Engine(PlanConfig {
            engine: cli.engine.clone(),
            module_dir: cli
                .module_dir
                .canonicalize()
                .unwrap_or(cli.module_dir.clone()),
            vars: cli.vars.clone(),
            var_files: cli.var_files.clone(),
            env: parse_env_pairs(&cli.env),
            init: cli.init,
        }),
    };

    let start_time = Instant::now();

    let (progress_tx, progress_rx) = mpsc::channel::<ProgressEvent>();
    let verbose = cli.verbose;

    let progress_handle = thread::spawn(move || {
        let mut output = Output::new(use_color);
        for event in progress_rx {
            output.print_progress(&event, verbose);
        }
        output.finish_progress();
    });

    let pattern = cli.pattern.as_deref();
    let results: Vec<FileResult> = if cli.sequential || files.len() == 1 {
        files
            .iter()
            .map(|file| run_check_file(&file.path, &file.name, &source, pattern, Some(&progress_tx)))
            .collect()
    } else {
        files
            .par_iter()
            .map(|file| {
                let tx = progress_tx.clone();
                run_check_file(&file.path, &file.name, &source, pattern, Some(&tx))
            })
            .collect()
    };

    drop(progress_tx);
    progress_handle.join().unwrap();

    let elapsed = start_time.elapsed();
    output.print_results(&results, elapsed);

    let all_passed = results.iter().all(|r| r.passed());
    std::process::exit(if all_passed { 0 } else { 1 });
}

fn parse_env_pairs(pairs: &[String]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.clone(), String::new()),
        })
        .collect()
}

fn list_checks(
    root: &std::path::Path,
    pattern: Option<&str>,
    output: &mut Output,
) -> anyhow::Result<()> {
    let files = discover_check_files(root)?;

    let mut listed = Vec::new();
    for file in &files {
        let checks = parse_check_file(&file.path)?;

        let file_matches = pattern.map_or(true, |pat| file.name.contains(pat));
        let filtered: Vec<_> = if let Some(pat) = pattern {
            checks
                .into_iter()
                .filter(|c| file_matches || c.name.contains(pat))
                .collect()
        } else {
            checks
        };

        if !filtered.is_empty() || pattern.is_none() {
            listed.push((file, filtered));
        }
    }

    output.print_list(&listed);
    Ok(())
}
