use crate::check::Check;
use crate::discover::CheckFile;
use crate::plan::{CheckResult, FileResult, ProgressEvent};
use similar::{ChangeTag, TextDiff};
use std::io::Write;
use std::time::Duration;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

pub struct Output {
    stdout: StandardStream,
    dot_count: usize,
}

impl Output {
    pub fn new(color: bool) -> Self {
        let color_choice = if color {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            stdout: StandardStream::stdout(color_choice),
            dot_count: 0,
        }
    }

    fn set_color(&mut self, color: Color) {
        let _ = self.stdout.set_color(ColorSpec::new().set_fg(Some(color)));
    }

    fn set_bold(&mut self) {
        let _ = self.stdout.set_color(ColorSpec::new().set_bold(true));
    }

    fn set_dim(&mut self) {
        let _ = self.stdout.set_color(ColorSpec::new().set_dimmed(true));
    }

    fn reset(&mut self) {
        let _ = self.stdout.reset();
    }

    pub fn print_progress(&mut self, event: &ProgressEvent, verbose: bool) {
        match event {
            ProgressEvent::CheckStart { file, name } => {
                if verbose {
                    self.set_dim();
                    writeln!(self.stdout, "starting {}: {}", file, name).unwrap();
                    self.reset();
                    let _ = self.stdout.flush();
                }
            }
            ProgressEvent::CheckComplete(result) => {
                if verbose {
                    self.print_verbose_result(result);
                } else {
                    self.print_dot(result);
                }
            }
        }
    }

    fn print_dot(&mut self, result: &CheckResult) {
        if result.passed {
            self.set_color(Color::Green);
            write!(self.stdout, ".").unwrap();
        } else {
            self.set_color(Color::Red);
            write!(self.stdout, "F").unwrap();
        }
        self.reset();
        let _ = self.stdout.flush();

        self.dot_count += 1;
        if self.dot_count >= 80 {
            writeln!(self.stdout).unwrap();
            self.dot_count = 0;
        }
    }

    fn print_verbose_result(&mut self, result: &CheckResult) {
        if result.passed {
            self.set_color(Color::Green);
            write!(self.stdout, "✓").unwrap();
        } else {
            self.set_color(Color::Red);
            write!(self.stdout, "✗").unwrap();
        }
        self.reset();

        write!(self.stdout, " {}: {}", result.file, result.check.name).unwrap();
        self.set_dim();
        writeln!(self.stdout, " {:.2}s", result.elapsed.as_secs_f64()).unwrap();
        self.reset();
    }

    pub fn finish_progress(&mut self) {
        if self.dot_count > 0 {
            writeln!(self.stdout).unwrap();
        }
        writeln!(self.stdout).unwrap();
    }

    pub fn print_results(&mut self, results: &[FileResult], elapsed: Duration) {
        let mut total_passed = 0;
        let mut total_failed = 0;
        let mut failed_checks: Vec<&CheckResult> = Vec::new();
        let mut setup_errors: Vec<(&str, &str)> = Vec::new();

        let mut sorted_results: Vec<_> = results.iter().collect();
        sorted_results.sort_by(|a, b| a.name.cmp(&b.name));

        for file_result in &sorted_results {
            if let Some(setup_error) = &file_result.setup_error {
                setup_errors.push((file_result.name.as_str(), setup_error.as_str()));
                total_failed += 1;
                continue;
            }

            let file_passed = file_result.passed_checks();
            let file_total = file_result.results.len();
            let file_time = format!(" in {:.2}s", file_result.elapsed.as_secs_f64());

            total_passed += file_passed;
            total_failed += file_total - file_passed;

            if file_result.passed() {
                self.set_color(Color::Green);
                write!(self.stdout, "✓ {}", file_result.name).unwrap();
            } else {
                self.set_color(Color::Red);
                write!(self.stdout, "✗ {}", file_result.name).unwrap();
                failed_checks.extend(file_result.results.iter().filter(|r| !r.passed));
            }
            self.reset();
            writeln!(
                self.stdout,
                ": {}/{} checks passed{}",
                file_passed, file_total, file_time
            )
            .unwrap();
        }

        if !setup_errors.is_empty() {
            writeln!(self.stdout).unwrap();
            self.set_color(Color::Red);
            self.set_bold();
            writeln!(self.stdout, "Errors:").unwrap();
            self.reset();

            for (name, error) in &setup_errors {
                writeln!(self.stdout).unwrap();
                self.set_color(Color::Red);
                write!(self.stdout, "✗").unwrap();
                self.reset();
                writeln!(self.stdout, " {}", name).unwrap();
                writeln!(self.stdout, "  {}", error).unwrap();
            }
        }

        if !failed_checks.is_empty() {
            writeln!(self.stdout).unwrap();
            self.set_color(Color::Red);
            self.set_bold();
            writeln!(self.stdout, "Failures:").unwrap();
            self.reset();

            for result in failed_checks {
                writeln!(self.stdout).unwrap();
                self.set_color(Color::Red);
                write!(self.stdout, "✗").unwrap();
                self.reset();
                writeln!(self.stdout, " {}: {}", result.file, result.check.name).unwrap();
                writeln!(
                    self.stdout,
                    "  {}:{}",
                    result.check.file_path.display(),
                    result.check.start_line
                )
                .unwrap();
                if !result.check.args.is_empty() {
                    writeln!(self.stdout, "  Args: {}", result.check.args.join(" ")).unwrap();
                }

                if let Some(error) = &result.error {
                    writeln!(self.stdout, "  Error: {}", error).unwrap();
                } else if let (Some(block), Some(actual)) =
                    (&result.failed_block, &result.actual_output)
                {
                    writeln!(self.stdout, "  Expected block not found in plan output:").unwrap();
                    writeln!(self.stdout).unwrap();
                    self.print_diff(block, actual);
                }
            }
        }

        writeln!(self.stdout).unwrap();
        let elapsed_str = format!(" in {:.2}s", elapsed.as_secs_f64());

        if total_failed == 0 {
            self.set_color(Color::Green);
            self.set_bold();
            write!(self.stdout, "All {} checks passed", total_passed).unwrap();
            self.reset();
            writeln!(self.stdout, "{}", elapsed_str).unwrap();
        } else {
            self.set_bold();
            write!(self.stdout, "Summary:").unwrap();
            self.reset();
            writeln!(
                self.stdout,
                " {} passed, {} failed{}",
                total_passed, total_failed, elapsed_str
            )
            .unwrap();
        }
    }

    pub fn print_diff(&mut self, expected: &str, actual: &str) {
        let diff = TextDiff::from_lines(expected, actual);

        for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
            if idx > 0 {
                writeln!(self.stdout, "...").unwrap();
            }

            for op in group {
                for change in diff.iter_changes(op) {
                    let (sign, color) = match change.tag() {
                        ChangeTag::Delete => ("-", Color::Red),
                        ChangeTag::Insert => ("+", Color::Green),
                        ChangeTag::Equal => (" ", Color::White),
                    };

                    self.set_color(color);
                    write!(self.stdout, "{}{}", sign, change.value()).unwrap();
                    self.reset();
                    if change.missing_newline() {
                        writeln!(self.stdout).unwrap();
                    }
                }
            }
        }
    }

    pub fn print_list(&mut self, files: &[(&CheckFile, Vec<Check>)]) {
        for (file, checks) in files {
            writeln!(self.stdout).unwrap();
            self.set_bold();
            write!(self.stdout, "{}", file.name).unwrap();
            self.reset();
            writeln!(self.stdout, ": {} check(s)", checks.len()).unwrap();
            for check in checks {
                writeln!(self.stdout, "  - {}", check.name).unwrap();
            }
        }
    }
}
