use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "planmatch",
    about = "Template-based matcher for infrastructure plan output",
    version
)]
pub struct Cli {
    /// Root directory (or single file) for check discovery
    #[arg(default_value = ".")]
    pub check_root: PathBuf,

    /// Provisioning engine binary to invoke
    #[arg(long, default_value = "terraform")]
    pub engine: String,

    /// Directory holding the root configuration to plan
    #[arg(long, default_value = ".")]
    pub module_dir: PathBuf,

    /// KEY=VALUE pair passed as -var on every plan (repeatable)
    #[arg(long = "var")]
    pub vars: Vec<String>,

    /// Variable file passed as -var-file on every plan (repeatable)
    #[arg(long = "var-file")]
    pub var_files: Vec<PathBuf>,

    /// KEY=VALUE environment for the engine process (repeatable)
    #[arg(long = "env")]
    pub env: Vec<String>,

    /// Run `<engine> init <module-dir>` before planning
    #[arg(long)]
    pub init: bool,

    /// Match checks against a pre-captured plan file instead of invoking
    /// the engine
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Filter checks by name pattern
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// List all available checks
    #[arg(short, long)]
    pub list: bool,

    /// Show each check as it completes with timing
    #[arg(short, long)]
    pub verbose: bool,

    /// Run check files sequentially instead of in parallel
    #[arg(short, long)]
    pub sequential: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
