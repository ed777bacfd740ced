//! refrain - token-aware context repetition for Claude Code
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use refrain::cli::active::{ActiveCommand, ActiveOptions};
use refrain::cli::add::{AddCommand, AddOptions};
use refrain::cli::init::{InitCommand, InitOptions};
use refrain::cli::list::{ListCommand, ListOptions};
use refrain::cli::refresh::{RefreshCommand, RefreshOptions};
use refrain::cli::remove::{RemoveCommand, RemoveOptions};
use refrain::cli::serve::ServeCommand;
use refrain::cli::summary::{SummaryCommand, SummaryOptions};
use refrain::cli::track::{TrackCommand, TrackOptions};
use refrain::config::{find_project_root, refrain_home, Config};
use refrain::core::Category;
use refrain::error::exit_codes;
use refrain::hooks::runner::read_stdin;
use refrain::hooks::{run_hook, HookType};
use refrain::service::ContextService;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "REFRAIN_LOG";

// =============================================================================
// CLI Definition
// =============================================================================

/// refrain - token-aware context repetition for Claude Code
#[derive(Parser)]
#[command(name = "refrain")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve NDJSON requests on stdin/stdout until EOF
    Serve,

    /// [Internal] Run a hook (JSON stdin/stdout). Called by Claude Code hooks
    Hook {
        /// The hook event type
        #[arg(value_enum)]
        event: HookEvent,
    },

    /// Add or replace a context item
    Add {
        /// Item id
        id: String,
        /// Item content
        content: String,
        /// Priority 1-10; 8 and above is shown on every query
        #[arg(long, short)]
        priority: Option<i64>,
        /// guideline, state, or documentation
        #[arg(long, short)]
        category: Option<Category>,
        /// Tokens between repetitions
        #[arg(long, short)]
        repeat_after: Option<i64>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Remove a context item
    Remove {
        /// Item id
        id: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Record consumption of text
    Track {
        /// Text that was consumed
        text: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show item counts, the token counter, and upcoming repetitions
    Summary {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Print the items due now and mark them shown
    Active {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Refresh the git status item
    Refresh {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// List all context items
    List {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Create config, guidelines directory, and print hook settings
    Init {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
        /// Overwrite existing config files
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum HookEvent {
    SessionStart,
    UserPromptSubmit,
    PostToolUse,
}

impl From<HookEvent> for HookType {
    fn from(event: HookEvent) -> Self {
        match event {
            HookEvent::SessionStart => HookType::SessionStart,
            HookEvent::UserPromptSubmit => HookType::UserPromptSubmit,
            HookEvent::PostToolUse => HookType::PostToolUse,
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    // Set up panic handler
    setup_panic_handler();

    let cli = Cli::parse();
    init_logging(matches!(cli.command, Commands::Serve));

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("refrain error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Install the stderr log subscriber. stdout is reserved for command,
/// protocol, and hook output.
fn init_logging(serving: bool) {
    let default = if serving { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Set up the global panic handler.
///
/// On panic, logs to `~/.refrain/crash.log` and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("refrain panic: {}", info);

        if let Some(home) = refrain_home() {
            let _ = std::fs::create_dir_all(&home);
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

/// Run the CLI and return the exit code.
fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Hook { event } => run_hook_command(event.into()),
        Commands::Serve => run_serve(&cwd),
        Commands::Init { json, quiet, force } => run_init(json, quiet, force, &cwd),
        Commands::Add {
            id,
            content,
            priority,
            category,
            repeat_after,
            json,
            quiet,
        } => {
            let options = AddOptions {
                json,
                quiet,
                priority,
                category,
                repeat_after_tokens: repeat_after,
            };
            Ok(run_add(&open_service(&cwd), &id, &content, &options))
        }
        Commands::Remove { id, json, quiet } => Ok(run_remove(
            &open_service(&cwd),
            &id,
            &RemoveOptions { json, quiet },
        )),
        Commands::Track { text, json, quiet } => Ok(run_track(
            &open_service(&cwd),
            &text,
            &TrackOptions { json, quiet },
        )),
        Commands::Summary { json, quiet } => Ok(run_summary(
            &open_service(&cwd),
            &SummaryOptions { json, quiet },
        )),
        Commands::Active { json, quiet } => Ok(run_active(
            &open_service(&cwd),
            &ActiveOptions { json, quiet },
        )),
        Commands::Refresh { json, quiet } => Ok(run_refresh(
            &open_service(&cwd),
            &RefreshOptions { json, quiet },
        )),
        Commands::List { json, quiet } => Ok(run_list(
            &open_service(&cwd),
            &ListOptions { json, quiet },
        )),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

fn open_service(cwd: &Path) -> ContextService {
    let root = find_project_root(cwd);
    let config = Config::load_from_cwd(&root);
    ContextService::open(&root, config)
}

fn print_output(formatted: &str) {
    if !formatted.is_empty() {
        print!("{}", formatted);
    }
}

/// Convert a success boolean to an exit code.
fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::OK as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

fn run_hook_command(hook_type: HookType) -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Hooks never block the session: unreadable stdin is an empty payload
    let input = read_stdin().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not read hook input");
        "{}".to_string()
    });
    println!("{}", run_hook(hook_type, &input));
    Ok(ExitCode::from(exit_codes::OK as u8))
}

fn run_serve(cwd: &Path) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let service = Arc::new(open_service(cwd));
    tracing::info!(
        root = %service.root().display(),
        tokenizer = service.counter_name(),
        "serving"
    );
    ServeCommand::new(service).run()?;
    Ok(ExitCode::from(exit_codes::OK as u8))
}

fn run_init(
    json: bool,
    quiet: bool,
    force: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Initialize where the user is unless already inside a refrain project
    let root = find_project_root(cwd);
    let config = Config::load_from_cwd(&root);
    let cmd = InitCommand::new(&root, config);
    let options = InitOptions { json, quiet, force };

    let output = cmd.run(&options);
    print_output(&cmd.format_output(&output, &options));
    Ok(success_to_exit_code(output.success))
}

fn run_add(service: &ContextService, id: &str, content: &str, options: &AddOptions) -> ExitCode {
    let cmd = AddCommand::new(service);
    let output = cmd.run(id, content, options);
    print_output(&cmd.format_output(&output, options));
    success_to_exit_code(output.success)
}

fn run_remove(service: &ContextService, id: &str, options: &RemoveOptions) -> ExitCode {
    let cmd = RemoveCommand::new(service);
    let output = cmd.run(id);
    print_output(&cmd.format_output(&output, options));
    success_to_exit_code(output.success)
}

fn run_track(service: &ContextService, text: &str, options: &TrackOptions) -> ExitCode {
    let cmd = TrackCommand::new(service);
    let output = cmd.run(text);
    print_output(&cmd.format_output(&output, options));
    success_to_exit_code(output.success)
}

fn run_summary(service: &ContextService, options: &SummaryOptions) -> ExitCode {
    let cmd = SummaryCommand::new(service);
    print_output(&cmd.format_output(&cmd.run(), options));
    success_to_exit_code(true)
}

fn run_active(service: &ContextService, options: &ActiveOptions) -> ExitCode {
    let cmd = ActiveCommand::new(service);
    let output = cmd.run();
    print_output(&cmd.format_output(&output, options));
    success_to_exit_code(output.success)
}

fn run_refresh(service: &ContextService, options: &RefreshOptions) -> ExitCode {
    let cmd = RefreshCommand::new(service);
    let output = cmd.run();
    print_output(&cmd.format_output(&output, options));
    success_to_exit_code(output.success)
}

fn run_list(service: &ContextService, options: &ListOptions) -> ExitCode {
    let cmd = ListCommand::new(service);
    let output = cmd.run();
    print_output(&cmd.format_output(&output, options));
    success_to_exit_code(output.success)
}

// =============================================================================
// Tests
// =============================================================================
