//! Nanowave CLI
//!
//! Entry point for the `nanowave` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use nanowave::{
    simulator, CancelToken, ClaudeCli, IntegrationManager, Pipeline, PipelineEvent, PipelinePhase,
    Project, SkillRegistry, ToolConfig, UsageStore, Workspace, XcodebuildCompiler,
};

#[derive(Parser)]
#[command(name = "nanowave")]
#[command(about = "Describe an app, get a running Xcode project", version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Project directory (default: current directory)
    #[arg(long, short = 'd', global = true)]
    dir: Option<PathBuf>,

    /// Model passed to the agent
    #[arg(long, global = true)]
    model: Option<String>,

    /// Start a fresh agent session instead of resuming the stored one
    #[arg(long, global = true)]
    fresh_session: bool,

    /// Simulator to build, fix, and run against
    #[arg(long, global = true)]
    simulator: Option<String>,

    /// Verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Freeform request, routed to build, edit, or ask
    prompt: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a new app from a description
    Build {
        /// The app description
        prompt: Vec<String>,

        /// Image attachments (mockups, references)
        #[arg(long, short = 'i')]
        image: Vec<PathBuf>,
    },

    /// Change the existing app
    Edit {
        /// The change request
        prompt: Vec<String>,

        /// Image attachments
        #[arg(long, short = 'i')]
        image: Vec<PathBuf>,
    },

    /// Compile the project and repair errors
    Fix,

    /// Boot the simulator and launch the built app
    Run,

    /// Open the project in Xcode
    Open,

    /// Show the project record and usage
    Info,

    /// Ask a question about the project without changing it
    Ask {
        /// The question
        prompt: Vec<String>,
    },

    /// List nanowave projects under a directory
    Projects {
        /// Directory to scan (default: current directory)
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            if cancel.is_cancelled() {
                // Second interrupt: stop waiting for cleanup.
                process::exit(130);
            }
            eprintln!("\nInterrupted; stopping after the current step...");
            cancel.cancel();
        }) {
            eprintln!("Warning: could not install interrupt handler: {}", e);
        }
    }

    let workspace = Workspace::new(
        cli.dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))),
    );

    let mut config = match ToolConfig::load_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    if cli.model.is_some() {
        config.model = cli.model.clone();
    }

    if cli.fresh_session {
        reset_session(&workspace);
    }
    if let Some(ref simulator) = cli.simulator {
        persist_simulator(&workspace, simulator);
    }

    let registry = match SkillRegistry::load_embedded() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Skill catalog error: {}", e);
            process::exit(1);
        }
    };
    let integrations = IntegrationManager::new();
    let agent = ClaudeCli::new(config.agent_binary.clone(), cancel);
    let compiler = XcodebuildCompiler;
    let verbose = cli.verbose;
    let mut pipeline = Pipeline::new(
        &agent,
        &compiler,
        &registry,
        &integrations,
        config,
        workspace.clone(),
    );
    let mut on_event = progress_printer(verbose);

    match cli.command {
        Some(Commands::Build { prompt, image }) => {
            let prompt = join_prompt(&prompt);
            match pipeline.build(&prompt, image, &mut on_event) {
                Ok(result) => {
                    if result.is_complete() {
                        println!(
                            "Built {}: {} files, {} builder pass(es), {} fix attempt(s), ${:.2}",
                            result.app_name,
                            result.completed_files,
                            result.builder_passes,
                            result.fix_attempts,
                            result.total_cost_usd,
                        );
                    } else {
                        println!(
                            "Built {} with gaps: {} file(s) unfinished, compile {}",
                            result.app_name,
                            result.shortfall.len(),
                            if result.green { "green" } else { "failing" },
                        );
                        for path in &result.shortfall {
                            println!("  missing: {}", path);
                        }
                    }
                    process::exit(0);
                }
                Err(e) => exit_with(e),
            }
        }
        Some(Commands::Edit { prompt, image }) => {
            let prompt = join_prompt(&prompt);
            match pipeline.edit(&prompt, image, &mut on_event) {
                Ok(result) => {
                    println!(
                        "Updated {}: compile {}, ${:.2}",
                        result.app_name,
                        if result.green { "green" } else { "failing" },
                        result.total_cost_usd,
                    );
                    process::exit(0);
                }
                Err(e) => exit_with(e),
            }
        }
        Some(Commands::Fix) => match pipeline.fix(&mut on_event) {
            Ok(result) => {
                if result.green {
                    println!("{} compiles (after {} fix attempt(s))", result.app_name, result.fix_attempts);
                    process::exit(0);
                }
                println!(
                    "{} still failing after {} attempt(s)",
                    result.app_name, result.fix_attempts
                );
                process::exit(1);
            }
            Err(e) => exit_with(e),
        },
        Some(Commands::Run) => run_project(&workspace),
        Some(Commands::Open) => open_project(&workspace),
        Some(Commands::Info) => show_info(&workspace),
        Some(Commands::Ask { prompt }) => {
            let prompt = join_prompt(&prompt);
            match pipeline.ask(&prompt, &mut on_event) {
                Ok(answer) => {
                    println!("{}", answer);
                    process::exit(0);
                }
                Err(e) => exit_with(e),
            }
        }
        Some(Commands::Projects { root }) => list_projects(&root),
        None => {
            let prompt = join_prompt(&cli.prompt);
            if prompt.is_empty() {
                eprintln!("Nothing to do. Try: nanowave \"a habit tracker with streaks\"");
                process::exit(1);
            }
            match pipeline.dispatch(&prompt, vec![], &mut on_event) {
                Ok(summary) => {
                    println!("{}", summary);
                    process::exit(0);
                }
                Err(e) => exit_with(e),
            }
        }
    }
}

fn join_prompt(parts: &[String]) -> String {
    parts.join(" ").trim().to_string()
}

fn exit_with(error: nanowave::PipelineError) -> ! {
    eprintln!("Error: {}", error);
    process::exit(error.exit_code());
}

/// Progress lines on stderr; token text only in verbose mode.
fn progress_printer(verbose: bool) -> impl FnMut(PipelineEvent) {
    move |event: PipelineEvent| match event {
        PipelineEvent::PhaseStarted(phase) => {
            let label = match phase {
                PipelinePhase::Routing => "Routing request...",
                PipelinePhase::Analyzing => "Analyzing the idea...",
                PipelinePhase::Planning => "Planning the app...",
                PipelinePhase::Building => "Writing the app...",
                PipelinePhase::Editing => "Applying the change...",
                PipelinePhase::Fixing => "Compiling and repairing...",
                PipelinePhase::Asking => "Thinking...",
                PipelinePhase::Done => return,
            };
            eprintln!("{}", label);
        }
        PipelineEvent::ToolUse(name) => {
            if verbose {
                eprintln!("  tool: {}", name);
            }
        }
        PipelineEvent::BuilderPass {
            pass,
            missing,
            empty,
        } => {
            if missing > 0 || empty > 0 {
                eprintln!(
                    "  pass {}: {} missing, {} empty",
                    pass, missing, empty
                );
            }
        }
        PipelineEvent::FixAttempt { attempt } => {
            if verbose && attempt > 0 {
                eprintln!("  fix rounds: {}", attempt);
            }
        }
        PipelineEvent::AgentText(_) => {}
    }
}

fn load_project_or_exit(workspace: &Workspace) -> Project {
    match Project::load(&workspace.project_record_path()) {
        Ok(Some(project)) => project,
        Ok(None) => {
            eprintln!("No project in this directory; build one first.");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error reading project record: {}", e);
            process::exit(1);
        }
    }
}

fn reset_session(workspace: &Workspace) {
    if let Ok(Some(mut project)) = Project::load(&workspace.project_record_path()) {
        project.session_id = None;
        if let Err(e) = project.store(&workspace.project_record_path()) {
            eprintln!("Warning: could not reset session: {}", e);
        }
    }
}

fn persist_simulator(workspace: &Workspace, simulator: &str) {
    if let Ok(Some(mut project)) = Project::load(&workspace.project_record_path()) {
        project.simulator = Some(simulator.to_string());
        if let Err(e) = project.store(&workspace.project_record_path()) {
            eprintln!("Warning: could not store simulator choice: {}", e);
        }
    }
}

fn run_project(workspace: &Workspace) -> ! {
    let project = load_project_or_exit(workspace);
    match simulator::run_app(workspace, &project) {
        Ok(()) => {
            println!("Launched {} ({})", project.name, project.bundle_id);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn open_project(workspace: &Workspace) -> ! {
    let project = load_project_or_exit(workspace);
    match simulator::open_project(workspace, &project) {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn show_info(workspace: &Workspace) -> ! {
    let project = load_project_or_exit(workspace);
    println!("{} ({:?})", project.name, project.status);
    println!("  Bundle id: {}", project.bundle_id);
    println!("  Platform: {}", project.platform);
    if project.platforms.len() > 1 {
        let names: Vec<&str> = project.platforms.iter().map(|p| p.as_str()).collect();
        println!("  Platforms: {}", names.join(", "));
    }
    if let Some(family) = project.device_family {
        println!("  Device family: {}", family);
    }
    if let Some(ref simulator) = project.simulator {
        println!("  Simulator: {}", simulator);
    }
    if let Some(ref session) = project.session_id {
        println!("  Session: {}", session);
    }

    let usage = UsageStore::new(workspace.usage_path());
    match usage.totals() {
        Ok((cost, tokens)) => {
            println!(
                "  Usage: ${:.2} total ({} in, {} out, {} cache-read)",
                cost, tokens.input_tokens, tokens.output_tokens, tokens.cache_read_input_tokens
            );
        }
        Err(e) => println!("  Usage: unavailable ({})", e),
    }
    process::exit(0);
}

fn list_projects(root: &PathBuf) -> ! {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Cannot read {}: {}", root.display(), e);
            process::exit(1);
        }
    };

    let mut found = 0;
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let workspace = Workspace::new(&dir);
        if let Ok(Some(project)) = Project::load(&workspace.project_record_path()) {
            found += 1;
            println!(
                "{}  [{}]  {}  ({:?})",
                project.name,
                project.platform,
                dir.display(),
                project.status,
            );
        }
    }
    if found == 0 {
        println!("No nanowave projects under {}", root.display());
    }
    process::exit(0);
}
