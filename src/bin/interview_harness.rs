//! Interview Template Harness CLI
//!
//! Compiles and activates every template in the config directory, and can
//! walk a template end to end through the facilitation engine.
//!
//! Usage:
//!   cargo run --features cli --bin interview_harness -- check
//!   cargo run --features cli --bin interview_harness -- check --json
//!   cargo run --features cli --bin interview_harness -- walk discovery-call

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use interview_core::config::ConfigLoader;
use interview_core::{
    FacilitationEngine, Protocol, SessionState, SessionStatus, TemplateRegistry,
};

#[derive(Parser, Debug)]
#[command(name = "interview_harness", about = "Check and walk interview templates")]
struct Args {
    /// Configuration directory (defaults to INTERVIEW_CONFIG_DIR or "config")
    #[arg(long, short = 'd', env = "INTERVIEW_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile and activate every template, reporting failures
    Check {
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Answer every question of a template with a placeholder and print the
    /// phase transitions
    Walk {
        template_id: String,
        /// Placeholder answer recorded for each question
        #[arg(long, default_value = "ok")]
        answer: String,
    },
}

#[derive(Debug, Serialize)]
struct CheckReport {
    total_templates: usize,
    compiled: usize,
    activated: usize,
    failed: usize,
    results: Vec<CheckResult>,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    path: String,
    template_id: Option<String>,
    phases: usize,
    questions: usize,
    /// Template phases the protocol never advances through
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_phases: Vec<String>,
    error: Option<String>,
}

fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();
    let loader = match &args.config_dir {
        Some(dir) => ConfigLoader::new(dir),
        None => ConfigLoader::from_env(),
    };

    let outcome = match args.command {
        Command::Check { json } => run_check(&loader, json),
        Command::Walk {
            template_id,
            answer,
        } => run_walk(&loader, &template_id, &answer),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Build a registry from the config directory.
fn load_registry(
    loader: &ConfigLoader,
    protocol: &Protocol,
) -> Result<(TemplateRegistry, CheckReport)> {
    let registry = TemplateRegistry::new();
    let loads = loader.load_templates()?;

    let mut report = CheckReport {
        total_templates: loads.len(),
        compiled: 0,
        activated: 0,
        failed: 0,
        results: Vec::with_capacity(loads.len()),
    };

    for load in loads {
        let path = load.path.display().to_string();
        let result = match load.result {
            Ok(template) => {
                report.compiled += 1;
                let template_id = template.id.clone();
                let phases = template.phases.len();
                let questions = template.questions.len();
                let missing_phases = protocol
                    .missing_phases(&template.phases)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                let error = registry.activate(template).err().map(|e| e.to_string());
                if error.is_none() {
                    report.activated += 1;
                }
                CheckResult {
                    path,
                    template_id: Some(template_id),
                    phases,
                    questions,
                    missing_phases,
                    error,
                }
            }
            Err(e) => CheckResult {
                path,
                template_id: None,
                phases: 0,
                questions: 0,
                missing_phases: Vec::new(),
                error: Some(e.to_string()),
            },
        };
        if result.error.is_some() {
            report.failed += 1;
        }
        report.results.push(result);
    }

    Ok((registry, report))
}

fn run_check(loader: &ConfigLoader, json: bool) -> Result<bool> {
    // Protocol errors fail the check too
    let protocol = loader.load_protocol()?;
    let (_, report) = load_registry(loader, &protocol)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Templates directory: {}", loader.templates_dir().display());
        println!(
            "Total: {}  Compiled: {}  Activated: {}  Failed: {}\n",
            report.total_templates, report.compiled, report.activated, report.failed
        );
        for r in &report.results {
            match &r.error {
                None => println!(
                    "  ✓ {} ({} phases, {} questions)",
                    r.template_id.as_deref().unwrap_or("?"),
                    r.phases,
                    r.questions
                ),
                Some(e) => println!("  ✗ {}: {}", r.path, e),
            }
            if !r.missing_phases.is_empty() {
                println!(
                    "    ⚠ phases not in protocol order: {}",
                    r.missing_phases.join(", ")
                );
            }
        }
    }

    Ok(report.failed == 0)
}

fn run_walk(loader: &ConfigLoader, template_id: &str, answer: &str) -> Result<bool> {
    let protocol = loader.load_protocol()?;
    let (registry, _) = load_registry(loader, &protocol)?;
    let template = registry
        .get_active(template_id)
        .with_context(|| format!("Template '{}' is not active", template_id))?;
    let protocol = protocol
        .with_overrides(&template.rules)
        .with_context(|| format!("Rule overrides of '{}' are invalid", template_id))?;

    let engine = FacilitationEngine::new(&template, &protocol);
    let mut state = SessionState::new();
    println!("Session {} on '{}'", state.session_id, template.name);

    while let Some(question) = engine.next_question(&state) {
        let before = state.current_phase.clone();
        state = match engine.apply_answer(&state, &question.id, serde_json::json!(answer)) {
            Ok(next) => next,
            Err(e) => {
                println!("  ✗ {}: {}", question.id, e);
                return Ok(false);
            }
        };
        println!("  [{}] {} → {}", question.phase, question.id, question.text);
        if before != state.current_phase {
            println!(
                "  phase: {} → {}",
                before.as_deref().unwrap_or("-"),
                state.current_phase.as_deref().unwrap_or("-")
            );
        }
    }

    let progress = engine.progress(&state);
    println!(
        "Answered {}/{} questions, status {:?}",
        progress.answered, progress.total, progress.status
    );
    Ok(progress.status == SessionStatus::Completed)
}
