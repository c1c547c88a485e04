mod prompt;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nodepin_config::EnvironmentLayout;
use nodepin_orchestrator::{OrchestratorError, ResolutionResult, WorkflowOrchestrator};
use nodepin_resolver::{AutomaticStrategy, InteractiveStrategy};

use crate::prompt::TerminalPrompter;

/// nodepin - reproducible dependencies for node-based workflows
#[derive(Parser)]
#[command(name = "nodepin")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Environment root (default: ~/.nodepin)
  #[arg(long, global = true)]
  env: Option<PathBuf>,

  /// Log debug output to stderr
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Analyze a workflow and record everything that resolves automatically
  Resolve {
    /// Workflow name under workflows/ (with or without .json)
    workflow: String,
  },

  /// Resolve a workflow, asking about anything left over
  Fix {
    workflow: String,

    /// Report what would happen without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Never prompt; leave ambiguous and unresolved items as they are
    #[arg(long)]
    auto: bool,
  },

  /// Show whether a workflow is commit-safe
  Status {
    workflow: String,

    /// Print the status as JSON
    #[arg(long)]
    json: bool,
  },

  /// Fail unless a workflow is commit-safe
  Check {
    workflow: String,

    /// Succeed even with unresolved dependencies
    #[arg(long)]
    allow_issues: bool,
  },

  /// Fingerprint the models directory and update the index
  Scan,

  /// Record a download URL for a model
  Source {
    /// Content hash of the model
    hash: String,

    url: String,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let root = match cli.env {
    Some(root) => root,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".nodepin"),
  };
  let layout = EnvironmentLayout::new(root);

  let Some(command) = cli.command else {
    println!("nodepin - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run(command, layout).await })
}

fn init_logging(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

async fn run(command: Commands, layout: EnvironmentLayout) -> Result<()> {
  let root = layout.root().display().to_string();
  let orchestrator = WorkflowOrchestrator::open(layout)
    .await
    .with_context(|| format!("failed to open environment at {}", root))?;

  match command {
    Commands::Resolve { workflow } => {
      let result = orchestrator
        .resolve(&workflow)
        .await
        .with_context(|| format!("failed to resolve workflow '{}'", workflow))?;
      print_result(&result);
    }

    Commands::Fix {
      workflow,
      dry_run,
      auto,
    } => {
      if dry_run {
        let report = orchestrator.dry_run(&workflow).await?;
        println!(
          "{}: {} node(s) and {} model(s) resolve automatically",
          workflow, report.auto_nodes, report.auto_models
        );
        if report.needs_interaction() {
          println!(
            "{}: {} node(s) and {} model(s) need a decision",
            workflow, report.interactive_nodes, report.interactive_models
          );
        } else {
          println!("{}: nothing needs a decision", workflow);
        }
        return Ok(());
      }

      let outcome = if auto {
        let mut nodes = AutomaticStrategy;
        let mut models = AutomaticStrategy;
        orchestrator
          .fix_resolution(&workflow, Some(&mut nodes), Some(&mut models), false)
          .await
      } else {
        let mut nodes = InteractiveStrategy::new(TerminalPrompter::new());
        let mut models = InteractiveStrategy::new(TerminalPrompter::new());
        orchestrator
          .fix_resolution(&workflow, Some(&mut nodes), Some(&mut models), false)
          .await
      };

      match outcome {
        Ok(result) => print_result(&result),
        Err(OrchestratorError::Cancelled { saved, .. }) => {
          eprintln!("Cancelled. Progress saved ({} decision(s)).", saved);
        }
        Err(e) => return Err(e).context(format!("failed to fix workflow '{}'", workflow)),
      }
    }

    Commands::Status { workflow, json } => {
      let report = orchestrator.dry_run(&workflow).await?;
      let issues: Vec<String> = report
        .result
        .issues()
        .iter()
        .map(ToString::to_string)
        .collect();

      if json {
        let status = serde_json::json!({
          "workflow": workflow,
          "commit_safe": issues.is_empty(),
          "issues": issues,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
      } else if issues.is_empty() {
        println!("{}: commit-safe", workflow);
      } else {
        println!("{}: {} issue(s)", workflow, issues.len());
        for issue in &issues {
          println!("  - {}", issue);
        }
      }
    }

    Commands::Check {
      workflow,
      allow_issues,
    } => match orchestrator.check_commit(&workflow, allow_issues).await {
      Ok(result) if result.is_commit_safe() => println!("{}: commit-safe", workflow),
      Ok(result) => {
        eprintln!(
          "{}: committing with {} issue(s)",
          workflow,
          result.issues().len()
        );
      }
      Err(OrchestratorError::CommitBlocked { workflow, issues }) => {
        for issue in &issues {
          eprintln!("  - {}", issue);
        }
        bail!(
          "workflow '{}' is not commit-safe ({} issue(s)); use --allow-issues to override",
          workflow,
          issues.len()
        );
      }
      Err(e) => return Err(e.into()),
    },

    Commands::Scan => {
      let report = orchestrator
        .scan_models()
        .await
        .context("failed to scan models")?;
      println!(
        "{} file(s): {} indexed, {} unchanged, {} removed",
        report.files, report.indexed, report.unchanged, report.removed
      );
      for (path, error) in &report.failed {
        eprintln!("  failed: {}: {}", path, error);
      }
    }

    Commands::Source { hash, url } => {
      let changed = orchestrator
        .add_model_source(&hash, &url)
        .await
        .with_context(|| format!("failed to record source for model {}", hash))?;
      if changed {
        println!("{}: source recorded in nodepin.toml", hash);
      } else {
        println!("{}: source recorded (nodepin.toml unchanged)", hash);
      }
    }
  }

  Ok(())
}

fn print_result(result: &ResolutionResult) {
  for line in result.summary() {
    println!("{}: {}", result.workflow, line);
  }
  for issue in result.issues() {
    println!("  - {}", issue);
  }
}
