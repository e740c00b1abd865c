use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use crate::api::{ApiConfig, HttpApi, JobApi};
use crate::dispatch::{execute_plan, NoticeLog};
use crate::model::{DispatchOutcome, NoticeLevel, Target};
use crate::picker::{ActiveTab, SelectionState};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "jobpick",
    version,
    about = "Pick an analyzer or fieldset and run it against a document or corpus"
)]
pub struct Cli {
    /// Base URL of the document backend
    #[arg(long, default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Bearer token for the backend (falls back to JOBPICK_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Per-request timeout
    #[arg(long, default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Target document id
    #[arg(long)]
    pub document_id: Option<String>,

    /// Target corpus id
    #[arg(long)]
    pub corpus_id: Option<String>,

    /// List available analyzers and fieldsets and exit (no TUI)
    #[arg(long)]
    pub list: bool,

    /// Print machine-readable JSON instead of text (with --list)
    #[arg(long)]
    pub json: bool,

    /// Run this analyzer directly and exit (no TUI)
    #[arg(long, conflicts_with = "fieldset")]
    pub analyzer: Option<String>,

    /// Run this fieldset directly and exit (no TUI)
    #[arg(long)]
    pub fieldset: Option<String>,

    /// Extract name for corpus-level fieldset runs
    #[arg(long)]
    pub name: Option<String>,
}

impl Cli {
    fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.base_url.clone(),
            token: self
                .token
                .clone()
                .or_else(|| std::env::var("JOBPICK_TOKEN").ok()),
            timeout: Duration::from(self.timeout),
        }
    }

    fn target(&self) -> Result<Target> {
        Target::new(self.document_id.clone(), self.corpus_id.clone())
            .context("a --document-id or --corpus-id target is required")
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let api: Arc<dyn JobApi> = Arc::new(HttpApi::new(&args.api_config())?);

    if args.list {
        return run_list(&args, api.as_ref()).await;
    }

    if args.analyzer.is_some() || args.fieldset.is_some() {
        return run_headless(&args, api.as_ref()).await;
    }

    run_picker(&args, api).await
}

#[cfg(feature = "tui")]
async fn run_picker(args: &Cli, api: Arc<dyn JobApi>) -> Result<()> {
    let target = args.target()?;
    crate::tui::run(api, target).await
}

/// Built without the TUI; only the headless surfaces are available.
#[cfg(not(feature = "tui"))]
async fn run_picker(_args: &Cli, _api: Arc<dyn JobApi>) -> Result<()> {
    anyhow::bail!("this build has no TUI; use --list, --analyzer or --fieldset")
}

/// Print both option lists, as text or JSON.
async fn run_list(args: &Cli, api: &dyn JobApi) -> Result<()> {
    let (analyzers, fieldsets) = tokio::join!(api.list_analyzers(), api.list_fieldsets());
    let analyzers = analyzers.context("fetch analyzers")?;
    let fieldsets = fieldsets.context("fetch fieldsets")?;

    if args.json {
        let out = serde_json::json!({
            "analyzers": analyzers,
            "fieldsets": fieldsets,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Analyzers:");
    if analyzers.is_empty() {
        println!("  (none)");
    }
    for a in &analyzers {
        println!("  {}  {}", a.id, a.description);
    }
    println!("Fieldsets:");
    if fieldsets.is_empty() {
        println!("  (none)");
    }
    for f in &fieldsets {
        println!("  {}  {}", f.id, f.name);
    }
    Ok(())
}

/// Run one flow without the TUI. Reuses the picker state machine so the
/// flow resolution is identical to the interactive path.
async fn run_headless(args: &Cli, api: &dyn JobApi) -> Result<()> {
    let target = args.target()?;

    let mut selection = SelectionState::default();
    if let Some(id) = &args.analyzer {
        selection.pick(id.clone());
    } else if let Some(id) = &args.fieldset {
        selection.switch_tab(ActiveTab::Fieldset);
        selection.pick(id.clone());
        if let Some(name) = &args.name {
            selection.edit_name(name.clone());
        }
    }

    let plan = selection.plan_run(&target)?;
    let mut log = NoticeLog::default();
    let outcome = execute_plan(api, &mut log, plan).await;

    for n in &log.notices {
        match n.level {
            NoticeLevel::Success | NoticeLevel::Info => println!("{}", n.text),
            NoticeLevel::Error => eprintln!("{}", n.text),
        }
    }
    if outcome == DispatchOutcome::Failed {
        std::process::exit(1);
    }
    Ok(())
}
