use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use lex_tables::{
    apply::{apply_stored_corrections, resolve_tables},
    batch::{BatchReport, for_each_law},
    config::Config,
    correction::{CorrectionStats, CorrectionStore, ResetScope},
    extract::TableExtractor,
    progress::{BatchPhase, ProgressReporter, create_reporter},
};
use tracing::{error, info};

#[derive(Parser)]
#[clap(about = "Table reconstruction and correction reconciliation for law collections")]
struct Opts {
    #[clap(short, long, env = "LEX_TABLES_CONFIG")]
    config: PathBuf,
    /// Folder (dataset partition) to work on; defaults to the configured one.
    #[clap(short, long, global = true)]
    folder: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create correction files with every table undecided.
    Init {
        #[clap(long)]
        law: Option<String>,
        /// One file per version instead of one per law.
        #[clap(long)]
        per_version: bool,
    },
    /// Append newly discovered tables to existing correction files.
    Update {
        #[clap(long)]
        law: Option<String>,
        #[clap(long)]
        per_version: bool,
    },
    /// Report review completion per law.
    Status {
        #[clap(long)]
        law: Option<String>,
        #[clap(long)]
        per_version: bool,
    },
    /// Apply corrections to the rendered HTML pages.
    Build {
        #[clap(long)]
        law: Option<String>,
    },
    /// Print the resolved tables of one version as JSON.
    Resolve {
        #[clap(long)]
        law: String,
        #[clap(long)]
        version: String,
    },
    /// Delete correction files.
    Reset {
        #[clap(long)]
        law: Option<String>,
        /// legacy, per-version or all
        #[clap(long, default_value = "all")]
        scope: ResetScope,
    },
    /// Split law-level correction files into per-version files.
    Migrate {
        #[clap(long)]
        law: Option<String>,
    },
}

struct App {
    config: Config,
    folder: String,
    extractor: TableExtractor,
    store: CorrectionStore,
}

impl App {
    fn extracted_laws(&self, law: Option<String>) -> anyhow::Result<Vec<String>> {
        match law {
            Some(law) => Ok(vec![law]),
            None => self.extractor.list_laws().context("list laws"),
        }
    }

    fn corrected_laws(&self, law: Option<String>) -> anyhow::Result<Vec<String>> {
        match law {
            Some(law) => Ok(vec![law]),
            None => self.store.list_laws(&self.folder).context("list corrected laws"),
        }
    }

    /// `None` for the law-level file, else each extracted version.
    fn scopes(&self, law_id: &str, per_version: bool) -> Result<Vec<Option<String>>, lex_tables::Error> {
        if per_version {
            Ok(self.extractor.list_versions(law_id)?.into_iter().map(Some).collect())
        } else {
            Ok(vec![None])
        }
    }
}

/// Rendered pages by law: `<html_dir>/<folder>/<law>-<version>.html`.
fn discover_pages(app: &App, law: Option<&str>) -> anyhow::Result<IndexMap<String, Vec<(String, PathBuf)>>> {
    let html_dir = app
        .config
        .html_dir
        .as_ref()
        .ok_or_else(|| anyhow!("html_dir is not configured"))?;
    let pattern = format!("{}/{}/*.html", html_dir.display(), app.folder);
    let mut pages: IndexMap<String, Vec<(String, PathBuf)>> = IndexMap::new();
    for path in glob::glob(&pattern).with_context(|| format!("glob {pattern}"))? {
        let path = path.context("read page path")?;
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let Some((law_id, version)) = stem.rsplit_once('-') else {
            continue;
        };
        if law.is_some_and(|law| law != law_id) {
            continue;
        }
        pages
            .entry(law_id.to_owned())
            .or_default()
            .push((version.to_owned(), path.clone()));
    }
    pages.sort_keys();
    Ok(pages)
}

fn concurrency() -> usize {
    num_cpus::get()
}

async fn run_batch(
    app: Arc<App>,
    command: Command,
    reporter: Arc<dyn ProgressReporter>,
) -> anyhow::Result<BatchReport> {
    reporter.set_phase(BatchPhase::DiscoveringLaws);
    let report = match command {
        Command::Init { law, per_version } => {
            let laws = app.extracted_laws(law)?;
            reporter.set_phase(BatchPhase::Initializing);
            let job_app = app.clone();
            let (report, outputs) = for_each_law(laws, concurrency(), reporter.clone(), move |law_id| {
                let mut created = 0usize;
                for version in job_app.scopes(law_id, per_version)? {
                    if job_app.store.initialize(
                        law_id,
                        version.as_deref(),
                        &job_app.folder,
                        &job_app.extractor,
                    )? {
                        created += 1;
                    }
                }
                Ok(created)
            })
            .await;
            let created: usize = outputs.iter().map(|(_, created)| created).sum();
            info!(created, "initialized correction files");
            report
        }
        Command::Update { law, per_version } => {
            let laws = app.extracted_laws(law)?;
            reporter.set_phase(BatchPhase::Updating);
            let job_app = app.clone();
            let (report, outputs) = for_each_law(laws, concurrency(), reporter.clone(), move |law_id| {
                let mut added = 0;
                for version in job_app.scopes(law_id, per_version)? {
                    added += job_app
                        .store
                        .update_with_new_tables(
                            law_id,
                            version.as_deref(),
                            &job_app.folder,
                            &job_app.extractor,
                        )?
                        .len();
                }
                Ok(added)
            })
            .await;
            for (law_id, added) in outputs.iter().filter(|(_, added)| *added > 0) {
                reporter.log_info(&format!("{law_id}: {added} new tables"));
            }
            report
        }
        Command::Status { law, per_version } => {
            let laws = app.extracted_laws(law)?;
            reporter.set_phase(BatchPhase::CheckingStatus);
            let job_app = app.clone();
            let (report, outputs) = for_each_law(laws, concurrency(), reporter.clone(), move |law_id| {
                let mut complete = true;
                let mut undecided = 0;
                let mut stats = CorrectionStats::default();
                for version in job_app.scopes(law_id, per_version)? {
                    let (done, missing) = job_app.store.validate_law_completion(
                        law_id,
                        version.as_deref(),
                        &job_app.folder,
                        &job_app.extractor,
                    )?;
                    complete &= done;
                    undecided += missing.len();
                    if let Some(file) = job_app.store.get(law_id, version.as_deref(), &job_app.folder) {
                        stats.merge(&CorrectionStats::from_file(&file));
                    }
                }
                Ok((complete, undecided, stats))
            })
            .await;
            let mut total = CorrectionStats::default();
            for (law_id, (complete, undecided, stats)) in &outputs {
                total.merge(stats);
                let mark = if *complete { "complete" } else { "open" };
                println!("{law_id}\t{mark}\t{undecided} undecided\t{stats}");
            }
            let complete = outputs.iter().filter(|(_, (complete, _, _))| *complete).count();
            println!("{complete}/{} laws complete; {total}", outputs.len());
            report
        }
        Command::Build { law } => {
            let pages = Arc::new(discover_pages(&app, law.as_deref())?);
            reporter.set_phase(BatchPhase::ApplyingCorrections);
            let laws = pages.keys().cloned().collect();
            let job_app = app.clone();
            let (report, outputs) = for_each_law(laws, concurrency(), reporter.clone(), move |law_id| {
                let mut missing_targets = 0;
                for (version, path) in pages.get(law_id).into_iter().flatten() {
                    if let Some(report) =
                        apply_stored_corrections(&job_app.store, &job_app.folder, law_id, version, path)?
                    {
                        missing_targets += report.missing_targets.len();
                    }
                }
                Ok(missing_targets)
            })
            .await;
            for (law_id, missing) in outputs.iter().filter(|(_, missing)| *missing > 0) {
                reporter.log_warn(&format!("{law_id}: {missing} merged tables kept, target missing"));
            }
            report
        }
        Command::Reset { law, scope } => {
            reporter.set_phase(BatchPhase::Resetting);
            match law {
                Some(law) => {
                    let job_app = app.clone();
                    let (report, _) = for_each_law(vec![law], 1, reporter.clone(), move |law_id| {
                        job_app.store.reset_law(law_id, &job_app.folder, scope)
                    })
                    .await;
                    report
                }
                None => {
                    let store_app = app.clone();
                    tokio::task::spawn_blocking(move || store_app.store.reset_folder(&store_app.folder, scope))
                        .await
                        .context("reset worker")?
                        .context("reset folder")?
                }
            }
        }
        Command::Migrate { law } => {
            let laws = app.corrected_laws(law)?;
            reporter.set_phase(BatchPhase::Migrating);
            let job_app = app.clone();
            let (report, _) = for_each_law(laws, concurrency(), reporter.clone(), move |law_id| {
                job_app.store.migrate_law_to_per_version(law_id, &job_app.folder)
            })
            .await;
            report
        }
        Command::Resolve { law, version } => {
            resolve(&app, &law, &version)?;
            BatchReport {
                succeeded: vec![law],
                failed: Vec::new(),
            }
        }
    };
    Ok(report)
}

fn resolve(app: &App, law_id: &str, version: &str) -> anyhow::Result<()> {
    let tables = app
        .extractor
        .extract_tables_from_version(law_id, version)
        .with_context(|| format!("extract tables of {law_id}@{version}"))?;
    let corrections = app.store.get_effective(law_id, version, &app.folder);
    let resolved = resolve_tables(&tables, corrections.as_ref());
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

async fn run(opts: Opts) -> anyhow::Result<bool> {
    let reporter = create_reporter();
    reporter.set_phase(BatchPhase::LoadingConfig);
    let config = Config::load(&opts.config)
        .with_context(|| format!("load config from {}", opts.config.display()))?;
    config.validate().map_err(|msg| anyhow!("{msg}"))?;

    let folder = opts.folder.unwrap_or_else(|| config.folder.clone());
    let extractor = TableExtractor::new(config.data_dir.join(&folder), &config.tables)
        .context("compile table markers")?;
    let store = CorrectionStore::new(&config.corrections_dir).with_reviewer(config.reviewer.clone());
    let app = Arc::new(App {
        config,
        folder,
        extractor,
        store,
    });

    let report = match run_batch(app, opts.command, reporter.clone()).await {
        Ok(report) => report,
        Err(e) => {
            reporter.log_error(&format!("{e:#}"));
            reporter.set_phase(BatchPhase::Failed("command aborted".to_owned()));
            reporter.finish();
            return Err(e);
        }
    };
    if report.is_success() {
        reporter.set_phase(BatchPhase::Completed);
    } else {
        reporter.set_phase(BatchPhase::Failed(format!("{} laws failed", report.failed.len())));
    }
    reporter.finish();
    if !report.is_success() {
        eprintln!("{report}");
    }
    Ok(report.is_success())
}

fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(?e, "failed to start runtime");
            std::process::exit(2);
        }
    };
    match runtime.block_on(run(opts)) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!(?e, "critical error");
            std::process::exit(2);
        }
    }
}
