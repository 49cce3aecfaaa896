use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use knitchart_core::{
    AppConfig, ChartSession, Command, FileProgressRepository, RowSettings, UndoTarget,
};
use knitchart_render::ChartSourceFactory;
use knitchart_tty::format_status;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

mod view;

#[derive(Debug, Parser)]
#[command(
    name = "knitchart",
    version,
    about = "track row progress on knitting charts"
)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding saved progress and logs
    #[arg(long = "state-dir", global = true)]
    state_dir: Option<PathBuf>,

    /// PDF page to open (0-based)
    #[arg(short = 'p', long = "page", global = true, default_value_t = 0)]
    page: usize,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Print the current row and check count
    Status { file: PathBuf },
    /// Move forward by the configured step
    Advance {
        file: PathBuf,
        /// How many times to advance
        #[arg(short = 'n', long, default_value_t = 1)]
        times: usize,
    },
    /// Run a sequence of advances and undos in one session
    Run {
        file: PathBuf,
        #[arg(required = true, value_enum)]
        steps: Vec<Step>,
    },
    /// Regenerate markers, discarding all progress
    Reset {
        file: PathBuf,
        #[arg(long = "start-y")]
        start_y: Option<f64>,
        #[arg(long = "row-height")]
        row_height: Option<f64>,
        #[arg(long)]
        step: Option<usize>,
    },
    /// Print the saved progress as JSON
    Export { file: PathBuf },
    /// Interactive terminal view
    View { file: PathBuf },
}

impl Action {
    fn file(&self) -> &Path {
        match self {
            Action::Status { file }
            | Action::Advance { file, .. }
            | Action::Run { file, .. }
            | Action::Reset { file, .. }
            | Action::Export { file }
            | Action::View { file } => file,
        }
    }

    fn is_interactive(&self) -> bool {
        matches!(self, Action::View { .. })
    }
}

/// One action of `run`. Undo history only lives as long as the session,
/// so undos are only meaningful after advances in the same run.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Step {
    Advance,
    UndoRow,
    UndoMarkers,
    UndoCount,
}

impl Step {
    fn undo_target(self) -> Option<UndoTarget> {
        match self {
            Step::Advance => None,
            Step::UndoRow => Some(UndoTarget::RowIndex),
            Step::UndoMarkers => Some(UndoTarget::Markers),
            Step::UndoCount => Some(UndoTarget::CheckCount),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let data_dir = match &args.state_dir {
        Some(dir) => dir.clone(),
        None => AppConfig::project_dirs()
            .map(|dirs| dirs.data_local_dir().to_path_buf())
            .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?,
    };
    let _log_guard = init_logging(&data_dir.join("logs"), !args.action.is_interactive())?;

    let config = match args.config.clone().or_else(AppConfig::default_path) {
        Some(path) => AppConfig::load(&path)
            .with_context(|| format!("failed to load config {:?}", path))?,
        None => AppConfig::default(),
    };
    let store = FileProgressRepository::new(data_dir.join("state"))?;
    info!(state = %store.root().display(), "using progress store");
    let mut session = ChartSession::new(Arc::new(store), config);

    let provider = ChartSourceFactory::with_page(args.page);
    let file = args.action.file().to_path_buf();
    session
        .open_with(&provider, &file)
        .await
        .with_context(|| format!("failed to open {:?}", file))?;

    match args.action {
        Action::Status { .. } => {}
        Action::Advance { times, .. } => {
            session.apply(Command::Advance { times })?;
        }
        Action::Run { steps, .. } => {
            for step in steps {
                match step.undo_target() {
                    None => {
                        session.apply(Command::Advance { times: 1 })?;
                    }
                    Some(target) => {
                        if !session.apply(Command::undo(target))? {
                            eprintln!("nothing to undo for {}", undo_label(target));
                        }
                    }
                }
            }
        }
        Action::Reset {
            start_y,
            row_height,
            step,
            ..
        } => {
            let current = session.row_settings();
            let settings = RowSettings {
                start_y: start_y.unwrap_or(current.start_y),
                row_height: row_height.unwrap_or(current.row_height),
                step_count: step.unwrap_or(current.step_count),
            };
            session.apply(Command::ApplyRowSettings(settings))?;
        }
        Action::Export { .. } => {
            let snapshot = session
                .snapshot()
                .ok_or_else(|| anyhow!("no chart is open"))?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            session.flush().await;
            return Ok(());
        }
        Action::View { .. } => {
            view::run(&mut session)?;
        }
    }

    session.flush().await;
    if let Some(status) = format_status(&session) {
        println!("{}", status);
    }
    Ok(())
}

fn undo_label(target: UndoTarget) -> &'static str {
    match target {
        UndoTarget::RowIndex => "row index",
        UndoTarget::Markers => "markers",
        UndoTarget::CheckCount => "check count",
    }
}

fn init_logging(log_dir: &Path, console: bool) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "knitchart.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    let console_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(EnvFilter::new("warn"))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
