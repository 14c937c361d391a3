// src/main.rs

mod output;

use anyhow::{bail, Context, Result};
use attendance_core::dates::parse_api_date;
use attendance_core::{
    AttendanceApi, Clock, DateWindow, DayWiseJob, DirectoryCache, EmployeeBreakdownJob,
    EmployeeFilter, EngineConfig, HttpAttendanceApi, MonthWiseJob, Notification, NotificationSink, Outcome, ReportAggregator,
    ReportJob, ReportSession, ReportSink, ReportView, RequestRetrier, Searchable, ShiftFilter,
    SystemClock,
};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::io;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use output::{pager_line, render, OutputFormat, Tabular};

#[derive(Parser, Debug)]
#[command(
    name = "attendance-report",
    about = "Month-wise, day-wise and per-employee attendance reports",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Keep rows whose name or employee id contains this text
    #[arg(short, long, global = true)]
    search: Option<String>,

    /// Page to show in table output (1-based)
    #[arg(short, long, global = true, default_value_t = 1)]
    page: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-employee totals for a date range
    Month {
        /// First day, YYYY-MM-DD (defaults to the start of the current month)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD (defaults to the end of the current month)
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,
        /// Restrict the report to these employee ids
        #[arg(long = "employee")]
        employees: Vec<String>,
    },
    /// Attendance records of a single day
    Day {
        /// Day, YYYY-MM-DD (defaults to today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// All, General, Shift-A, Shift-B or Shift-C
        #[arg(long, default_value = "All")]
        shift: String,
    },
    /// Day-by-day attendance of one employee
    Breakdown {
        /// Employee id
        #[arg(long)]
        employee: String,
        /// First day, YYYY-MM-DD (defaults to the start of the current month)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD (defaults to the end of the current month)
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_api_date(value).ok_or_else(|| format!("'{}' is not a YYYY-MM-DD date", value))
}

/// Prints toasts to stderr.
struct StderrNotifier;

impl NotificationSink for StderrNotifier {
    fn notify(&self, notification: Notification) {
        eprintln!("{}", notification);
    }
}

/// Keeps the most recently published row set.
struct CollectingSink<R> {
    rows: Mutex<Option<Vec<R>>>,
}

impl<R> CollectingSink<R> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(None),
        })
    }

    fn take(&self) -> Vec<R> {
        match self.rows.lock() {
            Ok(mut guard) => guard.take().unwrap_or_default(),
            Err(poisoned) => poisoned.into_inner().take().unwrap_or_default(),
        }
    }
}

impl<R: Send + Sync> ReportSink<R> for CollectingSink<R> {
    fn publish(&self, rows: Vec<R>) {
        match self.rows.lock() {
            Ok(mut guard) => *guard = Some(rows),
            Err(poisoned) => *poisoned.into_inner() = Some(rows),
        }
    }
}

struct Engine {
    config: EngineConfig,
    api: Arc<dyn AttendanceApi>,
    clock: Arc<dyn Clock>,
    retrier: RequestRetrier,
    cache: DirectoryCache,
}

impl Engine {
    fn from_config(config: EngineConfig) -> Result<Self> {
        let api: Arc<dyn AttendanceApi> = Arc::new(
            HttpAttendanceApi::new(config.http_config())
                .context("Failed to initialise attendance API client")?,
        );
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let retrier = RequestRetrier::new(config.retry_policy());
        let cache = DirectoryCache::new(api.clone(), clock.clone(), retrier, config.cache_ttl());
        Ok(Self {
            config,
            api,
            clock,
            retrier,
            cache,
        })
    }

    /// Runs `job` in a fresh session and returns the published rows. Ctrl-C
    /// tears the session down.
    async fn run<J>(&self, job: J) -> Result<Vec<J::Row>>
    where
        J: ReportJob,
    {
        let sink = CollectingSink::new();
        let session = ReportSession::new(
            self.cache.clone(),
            self.clock.clone(),
            sink.clone(),
            Arc::new(StderrNotifier),
            self.config.session_config(),
        );

        let outcome = tokio::select! {
            outcome = session.request(job) => outcome,
            Ok(()) = tokio::signal::ctrl_c() => {
                warn!("Interrupted; cancelling report run");
                session.teardown();
                Outcome::TornDown
            }
        };

        match outcome {
            Outcome::Settled { rows } => {
                info!("Report ready with {} rows", rows);
                Ok(sink.take())
            }
            Outcome::Failed(e) => bail!("Report run failed: {}", e),
            other => bail!("Report run did not complete: {:?}", other),
        }
    }
}

fn present<R>(rows: Vec<R>, cli: &Cli, page_size: usize) -> Result<()>
where
    R: Tabular + Searchable + Clone,
{
    let mut view = ReportView::new(page_size);
    view.set_rows(rows);
    if let Some(query) = &cli.search {
        view.set_query(query.as_str());
    }
    view.set_page(cli.page);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.format {
        OutputFormat::Table => {
            render(&view.current_page(), cli.format, &mut out)?;
            eprintln!(
                "{}",
                pager_line(view.page(), view.total_pages(), &view.visible_pages())
            );
        }
        // exports carry every matching row, not just the current page
        OutputFormat::Json | OutputFormat::Csv => render(&view.filtered(), cli.format, &mut out)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("Failed to load ATTENDANCE_* configuration")?;
    info!("Using attendance service at {}", config.api_base_url);
    let page_size = config.page_size;
    let engine = Engine::from_config(config)?;

    match &cli.command {
        Command::Month {
            from,
            to,
            employees,
        } => {
            let current = DateWindow::month_of(Local::now().date_naive());
            let job = MonthWiseJob::new(
                ReportAggregator::new(engine.api.clone(), engine.retrier),
                from.unwrap_or(current.from()),
                to.unwrap_or(current.to()),
            )
            .with_filter(EmployeeFilter::from_ids(employees.clone()))
            .with_batch_size(engine.config.batch_size);
            let rows = engine.run(job).await?;
            present(rows, &cli, page_size)
        }
        Command::Day { date, shift } => {
            let shift: ShiftFilter = shift.parse().unwrap_or_default();
            let job = DayWiseJob::new(
                engine.api.clone(),
                engine.retrier,
                date.unwrap_or_else(|| Local::now().date_naive()),
            )
            .with_shift(shift);
            let rows = engine.run(job).await?;
            present(rows, &cli, page_size)
        }
        Command::Breakdown { employee, from, to } => {
            let current = DateWindow::month_of(Local::now().date_naive());
            let job = EmployeeBreakdownJob::new(
                engine.api.clone(),
                engine.retrier,
                employee.clone(),
                from.unwrap_or(current.from()),
                to.unwrap_or(current.to()),
            )
            .with_batch_size(engine.config.batch_size);
            let rows = engine.run(job).await?;
            present(rows, &cli, page_size)
        }
    }
}
