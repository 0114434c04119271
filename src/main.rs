use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use school_conduct_early_warning::bands::{self, DetailedPresenceBand, PresenceBand, ScoreBand};
use school_conduct_early_warning::cache::StudentCache;
use school_conduct_early_warning::config::{ScoringConfig, WindowKind};
use school_conduct_early_warning::models::CaseStatus;
use school_conduct_early_warning::{db, report};

#[derive(Parser)]
#[command(name = "conduct-early-warning")]
#[command(about = "Attendance, conduct score and risk tracking for school staff", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file (falls back to EARLY_WARNING_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Attendance window, overriding the config file
    #[arg(long, global = true, value_enum)]
    window: Option<WindowKind>,

    /// Length of the rolling attendance window in days
    #[arg(long, global = true)]
    rolling_days: Option<i64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import daily attendance marks from a CSV file
    ImportAttendance {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import disciplinary measures from a CSV file
    ImportMeasures {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record the case-tracking status of a student
    SetCase {
        #[arg(long)]
        student: String,
        #[arg(long)]
        status: CaseStatus,
    },
    /// Show attendance, conduct score and risk for one student
    Summary {
        #[arg(long)]
        student: String,
        #[arg(long)]
        json: bool,
    },
    /// List students by risk
    Score {
        #[arg(long)]
        class: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        class: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export one row per student as CSV
    Export {
        #[arg(long)]
        class: Option<String>,
        #[arg(long, default_value = "students.csv")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("EARLY_WARNING_CONFIG").map(PathBuf::from));
    let scoring = ScoringConfig::load(config_path.as_deref())?
        .with_window_override(cli.window, cli.rolling_days)?;

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let today = Utc::now().date_naive();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool, today).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportAttendance { csv } => {
            let written = db::import_attendance_csv(&pool, &csv).await?;
            println!("Recorded {written} attendance marks from {}.", csv.display());
        }
        Commands::ImportMeasures { csv } => {
            let inserted = db::import_measures_csv(&pool, &csv).await?;
            println!("Inserted {inserted} measures from {}.", csv.display());
        }
        Commands::SetCase { student, status } => {
            db::set_case_status(&pool, &student, status).await?;
            println!("Case status for {student} set to {status}.");
        }
        Commands::Summary { student, json } => {
            print_summary(&pool, &scoring, today, &student, json).await?;
        }
        Commands::Score { class, limit } => {
            let cache = load(&pool, &scoring, today, class.as_deref()).await?;
            let summaries = cache.summaries(&scoring, today, class.as_deref());

            if summaries.is_empty() {
                println!("No students found for this scope.");
                return Ok(());
            }

            println!("Students by risk:");
            for summary in summaries.iter().take(limit) {
                println!(
                    "- {} ({}, {}) {} risk, {} points, presence {:.1}%, conduct {:.1}",
                    summary.profile.full_name,
                    summary.profile.code,
                    summary.profile.class_name,
                    bands::risk_label(summary.risk.level),
                    summary.risk.points,
                    summary.attendance.operational_presence_percent(),
                    summary.discipline.score
                );
            }
        }
        Commands::Report { class, out } => {
            let cache = load(&pool, &scoring, today, class.as_deref()).await?;
            let summaries = cache.summaries(&scoring, today, class.as_deref());
            let recent: Vec<_> = summaries
                .iter()
                .flat_map(|summary| cache.measures(summary.profile.id).iter().cloned())
                .collect();
            let report = report::build_report(
                class.as_deref(),
                scoring.window.start(today),
                today,
                &summaries,
                &recent,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { class, out } => {
            let cache = load(&pool, &scoring, today, class.as_deref()).await?;
            let summaries = cache.summaries(&scoring, today, class.as_deref());
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            report::write_csv(file, &summaries)?;
            println!("Exported {} students to {}.", summaries.len(), out.display());
        }
    }

    Ok(())
}

async fn load(
    pool: &PgPool,
    scoring: &ScoringConfig,
    today: NaiveDate,
    class_name: Option<&str>,
) -> anyhow::Result<StudentCache> {
    db::load_cache(pool, scoring.window.start(today), class_name).await
}

async fn print_summary(
    pool: &PgPool,
    scoring: &ScoringConfig,
    today: NaiveDate,
    student_code: &str,
    json: bool,
) -> anyhow::Result<()> {
    let cache = load(pool, scoring, today, None).await?;
    let profile = cache
        .find_by_code(student_code)
        .with_context(|| format!("no student with code {student_code}"))?;
    let summary = cache
        .summarize(profile.id, scoring, today)
        .with_context(|| format!("no records for {student_code}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let presence = summary.attendance.operational_presence_percent();
    let score = summary.discipline.score;

    println!(
        "{} ({}, {})",
        summary.profile.full_name, summary.profile.code, summary.profile.class_name
    );
    println!(
        "Attendance since {}: {} records, {} present, {} justified, {} absent ({} controlled)",
        scoring.window.start(today),
        summary.attendance.total_records,
        summary.attendance.present_count,
        summary.attendance.justified_count,
        summary.attendance.absent_count,
        summary.attendance.controlled_count
    );
    println!(
        "Presence {:.1}% ({} / {}), longest absence streak {}",
        presence,
        PresenceBand::for_percent(presence).label(),
        DetailedPresenceBand::for_percent(presence).label(),
        summary.attendance.max_consecutive_absences
    );
    println!(
        "Conduct score {:.1} ({}) from {} measures{}",
        score,
        ScoreBand::for_score(score).label(),
        summary.discipline.measure_count,
        match summary.discipline.days_since_last_negative {
            Some(days) if summary.discipline.bonus_active => {
                format!(", bonus active ({days} days since last negative event)")
            }
            Some(days) => format!(", {days} days since last negative event"),
            None => ", bonus active (no negative events)".to_string(),
        }
    );
    println!("Case tracking: {}", summary.case_status);
    println!(
        "Risk: {} ({} points)",
        bands::risk_label(summary.risk.level),
        summary.risk.points
    );
    for reason in &summary.risk.reasons {
        println!("  - {reason}");
    }

    Ok(())
}
