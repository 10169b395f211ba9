use std::path::PathBuf;

use anyhow::Context;
use chrono::{Days, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod attendance;
mod calendar;
mod config;
mod db;
mod error;
mod geo;
mod metrics;
mod models;
mod project;
mod report;
mod scoring;

#[derive(Parser)]
#[command(name = "attendance-analytics")]
#[command(about = "Attendance and performance analytics for Group Scholar", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Record a check-in for today, with optional coordinates
    CheckIn {
        #[arg(long)]
        email: String,
        #[arg(long, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lng: Option<f64>,
        #[arg(long, default_value = "office")]
        mode: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Record a check-out for today
    CheckOut {
        #[arg(long)]
        email: String,
    },
    /// Approve or reject an attendance record
    Decide {
        #[arg(long)]
        record: Uuid,
        #[arg(long)]
        approver: String,
        #[arg(long)]
        action: String,
    },
    /// List records waiting for an approval decision
    Pending {
        #[arg(long)]
        viewer: String,
    },
    /// Show each team member's status for one day
    Roster {
        #[arg(long)]
        viewer: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Performance snapshot for one user and month
    Snapshot {
        #[arg(long)]
        email: String,
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Month-to-date detail and recent timeline for one team member
    MemberDetail {
        #[arg(long)]
        viewer: String,
        #[arg(long)]
        member: String,
        #[arg(long)]
        json: bool,
    },
    /// Build the monthly team report
    TeamReport {
        #[arg(long)]
        viewer: String,
        #[arg(long)]
        month: Option<String>,
        #[arg(long, default_value = "team-report.md")]
        out: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Burndown, velocity, and risk assessment for a project
    ProjectAnalytics {
        #[arg(long)]
        project: String,
        #[arg(long, default_value = "month")]
        range: String,
        #[arg(long)]
        json: bool,
    },
    /// Import tasks from a CSV file
    ImportTasks {
        #[arg(long)]
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let engine_config = config::EngineConfig::from_env()?;
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool, Local::now().date_naive()).await?;
            println!("Seed data inserted.");
        }
        Commands::CheckIn {
            email,
            lat,
            lng,
            mode,
            note,
        } => {
            let user = db::user_by_email(&pool, &email).await?;
            let mode: models::WorkMode = mode.parse()?;
            let now = Local::now().naive_local();

            let geofence = match (lat, lng) {
                (Some(lat), Some(lng)) => geo::check_geofence(lat, lng, &engine_config),
                _ => None,
            };
            let record = db::check_in(
                &pool,
                &user,
                now,
                lat,
                lng,
                geofence.map(|check| check.distance_m),
                mode,
                note.as_deref(),
            )
            .await?;
            info!(
                user = %user.email,
                day = %record.day,
                status = %record.status,
                "check-in recorded"
            );

            println!(
                "Checked in {} at {} ({}).",
                user.full_name,
                now.format("%H:%M"),
                record.status
            );
            match geofence {
                Some(check) if check.within_range => {
                    println!("Location verified: {}m from the office.", check.distance_m);
                }
                Some(check) => {
                    println!(
                        "Outside the {}m office radius ({}m away); kept for manual review.",
                        engine_config.geofence_radius_m, check.distance_m
                    );
                }
                None if lat.is_some() => {
                    println!("Coordinates could not be validated; distance left unset.");
                }
                None => {}
            }
        }
        Commands::CheckOut { email } => {
            let user = db::user_by_email(&pool, &email).await?;
            let now = Local::now().naive_local();
            let record = db::check_out(&pool, &user, now).await?;

            println!(
                "Checked out {} at {}; {:.1}h credited, status {}.",
                user.full_name,
                now.format("%H:%M"),
                metrics::worked_hours(&record),
                record.status
            );
        }
        Commands::Decide {
            record,
            approver,
            action,
        } => {
            let approver = db::user_by_email(&pool, &approver).await?;
            let decision: attendance::Decision = action.parse()?;
            let updated =
                db::decide(&pool, record, &approver, decision, Local::now().naive_local()).await?;
            let owner = db::user_by_id(&pool, updated.user_id).await?;
            if let (Some(decided_by), Some(decided_at)) = (updated.decided_by, updated.decided_at) {
                info!(
                    record = %updated.id,
                    decided_by = %decided_by,
                    decided_at = %decided_at,
                    status = %updated.status,
                    "attendance decision applied"
                );
            }

            println!(
                "{} {} {}'s record for {}.",
                approver.full_name, updated.status, owner.full_name, updated.day
            );
        }
        Commands::Pending { viewer } => {
            let viewer = db::user_by_email(&pool, &viewer).await?;
            let queue = db::pending_attendance(&pool, &viewer).await?;

            if queue.is_empty() {
                println!("No records waiting for a decision.");
                return Ok(());
            }

            println!("Records waiting for a decision:");
            for item in &queue {
                let record = &item.record;
                println!(
                    "- {} {} ({}) {} in {} out {} [{}]",
                    record.id,
                    item.user_name,
                    item.user_email,
                    record.day,
                    fmt_time(record.check_in),
                    fmt_time(record.check_out),
                    record.mode
                );
                if let (Some(lat), Some(lng)) = (record.latitude, record.longitude) {
                    match record.distance_m {
                        Some(d) => println!("  at ({lat:.5}, {lng:.5}), {d}m from office"),
                        None => println!("  at ({lat:.5}, {lng:.5}), distance unverified"),
                    }
                }
                if let Some(note) = &record.note {
                    println!("  note: {note}");
                }
            }
        }
        Commands::Roster { viewer, date } => {
            let viewer = db::user_by_email(&pool, &viewer).await?;
            let day = date.unwrap_or_else(|| Local::now().date_naive());
            let members = db::team_members(&pool, &viewer).await?;

            if members.is_empty() {
                println!("No team members in scope.");
                return Ok(());
            }

            let ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();
            let records = db::attendance_on_day(&pool, &ids, day).await?;

            println!("Roster for {day}:");
            for member in &members {
                match records.iter().find(|r| r.user_id == member.id) {
                    Some(record) => println!(
                        "- {} ({}): {}, in {} out {} [{}]",
                        member.full_name,
                        member.role,
                        models::DayStatus::from(record.status),
                        fmt_time(record.check_in),
                        fmt_time(record.check_out),
                        record.mode
                    ),
                    None => {
                        let status = if calendar::is_weekend(day) {
                            models::DayStatus::Weekend
                        } else {
                            models::DayStatus::Absent
                        };
                        println!("- {} ({}): {}", member.full_name, member.role, status);
                    }
                }
            }
        }
        Commands::Snapshot { email, month, json } => {
            let user = db::user_by_email(&pool, &email).await?;
            let today = Local::now().date_naive();
            let month: calendar::Month = match month {
                Some(raw) => raw.parse()?,
                None => calendar::Month::containing(today),
            };

            let total_days = if month.last_day() < today {
                calendar::working_days_in_month(month)
            } else {
                calendar::working_days_elapsed(month, today)
            };
            let records =
                db::approved_attendance(&pool, &[user.id], month.first_day(), month.last_day())
                    .await?;
            let tasks = db::tasks_for_assignees(
                &pool,
                &[user.id],
                month.first_day().and_time(NaiveTime::MIN),
                (month.last_day() + Days::new(1)).and_time(NaiveTime::MIN),
            )
            .await?;

            let snapshot = metrics::build_snapshot(
                user.id,
                &records,
                &tasks,
                total_days,
                engine_config.late_cutoff,
            );
            let productivity = scoring::score_with_tasks(&snapshot);
            let row = models::MemberPerformance {
                name: user.full_name,
                email: user.email,
                snapshot,
                productivity,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&row)?);
                return Ok(());
            }

            println!("Snapshot for {} ({}), {}:", row.name, row.email, month);
            println!(
                "- Present {} of {} working days ({}%)",
                row.snapshot.present_days, row.snapshot.total_days, row.snapshot.attendance_rate
            );
            println!(
                "- Hours: {:.1} total, {:.1} average",
                row.snapshot.total_hours, row.snapshot.average_hours
            );
            println!("- Late arrivals: {}", row.snapshot.late_arrivals);
            println!(
                "- Tasks: {}/{} completed ({:.0}%)",
                row.snapshot.completed_tasks,
                row.snapshot.total_tasks,
                row.snapshot.task_completion_rate
            );
            println!("- Productivity: {}", row.productivity);
        }
        Commands::MemberDetail {
            viewer,
            member,
            json,
        } => {
            let viewer = db::user_by_email(&pool, &viewer).await?;
            let member = db::user_by_email(&pool, &member).await?;
            if !attendance::supervises(&viewer, &member) {
                return Err(error::EngineError::NotAuthorized.into());
            }

            let as_of = Local::now().date_naive();
            let month = calendar::Month::containing(as_of);
            let start = month.first_day().min(as_of - Duration::days(9));
            let records = db::attendance_range(&pool, member.id, start, as_of).await?;
            let detail =
                report::build_member_detail(&member, as_of, &records, engine_config.late_cutoff);

            if json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
                return Ok(());
            }

            println!(
                "{} ({}, {})",
                detail.member.name, detail.member.email, detail.member.role
            );
            println!(
                "- Month to date: {}% attendance, {:.1}h average, {} late",
                detail.stats.attendance_rate, detail.stats.average_hours, detail.stats.late_arrivals
            );
            println!("- Productivity: {}", detail.productivity);
            println!("Last 10 days:");
            for day in &detail.recent_attendance {
                println!(
                    "- {} {}: in {} out {} ({:.1}h)",
                    day.date,
                    day.status,
                    fmt_time(day.check_in),
                    fmt_time(day.check_out),
                    day.hours
                );
            }
        }
        Commands::TeamReport {
            viewer,
            month,
            out,
            json,
        } => {
            let viewer = db::user_by_email(&pool, &viewer).await?;
            let today = Local::now().date_naive();
            let month: calendar::Month = match month {
                Some(raw) => raw.parse()?,
                None => calendar::Month::containing(today),
            };

            let members = db::team_members(&pool, &viewer).await?;
            let ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();
            let attendance = db::approved_attendance(
                &pool,
                &ids,
                month.prev().prev().first_day(),
                month.last_day(),
            )
            .await?;
            let tasks = db::tasks_for_assignees(
                &pool,
                &ids,
                month.first_day().and_time(NaiveTime::MIN),
                (month.last_day() + Days::new(1)).and_time(NaiveTime::MIN),
            )
            .await?;

            let report = report::build_team_report(
                month,
                today,
                &members,
                &attendance,
                &tasks,
                engine_config.late_cutoff,
            );
            info!(month = %report.month, members = report.total_members, "team report built");

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            std::fs::write(&out, report::render_team_report(&report))?;
            println!("Report written to {}.", out.display());
        }
        Commands::ProjectAnalytics {
            project: code,
            range,
            json,
        } => {
            let record = db::project_by_code(&pool, &code).await?;
            let window: project::RangeWindow = range.parse()?;
            let now = Local::now().naive_local();
            let today = now.date();

            let members = db::project_members(&pool, record.id).await?;
            let sprints = db::project_sprints(&pool, record.id).await?;
            let tasks = db::project_tasks(
                &pool,
                record.id,
                window.start(today).and_time(NaiveTime::MIN),
                now,
            )
            .await?;

            let analytics = project::build_project_analytics(&members, &sprints, &tasks, today);

            if json {
                println!("{}", serde_json::to_string_pretty(&analytics)?);
                return Ok(());
            }

            let overview = &analytics.overview;
            println!("Project {} ({}, {})", record.name, record.code, record.status);
            println!(
                "- Tasks: {} total, {} done, {} in progress, {} overdue",
                overview.total_tasks,
                overview.completed_tasks,
                overview.in_progress_tasks,
                overview.overdue_tasks
            );
            println!("- Velocity: {} points", overview.team_velocity);
            if let Some(sprint) = &analytics.sprint_progress {
                println!(
                    "- {}: {:.0}% complete, {} days remaining, velocity {}",
                    sprint.name, sprint.progress, sprint.days_remaining, sprint.velocity_trend
                );
            }
            println!(
                "- Average task completion: {:.1} days",
                analytics.time_metrics.average_task_days
            );

            let overdue: Vec<&models::TaskRecord> = tasks
                .iter()
                .filter(|t| project::is_overdue(t, today))
                .collect();
            if !overdue.is_empty() {
                println!("Overdue tasks:");
                for task in overdue {
                    if let Some(due) = task.due_on {
                        println!("- {} (due {due})", task.title);
                    }
                }
            }

            println!("Assignees:");
            for row in &analytics.team_performance {
                println!(
                    "- {}: {} done / {} open, {:.1} days average, {} points",
                    row.name,
                    row.tasks_completed,
                    row.tasks_in_progress,
                    row.average_completion_days,
                    row.story_points_completed
                );
            }

            println!("Risk: {}", analytics.risk_assessment.level);
            for factor in &analytics.risk_assessment.factors {
                println!("- {factor}");
            }
            println!("Recommendations:");
            for rec in &analytics.risk_assessment.recommendations {
                println!("- {rec}");
            }
        }
        Commands::ImportTasks { csv } => {
            let inserted = db::import_tasks_csv(&pool, &csv).await?;
            println!("Inserted {inserted} tasks from {}.", csv.display());
        }
    }

    Ok(())
}

fn fmt_time(stamp: Option<NaiveDateTime>) -> String {
    match stamp {
        Some(stamp) => stamp.format("%H:%M").to_string(),
        None => "-".to_string(),
    }
}
