use std::str::FromStr;

use anyhow::bail;
use chrono::{Duration, Months, NaiveDate};
use uuid::Uuid;

use crate::models::{
    AssigneePerformance, BurndownPoint, ProjectAnalytics, ProjectOverview, RiskAssessment,
    RiskLevel, SprintProgress, SprintRecord, SprintStatus, TaskRecord, TaskStatus, TimeMetrics,
    UserRecord, VelocityTrend,
};

const DEFAULT_BURNDOWN_DAYS: i64 = 14;
const BURNDOWN_WINDOW: usize = 14;

const OVERDUE_RATIO_CUTOFF: f64 = 0.2;
const LONG_TASK_DAYS: f64 = 7.0;
const SPRINT_CLOSING_DAYS: i64 = 2;
const SPRINT_COMPLETION_FLOOR: f64 = 0.8;
const WIP_PER_MEMBER: u32 = 3;

const VELOCITY_UP_BAND: f64 = 1.1;
const VELOCITY_DOWN_BAND: f64 = 0.9;

const BLOCKER_SHARE: f64 = 0.3;
const REVIEW_HOURS_FLAT: f64 = 4.5;

/// Lookback window for the task set feeding the analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeWindow {
    Week,
    Month,
    Quarter,
}

impl RangeWindow {
    pub fn start(self, today: NaiveDate) -> NaiveDate {
        match self {
            RangeWindow::Week => today - Duration::days(7),
            RangeWindow::Month => today - Months::new(1),
            RangeWindow::Quarter => today - Months::new(3),
        }
    }
}

impl FromStr for RangeWindow {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "week" => Ok(RangeWindow::Week),
            "month" => Ok(RangeWindow::Month),
            "quarter" => Ok(RangeWindow::Quarter),
            other => bail!("unknown range '{other}', expected week, month, or quarter"),
        }
    }
}

/// Full analytics bundle for one project. `tasks` is the set created inside
/// the requested lookback window; `sprints` is the project's full sprint
/// list so the trend can look back at completed ones.
pub fn build_project_analytics(
    members: &[UserRecord],
    sprints: &[SprintRecord],
    tasks: &[TaskRecord],
    today: NaiveDate,
) -> ProjectAnalytics {
    let active = sprints.iter().find(|s| s.status == SprintStatus::Active);

    let overview = build_overview(active, tasks, today);
    let team_performance = assignee_performance(members, tasks);
    let time_metrics = build_time_metrics(tasks);
    let risk_assessment = assess_risk(
        members,
        active,
        tasks,
        &team_performance,
        time_metrics.average_task_days,
        today,
    );
    let sprint_progress = active
        .map(|sprint| build_sprint_progress(sprint, sprints, tasks, overview.team_velocity, today));

    ProjectAnalytics {
        overview,
        team_performance,
        sprint_progress,
        time_metrics,
        risk_assessment,
    }
}

fn build_overview(
    active: Option<&SprintRecord>,
    tasks: &[TaskRecord],
    today: NaiveDate,
) -> ProjectOverview {
    let completed_points = completed_story_points(tasks);

    ProjectOverview {
        total_tasks: tasks.len() as u32,
        completed_tasks: count_status(tasks, TaskStatus::Done),
        in_progress_tasks: count_status(tasks, TaskStatus::InProgress),
        overdue_tasks: tasks.iter().filter(|t| is_overdue(t, today)).count() as u32,
        // Velocity is attributed to the active sprint; without one there is
        // nothing to attribute the completed points to.
        team_velocity: if active.is_some() { completed_points } else { 0 },
        burndown: burndown_series(active, tasks, today),
    }
}

/// Linear approximation over the sprint span, not a replay of historical
/// completions. Without an active sprint the series trails today.
fn burndown_series(
    active: Option<&SprintRecord>,
    tasks: &[TaskRecord],
    today: NaiveDate,
) -> Vec<BurndownPoint> {
    let sprint_days = active
        .map(|s| (s.ends_on - s.starts_on).num_days())
        .unwrap_or(DEFAULT_BURNDOWN_DAYS)
        .max(1);
    let total = total_story_points(tasks) as f64;
    let completed = completed_story_points(tasks) as f64;
    let span = sprint_days as f64;

    let mut points = Vec::with_capacity(sprint_days as usize + 1);
    for i in 0..=sprint_days {
        let date = match active {
            Some(sprint) => sprint.starts_on + Duration::days(i),
            None => today - Duration::days(sprint_days - i),
        };
        points.push(BurndownPoint {
            date,
            remaining: (total - completed * (i as f64 / span)).max(0.0),
            ideal: (total - (total / span) * i as f64).max(0.0),
        });
    }

    if points.len() > BURNDOWN_WINDOW {
        let cut = points.len() - BURNDOWN_WINDOW;
        points.drain(..cut);
    }
    points
}

fn assignee_performance(members: &[UserRecord], tasks: &[TaskRecord]) -> Vec<AssigneePerformance> {
    let mut rows: Vec<AssigneePerformance> = members
        .iter()
        .map(|member| {
            let assigned: Vec<&TaskRecord> = tasks
                .iter()
                .filter(|t| t.assignee_id == Some(member.id))
                .collect();
            let completed: Vec<&TaskRecord> = assigned
                .iter()
                .copied()
                .filter(|t| t.status == TaskStatus::Done)
                .collect();

            AssigneePerformance {
                user_id: member.id,
                name: member.full_name.clone(),
                tasks_completed: completed.len() as u32,
                tasks_in_progress: assigned
                    .iter()
                    .filter(|t| t.status == TaskStatus::InProgress)
                    .count() as u32,
                average_completion_days: mean_days(completed.iter().copied()),
                story_points_completed: completed
                    .iter()
                    .map(|t| i64::from(t.story_points.unwrap_or(0)))
                    .sum(),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.tasks_completed.cmp(&a.tasks_completed));
    rows
}

fn build_sprint_progress(
    sprint: &SprintRecord,
    sprints: &[SprintRecord],
    tasks: &[TaskRecord],
    velocity: i64,
    today: NaiveDate,
) -> SprintProgress {
    SprintProgress {
        name: sprint.name.clone(),
        progress: sprint_completion(sprint.id, tasks) * 100.0,
        days_remaining: (sprint.ends_on - today).num_days().max(0),
        velocity_trend: velocity_trend(velocity, sprints),
    }
}

// Done share of the sprint's tasks, 0 when the sprint has none assigned.
fn sprint_completion(sprint_id: Uuid, tasks: &[TaskRecord]) -> f64 {
    let in_sprint: Vec<&TaskRecord> = tasks
        .iter()
        .filter(|t| t.sprint_id == Some(sprint_id))
        .collect();
    if in_sprint.is_empty() {
        return 0.0;
    }
    let done = in_sprint
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .count();
    done as f64 / in_sprint.len() as f64
}

/// Compares current velocity against the most recently started completed
/// sprint. No baseline (or an empty one) reads as stable.
fn velocity_trend(velocity: i64, sprints: &[SprintRecord]) -> VelocityTrend {
    let previous = sprints
        .iter()
        .filter(|s| s.status == SprintStatus::Completed)
        .max_by_key(|s| s.starts_on);

    match previous {
        Some(prev) if prev.velocity > 0 => {
            let baseline = f64::from(prev.velocity);
            if velocity as f64 > baseline * VELOCITY_UP_BAND {
                VelocityTrend::Up
            } else if (velocity as f64) < baseline * VELOCITY_DOWN_BAND {
                VelocityTrend::Down
            } else {
                VelocityTrend::Stable
            }
        }
        _ => VelocityTrend::Stable,
    }
}

fn build_time_metrics(tasks: &[TaskRecord]) -> TimeMetrics {
    let average_task_days = mean_days(tasks.iter().filter(|t| t.status == TaskStatus::Done));

    TimeMetrics {
        average_task_days,
        blocker_resolution_days_est: average_task_days * BLOCKER_SHARE,
        code_review_hours_est: REVIEW_HOURS_FLAT,
    }
}

fn assess_risk(
    members: &[UserRecord],
    active: Option<&SprintRecord>,
    tasks: &[TaskRecord],
    team_performance: &[AssigneePerformance],
    average_task_days: f64,
    today: NaiveDate,
) -> RiskAssessment {
    let mut level = RiskLevel::Low;
    let mut factors = Vec::new();
    let mut recommendations = Vec::new();

    let total = tasks.len() as f64;
    let overdue = tasks.iter().filter(|t| is_overdue(t, today)).count() as f64;
    if overdue > total * OVERDUE_RATIO_CUTOFF {
        let pct = (overdue / total * 100.0).round();
        factors.push(format!("High overdue task ratio ({pct}%)"));
        recommendations.push("Review and reprioritize overdue tasks".to_string());
        level = level.max(RiskLevel::High);
    }

    if average_task_days > LONG_TASK_DAYS {
        factors.push("Tasks taking longer than expected to complete".to_string());
        recommendations.push("Break down large tasks into smaller, manageable pieces".to_string());
        level = level.max(RiskLevel::Medium);
    }

    if let Some(sprint) = active {
        let days_remaining = (sprint.ends_on - today).num_days().max(0);
        if days_remaining <= SPRINT_CLOSING_DAYS
            && sprint_completion(sprint.id, tasks) < SPRINT_COMPLETION_FLOOR
        {
            factors.push("Sprint unlikely to complete on time".to_string());
            recommendations.push("Consider moving incomplete items to next sprint".to_string());
            level = level.max(RiskLevel::Medium);
        }
    }

    let wip: u32 = team_performance.iter().map(|m| m.tasks_in_progress).sum();
    if wip > members.len() as u32 * WIP_PER_MEMBER {
        factors.push("Team may be overloaded with too many concurrent tasks".to_string());
        recommendations.push("Implement WIP limits and focus on task completion".to_string());
        level = level.max(RiskLevel::Medium);
    }

    if factors.is_empty() {
        factors.push("No significant risk factors identified".to_string());
        recommendations.push("Continue current practices and monitor regularly".to_string());
    }

    RiskAssessment {
        level,
        factors,
        recommendations,
    }
}

pub fn is_overdue(task: &TaskRecord, today: NaiveDate) -> bool {
    task.status != TaskStatus::Done && task.due_on.map_or(false, |due| due < today)
}

fn count_status(tasks: &[TaskRecord], status: TaskStatus) -> u32 {
    tasks.iter().filter(|t| t.status == status).count() as u32
}

fn total_story_points(tasks: &[TaskRecord]) -> i64 {
    tasks
        .iter()
        .map(|t| i64::from(t.story_points.unwrap_or(0)))
        .sum()
}

fn completed_story_points(tasks: &[TaskRecord]) -> i64 {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .map(|t| i64::from(t.story_points.unwrap_or(0)))
        .sum()
}

// Mean span between start and completion stamps, skipping tasks missing
// either one.
fn mean_days<'a>(tasks: impl Iterator<Item = &'a TaskRecord>) -> f64 {
    let spans: Vec<i64> = tasks
        .filter_map(|t| match (t.started_at, t.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_days()),
            _ => None,
        })
        .collect();
    if spans.is_empty() {
        return 0.0;
    }
    spans.iter().sum::<i64>() as f64 / spans.len() as f64
}
