use chrono::NaiveTime;
use uuid::Uuid;

use crate::models::{AttendanceRecord, TaskRecord, TaskStatus, UserSnapshot};

/// Cap on credited hours per day; guards against bad clock data and
/// overnight stamps.
pub const DAILY_HOURS_CAP: f64 = 12.0;

/// Completion rate credited to users with no tasks in the period, so a
/// task-less month neither rewards nor penalizes them.
pub const NEUTRAL_TASK_RATE: f64 = 50.0;

pub fn worked_hours(record: &AttendanceRecord) -> f64 {
    match (record.check_in, record.check_out) {
        (Some(start), Some(end)) => {
            let hours = (end - start).num_minutes() as f64 / 60.0;
            hours.clamp(0.0, DAILY_HOURS_CAP)
        }
        _ => 0.0,
    }
}

pub fn is_late(record: &AttendanceRecord, cutoff: NaiveTime) -> bool {
    record.check_in.map_or(false, |stamp| stamp.time() > cutoff)
}

/// Integer percentage, rounded then clamped to 0-100. A zero denominator
/// yields zero rather than an error.
pub fn rate_percent(count: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return 0;
    }
    let rate = (f64::from(count) / f64::from(denominator) * 100.0).round() as u32;
    rate.min(100)
}

/// Fold one user's approved attendance and task records for a period into
/// a snapshot. `total_days` is the working-day denominator the caller
/// derived from the calendar (elapsed days, not the full month).
pub fn build_snapshot(
    user_id: Uuid,
    approved: &[AttendanceRecord],
    tasks: &[TaskRecord],
    total_days: u32,
    late_cutoff: NaiveTime,
) -> UserSnapshot {
    let present_days = approved.len() as u32;
    let total_hours: f64 = approved.iter().map(worked_hours).sum();
    let average_hours = if present_days > 0 {
        total_hours / f64::from(present_days)
    } else {
        0.0
    };
    let late_arrivals = approved.iter().filter(|r| is_late(r, late_cutoff)).count() as u32;
    let attendance_rate = rate_percent(present_days, total_days);

    let total_tasks = tasks.len() as u32;
    let completed_tasks = tasks.iter().filter(|t| t.status == TaskStatus::Done).count() as u32;
    let task_completion_rate = if total_tasks > 0 {
        f64::from(completed_tasks) / f64::from(total_tasks) * 100.0
    } else {
        NEUTRAL_TASK_RATE
    };

    UserSnapshot {
        user_id,
        present_days,
        total_days,
        total_hours,
        average_hours,
        late_arrivals,
        attendance_rate,
        total_tasks,
        completed_tasks,
        task_completion_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalStatus, WorkMode};
    use chrono::{NaiveDate, NaiveDateTime};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    fn stamp(d: u32, h: u32, m: u32) -> NaiveDateTime {
        date(d).and_hms_opt(h, m, 0).unwrap()
    }

    fn record(
        day: u32,
        check_in: Option<NaiveDateTime>,
        check_out: Option<NaiveDateTime>,
    ) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            day: date(day),
            check_in,
            check_out,
            latitude: None,
            longitude: None,
            distance_m: None,
            note: None,
            mode: WorkMode::Office,
            status: ApprovalStatus::Approved,
            decided_by: None,
            decided_at: None,
        }
    }

    fn task(status: TaskStatus) -> TaskRecord {
        TaskRecord {
            sprint_id: None,
            assignee_id: None,
            title: "wire up exports".to_string(),
            status,
            story_points: Some(3),
            due_on: None,
            started_at: None,
            completed_at: None,
        }
    }

    fn cutoff() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 15, 0).unwrap()
    }

    #[test]
    fn on_time_full_day_on_first_working_day() {
        // Checked in 09:10, out eight hours later, one working day elapsed.
        let records = vec![record(3, Some(stamp(3, 9, 10)), Some(stamp(3, 17, 10)))];
        let snap = build_snapshot(records[0].user_id, &records, &[], 1, cutoff());

        assert_eq!(snap.present_days, 1);
        assert_eq!(snap.late_arrivals, 0);
        assert_eq!(snap.attendance_rate, 100);
        assert!((snap.average_hours - 8.0).abs() < 1e-9);
        assert!((snap.total_hours - 8.0).abs() < 1e-9);
    }

    #[test]
    fn hours_are_capped_per_day() {
        let records = vec![
            // 14 hours on the clock, credited as 12.
            record(3, Some(stamp(3, 6, 0)), Some(stamp(3, 20, 0))),
            // Clock skew: checkout before checkin credits zero.
            record(4, Some(stamp(4, 17, 0)), Some(stamp(4, 9, 0))),
        ];
        let snap = build_snapshot(records[0].user_id, &records, &[], 5, cutoff());
        assert!((snap.total_hours - 12.0).abs() < 1e-9);
        assert_eq!(snap.present_days, 2);
    }

    #[test]
    fn open_record_counts_presence_but_no_hours() {
        let records = vec![record(3, Some(stamp(3, 9, 0)), None)];
        let snap = build_snapshot(records[0].user_id, &records, &[], 2, cutoff());
        assert_eq!(snap.present_days, 1);
        assert_eq!(snap.total_hours, 0.0);
        assert_eq!(snap.attendance_rate, 50);
    }

    #[test]
    fn cutoff_is_exclusive() {
        let on_the_dot = record(3, Some(stamp(3, 9, 15)), None);
        let minute_over = record(4, Some(stamp(4, 9, 16)), None);
        assert!(!is_late(&on_the_dot, cutoff()));
        assert!(is_late(&minute_over, cutoff()));
    }

    #[test]
    fn rate_is_clamped_and_zero_denominator_is_zero() {
        assert_eq!(rate_percent(10, 5), 100);
        assert_eq!(rate_percent(1, 3), 33);
        assert_eq!(rate_percent(2, 3), 67);
        assert_eq!(rate_percent(0, 0), 0);
        assert_eq!(rate_percent(5, 0), 0);
    }

    #[test]
    fn task_completion_defaults_to_neutral_without_tasks() {
        let snap = build_snapshot(Uuid::new_v4(), &[], &[], 0, cutoff());
        assert_eq!(snap.present_days, 0);
        assert_eq!(snap.attendance_rate, 0);
        assert_eq!(snap.average_hours, 0.0);
        assert_eq!(snap.task_completion_rate, NEUTRAL_TASK_RATE);
    }

    #[test]
    fn task_completion_uses_done_ratio() {
        let tasks = vec![
            task(TaskStatus::Done),
            task(TaskStatus::Done),
            task(TaskStatus::Done),
            task(TaskStatus::Todo),
        ];
        let snap = build_snapshot(Uuid::new_v4(), &[], &tasks, 0, cutoff());
        assert_eq!(snap.total_tasks, 4);
        assert_eq!(snap.completed_tasks, 3);
        assert!((snap.task_completion_rate - 75.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_is_deterministic_for_fixed_inputs() {
        let records = vec![record(3, Some(stamp(3, 9, 30)), Some(stamp(3, 18, 0)))];
        let tasks = vec![task(TaskStatus::Done), task(TaskStatus::InProgress)];
        let user = records[0].user_id;

        let first = build_snapshot(user, &records, &tasks, 3, cutoff());
        let second = build_snapshot(user, &records, &tasks, 3, cutoff());

        assert_eq!(first.present_days, second.present_days);
        assert_eq!(first.attendance_rate, second.attendance_rate);
        assert_eq!(first.late_arrivals, second.late_arrivals);
        assert_eq!(first.total_hours, second.total_hours);
        assert_eq!(first.task_completion_rate, second.task_completion_rate);
    }
}
