use std::fmt::Write;

use chrono::{Duration, NaiveDate, NaiveTime};

use crate::calendar::{self, Month};
use crate::metrics;
use crate::models::{
    ApprovalStatus, AttendanceRecord, DayStatus, MemberDetail, MemberPerformance, MemberSummary,
    MonthTrendPoint, TaskRecord, TeamReport, TimelineDay, UserRecord,
};
use crate::scoring;

const HIGH_PERFORMER_CUTOFF: u32 = 90;
const ATTENTION_CUTOFF: u32 = 75;
const LOW_ATTENDANCE_PCT: u32 = 75;
const UNDERUTILIZED_HOURS: f64 = 6.0;
const OVERLOADED_HOURS: f64 = 9.0;

const TIMELINE_DAYS: i64 = 10;

/// Team report for one month. `attendance` must hold approved records for
/// the member set spanning the report month and the two before it (for the
/// trend); `tasks` holds the members' tasks created in the report month.
pub fn build_team_report(
    month: Month,
    as_of: NaiveDate,
    members: &[UserRecord],
    attendance: &[AttendanceRecord],
    tasks: &[TaskRecord],
    late_cutoff: NaiveTime,
) -> TeamReport {
    if members.is_empty() {
        return TeamReport {
            month: month.to_string(),
            total_members: 0,
            avg_attendance_rate: 0,
            total_work_hours: 0,
            productivity_score: 0,
            high_performers: 0,
            low_performers: 0,
            monthly_trend: Vec::new(),
            member_performance: Vec::new(),
            recommendations: Vec::new(),
        };
    }

    let total_days = calendar::working_days_elapsed(month, as_of);

    let mut member_performance = Vec::with_capacity(members.len());
    for member in members {
        let records: Vec<AttendanceRecord> = attendance
            .iter()
            .filter(|r| r.user_id == member.id && month.contains(r.day))
            .cloned()
            .collect();
        let member_tasks: Vec<TaskRecord> = tasks
            .iter()
            .filter(|t| t.assignee_id == Some(member.id))
            .cloned()
            .collect();

        let snapshot =
            metrics::build_snapshot(member.id, &records, &member_tasks, total_days, late_cutoff);
        let productivity = scoring::score_with_tasks(&snapshot);

        member_performance.push(MemberPerformance {
            name: member.full_name.clone(),
            email: member.email.clone(),
            snapshot,
            productivity,
        });
    }

    let total_members = member_performance.len() as u32;
    let avg_attendance_rate =
        mean_u32(member_performance.iter().map(|m| m.snapshot.attendance_rate));
    let total_hours: f64 = member_performance.iter().map(|m| m.snapshot.total_hours).sum();
    let productivity_score = mean_u32(member_performance.iter().map(|m| m.productivity));
    let (high_performers, low_performers) = performer_counts(&member_performance);

    let recommendations = recommendations(
        high_performers,
        low_performers,
        avg_attendance_rate,
        total_hours,
        total_members,
    );

    TeamReport {
        month: month.to_string(),
        total_members,
        avg_attendance_rate,
        total_work_hours: total_hours.round() as i64,
        productivity_score,
        high_performers,
        low_performers,
        monthly_trend: build_trend(month, as_of, total_members, attendance),
        member_performance,
        recommendations,
    }
}

/// Trailing three-month trend ending at the report month, one point per
/// month labeled by abbreviation.
fn build_trend(
    month: Month,
    as_of: NaiveDate,
    team_size: u32,
    attendance: &[AttendanceRecord],
) -> Vec<MonthTrendPoint> {
    [month.prev().prev(), month.prev(), month]
        .into_iter()
        .map(|m| {
            let working_days = calendar::working_days_elapsed(m, as_of);
            let in_month: Vec<&AttendanceRecord> =
                attendance.iter().filter(|r| m.contains(r.day)).collect();
            let hours: f64 = in_month.iter().map(|r| metrics::worked_hours(r)).sum();

            MonthTrendPoint {
                month: m.label(),
                attendance: metrics::rate_percent(in_month.len() as u32, team_size * working_days),
                hours: hours.round() as i64,
            }
        })
        .collect()
}

fn performer_counts(member_performance: &[MemberPerformance]) -> (u32, u32) {
    let high = member_performance
        .iter()
        .filter(|m| m.productivity >= HIGH_PERFORMER_CUTOFF)
        .count() as u32;
    let low = member_performance
        .iter()
        .filter(|m| m.productivity < ATTENTION_CUTOFF)
        .count() as u32;
    (high, low)
}

fn recommendations(
    high_performers: u32,
    low_performers: u32,
    avg_attendance_rate: u32,
    total_hours: f64,
    total_members: u32,
) -> Vec<String> {
    let mut recs = Vec::new();

    if low_performers > 0 {
        recs.push(format!(
            "Schedule 1-on-1 meetings with {low_performers} underperforming members"
        ));
    }
    if high_performers > 0 {
        recs.push(format!(
            "Publicly recognize {high_performers} top performers to boost morale"
        ));
    }
    if avg_attendance_rate < LOW_ATTENDANCE_PCT {
        recs.push("Investigate attendance issues and consider flexible work policies".to_string());
    }

    let hours_per_member = total_hours / f64::from(total_members);
    if hours_per_member < UNDERUTILIZED_HOURS {
        recs.push("Review workload distribution - team may be underutilized".to_string());
    }
    if hours_per_member > OVERLOADED_HOURS {
        recs.push("Monitor for burnout risk - consider workload rebalancing".to_string());
    }

    recs
}

/// Month-to-date detail for a single member. `records` must hold the
/// member's attendance in any status covering the current month and the
/// trailing ten days.
pub fn build_member_detail(
    member: &UserRecord,
    as_of: NaiveDate,
    records: &[AttendanceRecord],
    late_cutoff: NaiveTime,
) -> MemberDetail {
    let month = Month::containing(as_of);
    let total_days = calendar::working_days_elapsed(month, as_of);

    let approved: Vec<AttendanceRecord> = records
        .iter()
        .filter(|r| r.status == ApprovalStatus::Approved && month.contains(r.day))
        .cloned()
        .collect();

    let stats = metrics::build_snapshot(member.id, &approved, &[], total_days, late_cutoff);
    let productivity = scoring::score_with_punctuality(&stats);

    MemberDetail {
        member: MemberSummary {
            id: member.id,
            name: member.full_name.clone(),
            email: member.email.clone(),
            role: member.role,
        },
        stats,
        productivity,
        recent_attendance: recent_timeline(records, as_of),
    }
}

/// Last ten calendar days, newest first. Weekends and recordless weekdays
/// get explicit placeholder entries so the view reads as a full timeline.
fn recent_timeline(records: &[AttendanceRecord], as_of: NaiveDate) -> Vec<TimelineDay> {
    (0..TIMELINE_DAYS)
        .map(|offset| {
            let date = as_of - Duration::days(offset);
            match records.iter().find(|r| r.day == date) {
                Some(record) => TimelineDay {
                    date,
                    status: record.status.into(),
                    check_in: record.check_in,
                    check_out: record.check_out,
                    hours: raw_hours(record),
                    mode: Some(record.mode),
                    distance_m: record.distance_m,
                },
                None => TimelineDay {
                    date,
                    status: if calendar::is_weekend(date) {
                        DayStatus::Weekend
                    } else {
                        DayStatus::Absent
                    },
                    check_in: None,
                    check_out: None,
                    hours: 0.0,
                    mode: None,
                    distance_m: None,
                },
            }
        })
        .collect()
}

// Uncapped wall-clock hours; the timeline shows what was stamped, the cap
// only applies to credited totals.
fn raw_hours(record: &AttendanceRecord) -> f64 {
    match (record.check_in, record.check_out) {
        (Some(start), Some(end)) => ((end - start).num_minutes() as f64 / 60.0).max(0.0),
        _ => 0.0,
    }
}

fn mean_u32(values: impl Iterator<Item = u32>) -> u32 {
    let (sum, count) = values.fold((0u64, 0u64), |(s, n), v| (s + u64::from(v), n + 1));
    if count == 0 {
        0
    } else {
        (sum as f64 / count as f64).round() as u32
    }
}

pub fn render_team_report(report: &TeamReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Team Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} members)",
        report.month, report.total_members
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Attendance rate: {}%", report.avg_attendance_rate);
    let _ = writeln!(output, "- Total hours: {}h", report.total_work_hours);
    let _ = writeln!(output, "- Productivity: {}", report.productivity_score);
    let _ = writeln!(
        output,
        "- High performers (>= {}): {}",
        HIGH_PERFORMER_CUTOFF, report.high_performers
    );
    let _ = writeln!(
        output,
        "- Needs attention (< {}): {}",
        ATTENTION_CUTOFF, report.low_performers
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## 3-Month Trend");
    if report.monthly_trend.is_empty() {
        let _ = writeln!(output, "No trend data for this scope.");
    } else {
        for point in &report.monthly_trend {
            let _ = writeln!(
                output,
                "- {}: attendance {}%, {}h",
                point.month, point.attendance, point.hours
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Individual Performance");
    if report.member_performance.is_empty() {
        let _ = writeln!(output, "No members in scope for this report.");
    } else {
        for member in &report.member_performance {
            let _ = writeln!(
                output,
                "- {} ({}): attendance {}%, avg {:.1}h, productivity {} ({}/{} tasks)",
                member.name,
                member.email,
                member.snapshot.attendance_rate,
                member.snapshot.average_hours,
                member.productivity,
                member.snapshot.completed_tasks,
                member.snapshot.total_tasks
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    if report.recommendations.is_empty() {
        let _ = writeln!(output, "Nothing flagged for this month.");
    } else {
        for rec in &report.recommendations {
            let _ = writeln!(output, "- {rec}");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, TaskStatus, WorkMode};
    use chrono::NaiveDateTime;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stamp(day: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
        day.and_hms_opt(h, min, 0).unwrap()
    }

    fn member(name: &str, manager_id: Option<Uuid>) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            role: Role::Employee,
            manager_id,
        }
    }

    fn approved_day(user_id: Uuid, day: NaiveDate, in_h: u32, out_h: u32) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            user_id,
            day,
            check_in: Some(stamp(day, in_h, 0)),
            check_out: Some(stamp(day, out_h, 0)),
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

    fn done_task(assignee_id: Uuid) -> TaskRecord {
        TaskRecord {
            sprint_id: None,
            assignee_id: Some(assignee_id),
            title: "close out audit items".to_string(),
            status: TaskStatus::Done,
            story_points: Some(2),
            due_on: None,
            started_at: None,
            completed_at: None,
        }
    }

    fn cutoff() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 15, 0).unwrap()
    }

    fn perf(productivity: u32) -> MemberPerformance {
        let user_id = Uuid::new_v4();
        MemberPerformance {
            name: "x".to_string(),
            email: "x@example.com".to_string(),
            snapshot: metrics::build_snapshot(user_id, &[], &[], 0, cutoff()),
            productivity,
        }
    }

    #[test]
    fn performer_thresholds_split_95_80_60() {
        let perfs = [perf(95), perf(80), perf(60)];
        let (high, low) = performer_counts(&perfs);
        assert_eq!(high, 1);
        assert_eq!(low, 1);
        assert_eq!(mean_u32([95u32, 80, 60].into_iter()), 78);
    }

    #[test]
    fn empty_team_short_circuits_to_zeroed_report() {
        let report = build_team_report(
            "2026-08".parse().unwrap(),
            date(2026, 8, 25),
            &[],
            &[],
            &[],
            cutoff(),
        );
        assert_eq!(report.total_members, 0);
        assert_eq!(report.avg_attendance_rate, 0);
        assert_eq!(report.total_work_hours, 0);
        assert_eq!(report.productivity_score, 0);
        assert!(report.monthly_trend.is_empty());
        assert!(report.member_performance.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn single_member_report_mid_month() {
        let manager_id = Uuid::new_v4();
        let asha = member("Asha", Some(manager_id));
        let aug3 = date(2026, 8, 3);

        let attendance = vec![
            approved_day(asha.id, aug3, 9, 17),
            // Prior-month record only feeds the trend, not the Aug stats.
            approved_day(asha.id, date(2026, 7, 15), 9, 17),
        ];
        let tasks = vec![done_task(asha.id)];

        // Two working days have elapsed by Tuesday Aug 4.
        let report = build_team_report(
            "2026-08".parse().unwrap(),
            date(2026, 8, 4),
            std::slice::from_ref(&asha),
            &attendance,
            &tasks,
            cutoff(),
        );

        assert_eq!(report.total_members, 1);
        let row = &report.member_performance[0];
        assert_eq!(row.snapshot.present_days, 1);
        assert_eq!(row.snapshot.total_days, 2);
        assert_eq!(row.snapshot.attendance_rate, 50);
        assert_eq!(row.snapshot.completed_tasks, 1);
        // 50 * 0.6 + 100 * 0.3 + 100 * 0.1
        assert_eq!(row.productivity, 70);

        assert_eq!(report.avg_attendance_rate, 50);
        assert_eq!(report.total_work_hours, 8);
        assert_eq!(report.productivity_score, 70);
        assert_eq!(report.high_performers, 0);
        assert_eq!(report.low_performers, 1);

        let labels: Vec<&str> = report
            .monthly_trend
            .iter()
            .map(|p| p.month.as_str())
            .collect();
        assert_eq!(labels, vec!["Jun", "Jul", "Aug"]);
        assert_eq!(report.monthly_trend[0].attendance, 0);
        // One approved July day over 23 working days.
        assert_eq!(report.monthly_trend[1].attendance, 4);
        assert_eq!(report.monthly_trend[1].hours, 8);
        assert_eq!(report.monthly_trend[2].attendance, 50);

        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("1-on-1 meetings with 1 underperforming")));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("attendance issues")));
    }

    #[test]
    fn workload_recommendations_trip_on_hour_bounds() {
        let low = recommendations(0, 0, 90, 4.0, 1);
        assert!(low.iter().any(|r| r.contains("underutilized")));

        let high = recommendations(0, 0, 90, 40.0, 1);
        assert!(high.iter().any(|r| r.contains("burnout")));

        let balanced = recommendations(0, 0, 90, 8.0, 1);
        assert!(balanced.is_empty());
    }

    #[test]
    fn member_detail_classifies_timeline_days() {
        let manager_id = Uuid::new_v4();
        let asha = member("Asha", Some(manager_id));
        let as_of = date(2026, 8, 25);

        let mut open_today = approved_day(asha.id, as_of, 9, 17);
        open_today.status = ApprovalStatus::Pending;
        open_today.check_out = None;

        let mut long_day = approved_day(asha.id, date(2026, 8, 24), 8, 21);
        long_day.check_out = Some(stamp(date(2026, 8, 24), 21, 30));

        let records = vec![open_today, long_day];
        let detail = build_member_detail(&asha, as_of, &records, cutoff());

        assert_eq!(detail.recent_attendance.len(), 10);
        assert_eq!(detail.recent_attendance[0].date, as_of);
        assert_eq!(detail.recent_attendance[0].status, DayStatus::Pending);
        assert_eq!(detail.recent_attendance[0].hours, 0.0);

        // Monday the 24th ran 8:00-21:30; the timeline shows the raw 13.5h.
        assert_eq!(detail.recent_attendance[1].status, DayStatus::Approved);
        assert!((detail.recent_attendance[1].hours - 13.5).abs() < 1e-9);

        // Aug 22-23 are a weekend, Aug 21 a recordless weekday.
        assert_eq!(detail.recent_attendance[2].status, DayStatus::Weekend);
        assert_eq!(detail.recent_attendance[3].status, DayStatus::Weekend);
        assert_eq!(detail.recent_attendance[4].status, DayStatus::Absent);

        // Stats only count the approved day; the pending one is excluded.
        assert_eq!(detail.stats.present_days, 1);
        assert_eq!(detail.stats.total_days, 17);
        // Credited hours cap at 12 even though the timeline shows 13.5.
        assert!((detail.stats.total_hours - 12.0).abs() < 1e-9);
    }

    #[test]
    fn rendered_report_lists_sections() {
        let report = build_team_report(
            "2026-08".parse().unwrap(),
            date(2026, 8, 25),
            &[],
            &[],
            &[],
            cutoff(),
        );
        let markdown = render_team_report(&report);
        assert!(markdown.contains("# Team Performance Report"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("## 3-Month Trend"));
        assert!(markdown.contains("No members in scope"));
    }
}
