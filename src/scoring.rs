use crate::models::UserSnapshot;

// Task-based formula. Fixed policy: historical reports were generated with
// exactly these weights and the 8-hour baseline, so they must not drift.
const W_ATTENDANCE: f64 = 0.6;
const W_TASKS: f64 = 0.3;
const W_HOURS: f64 = 0.1;

const BASELINE_DAY_HOURS: f64 = 8.0;
// Overtime can lift the hours factor to at most 1.2.
const OVERTIME_BONUS_CAP: f64 = 1.2;

// Punctuality variant used by the single-member detail view, where task
// data is out of scope and late arrivals stand in as the third factor.
const W_ATTENDANCE_DETAIL: f64 = 0.7;
const W_HOURS_DETAIL: f64 = 0.2;
const W_ON_TIME: f64 = 0.1;

/// Productivity from attendance, task completion, and hours. Used for team
/// reports, where task records are available for every member.
pub fn score_with_tasks(snapshot: &UserSnapshot) -> u32 {
    let hours_score =
        (snapshot.average_hours / BASELINE_DAY_HOURS).min(OVERTIME_BONUS_CAP) * 100.0;
    let raw = f64::from(snapshot.attendance_rate) * W_ATTENDANCE
        + snapshot.task_completion_rate * W_TASKS
        + hours_score * W_HOURS;
    clamp_score(raw)
}

/// Productivity from attendance, hours, and on-time arrivals. Used for the
/// member detail view; no overtime bonus here.
pub fn score_with_punctuality(snapshot: &UserSnapshot) -> u32 {
    let on_time_ratio = if snapshot.present_days > 0 {
        f64::from(snapshot.present_days.saturating_sub(snapshot.late_arrivals))
            / f64::from(snapshot.present_days)
    } else {
        0.0
    };
    let hours_score = (snapshot.average_hours / BASELINE_DAY_HOURS).min(1.0) * 100.0;
    let raw = f64::from(snapshot.attendance_rate) * W_ATTENDANCE_DETAIL
        + hours_score * W_HOURS_DETAIL
        + on_time_ratio * 100.0 * W_ON_TIME;
    clamp_score(raw)
}

fn clamp_score(raw: f64) -> u32 {
    raw.round().clamp(0.0, 100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn snapshot(
        attendance_rate: u32,
        task_completion_rate: f64,
        average_hours: f64,
        present_days: u32,
        late_arrivals: u32,
    ) -> UserSnapshot {
        UserSnapshot {
            user_id: Uuid::new_v4(),
            present_days,
            total_days: present_days,
            total_hours: average_hours * f64::from(present_days),
            average_hours,
            late_arrivals,
            attendance_rate,
            total_tasks: 0,
            completed_tasks: 0,
            task_completion_rate,
        }
    }

    #[test]
    fn task_formula_reproduces_known_weighting() {
        // 100 * 0.6 + 50 * 0.3 + 100 * 0.1 = 85
        let snap = snapshot(100, 50.0, 8.0, 20, 0);
        assert_eq!(score_with_tasks(&snap), 85);
    }

    #[test]
    fn overtime_bonus_is_capped_and_score_clamped() {
        // Hours factor saturates at 1.2; the raw 102 clamps to 100.
        let snap = snapshot(100, 100.0, 12.0, 20, 0);
        assert_eq!(score_with_tasks(&snap), 100);
    }

    #[test]
    fn neutral_task_rate_alone_yields_fifteen() {
        let snap = snapshot(0, 50.0, 0.0, 0, 0);
        assert_eq!(score_with_tasks(&snap), 15);
    }

    #[test]
    fn punctuality_formula_reproduces_known_weighting() {
        // 100 * 0.7 + 100 * 0.2 + 75 * 0.1 = 97.5, rounded up.
        let snap = snapshot(100, 0.0, 8.0, 4, 1);
        assert_eq!(score_with_punctuality(&snap), 98);
    }

    #[test]
    fn punctuality_variant_has_no_overtime_bonus() {
        let snap = snapshot(0, 0.0, 12.0, 0, 0);
        assert_eq!(score_with_punctuality(&snap), 20);
    }

    #[test]
    fn scores_stay_in_bounds_for_extreme_inputs() {
        let extremes = [
            snapshot(0, 0.0, 0.0, 0, 0),
            snapshot(100, 100.0, 24.0, 30, 0),
            snapshot(100, 0.0, 0.0, 1, 5),
            snapshot(0, 100.0, 11.9, 2, 2),
        ];
        for snap in &extremes {
            assert!(score_with_tasks(snap) <= 100);
            assert!(score_with_punctuality(snap) <= 100);
        }
    }
}
