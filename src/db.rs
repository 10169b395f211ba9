use anyhow::Context;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::attendance::{self, Decision};
use crate::calendar;
use crate::error::EngineError;
use crate::models::{
    ApprovalStatus, AttendanceRecord, PendingAttendance, ProjectRecord, Role, SprintRecord,
    TaskRecord, TaskStatus, UserRecord, WorkMode,
};

pub async fn init_db(pool: &PgPool) -> Result<(), EngineError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool, today: NaiveDate) -> anyhow::Result<()> {
    let priya = Uuid::parse_str("a3e1c9d4-5b2f-4c1e-9a7d-8e6f0b2c4d1a")?;
    let rohan = Uuid::parse_str("b7d2e8f1-3a6c-4e9b-8c5d-2f7a9e1b3c6d")?;
    let asha = Uuid::parse_str("c1f4a7b2-8d3e-4b6f-a9c8-5e2d7f4b1a9e")?;
    let dev = Uuid::parse_str("d9b3c6e2-7f1a-4d8c-b5e9-3a8f2c7d5b1f")?;
    let meera = Uuid::parse_str("e5a8d1f3-2c9b-4a7e-8f6b-9d4e1a3c8f2b")?;

    let users = vec![
        (priya, "Priya Nair", "priya.nair@groupscholar.com", Role::Admin, None),
        (rohan, "Rohan Iyer", "rohan.iyer@groupscholar.com", Role::Manager, Some(priya)),
        (asha, "Asha Kulkarni", "asha.kulkarni@groupscholar.com", Role::Employee, Some(rohan)),
        (dev, "Dev Sharma", "dev.sharma@groupscholar.com", Role::Employee, Some(rohan)),
        (meera, "Meera Joshi", "meera.joshi@groupscholar.com", Role::Employee, Some(rohan)),
    ];

    for (id, name, email, role, manager_id) in users {
        sqlx::query(
            r#"
            INSERT INTO attendance_analytics.users (id, full_name, email, role, manager_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, role = EXCLUDED.role,
                manager_id = EXCLUDED.manager_id
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(role.as_str())
        .bind(manager_id)
        .fetch_one(pool)
        .await?;
    }

    // The three most recent working days, so freshly seeded reports and
    // rosters have data no matter when the command runs.
    let recent: Vec<NaiveDate> = calendar::working_days(today - Duration::days(9), today).collect();
    anyhow::ensure!(recent.len() >= 3, "seed window holds fewer than 3 working days");
    let days = &recent[recent.len() - 3..];

    let attendance = vec![
        (
            asha,
            days[0],
            (9, 5),
            Some((17, 35)),
            WorkMode::Office,
            "approved",
            Some((18.6624, 73.7929, 42)),
            Some(rohan),
        ),
        (
            asha,
            days[1],
            (9, 2),
            Some((17, 40)),
            WorkMode::Office,
            "approved",
            Some((18.6625, 73.7930, 55)),
            Some(rohan),
        ),
        (
            asha,
            days[2],
            (9, 8),
            Some((17, 12)),
            WorkMode::Office,
            "pending",
            Some((18.6623, 73.7928, 38)),
            None,
        ),
        (
            dev,
            days[0],
            (9, 40),
            Some((18, 10)),
            WorkMode::Office,
            "approved",
            Some((18.6627, 73.7933, 71)),
            Some(rohan),
        ),
        (dev, days[1], (9, 0), Some((17, 0)), WorkMode::Remote, "pending", None, None),
        (
            meera,
            days[0],
            (8, 55),
            Some((17, 20)),
            WorkMode::Office,
            "approved",
            Some((18.6622, 73.7927, 63)),
            Some(rohan),
        ),
        (
            meera,
            days[2],
            (9, 10),
            None,
            WorkMode::Office,
            "pending",
            Some((18.6626, 73.7931, 49)),
            None,
        ),
        (
            rohan,
            days[0],
            (8, 50),
            Some((17, 50)),
            WorkMode::Office,
            "approved",
            Some((18.6624, 73.7929, 30)),
            None,
        ),
        (
            rohan,
            days[1],
            (8, 48),
            Some((18, 5)),
            WorkMode::Office,
            "approved",
            Some((18.6624, 73.7929, 33)),
            None,
        ),
        (
            rohan,
            days[2],
            (8, 52),
            Some((17, 45)),
            WorkMode::Office,
            "approved",
            Some((18.6624, 73.7929, 29)),
            None,
        ),
    ];

    for (user_id, day, check_in, check_out, mode, status, geo, decided_by) in attendance {
        let check_in = day
            .and_hms_opt(check_in.0, check_in.1, 0)
            .context("invalid seed check-in time")?;
        let check_out = match check_out {
            Some((h, m)) => Some(day.and_hms_opt(h, m, 0).context("invalid seed check-out time")?),
            None => None,
        };
        let decided_at = match decided_by {
            Some(_) => Some(day.and_hms_opt(18, 30, 0).context("invalid seed decision time")?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO attendance_analytics.attendance
            (id, user_id, day, check_in, check_out, latitude, longitude, distance_m,
             mode, status, decided_by, decided_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (user_id, day) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(day)
        .bind(check_in)
        .bind(check_out)
        .bind(geo.map(|g| g.0))
        .bind(geo.map(|g| g.1))
        .bind(geo.map(|g| g.2))
        .bind(mode.as_str())
        .bind(status)
        .bind(decided_by)
        .bind(decided_at)
        .execute(pool)
        .await?;
    }

    let atlas = Uuid::parse_str("f2c7b4e9-6d1a-4c3f-9e8a-7b5d2f9c4e6a")?;
    sqlx::query(
        r#"
        INSERT INTO attendance_analytics.projects (id, name, code)
        VALUES ($1, $2, $3)
        ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(atlas)
    .bind("Atlas Platform")
    .bind("ATLAS")
    .fetch_one(pool)
    .await?;

    for member in [rohan, asha, dev, meera] {
        sqlx::query(
            r#"
            INSERT INTO attendance_analytics.project_members (project_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(atlas)
        .bind(member)
        .execute(pool)
        .await?;
    }

    let sprint_one = Uuid::parse_str("1a6e9c3d-8b5f-4e2a-b7d4-6c9f3e8a1d5b")?;
    let sprint_two = Uuid::parse_str("2b7f1d4e-9c6a-4f3b-8e5c-7d1a4b9f2e6c")?;
    let sprints = vec![
        (
            sprint_one,
            "Sprint 1",
            today - Duration::days(28),
            today - Duration::days(14),
            "completed",
            21,
        ),
        (
            sprint_two,
            "Sprint 2",
            today - Duration::days(7),
            today + Duration::days(7),
            "active",
            0,
        ),
    ];

    for (id, name, starts_on, ends_on, status, velocity) in sprints {
        sqlx::query(
            r#"
            INSERT INTO attendance_analytics.sprints
            (id, project_id, name, starts_on, ends_on, status, velocity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET starts_on = EXCLUDED.starts_on, ends_on = EXCLUDED.ends_on,
                status = EXCLUDED.status, velocity = EXCLUDED.velocity
            "#,
        )
        .bind(id)
        .bind(atlas)
        .bind(name)
        .bind(starts_on)
        .bind(ends_on)
        .bind(status)
        .bind(velocity)
        .execute(pool)
        .await?;
    }

    // Day offsets from today: (due, started, completed), then created.
    let tasks = vec![
        (
            "seed-101",
            asha,
            "Wire the attendance export",
            "done",
            3,
            Some(sprint_two),
            (Some(-1), Some(-6), Some(-3)),
            -7,
        ),
        (
            "seed-102",
            asha,
            "Harden geofence edge cases",
            "in_progress",
            2,
            Some(sprint_two),
            (Some(2), Some(-2), None),
            -5,
        ),
        (
            "seed-103",
            dev,
            "Backfill March approvals",
            "done",
            5,
            Some(sprint_two),
            (Some(-2), Some(-9), Some(-2)),
            -10,
        ),
        (
            "seed-104",
            dev,
            "Sprint board polish",
            "todo",
            1,
            Some(sprint_two),
            (Some(-3), None, None),
            -6,
        ),
        (
            "seed-105",
            meera,
            "Write onboarding runbook",
            "done",
            2,
            Some(sprint_one),
            (None, Some(-20), Some(-16)),
            -21,
        ),
        (
            "seed-106",
            meera,
            "Quarterly capacity review",
            "in_progress",
            3,
            Some(sprint_two),
            (Some(5), Some(-1), None),
            -4,
        ),
        ("seed-107", rohan, "Prune stale task imports", "todo", 1, None, (Some(7), None, None), -3),
        (
            "seed-108",
            asha,
            "Rotate API credentials",
            "done",
            1,
            Some(sprint_one),
            (None, Some(-18), Some(-17)),
            -19,
        ),
    ];

    for (source_key, assignee, title, status, points, sprint_id, dates, created) in tasks {
        let (due, started, completed) = dates;
        let stamp = |offset: i64| -> anyhow::Result<NaiveDateTime> {
            (today + Duration::days(offset))
                .and_hms_opt(10, 0, 0)
                .context("invalid seed task time")
        };

        sqlx::query(
            r#"
            INSERT INTO attendance_analytics.tasks
            (id, project_id, sprint_id, assignee_id, title, status, story_points,
             due_on, started_at, completed_at, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(atlas)
        .bind(sprint_id)
        .bind(assignee)
        .bind(title)
        .bind(status)
        .bind(points)
        .bind(due.map(|d| today + Duration::days(d)))
        .bind(started.map(stamp).transpose()?)
        .bind(completed.map(stamp).transpose()?)
        .bind(stamp(created)?)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    info!("seed data upserted");
    Ok(())
}

pub async fn user_by_email(pool: &PgPool, email: &str) -> Result<UserRecord, EngineError> {
    let row = sqlx::query(
        "SELECT id, full_name, email, role, manager_id \
         FROM attendance_analytics.users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngineError::UserNotFound {
        ident: email.to_string(),
    })?;

    Ok(map_user(&row)?)
}

pub async fn user_by_id(pool: &PgPool, id: Uuid) -> Result<UserRecord, EngineError> {
    let row = sqlx::query(
        "SELECT id, full_name, email, role, manager_id \
         FROM attendance_analytics.users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngineError::UserNotFound {
        ident: id.to_string(),
    })?;

    Ok(map_user(&row)?)
}

/// Resolves the reporting line a viewer may see: admins get every
/// non-admin user, managers their direct reports.
pub async fn team_members(
    pool: &PgPool,
    viewer: &UserRecord,
) -> Result<Vec<UserRecord>, EngineError> {
    let rows = match viewer.role {
        Role::Admin => {
            sqlx::query(
                "SELECT id, full_name, email, role, manager_id \
                 FROM attendance_analytics.users \
                 WHERE role <> 'admin' ORDER BY full_name",
            )
            .fetch_all(pool)
            .await?
        }
        Role::Manager => {
            sqlx::query(
                "SELECT id, full_name, email, role, manager_id \
                 FROM attendance_analytics.users \
                 WHERE manager_id = $1 ORDER BY full_name",
            )
            .bind(viewer.id)
            .fetch_all(pool)
            .await?
        }
        Role::Employee => return Err(EngineError::NotAuthorized),
    };

    let mut members = Vec::with_capacity(rows.len());
    for row in rows {
        members.push(map_user(&row)?);
    }
    Ok(members)
}

pub async fn approved_attendance(
    pool: &PgPool,
    user_ids: &[Uuid],
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query(
        "SELECT id, user_id, day, check_in, check_out, latitude, longitude, distance_m, \
         note, mode, status, decided_by, decided_at \
         FROM attendance_analytics.attendance \
         WHERE user_id = ANY($1) AND day BETWEEN $2 AND $3 AND status = 'approved' \
         ORDER BY day",
    )
    .bind(user_ids)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_attendance).collect()
}

pub async fn attendance_range(
    pool: &PgPool,
    user_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query(
        "SELECT id, user_id, day, check_in, check_out, latitude, longitude, distance_m, \
         note, mode, status, decided_by, decided_at \
         FROM attendance_analytics.attendance \
         WHERE user_id = $1 AND day BETWEEN $2 AND $3 \
         ORDER BY day DESC",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_attendance).collect()
}

pub async fn attendance_on_day(
    pool: &PgPool,
    user_ids: &[Uuid],
    day: NaiveDate,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query(
        "SELECT id, user_id, day, check_in, check_out, latitude, longitude, distance_m, \
         note, mode, status, decided_by, decided_at \
         FROM attendance_analytics.attendance \
         WHERE user_id = ANY($1) AND day = $2",
    )
    .bind(user_ids)
    .bind(day)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_attendance).collect()
}

/// Records awaiting a decision, scoped the same way as `team_members`.
pub async fn pending_attendance(
    pool: &PgPool,
    viewer: &UserRecord,
) -> Result<Vec<PendingAttendance>, EngineError> {
    let rows = match viewer.role {
        Role::Admin => {
            sqlx::query(
                "SELECT a.id, a.user_id, a.day, a.check_in, a.check_out, a.latitude, \
                 a.longitude, a.distance_m, a.note, a.mode, a.status, a.decided_by, \
                 a.decided_at, u.full_name, u.email \
                 FROM attendance_analytics.attendance a \
                 JOIN attendance_analytics.users u ON u.id = a.user_id \
                 WHERE a.status = 'pending' \
                 ORDER BY a.day DESC, u.full_name",
            )
            .fetch_all(pool)
            .await?
        }
        Role::Manager => {
            sqlx::query(
                "SELECT a.id, a.user_id, a.day, a.check_in, a.check_out, a.latitude, \
                 a.longitude, a.distance_m, a.note, a.mode, a.status, a.decided_by, \
                 a.decided_at, u.full_name, u.email \
                 FROM attendance_analytics.attendance a \
                 JOIN attendance_analytics.users u ON u.id = a.user_id \
                 WHERE a.status = 'pending' AND u.manager_id = $1 \
                 ORDER BY a.day DESC, u.full_name",
            )
            .bind(viewer.id)
            .fetch_all(pool)
            .await?
        }
        Role::Employee => return Err(EngineError::NotAuthorized),
    };

    let mut pending = Vec::with_capacity(rows.len());
    for row in rows {
        pending.push(PendingAttendance {
            record: map_attendance(&row)?,
            user_name: row.get("full_name"),
            user_email: row.get("email"),
        });
    }
    Ok(pending)
}

pub async fn tasks_for_assignees(
    pool: &PgPool,
    user_ids: &[Uuid],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> anyhow::Result<Vec<TaskRecord>> {
    let rows = sqlx::query(
        "SELECT sprint_id, assignee_id, title, status, story_points, \
         due_on, started_at, completed_at \
         FROM attendance_analytics.tasks \
         WHERE assignee_id = ANY($1) AND created_at >= $2 AND created_at < $3 \
         ORDER BY created_at",
    )
    .bind(user_ids)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_task).collect()
}

pub async fn project_by_code(pool: &PgPool, code: &str) -> anyhow::Result<ProjectRecord> {
    let row = sqlx::query(
        "SELECT id, name, code, status FROM attendance_analytics.projects WHERE code = $1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no project with code {code}"))?;

    Ok(ProjectRecord {
        id: row.get("id"),
        name: row.get("name"),
        code: row.get("code"),
        status: row.get("status"),
    })
}

pub async fn project_members(pool: &PgPool, project_id: Uuid) -> anyhow::Result<Vec<UserRecord>> {
    let rows = sqlx::query(
        "SELECT u.id, u.full_name, u.email, u.role, u.manager_id \
         FROM attendance_analytics.project_members pm \
         JOIN attendance_analytics.users u ON u.id = pm.user_id \
         WHERE pm.project_id = $1 ORDER BY u.full_name",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_user).collect()
}

pub async fn project_sprints(pool: &PgPool, project_id: Uuid) -> anyhow::Result<Vec<SprintRecord>> {
    let rows = sqlx::query(
        "SELECT id, name, starts_on, ends_on, status, velocity \
         FROM attendance_analytics.sprints \
         WHERE project_id = $1 ORDER BY starts_on",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_sprint).collect()
}

pub async fn project_tasks(
    pool: &PgPool,
    project_id: Uuid,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> anyhow::Result<Vec<TaskRecord>> {
    let rows = sqlx::query(
        "SELECT sprint_id, assignee_id, title, status, story_points, \
         due_on, started_at, completed_at \
         FROM attendance_analytics.tasks \
         WHERE project_id = $1 AND created_at BETWEEN $2 AND $3 \
         ORDER BY created_at",
    )
    .bind(project_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_task).collect()
}

/// First writer wins: the upsert only lands when no check-in exists for
/// the day, so a concurrent duplicate observes `AlreadyCheckedIn`.
#[allow(clippy::too_many_arguments)]
pub async fn check_in(
    pool: &PgPool,
    user: &UserRecord,
    now: NaiveDateTime,
    latitude: Option<f64>,
    longitude: Option<f64>,
    distance_m: Option<i32>,
    mode: WorkMode,
    note: Option<&str>,
) -> Result<AttendanceRecord, EngineError> {
    let day = now.date();
    let status = attendance::auto_status(user.role);

    let row = sqlx::query(
        r#"
        INSERT INTO attendance_analytics.attendance
        (id, user_id, day, check_in, latitude, longitude, distance_m, note, mode, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (user_id, day) DO UPDATE
        SET check_in = EXCLUDED.check_in, latitude = EXCLUDED.latitude,
            longitude = EXCLUDED.longitude, distance_m = EXCLUDED.distance_m,
            note = EXCLUDED.note, mode = EXCLUDED.mode, status = EXCLUDED.status
        WHERE attendance.check_in IS NULL
        RETURNING id, user_id, day, check_in, check_out, latitude, longitude, distance_m,
                  note, mode, status, decided_by, decided_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(day)
    .bind(now)
    .bind(latitude)
    .bind(longitude)
    .bind(distance_m)
    .bind(note)
    .bind(mode.as_str())
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(map_attendance(&row)?),
        None => Err(EngineError::AlreadyCheckedIn { day }),
    }
}

/// Stamps the check-out and re-enters the approval queue for ordinary
/// roles. A rejected day stays rejected; only the stamp is recorded.
pub async fn check_out(
    pool: &PgPool,
    user: &UserRecord,
    now: NaiveDateTime,
) -> Result<AttendanceRecord, EngineError> {
    let day = now.date();
    let status = attendance::auto_status(user.role);

    let row = sqlx::query(
        r#"
        UPDATE attendance_analytics.attendance
        SET check_out = $1,
            status = CASE WHEN status = 'rejected' THEN status ELSE $2 END,
            decided_by = CASE WHEN status = 'rejected' THEN decided_by ELSE NULL END,
            decided_at = CASE WHEN status = 'rejected' THEN decided_at ELSE NULL END
        WHERE user_id = $3 AND day = $4 AND check_in IS NOT NULL AND check_out IS NULL
        RETURNING id, user_id, day, check_in, check_out, latitude, longitude, distance_m,
                  note, mode, status, decided_by, decided_at
        "#,
    )
    .bind(now)
    .bind(status.as_str())
    .bind(user.id)
    .bind(day)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        return Ok(map_attendance(&row)?);
    }

    // The guard missed; look at the row to tell the caller why.
    let existing = sqlx::query(
        "SELECT check_in FROM attendance_analytics.attendance WHERE user_id = $1 AND day = $2",
    )
    .bind(user.id)
    .bind(day)
    .fetch_optional(pool)
    .await?;

    match existing {
        Some(row) if row.get::<Option<NaiveDateTime>, _>("check_in").is_some() => {
            Err(EngineError::AlreadyCheckedOut { day })
        }
        _ => Err(EngineError::NotCheckedIn { day }),
    }
}

/// Applies an approval decision. Authority requires supervisory scope
/// over the record's owner; the conditional update keeps concurrent
/// deciders from overturning a terminal status.
pub async fn decide(
    pool: &PgPool,
    record_id: Uuid,
    approver: &UserRecord,
    decision: Decision,
    now: NaiveDateTime,
) -> Result<AttendanceRecord, EngineError> {
    let row = sqlx::query(
        "SELECT a.status AS record_status, u.id, u.full_name, u.email, u.role, u.manager_id \
         FROM attendance_analytics.attendance a \
         JOIN attendance_analytics.users u ON u.id = a.user_id \
         WHERE a.id = $1",
    )
    .bind(record_id)
    .fetch_optional(pool)
    .await?
    .ok_or(EngineError::RecordNotFound { id: record_id })?;

    let owner = map_user(&row)?;
    if !attendance::supervises(approver, &owner) {
        return Err(EngineError::NotAuthorized);
    }

    let current: ApprovalStatus = row.get::<String, _>("record_status").parse()?;
    if !attendance::decision_allowed(current, decision) {
        return Err(EngineError::AlreadyDecided { status: current });
    }

    let new_status = decision.as_status();
    let updated = sqlx::query(
        r#"
        UPDATE attendance_analytics.attendance
        SET status = $1, decided_by = $2, decided_at = $3
        WHERE id = $4 AND status IN ('pending', $1)
        RETURNING id, user_id, day, check_in, check_out, latitude, longitude, distance_m,
                  note, mode, status, decided_by, decided_at
        "#,
    )
    .bind(new_status.as_str())
    .bind(approver.id)
    .bind(now)
    .bind(record_id)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = updated {
        return Ok(map_attendance(&row)?);
    }

    // Raced with another decider between the read and the update.
    let status: Option<String> =
        sqlx::query("SELECT status FROM attendance_analytics.attendance WHERE id = $1")
            .bind(record_id)
            .fetch_optional(pool)
            .await?
            .map(|r| r.get("status"));

    match status {
        Some(raw) => Err(EngineError::AlreadyDecided {
            status: raw.parse()?,
        }),
        None => Err(EngineError::RecordNotFound { id: record_id }),
    }
}

pub async fn import_tasks_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        title: String,
        status: String,
        story_points: Option<i32>,
        assignee_name: String,
        assignee_email: String,
        project_code: String,
        sprint: Option<String>,
        due_on: Option<NaiveDate>,
        started_at: Option<NaiveDateTime>,
        completed_at: Option<NaiveDateTime>,
        created_on: Option<NaiveDate>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let status: TaskStatus = row
            .status
            .parse()
            .with_context(|| format!("task '{}'", row.title))?;

        let assignee_id: Uuid = sqlx::query(
            r#"
            INSERT INTO attendance_analytics.users (id, full_name, email, role)
            VALUES ($1, $2, $3, 'employee')
            ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.assignee_name)
        .bind(&row.assignee_email)
        .fetch_one(pool)
        .await?
        .get("id");

        let project_id: Uuid = sqlx::query(
            r#"
            INSERT INTO attendance_analytics.projects (id, name, code)
            VALUES ($1, $2, $2)
            ON CONFLICT (code) DO UPDATE SET code = EXCLUDED.code
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.project_code)
        .fetch_one(pool)
        .await?
        .get("id");

        sqlx::query(
            r#"
            INSERT INTO attendance_analytics.project_members (project_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(assignee_id)
        .execute(pool)
        .await?;

        let sprint_id = match row.sprint.as_deref() {
            Some(name) => Some(
                sqlx::query(
                    "SELECT id FROM attendance_analytics.sprints \
                     WHERE project_id = $1 AND name = $2",
                )
                .bind(project_id)
                .bind(name)
                .fetch_optional(pool)
                .await?
                .map(|r| r.get::<Uuid, _>("id"))
                .with_context(|| {
                    format!("unknown sprint '{name}' for project {}", row.project_code)
                })?,
            ),
            None => None,
        };

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO attendance_analytics.tasks
            (id, project_id, sprint_id, assignee_id, title, status, story_points,
             due_on, started_at, completed_at, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, COALESCE($11, now()), $12)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(sprint_id)
        .bind(assignee_id)
        .bind(&row.title)
        .bind(status.as_str())
        .bind(row.story_points)
        .bind(row.due_on)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(row.created_on.and_then(|d| d.and_hms_opt(9, 0, 0)))
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

fn map_user(row: &PgRow) -> anyhow::Result<UserRecord> {
    let role: String = row.get("role");
    Ok(UserRecord {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        role: role.parse()?,
        manager_id: row.get("manager_id"),
    })
}

fn map_attendance(row: &PgRow) -> anyhow::Result<AttendanceRecord> {
    let mode: String = row.get("mode");
    let status: String = row.get("status");
    Ok(AttendanceRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        day: row.get("day"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        distance_m: row.get("distance_m"),
        note: row.get("note"),
        mode: mode.parse()?,
        status: status.parse()?,
        decided_by: row.get("decided_by"),
        decided_at: row.get("decided_at"),
    })
}

fn map_task(row: &PgRow) -> anyhow::Result<TaskRecord> {
    let status: String = row.get("status");
    Ok(TaskRecord {
        sprint_id: row.get("sprint_id"),
        assignee_id: row.get("assignee_id"),
        title: row.get("title"),
        status: status.parse()?,
        story_points: row.get("story_points"),
        due_on: row.get("due_on"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    })
}

fn map_sprint(row: &PgRow) -> anyhow::Result<SprintRecord> {
    let status: String = row.get("status");
    Ok(SprintRecord {
        id: row.get("id"),
        name: row.get("name"),
        starts_on: row.get("starts_on"),
        ends_on: row.get("ends_on"),
        status: status.parse()?,
        velocity: row.get("velocity"),
    })
}
