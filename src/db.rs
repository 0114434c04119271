use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::cache::StudentCache;
use crate::models::{
    AttendanceEvent, AttendanceStatus, CaseStatus, DisciplinaryEvent, StudentId, StudentProfile,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_student(
    pool: &PgPool,
    code: &str,
    full_name: &str,
    class_name: &str,
) -> anyhow::Result<StudentId> {
    let id: StudentId = sqlx::query(
        r#"
        INSERT INTO school_early_warning.students (code, full_name, class_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (code) DO UPDATE
        SET full_name = EXCLUDED.full_name, class_name = EXCLUDED.class_name
        RETURNING id
        "#,
    )
    .bind(code)
    .bind(full_name)
    .bind(class_name)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_attendance(
    pool: &PgPool,
    student_id: StudentId,
    date: NaiveDate,
    status: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO school_early_warning.attendance (student_id, date, status)
        VALUES ($1, $2, $3)
        ON CONFLICT (student_id, date) DO UPDATE
        SET status = EXCLUDED.status, recorded_at = now()
        "#,
    )
    .bind(student_id)
    .bind(date)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_measure(
    pool: &PgPool,
    student_id: StudentId,
    occurred_on: NaiveDate,
    measure_type: &str,
    note: &str,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO school_early_warning.disciplinary_measures
        (id, student_id, occurred_on, measure_type, note, source_key)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(occurred_on)
    .bind(measure_type)
    .bind(note)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool, today: NaiveDate) -> anyhow::Result<()> {
    let ana = upsert_student(pool, "2026-0101", "Ana Souza", "7A").await?;
    let bruno = upsert_student(pool, "2026-0102", "Bruno Lima", "7A").await?;
    let carla = upsert_student(pool, "2026-0215", "Carla Dias", "8B").await?;

    // Last 20 days: Ana misses two, Bruno misses the most recent six.
    for offset in 0..20 {
        let date = today - chrono::Duration::days(offset);
        let ana_status = if offset == 4 || offset == 11 { "absent" } else { "present" };
        let bruno_status = match offset {
            0..=5 => "absent",
            9 => "justified",
            _ => "present",
        };
        let carla_status = if offset == 2 { "controlled" } else { "present" };
        upsert_attendance(pool, ana, date, ana_status).await?;
        upsert_attendance(pool, bruno, date, bruno_status).await?;
        upsert_attendance(pool, carla, date, carla_status).await?;
    }

    let measures = vec![
        ("seed-001", bruno, "Advertência oral", 3, "Disrupted class"),
        ("seed-002", bruno, "Advertência escrita", 10, "Repeated phone use"),
        ("seed-003", bruno, "Suspensão", 25, "Fight during break"),
        ("seed-004", carla, "Advertência oral", 75, "Late to class"),
        ("seed-005", ana, "Elogio", 8, "Helped organise science fair"),
    ];

    for (source_key, student_id, measure_type, days_ago, note) in measures {
        let occurred_on = today - chrono::Duration::days(days_ago);
        insert_measure(pool, student_id, occurred_on, measure_type, note, source_key).await?;
    }

    set_case_status(pool, "2026-0102", CaseStatus::AwaitingDeadline).await?;

    Ok(())
}

pub async fn set_case_status(
    pool: &PgPool,
    student_code: &str,
    status: CaseStatus,
) -> anyhow::Result<()> {
    let student_id: StudentId =
        sqlx::query("SELECT id FROM school_early_warning.students WHERE code = $1")
            .bind(student_code)
            .fetch_optional(pool)
            .await?
            .with_context(|| format!("no student with code {student_code}"))?
            .get("id");

    if status == CaseStatus::None {
        sqlx::query("DELETE FROM school_early_warning.case_tracking WHERE student_id = $1")
            .bind(student_id)
            .execute(pool)
            .await?;
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO school_early_warning.case_tracking (student_id, status)
        VALUES ($1, $2)
        ON CONFLICT (student_id) DO UPDATE
        SET status = EXCLUDED.status, updated_at = now()
        "#,
    )
    .bind(student_id)
    .bind(status.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_students(
    pool: &PgPool,
    class_name: Option<&str>,
) -> anyhow::Result<Vec<StudentProfile>> {
    let mut query = String::from(
        "SELECT id, code, full_name, class_name FROM school_early_warning.students",
    );
    if class_name.is_some() {
        query.push_str(" WHERE class_name = $1");
    }

    let mut rows = sqlx::query(&query);
    if let Some(value) = class_name {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records
        .into_iter()
        .map(|row| StudentProfile {
            id: row.get("id"),
            code: row.get("code"),
            full_name: row.get("full_name"),
            class_name: row.get("class_name"),
        })
        .collect())
}

pub async fn fetch_attendance(
    pool: &PgPool,
    since_date: NaiveDate,
    class_name: Option<&str>,
) -> anyhow::Result<Vec<AttendanceEvent>> {
    let mut query = String::from(
        "SELECT a.student_id, a.date, a.status \
         FROM school_early_warning.attendance a \
         JOIN school_early_warning.students s ON s.id = a.student_id \
         WHERE a.date >= $1",
    );
    if class_name.is_some() {
        query.push_str(" AND s.class_name = $2");
    }
    query.push_str(" ORDER BY a.student_id, a.date");

    let mut rows = sqlx::query(&query).bind(since_date);
    if let Some(value) = class_name {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records
        .into_iter()
        .map(|row| AttendanceEvent {
            student_id: row.get("student_id"),
            date: row.get("date"),
            status: AttendanceStatus::parse(row.get::<&str, _>("status")),
        })
        .collect())
}

pub async fn fetch_measures(
    pool: &PgPool,
    class_name: Option<&str>,
) -> anyhow::Result<Vec<DisciplinaryEvent>> {
    let mut query = String::from(
        "SELECT m.student_id, m.occurred_on, m.measure_type, m.note \
         FROM school_early_warning.disciplinary_measures m \
         JOIN school_early_warning.students s ON s.id = m.student_id",
    );
    if class_name.is_some() {
        query.push_str(" WHERE s.class_name = $1");
    }

    let mut rows = sqlx::query(&query);
    if let Some(value) = class_name {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records
        .into_iter()
        .map(|row| DisciplinaryEvent {
            student_id: row.get("student_id"),
            date: row.get("occurred_on"),
            measure_type: row.get("measure_type"),
            note: row.get("note"),
        })
        .collect())
}

pub async fn fetch_case_statuses(pool: &PgPool) -> anyhow::Result<HashMap<StudentId, CaseStatus>> {
    let records = sqlx::query("SELECT student_id, status FROM school_early_warning.case_tracking")
        .fetch_all(pool)
        .await?;

    let mut statuses = HashMap::new();
    for row in records {
        let student_id: StudentId = row.get("student_id");
        let raw: String = row.get("status");
        let status = raw.parse::<CaseStatus>().unwrap_or_else(|err| {
            tracing::warn!(student_id, %err, "treating unknown case status as unset");
            CaseStatus::Unset
        });
        statuses.insert(student_id, status);
    }
    Ok(statuses)
}

pub async fn fetch_stored_scores(pool: &PgPool) -> anyhow::Result<HashMap<StudentId, f64>> {
    let records =
        sqlx::query("SELECT student_id, nota_atual FROM school_early_warning.student_conduct_scores")
            .fetch_all(pool)
            .await?;
    Ok(records
        .into_iter()
        .map(|row| (row.get("student_id"), row.get("nota_atual")))
        .collect())
}

/// Fetches every source concurrently and folds the rows into a fresh cache.
/// A failing score view is tolerated; scores then come from the local formula.
pub async fn load_cache(
    pool: &PgPool,
    since_date: NaiveDate,
    class_name: Option<&str>,
) -> anyhow::Result<StudentCache> {
    let (students, attendance, measures, case_statuses, stored_scores) = tokio::try_join!(
        fetch_students(pool, class_name),
        fetch_attendance(pool, since_date, class_name),
        fetch_measures(pool, class_name),
        fetch_case_statuses(pool),
        async {
            Ok::<_, anyhow::Error>(match fetch_stored_scores(pool).await {
                Ok(scores) => scores,
                Err(err) => {
                    tracing::warn!(%err, "stored conduct scores unavailable, using local formula");
                    HashMap::new()
                }
            })
        },
    )
    .context("failed to load student records")?;

    let mut cache = StudentCache::new();
    for profile in students {
        cache.upsert_student(profile);
    }
    for event in attendance {
        cache.upsert_attendance(event);
    }
    for event in measures {
        cache.insert_measure(event);
    }
    for (student_id, status) in case_statuses {
        if cache.student(student_id).is_some() {
            cache.set_case_status(student_id, status);
        }
    }
    for (student_id, score) in stored_scores {
        if cache.student(student_id).is_some() {
            cache.set_stored_score(student_id, Some(score));
        }
    }

    tracing::info!(students = cache.len(), %since_date, "loaded student records");
    Ok(cache)
}

pub async fn import_attendance_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_code: String,
        full_name: String,
        class_name: String,
        date: NaiveDate,
        status: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut written = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        if let AttendanceStatus::Unrecognized(raw) = AttendanceStatus::parse(&row.status) {
            tracing::warn!(student = %row.student_code, date = %row.date, status = %raw, "importing unrecognized attendance status");
        }
        let student_id =
            upsert_student(pool, &row.student_code, &row.full_name, &row.class_name).await?;
        upsert_attendance(pool, student_id, row.date, row.status.trim()).await?;
        written += 1;
    }

    Ok(written)
}

pub async fn import_measures_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_code: String,
        full_name: String,
        class_name: String,
        measure_type: String,
        occurred_on: NaiveDate,
        note: String,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let student_id =
            upsert_student(pool, &row.student_code, &row.full_name, &row.class_name).await?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_measure(
            pool,
            student_id,
            row.occurred_on,
            &row.measure_type,
            &row.note,
            &source_key,
        )
        .await?
        {
            inserted += 1;
        }
    }

    Ok(inserted)
}
