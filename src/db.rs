use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    BiasRiskLevel, ContributesTo, EmployeeRecord, SignalAxisMapping, SignalCategory, SignalDefinition,
    SignalSnapshot,
};

const SNAPSHOT_COLUMNS: &str = "s.employee_id, s.signal_definition_id, d.name AS signal_name, \
     d.category, s.normalized_score, s.confidence_score, s.bias_risk_level, s.captured_at, \
     s.is_current";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let company_id = upsert_company(pool, "Northwind").await?;

    let employees = vec![
        ("Avery Lee", "avery.lee@northwind.example"),
        ("Jules Moreno", "jules.moreno@northwind.example"),
        ("Kiara Patel", "kiara.patel@northwind.example"),
    ];

    for (name, email) in employees {
        sqlx::query(
            r#"
            INSERT INTO talent_signals.employees (id, company_id, full_name, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, company_id = EXCLUDED.company_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(name)
        .bind(email)
        .execute(pool)
        .await?;
    }

    let definitions = vec![
        ("LEAD_CAP", "Leadership Capability", "leadership"),
        ("STRAT_THINK", "Strategic Thinking", "strategic_thinking"),
        ("LEARN_AGILITY", "Learning Agility", "adaptability"),
        ("TECH_MASTERY", "Technical Mastery", "technical"),
        ("CUST_FOCUS", "Customer Focus", "customer_focus"),
        ("COLLAB", "Collaboration", "teamwork"),
        ("VALUES_FIT", "Values Alignment", "values"),
    ];

    for (code, name, category) in definitions {
        sqlx::query(
            r#"
            INSERT INTO talent_signals.signal_definitions (id, code, name, category)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, category = EXCLUDED.category
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(name)
        .bind(category)
        .execute(pool)
        .await?;
    }

    let snapshots = vec![
        ("seed-001", "avery.lee@northwind.example", "LEAD_CAP", 4.4, 0.9, Some("low"), 12),
        ("seed-002", "avery.lee@northwind.example", "TECH_MASTERY", 4.1, 0.85, None, 20),
        ("seed-003", "avery.lee@northwind.example", "COLLAB", 3.8, 0.8, Some("medium"), 5),
        ("seed-004", "jules.moreno@northwind.example", "TECH_MASTERY", 3.2, 0.75, Some("low"), 9),
        ("seed-005", "jules.moreno@northwind.example", "STRAT_THINK", 3.9, 0.5, Some("high"), 14),
        ("seed-006", "kiara.patel@northwind.example", "CUST_FOCUS", 2.1, 0.7, Some("medium"), 3),
        ("seed-007", "kiara.patel@northwind.example", "LEARN_AGILITY", 4.6, 0.95, Some("low"), 30),
        ("seed-008", "kiara.patel@northwind.example", "VALUES_FIT", 3.5, 0.65, Some("high"), 7),
    ];

    for (source_key, email, code, score, confidence, bias, days_ago) in snapshots {
        let snapshot = NewSnapshot {
            email: email.to_string(),
            signal_code: code.to_string(),
            raw_value: None,
            normalized_score: score,
            confidence_score: confidence,
            bias_risk_level: bias.map(str::to_string),
            captured_at: Utc::now() - Duration::days(days_ago),
            source_key: source_key.to_string(),
        };
        insert_snapshot(pool, &snapshot).await?;
    }

    Ok(())
}

async fn upsert_company(pool: &PgPool, name: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO talent_signals.companies (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

pub async fn fetch_company_id(pool: &PgPool, name: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM talent_signals.companies WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("unknown company {name:?}"))?;
    Ok(row.get("id"))
}

fn row_to_employee(row: &PgRow) -> EmployeeRecord {
    EmployeeRecord {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
    }
}

pub async fn fetch_employee(
    pool: &PgPool,
    company_id: Uuid,
    email: &str,
) -> anyhow::Result<EmployeeRecord> {
    let row = sqlx::query(
        "SELECT id, full_name, email FROM talent_signals.employees \
         WHERE company_id = $1 AND email = $2",
    )
    .bind(company_id)
    .bind(email)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no employee {email} in this company"))?;
    Ok(row_to_employee(&row))
}

pub async fn fetch_company_employees(
    pool: &PgPool,
    company_id: Uuid,
) -> anyhow::Result<Vec<EmployeeRecord>> {
    let rows = sqlx::query(
        "SELECT id, full_name, email FROM talent_signals.employees \
         WHERE company_id = $1 ORDER BY full_name",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_employee).collect())
}

fn row_to_definition(row: &PgRow) -> SignalDefinition {
    SignalDefinition {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        category: SignalCategory::from(row.get::<String, _>("category")),
        is_active: row.get("is_active"),
    }
}

pub async fn fetch_active_definitions(pool: &PgPool) -> anyhow::Result<Vec<SignalDefinition>> {
    let rows = sqlx::query(
        "SELECT id, code, name, category, is_active FROM talent_signals.signal_definitions \
         WHERE is_active ORDER BY code",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_definition).collect())
}

pub async fn fetch_definition(pool: &PgPool, code: &str) -> anyhow::Result<SignalDefinition> {
    let row = sqlx::query(
        "SELECT id, code, name, category, is_active FROM talent_signals.signal_definitions \
         WHERE code = $1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("unknown signal definition {code:?}"))?;
    Ok(row_to_definition(&row))
}

fn row_to_mapping(row: &PgRow) -> anyhow::Result<SignalAxisMapping> {
    Ok(SignalAxisMapping {
        company_id: row.get("company_id"),
        signal_definition_id: row.get("signal_definition_id"),
        contributes_to: row.get::<String, _>("contributes_to").parse::<ContributesTo>()?,
        weight: row.get("weight"),
        minimum_confidence: row.get("minimum_confidence"),
        is_active: row.get("is_active"),
    })
}

pub async fn fetch_company_mappings(
    pool: &PgPool,
    company_id: Uuid,
) -> anyhow::Result<Vec<SignalAxisMapping>> {
    let rows = sqlx::query(
        "SELECT company_id, signal_definition_id, contributes_to, weight, minimum_confidence, \
         is_active FROM talent_signals.signal_axis_mappings \
         WHERE company_id = $1 AND is_active",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    let mappings = rows
        .iter()
        .map(row_to_mapping)
        .collect::<anyhow::Result<Vec<_>>>()?;
    debug!(%company_id, count = mappings.len(), "fetched custom mappings");
    Ok(mappings)
}

fn row_to_snapshot(row: &PgRow) -> anyhow::Result<SignalSnapshot> {
    let bias: Option<String> = row.get("bias_risk_level");
    Ok(SignalSnapshot {
        employee_id: row.get("employee_id"),
        signal_definition_id: row.get("signal_definition_id"),
        signal_name: row.get("signal_name"),
        category: SignalCategory::from(row.get::<String, _>("category")),
        normalized_score: row.get("normalized_score"),
        confidence_score: row.get("confidence_score"),
        bias_risk_level: BiasRiskLevel::parse_optional(bias.as_deref())?,
        captured_at: row.get("captured_at"),
        is_current: row.get("is_current"),
    })
}

pub async fn fetch_current_signals(
    pool: &PgPool,
    employee_id: Uuid,
) -> anyhow::Result<Vec<SignalSnapshot>> {
    let query = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM talent_signals.signal_snapshots s \
         JOIN talent_signals.signal_definitions d ON d.id = s.signal_definition_id \
         WHERE s.employee_id = $1 AND s.is_current"
    );
    let rows = sqlx::query(&query).bind(employee_id).fetch_all(pool).await?;
    let signals = rows
        .iter()
        .map(row_to_snapshot)
        .collect::<anyhow::Result<Vec<_>>>()?;
    debug!(%employee_id, count = signals.len(), "fetched current signals");
    Ok(signals)
}

pub async fn fetch_company_current_signals(
    pool: &PgPool,
    company_id: Uuid,
) -> anyhow::Result<Vec<SignalSnapshot>> {
    let query = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM talent_signals.signal_snapshots s \
         JOIN talent_signals.signal_definitions d ON d.id = s.signal_definition_id \
         JOIN talent_signals.employees e ON e.id = s.employee_id \
         WHERE e.company_id = $1 AND s.is_current"
    );
    let rows = sqlx::query(&query).bind(company_id).fetch_all(pool).await?;
    rows.iter().map(row_to_snapshot).collect()
}

/// Inserts new mapping rows, skipping any (company, definition) pair that
/// already has one. Returns the number of rows inserted.
pub async fn insert_mappings(
    pool: &PgPool,
    mappings: &[SignalAxisMapping],
) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for mapping in mappings {
        let result = sqlx::query(
            r#"
            INSERT INTO talent_signals.signal_axis_mappings
            (id, company_id, signal_definition_id, contributes_to, weight, minimum_confidence, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (company_id, signal_definition_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(mapping.company_id)
        .bind(mapping.signal_definition_id)
        .bind(mapping.contributes_to.as_str())
        .bind(mapping.weight)
        .bind(mapping.minimum_confidence)
        .bind(mapping.is_active)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Creates or replaces the company's mapping for one definition and
/// reactivates it.
pub async fn upsert_mapping(pool: &PgPool, mapping: &SignalAxisMapping) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO talent_signals.signal_axis_mappings
        (id, company_id, signal_definition_id, contributes_to, weight, minimum_confidence, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        ON CONFLICT (company_id, signal_definition_id) DO UPDATE
        SET contributes_to = EXCLUDED.contributes_to,
            weight = EXCLUDED.weight,
            minimum_confidence = EXCLUDED.minimum_confidence,
            is_active = TRUE,
            updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(mapping.company_id)
    .bind(mapping.signal_definition_id)
    .bind(mapping.contributes_to.as_str())
    .bind(mapping.weight)
    .bind(mapping.minimum_confidence)
    .execute(pool)
    .await?;
    Ok(())
}

/// Soft-deactivates a mapping. Returns false when no active mapping existed.
pub async fn deactivate_mapping(
    pool: &PgPool,
    company_id: Uuid,
    signal_definition_id: Uuid,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE talent_signals.signal_axis_mappings
        SET is_active = FALSE, updated_at = now()
        WHERE company_id = $1 AND signal_definition_id = $2 AND is_active
        "#,
    )
    .bind(company_id)
    .bind(signal_definition_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewSnapshot {
    pub email: String,
    pub signal_code: String,
    pub raw_value: Option<f64>,
    pub normalized_score: f64,
    pub confidence_score: f64,
    pub bias_risk_level: Option<String>,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub source_key: String,
}

impl NewSnapshot {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (0.0..=5.0).contains(&self.normalized_score),
            "normalized_score {} outside 0-5",
            self.normalized_score
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.confidence_score),
            "confidence_score {} outside 0-1",
            self.confidence_score
        );
        BiasRiskLevel::parse_optional(self.bias_risk_level.as_deref())?;
        Ok(())
    }
}

/// Records a snapshot. A newer snapshot supersedes the current one for the
/// same employee and definition; an older one is stored as history only.
/// Returns false when the source key was already imported.
pub async fn insert_snapshot(pool: &PgPool, snapshot: &NewSnapshot) -> anyhow::Result<bool> {
    snapshot.validate()?;
    let bias = BiasRiskLevel::parse_optional(snapshot.bias_risk_level.as_deref())?;

    let mut tx = pool.begin().await?;

    let exists = sqlx::query("SELECT 1 FROM talent_signals.signal_snapshots WHERE source_key = $1")
        .bind(&snapshot.source_key)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if exists {
        debug!(source_key = %snapshot.source_key, "snapshot already imported");
        return Ok(false);
    }

    let employee_id: Uuid =
        sqlx::query("SELECT id FROM talent_signals.employees WHERE email = $1")
            .bind(&snapshot.email)
            .fetch_optional(&mut *tx)
            .await?
            .with_context(|| format!("unknown employee {}", snapshot.email))?
            .get("id");

    let definition_id: Uuid =
        sqlx::query("SELECT id FROM talent_signals.signal_definitions WHERE code = $1")
            .bind(&snapshot.signal_code)
            .fetch_optional(&mut *tx)
            .await?
            .with_context(|| format!("unknown signal definition {}", snapshot.signal_code))?
            .get("id");

    sqlx::query(
        r#"
        UPDATE talent_signals.signal_snapshots
        SET is_current = FALSE
        WHERE employee_id = $1 AND signal_definition_id = $2 AND is_current
          AND captured_at <= $3
        "#,
    )
    .bind(employee_id)
    .bind(definition_id)
    .bind(snapshot.captured_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO talent_signals.signal_snapshots
        (id, employee_id, signal_definition_id, raw_value, normalized_score, confidence_score,
         bias_risk_level, captured_at, is_current, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
            NOT EXISTS (
                SELECT 1 FROM talent_signals.signal_snapshots
                WHERE employee_id = $2 AND signal_definition_id = $3 AND is_current
            ),
            $9)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(employee_id)
    .bind(definition_id)
    .bind(snapshot.raw_value)
    .bind(snapshot.normalized_score)
    .bind(snapshot.confidence_score)
    .bind(bias.map(BiasRiskLevel::as_str))
    .bind(snapshot.captured_at)
    .bind(&snapshot.source_key)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<NewSnapshot>().enumerate() {
        let mut row = result.with_context(|| format!("invalid CSV record {}", line + 1))?;
        if row.source_key.trim().is_empty() {
            row.source_key = format!("import-{}", Uuid::new_v4());
        }

        if insert_snapshot(pool, &row)
            .await
            .with_context(|| format!("failed to import CSV record {}", line + 1))?
        {
            inserted += 1;
        }
    }

    info!(path = %csv_path.display(), inserted, "snapshot import finished");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_snapshot(score: f64, confidence: f64, bias: Option<&str>) -> NewSnapshot {
        NewSnapshot {
            email: "avery.lee@northwind.example".to_string(),
            signal_code: "LEAD_CAP".to_string(),
            raw_value: Some(88.0),
            normalized_score: score,
            confidence_score: confidence,
            bias_risk_level: bias.map(str::to_string),
            captured_at: Utc::now(),
            source_key: "test-001".to_string(),
        }
    }

    #[test]
    fn accepts_in_range_snapshot() {
        assert!(new_snapshot(4.0, 0.9, Some("low")).validate().is_ok());
        assert!(new_snapshot(0.0, 0.0, None).validate().is_ok());
        assert!(new_snapshot(5.0, 1.0, Some("")).validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(new_snapshot(5.5, 0.9, None).validate().is_err());
        assert!(new_snapshot(3.0, 1.1, None).validate().is_err());
        assert!(new_snapshot(3.0, 0.8, Some("severe")).validate().is_err());
    }

    #[test]
    fn parses_csv_rows() {
        let data = "email,signal_code,raw_value,normalized_score,confidence_score,bias_risk_level,captured_at,source_key\n\
                    kiara.patel@northwind.example,COLLAB,,3.5,0.8,medium,2026-02-01T09:00:00Z,\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<NewSnapshot> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .expect("valid csv");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].raw_value, None);
        assert_eq!(rows[0].bias_risk_level.as_deref(), Some("medium"));
        assert!(rows[0].source_key.is_empty());
        assert!(rows[0].validate().is_ok());
    }
}
