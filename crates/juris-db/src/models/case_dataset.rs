//! Normalized case dataset.
//!
//! The derived, relational view of one provider lawsuit entry: a flat
//! header plus parties, subjects, movements and attachments. The dataset
//! is replaced wholesale per case on every successful sync — deleted and
//! reinserted in one transaction, never merged incrementally — so a shape
//! change on the provider side can never leak stale rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool, QueryBuilder};
use uuid::Uuid;

/// Flat header extracted from a raw lawsuit entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseHeader {
    pub process_number: String,
    pub court: Option<String>,
    pub instance: Option<String>,
    pub subject_summary: Option<String>,
    pub distribution_date: Option<DateTime<Utc>>,
    pub amount_in_dispute: Option<f64>,
    pub raw: Option<JsonValue>,
}

/// A party to the case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedParty {
    pub name: String,
    pub side: Option<String>,
    pub person_type: Option<String>,
    pub document: Option<String>,
}

/// A classified subject of the case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSubject {
    pub code: Option<String>,
    pub name: Option<String>,
}

/// A procedural movement (step).
///
/// `local_id` is a surrogate assigned during normalization; the provider's
/// step id is kept for de-duplication but is not guaranteed stable between
/// syncs, so attachments reference movements through the surrogate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMovement {
    pub local_id: i32,
    pub step_id: Option<String>,
    pub step_type: Option<String>,
    pub content: Option<String>,
    pub step_date: Option<DateTime<Utc>>,
    pub private: bool,
}

/// An attachment, owned by a movement or case-level when `movement_local_id`
/// is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAttachment {
    pub attachment_id: Option<String>,
    pub name: Option<String>,
    pub attachment_type: Option<String>,
    pub movement_local_id: Option<i32>,
}

/// Row counts per entity kind, stamped into the sync record's metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub parties: usize,
    pub subjects: usize,
    pub movements: usize,
    pub attachments: usize,
}

/// A fully normalized dataset for one case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseDataset {
    pub header: CaseHeader,
    pub parties: Vec<NormalizedParty>,
    pub subjects: Vec<NormalizedSubject>,
    pub movements: Vec<NormalizedMovement>,
    pub attachments: Vec<NormalizedAttachment>,
}

impl CaseDataset {
    /// Row counts per entity kind.
    #[must_use]
    pub fn counts(&self) -> DatasetCounts {
        DatasetCounts {
            parties: self.parties.len(),
            subjects: self.subjects.len(),
            movements: self.movements.len(),
            attachments: self.attachments.len(),
        }
    }

    /// Replace the stored dataset for a case.
    ///
    /// Deletes the header and all four collections for the case number,
    /// then bulk-inserts the fresh set. Runs entirely on the caller's
    /// connection: a failure rolls the whole replacement back, leaving the
    /// previous dataset intact.
    pub async fn replace_for_case(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
    ) -> Result<DatasetCounts, sqlx::Error> {
        let number = self.header.process_number.as_str();

        for table in [
            "process_attachments",
            "process_movements",
            "process_subjects",
            "process_parties",
            "process_details",
        ] {
            sqlx::query(&format!(
                "DELETE FROM {table} WHERE tenant_id = $1 AND process_number = $2"
            ))
            .bind(tenant_id)
            .bind(number)
            .execute(&mut *conn)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO process_details (
                tenant_id, process_number, court, instance, subject_summary,
                distribution_date, amount_in_dispute, raw
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tenant_id)
        .bind(number)
        .bind(&self.header.court)
        .bind(&self.header.instance)
        .bind(&self.header.subject_summary)
        .bind(self.header.distribution_date)
        .bind(self.header.amount_in_dispute)
        .bind(&self.header.raw)
        .execute(&mut *conn)
        .await?;

        if !self.parties.is_empty() {
            let mut qb = QueryBuilder::new(
                "INSERT INTO process_parties (tenant_id, process_number, name, side, person_type, document) ",
            );
            qb.push_values(&self.parties, |mut b, p| {
                b.push_bind(tenant_id)
                    .push_bind(number)
                    .push_bind(&p.name)
                    .push_bind(&p.side)
                    .push_bind(&p.person_type)
                    .push_bind(&p.document);
            });
            qb.build().execute(&mut *conn).await?;
        }

        if !self.subjects.is_empty() {
            let mut qb = QueryBuilder::new(
                "INSERT INTO process_subjects (tenant_id, process_number, code, name) ",
            );
            qb.push_values(&self.subjects, |mut b, s| {
                b.push_bind(tenant_id)
                    .push_bind(number)
                    .push_bind(&s.code)
                    .push_bind(&s.name);
            });
            qb.build().execute(&mut *conn).await?;
        }

        if !self.movements.is_empty() {
            let mut qb = QueryBuilder::new(
                "INSERT INTO process_movements (tenant_id, process_number, local_id, step_id, step_type, content, step_date, private) ",
            );
            qb.push_values(&self.movements, |mut b, m| {
                b.push_bind(tenant_id)
                    .push_bind(number)
                    .push_bind(m.local_id)
                    .push_bind(&m.step_id)
                    .push_bind(&m.step_type)
                    .push_bind(&m.content)
                    .push_bind(m.step_date)
                    .push_bind(m.private);
            });
            qb.build().execute(&mut *conn).await?;
        }

        if !self.attachments.is_empty() {
            let mut qb = QueryBuilder::new(
                "INSERT INTO process_attachments (tenant_id, process_number, attachment_id, name, attachment_type, movement_local_id) ",
            );
            qb.push_values(&self.attachments, |mut b, a| {
                b.push_bind(tenant_id)
                    .push_bind(number)
                    .push_bind(&a.attachment_id)
                    .push_bind(&a.name)
                    .push_bind(&a.attachment_type)
                    .push_bind(a.movement_local_id);
            });
            qb.build().execute(&mut *conn).await?;
        }

        Ok(self.counts())
    }

    /// Stored row counts for a case, for verification and reporting.
    pub async fn stored_counts(
        pool: &PgPool,
        tenant_id: Uuid,
        process_number: &str,
    ) -> Result<DatasetCounts, sqlx::Error> {
        let mut counts = DatasetCounts::default();
        for (table, slot) in [
            ("process_parties", 0usize),
            ("process_subjects", 1),
            ("process_movements", 2),
            ("process_attachments", 3),
        ] {
            let (n,): (i64,) = sqlx::query_as(&format!(
                "SELECT COUNT(*) FROM {table} WHERE tenant_id = $1 AND process_number = $2"
            ))
            .bind(tenant_id)
            .bind(process_number)
            .fetch_one(pool)
            .await?;
            match slot {
                0 => counts.parties = n as usize,
                1 => counts.subjects = n as usize,
                2 => counts.movements = n as usize,
                _ => counts.attachments = n as usize,
            }
        }
        Ok(counts)
    }
}
