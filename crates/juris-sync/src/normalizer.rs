//! Dataset normalizer.
//!
//! Pure transforms from one raw provider "lawsuit" entry into the
//! canonical entity set. The provider has historically shipped the same
//! concept under different keys (attachments as `attachments`,
//! `documents` or `files`; movement text as `content` or `step_content`),
//! so every extractor probes the known variants in order.
//!
//! Persistence is strictly replace-per-case and lives in
//! [`persist_dataset`]; the transforms themselves never touch the
//! database and are testable without one.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use std::collections::HashSet;
use uuid::Uuid;

use juris_db::models::{
    CaseDataset, CaseHeader, DatasetCounts, LegalCase, NormalizedAttachment, NormalizedMovement,
    NormalizedParty, NormalizedSubject,
};

use crate::error::{SyncError, SyncResult};

/// First string found under any of the given keys.
fn pick_str<'a>(value: &'a JsonValue, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| value.get(k).and_then(JsonValue::as_str))
        .filter(|s| !s.is_empty())
}

/// First number found under any of the given keys.
fn pick_f64(value: &JsonValue, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| {
        let v = value.get(k)?;
        v.as_f64().or_else(|| v.as_str()?.parse().ok())
    })
}

/// First array found under any of the given keys.
fn pick_array<'a>(value: &'a JsonValue, keys: &[&str]) -> Option<&'a Vec<JsonValue>> {
    keys.iter().find_map(|k| value.get(k).and_then(JsonValue::as_array))
}

/// First boolean found under any of the given keys.
fn pick_bool(value: &JsonValue, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| value.get(k).and_then(JsonValue::as_bool))
}

/// Parse the provider's date formats: RFC 3339 or a bare date.
fn pick_date(value: &JsonValue, keys: &[&str]) -> Option<DateTime<Utc>> {
    let s = pick_str(value, keys)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// A string id under any of the given keys, tolerating numeric ids.
fn pick_id(value: &JsonValue, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        let v = value.get(k)?;
        v.as_str()
            .map(str::to_string)
            .or_else(|| v.as_i64().map(|n| n.to_string()))
    })
}

/// Keep only the digits of a process number, for fuzzy equality across
/// formatting variants.
#[must_use]
pub fn normalize_process_number(number: &str) -> String {
    number.chars().filter(char::is_ascii_digit).collect()
}

fn extract_parties(raw: &JsonValue) -> Vec<NormalizedParty> {
    let Some(entries) = pick_array(raw, &["parties", "partes", "participants"]) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|p| {
            let name = pick_str(p, &["name", "nome"])?;
            Some(NormalizedParty {
                name: name.to_string(),
                side: pick_str(p, &["side", "pole", "participation"]).map(str::to_string),
                person_type: pick_str(p, &["person_type", "person", "entity_type"])
                    .map(str::to_string),
                document: pick_str(p, &["document", "main_document", "doc"]).map(str::to_string),
            })
        })
        .collect()
}

fn extract_subjects(raw: &JsonValue) -> Vec<NormalizedSubject> {
    let Some(entries) = pick_array(raw, &["subjects", "classifications", "assuntos"]) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|s| match s {
            // Either `{code, name}` objects or bare strings.
            JsonValue::Object(_) => {
                let code = pick_id(s, &["code", "codigo"]);
                let name = pick_str(s, &["name", "nome", "description"]).map(str::to_string);
                if code.is_none() && name.is_none() {
                    None
                } else {
                    Some(NormalizedSubject { code, name })
                }
            }
            JsonValue::String(name) if !name.is_empty() => Some(NormalizedSubject {
                code: None,
                name: Some(name.clone()),
            }),
            _ => None,
        })
        .collect()
}

/// Movements plus their attachments.
///
/// De-duplicates by the provider's step id within one pass and reassigns
/// each movement a local surrogate id; attachments reference movements by
/// that surrogate because the provider's ids are not stable between syncs.
fn extract_movements(raw: &JsonValue) -> (Vec<NormalizedMovement>, Vec<NormalizedAttachment>) {
    let mut movements = Vec::new();
    let mut attachments = Vec::new();
    let mut seen_steps: HashSet<String> = HashSet::new();
    let mut next_local_id = 1i32;

    if let Some(entries) = pick_array(raw, &["steps", "movements", "updates"]) {
        for entry in entries {
            let step_id = pick_id(entry, &["step_id", "id", "step_uuid"]);
            if let Some(ref id) = step_id {
                if !seen_steps.insert(id.clone()) {
                    continue;
                }
            }

            let local_id = next_local_id;
            next_local_id += 1;

            movements.push(NormalizedMovement {
                local_id,
                step_id,
                step_type: pick_str(entry, &["step_type", "type", "category"])
                    .map(str::to_string),
                content: pick_str(entry, &["content", "step_content", "text"])
                    .map(str::to_string),
                step_date: pick_date(entry, &["step_date", "date", "created_at"]),
                private: pick_bool(entry, &["private", "confidential"]).unwrap_or(false),
            });

            attachments.extend(extract_attachment_list(entry, Some(local_id)));
        }
    }

    // Case-level attachments, outside any movement.
    attachments.extend(extract_attachment_list(raw, None));

    (movements, attachments)
}

fn extract_attachment_list(
    value: &JsonValue,
    movement_local_id: Option<i32>,
) -> Vec<NormalizedAttachment> {
    let Some(entries) = pick_array(value, &["attachments", "documents", "files"]) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|a| {
            let attachment_id = pick_id(a, &["attachment_id", "id", "file_id"]);
            let name = pick_str(a, &["name", "file_name", "title"]).map(str::to_string);
            if attachment_id.is_none() && name.is_none() {
                return None;
            }
            Some(NormalizedAttachment {
                attachment_id,
                name,
                attachment_type: pick_str(a, &["attachment_type", "type", "extension"])
                    .map(str::to_string),
                movement_local_id,
            })
        })
        .collect()
}

/// Normalize one raw lawsuit entry into the canonical dataset.
///
/// `case_number` is the originating case's process number and always wins
/// over whatever number the entry claims: the dataset is keyed by the
/// local case, not by the provider's echo.
#[must_use]
pub fn normalize_lawsuit(raw: &JsonValue, case_number: &str) -> CaseDataset {
    let header = CaseHeader {
        process_number: case_number.to_string(),
        court: pick_str(raw, &["court", "tribunal", "tribunal_acronym"]).map(str::to_string),
        instance: pick_id(raw, &["instance", "degree"]),
        subject_summary: pick_str(raw, &["subject", "name", "title"]).map(str::to_string),
        distribution_date: pick_date(raw, &["distribution_date", "distributed_at"]),
        amount_in_dispute: pick_f64(raw, &["amount", "value", "cause_value"]),
        raw: Some(raw.clone()),
    };

    let parties = extract_parties(raw);
    let subjects = extract_subjects(raw);
    let (movements, attachments) = extract_movements(raw);

    CaseDataset {
        header,
        parties,
        subjects,
        movements,
        attachments,
    }
}

/// Persist a normalized dataset with replace semantics and stamp the
/// case's last-sync timestamp.
///
/// Runs on the caller's connection so it joins the orchestrator's
/// completion transaction: a failure here rolls the whole replacement
/// back, leaving the previous dataset intact.
pub async fn persist_dataset(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    case_id: Uuid,
    dataset: &CaseDataset,
) -> SyncResult<DatasetCounts> {
    if dataset.header.process_number.is_empty() {
        return Err(SyncError::Normalization(
            "dataset has no process number".to_string(),
        ));
    }
    let counts = dataset.replace_for_case(&mut *conn, tenant_id).await?;
    LegalCase::touch_last_sync(conn, case_id).await?;
    Ok(counts)
}
