use crate::domain::model::CrosslistAuditRecord;
use crate::domain::ports::AuditSink;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

const HEADER: [&str; 13] = [
    "timestamp",
    "actor_as_user_id",
    "term_id",
    "instructor_id",
    "action",
    "parent_course_id",
    "child_section_id",
    "result",
    "dry_run",
    "message",
    "new_title",
    "touched_section_ids",
    "syllabus_changed",
];

/// Append-only CSV audit trail. The header is written once when the file is
/// created; every operation appends exactly one row.
pub struct CsvAuditSink {
    path: PathBuf,
}

impl CsvAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, record: &CrosslistAuditRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if parent != Path::new("") {
                std::fs::create_dir_all(parent)?;
            }
        }

        let needs_header = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if needs_header {
            writer.write_record(HEADER)?;
        }

        let opt = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_default();
        let touched = record
            .touched_section_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(";");

        writer.write_record([
            record.timestamp.to_rfc3339(),
            opt(record.actor_as_user_id),
            opt(record.term_id),
            opt(record.instructor_id),
            record.action.as_str().to_string(),
            opt(record.parent_course_id),
            record.child_section_id.to_string(),
            record.result.as_str().to_string(),
            record.dry_run.to_string(),
            record.message.clone(),
            record.new_title.clone().unwrap_or_default(),
            touched,
            record
                .syllabus_changed
                .map(|b| b.to_string())
                .unwrap_or_default(),
        ])?;
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for CsvAuditSink {
    async fn record(&self, record: &CrosslistAuditRecord) -> Result<()> {
        self.append(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AuditAction, AuditResult};
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(action: AuditAction, result: AuditResult) -> CrosslistAuditRecord {
        CrosslistAuditRecord {
            timestamp: Utc::now(),
            actor_as_user_id: Some(42),
            term_id: Some(3),
            instructor_id: Some(7),
            action,
            parent_course_id: Some(100),
            child_section_id: 200,
            result,
            dry_run: false,
            message: "Cross-listed section 200 into course 100".to_string(),
            new_title: Some("ENGL-1301-001: Comp I and ENGL-1301-005: Comp I".to_string()),
            touched_section_ids: vec![200, 201],
            syllabus_changed: Some(true),
        }
    }

    #[tokio::test]
    async fn test_header_written_once_across_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.csv");
        let sink = CsvAuditSink::new(&path);

        sink.record(&record(AuditAction::CrossList, AuditResult::Success))
            .await
            .unwrap();
        sink.record(&record(AuditAction::UnCrossList, AuditResult::Error))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,"));
        assert!(lines[1].contains("cross_list"));
        assert!(lines[2].contains("un_cross_list"));
        assert!(lines[2].contains("error"));
    }

    #[tokio::test]
    async fn test_touched_ids_joined_with_semicolons() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.csv");
        let sink = CsvAuditSink::new(&path);

        sink.record(&record(AuditAction::CrossList, AuditResult::Success))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("200;201"));
    }

    #[tokio::test]
    async fn test_missing_parent_directory_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.csv");
        let sink = CsvAuditSink::new(&path);

        sink.record(&record(AuditAction::CrossList, AuditResult::Success))
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_empty_optionals_serialize_as_blank_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.csv");
        let sink = CsvAuditSink::new(&path);

        let mut rec = record(AuditAction::CrossList, AuditResult::Error);
        rec.actor_as_user_id = None;
        rec.parent_course_id = None;
        rec.new_title = None;
        rec.touched_section_ids.clear();
        rec.syllabus_changed = None;
        sink.record(&rec).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let data_line = contents.lines().nth(1).unwrap();
        assert!(data_line.contains(",,"));
    }
}
