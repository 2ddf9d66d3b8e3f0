use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Enrollment term. Immutable once fetched; cached with TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    #[serde(default)]
    pub display_name: String,
}

/// Raw section as returned by the platform, possibly nested inside a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub course_id: Option<i64>,
    #[serde(default)]
    pub nonxlist_course_id: Option<i64>,
    #[serde(default)]
    pub sis_section_id: Option<String>,
}

impl Section {
    /// The single system-wide definition of cross-list state: a section is
    /// cross-listed iff it carries an origin course different from its
    /// current course. Normalizer and orchestrator must agree on this.
    pub fn is_cross_listed(&self) -> bool {
        match (self.nonxlist_course_id, self.course_id) {
            (Some(origin), Some(current)) => origin != current,
            _ => false,
        }
    }
}

/// Raw course as returned by the platform. Locally read-only; mutated
/// remotely only through name/code/syllabus updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub workflow_state: String,
    #[serde(default)]
    pub total_students: i64,
    #[serde(default)]
    pub enrollment_term_id: Option<i64>,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub term: Option<Term>,
    #[serde(default)]
    pub syllabus_body: Option<String>,
    #[serde(default)]
    pub sis_course_id: Option<String>,
}

impl Course {
    pub fn is_published(&self) -> bool {
        self.workflow_state == "available"
    }
}

/// Normalized section attributed to its current owning course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionArtifact {
    pub id: i64,
    pub name: String,
    pub course_id: i64,
    pub cross_listed: bool,
    pub nonxlist_course_id: Option<i64>,
}

/// Deduplicated, orphan-filtered course produced by the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseArtifact {
    pub course_id: i64,
    pub name: String,
    pub course_code: String,
    pub workflow_state: String,
    pub total_students: i64,
    pub sections: Vec<SectionArtifact>,
}

/// Flattened snapshot of one side of a candidate pair, built per request
/// for the validation engine. Never persisted.
#[derive(Debug, Clone)]
pub struct CrosslistCandidate {
    pub course_id: i64,
    pub section_id: i64,
    pub name: String,
    pub course_code: String,
    pub published: bool,
    pub cross_listed: bool,
    pub total_students: i64,
    pub enrollment_term_id: Option<i64>,
    pub account_id: Option<i64>,
    pub teachers: Vec<Teacher>,
}

impl CrosslistCandidate {
    /// Parent side: the receiving course shell. For a parent, the section id
    /// is the course id; a course acting as parent is never itself cross-listed.
    pub fn from_course(course: &Course) -> Self {
        Self {
            course_id: course.id,
            section_id: course.id,
            name: course.name.clone(),
            course_code: course.course_code.clone(),
            published: course.is_published(),
            cross_listed: false,
            total_students: course.total_students,
            enrollment_term_id: course.enrollment_term_id,
            account_id: course.account_id,
            teachers: course.teachers.clone(),
        }
    }

    /// Child side: a section merged with its owning course. The section
    /// payload alone carries no publication state, so the course supplies it.
    pub fn from_section(section: &Section, course: &Course) -> Self {
        Self {
            course_id: course.id,
            section_id: section.id,
            name: section.name.clone(),
            course_code: course.course_code.clone(),
            published: course.is_published(),
            cross_listed: section.is_cross_listed(),
            total_students: course.total_students,
            enrollment_term_id: course.enrollment_term_id,
            account_id: course.account_id,
            teachers: course.teachers.clone(),
        }
    }
}

/// Partitioned validation result. If `errors` is non-empty the operation
/// must not proceed regardless of acknowledgments.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    pub fn is_blocked(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn needs_acknowledgment(&self) -> bool {
        self.errors.is_empty() && !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CrossList,
    UnCrossList,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CrossList => "cross_list",
            AuditAction::UnCrossList => "un_cross_list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Error,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResult::Success => "success",
            AuditResult::Error => "error",
        }
    }
}

/// One append-only record per attempted operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrosslistAuditRecord {
    pub timestamp: DateTime<Utc>,
    pub actor_as_user_id: Option<i64>,
    pub term_id: Option<i64>,
    pub instructor_id: Option<i64>,
    pub action: AuditAction,
    pub parent_course_id: Option<i64>,
    pub child_section_id: i64,
    pub result: AuditResult,
    pub dry_run: bool,
    pub message: String,
    pub new_title: Option<String>,
    pub touched_section_ids: Vec<i64>,
    pub syllabus_changed: Option<bool>,
}

/// Outcome of the post-merge content rewrite, folded into the audit record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostMergeUpdate {
    pub new_title: Option<String>,
    pub touched_section_ids: Vec<i64>,
    pub syllabus_changed: bool,
}

/// Resolved instructor candidate from SIS/Canvas-id/name lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCandidate {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sis_user_id: Option<String>,
    #[serde(default)]
    pub login_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: i64, course_id: Option<i64>, nonxlist: Option<i64>) -> Section {
        Section {
            id,
            name: format!("Section {}", id),
            course_id,
            nonxlist_course_id: nonxlist,
            sis_section_id: None,
        }
    }

    #[test]
    fn test_cross_listed_iff_origin_differs_from_current() {
        assert!(section(1, Some(20), Some(10)).is_cross_listed());
        assert!(!section(1, Some(10), Some(10)).is_cross_listed());
        assert!(!section(1, Some(10), None).is_cross_listed());
        assert!(!section(1, None, Some(10)).is_cross_listed());
    }

    #[test]
    fn test_parent_candidate_is_never_cross_listed() {
        let course = Course {
            id: 7,
            name: "Comp I".to_string(),
            course_code: "ENGL-1301-001".to_string(),
            workflow_state: "unpublished".to_string(),
            total_students: 0,
            enrollment_term_id: Some(3),
            account_id: Some(415),
            teachers: vec![],
            sections: vec![],
            term: None,
            syllabus_body: None,
            sis_course_id: None,
        };
        let parent = CrosslistCandidate::from_course(&course);
        assert!(!parent.cross_listed);
        assert!(!parent.published);
        assert_eq!(parent.section_id, parent.course_id);
    }
}
