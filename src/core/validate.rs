use crate::config::CrosslistPolicy;
use crate::domain::model::{CrosslistCandidate, ValidationOutcome};
use std::collections::HashSet;

/// Evaluate a parent/child pair against every rule, partitioning hits into
/// blocking errors and acknowledgeable warnings. All rules run; the outcome
/// lists every violation, not just the first.
pub fn validate_candidates(
    policy: &CrosslistPolicy,
    parent: &CrosslistCandidate,
    child: &CrosslistCandidate,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    if parent.cross_listed {
        outcome
            .errors
            .push("Parent section is already cross-listed".to_string());
    }
    if child.cross_listed {
        outcome
            .errors
            .push("Child section is already cross-listed".to_string());
    }

    if parent.course_id == child.course_id {
        outcome
            .errors
            .push("Cannot cross-list a section into its own course".to_string());
    }

    if policy.require_parent_unpublished && parent.published {
        outcome.errors.push("Parent must be unpublished".to_string());
    }

    if !child.published {
        outcome
            .errors
            .push("Child course must be published".to_string());
    }

    // Term comparison only fires when both sides report a term.
    if policy.require_same_term {
        if let (Some(parent_term), Some(child_term)) =
            (parent.enrollment_term_id, child.enrollment_term_id)
        {
            if parent_term != child_term {
                outcome.errors.push(format!(
                    "Parent and child are in different enrollment terms ({} vs {})",
                    parent_term, child_term
                ));
            }
        }
    }

    if policy.forbid_parent_with_students && parent.published && parent.total_students > 0 {
        outcome.warnings.push(format!(
            "Parent course is published with {} enrolled students",
            parent.total_students
        ));
    }

    // Disjoint teacher sets usually mean the wrong parent was picked.
    if !parent.teachers.is_empty() && !child.teachers.is_empty() {
        let parent_ids: HashSet<i64> = parent.teachers.iter().map(|t| t.id).collect();
        if !child.teachers.iter().any(|t| parent_ids.contains(&t.id)) {
            outcome
                .warnings
                .push("Parent and child have no teachers in common".to_string());
        }
    }

    if policy.require_same_subaccount {
        if let (Some(parent_account), Some(child_account)) = (parent.account_id, child.account_id) {
            if parent_account != child_account {
                outcome.warnings.push(format!(
                    "Parent and child are under different sub-accounts ({} vs {})",
                    parent_account, child_account
                ));
            }
        }
    }

    let parent_base = extract_course_number(&parent.course_code);
    let child_base = extract_course_number(&child.course_code);
    if !parent_base.is_empty() && !child_base.is_empty() && parent_base != child_base {
        outcome.warnings.push(format!(
            "Course codes differ ('{}' vs '{}'); combined listing is unusual",
            parent.course_code, child.course_code
        ));
    }

    if outcome.is_blocked() {
        tracing::info!(
            "Validation blocked section {} → course {}: {:?}",
            child.section_id,
            parent.course_id,
            outcome.errors
        );
    } else if !outcome.warnings.is_empty() {
        tracing::info!(
            "Validation passed with warnings for section {} → course {}: {:?}",
            child.section_id,
            parent.course_id,
            outcome.warnings
        );
    }

    outcome
}

/// Everything before the last `-` of a course code: "ENGL-1301-001" →
/// "ENGL-1301". Codes without any `-` are returned unchanged.
pub fn extract_course_number(course_code: &str) -> &str {
    match course_code.rsplit_once('-') {
        Some((base, _)) => base,
        None => course_code,
    }
}
