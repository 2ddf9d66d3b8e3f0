use crate::domain::model::{Course, CourseArtifact, SectionArtifact};
use std::collections::HashSet;

/// Normalize raw nested course→section payloads into deduplicated artifacts.
///
/// The platform reports the authoritative current owner on each section but
/// still returns courses whose sections have all migrated away; without the
/// orphan filter those stale shells would surface as cross-listing candidates.
pub fn build_course_artifacts(courses: &[Course]) -> Vec<CourseArtifact> {
    let mut seen_courses: HashSet<i64> = HashSet::new();
    let mut seen_sections: HashSet<i64> = HashSet::new();
    let mut artifacts: Vec<CourseArtifact> = Vec::new();
    let mut orphaned = 0usize;

    tracing::debug!("Normalizing {} raw courses", courses.len());

    for course in courses {
        // First occurrence wins; later duplicates are dropped.
        if !seen_courses.insert(course.id) {
            tracing::debug!("Skipping duplicate course {} '{}'", course.id, course.name);
            continue;
        }

        if course.sections.is_empty() {
            tracing::debug!("Skipping orphan course {} '{}': no sections", course.id, course.name);
            orphaned += 1;
            continue;
        }

        // Orphaned shell: every section originated here and now lives elsewhere.
        let all_migrated_away = course.sections.iter().all(|s| {
            let current = s.course_id.unwrap_or(course.id);
            s.nonxlist_course_id == Some(course.id) && current != course.id
        });
        if all_migrated_away {
            tracing::debug!(
                "Skipping orphan course {} '{}': all {} sections belong to other courses",
                course.id,
                course.name,
                course.sections.len()
            );
            orphaned += 1;
            continue;
        }

        let mut sections: Vec<SectionArtifact> = Vec::new();
        for section in &course.sections {
            let current = section.course_id.unwrap_or(course.id);

            // Sections are attributed to their current owner, never their origin.
            if current != course.id {
                tracing::debug!(
                    "Skipping section {}: belongs to course {}, not {}",
                    section.id,
                    current,
                    course.id
                );
                continue;
            }

            if !seen_sections.insert(section.id) {
                tracing::debug!("Skipping duplicate section {} '{}'", section.id, section.name);
                continue;
            }

            let cross_listed = section
                .nonxlist_course_id
                .is_some_and(|origin| origin != current);
            if cross_listed {
                tracing::info!(
                    "Cross-listed section {} '{}': currently in course {}, originally from course {}",
                    section.id,
                    section.name,
                    current,
                    section.nonxlist_course_id.unwrap_or_default()
                );
            }

            sections.push(SectionArtifact {
                id: section.id,
                name: section.name.clone(),
                course_id: current,
                cross_listed,
                nonxlist_course_id: section.nonxlist_course_id,
            });
        }

        artifacts.push(CourseArtifact {
            course_id: course.id,
            name: course.name.clone(),
            course_code: course.course_code.clone(),
            workflow_state: course.workflow_state.clone(),
            total_students: course.total_students,
            sections,
        });
    }

    // Second pass: filtering can leave a course with nothing attributable to it.
    let before = artifacts.len();
    artifacts.retain(|a| !a.sections.is_empty());
    orphaned += before - artifacts.len();

    tracing::info!(
        "Normalization complete: {} active courses, {} orphaned courses skipped, {} unique sections",
        artifacts.len(),
        orphaned,
        seen_sections.len()
    );

    artifacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Section;

    fn section(id: i64, course_id: i64, nonxlist: Option<i64>) -> Section {
        Section {
            id,
            name: format!("Section {}", id),
            course_id: Some(course_id),
            nonxlist_course_id: nonxlist,
            sis_section_id: None,
        }
    }

    fn course(id: i64, sections: Vec<Section>) -> Course {
        Course {
            id,
            name: format!("Course {}", id),
            course_code: format!("TEST-{:04}", id),
            workflow_state: "available".to_string(),
            total_students: 0,
            enrollment_term_id: Some(1),
            account_id: Some(1),
            teachers: vec![],
            sections,
            term: None,
            syllabus_body: None,
            sis_course_id: None,
        }
    }

    #[test]
    fn test_duplicate_courses_first_occurrence_wins() {
        let first = course(10, vec![section(100, 10, None), section(101, 10, None)]);
        let second = course(10, vec![section(102, 10, None)]);

        let artifacts = build_course_artifacts(&[first, second]);

        assert_eq!(artifacts.len(), 1);
        let ids: Vec<i64> = artifacts[0].sections.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![100, 101]);
    }

    #[test]
    fn test_every_section_appears_under_exactly_one_course() {
        // Section 100 shows up both under its own course and under a stale
        // duplicate listing from the other course's payload.
        let a = course(10, vec![section(100, 10, None)]);
        let b = course(20, vec![section(100, 10, None), section(200, 20, None)]);

        let artifacts = build_course_artifacts(&[a, b]);

        let mut all_ids: Vec<i64> = artifacts
            .iter()
            .flat_map(|a| a.sections.iter().map(|s| s.id))
            .collect();
        all_ids.sort_unstable();
        assert_eq!(all_ids, vec![100, 200]);
    }

    #[test]
    fn test_orphan_course_is_excluded_entirely() {
        // The course's only section originated here but now lives in course 99.
        let orphan = course(10, vec![section(100, 99, Some(10))]);
        let keeper = course(20, vec![section(200, 20, None)]);

        let artifacts = build_course_artifacts(&[orphan, keeper]);

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].course_id, 20);
    }

    #[test]
    fn test_course_with_no_sections_is_excluded() {
        let empty = course(10, vec![]);
        let artifacts = build_course_artifacts(&[empty]);
        assert!(artifacts.is_empty());
    }

    #[test]
    fn test_cross_listed_flag_requires_differing_origin() {
        let c = course(
            10,
            vec![
                // Merged in from course 5.
                section(100, 10, Some(5)),
                // Origin equals current owner: not cross-listed.
                section(101, 10, Some(10)),
                section(102, 10, None),
            ],
        );

        let artifacts = build_course_artifacts(&[c]);
        let flags: Vec<bool> = artifacts[0].sections.iter().map(|s| s.cross_listed).collect();
        assert_eq!(flags, vec![true, false, false]);
    }

    #[test]
    fn test_section_with_missing_course_id_belongs_to_iterated_course() {
        let mut orphan_section = section(100, 0, None);
        orphan_section.course_id = None;
        let c = course(10, vec![orphan_section]);

        let artifacts = build_course_artifacts(&[c]);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].sections[0].course_id, 10);
    }

    #[test]
    fn test_course_emptied_by_filtering_is_dropped_in_second_pass() {
        // Both sections currently belong elsewhere but only one originated
        // here, so the first-pass orphan check does not fire.
        let c = course(10, vec![section(100, 99, Some(10)), section(101, 98, Some(7))]);
        let artifacts = build_course_artifacts(&[c]);
        assert!(artifacts.is_empty());
    }
}
