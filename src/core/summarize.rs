use crate::core::client::CanvasClient;
use crate::core::courses::{get_course, get_course_sections};
use crate::core::validate::extract_course_number;
use crate::domain::model::PostMergeUpdate;
use crate::utils::error::Result;
use regex::Regex;
use reqwest::Method;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::OnceLock;

const BLOCK_START: &str = "<!-- CROSSLIST_CHILDREN -->";
const BLOCK_END: &str = "<!-- END_CROSSLIST_CHILDREN -->";

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<!-- CROSSLIST_CHILDREN -->.*?<!-- END_CROSSLIST_CHILDREN -->")
            .expect("valid marker pattern")
    })
}

/// Rewrite the parent's title, course code, and syllabus block after a
/// verified merge. Idempotent: re-running against the same child set writes
/// byte-identical content.
pub async fn apply_post_merge_updates(
    client: &CanvasClient,
    parent_course_id: i64,
) -> Result<PostMergeUpdate> {
    let sections = get_course_sections(client, parent_course_id).await?;

    // Merged-in children carry an origin course different from the parent.
    // BTreeMap keys keep the origin ordering stable across runs.
    let mut origin_sections: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for section in &sections {
        if let Some(origin) = section.nonxlist_course_id {
            if origin != parent_course_id {
                origin_sections.entry(origin).or_default().push(section.id);
            }
        }
    }

    if origin_sections.is_empty() {
        tracing::info!(
            "Course {} has no merged-in sections, nothing to update",
            parent_course_id
        );
        return Ok(PostMergeUpdate::default());
    }

    let parent = get_course(client, parent_course_id, &["syllabus_body"]).await?;

    let mut children: Vec<(String, String)> = Vec::new();
    for &origin_id in origin_sections.keys() {
        let origin = get_course(client, origin_id, &[]).await?;
        children.push((origin.course_code.clone(), origin.name.clone()));
    }

    let anchor = anchor_code(&parent.course_code);
    let (first_code, first_name) = &children[0];
    let new_title = compose_title(anchor, base_name(&parent.name, anchor), first_code, first_name);
    let new_code = combine_code(anchor, first_code);

    let old_body = parent.syllabus_body.clone().unwrap_or_default();
    let new_body = splice_syllabus(&old_body, &render_children_block(&children));
    let syllabus_changed = new_body != old_body;

    let body = json!({
        "course": {
            "name": new_title,
            "course_code": new_code,
            "syllabus_body": new_body,
        }
    });
    let path = format!("/api/v1/courses/{}", parent_course_id);
    client.request(Method::PUT, &path, &[], Some(&body)).await?;

    let mut touched: Vec<i64> = origin_sections.into_values().flatten().collect();
    touched.sort_unstable();

    tracing::info!(
        "Updated course {}: title '{}', code '{}', syllabus changed: {}",
        parent_course_id,
        new_title,
        new_code,
        syllabus_changed
    );

    Ok(PostMergeUpdate {
        new_title: Some(new_title),
        touched_section_ids: touched,
        syllabus_changed,
    })
}

/// The stable parent code. A previous run rewrote the code to a combined
/// form, so everything left of the first " / " is the original.
fn anchor_code(course_code: &str) -> &str {
    match course_code.split_once(" / ") {
        Some((anchor, _)) => anchor,
        None => course_code,
    }
}

fn child_clause_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // " and <code>: " where the code carries no spaces, as written by
    // compose_title. Plain " and " inside a course name never matches.
    RE.get_or_init(|| Regex::new(r" and [^ :]+: ").expect("valid clause pattern"))
}

/// The parent's name before any previous title rewrite. A name is only
/// unpicked when it carries the code prefix a prior run wrote; otherwise it
/// is returned whole, even if it happens to contain " and ".
fn base_name<'a>(name: &'a str, anchor: &str) -> &'a str {
    let prefix = format!("{}: ", anchor);
    let Some(stripped) = name.strip_prefix(prefix.as_str()) else {
        return name;
    };
    match child_clause_re().find(stripped) {
        Some(m) => &stripped[..m.start()],
        None => stripped,
    }
}

fn compose_title(parent_code: &str, parent_name: &str, child_code: &str, child_name: &str) -> String {
    format!(
        "{}: {} and {}: {}",
        parent_code, parent_name, child_code, child_name
    )
}

/// Combined course code. When both codes share a base number, only the
/// child's section suffix is appended ("ENGL-1301-001 / 005"); otherwise the
/// full child code is used.
fn combine_code(parent_code: &str, child_code: &str) -> String {
    if extract_course_number(parent_code) == extract_course_number(child_code) {
        let suffix = child_code.rsplit_once('-').map_or(child_code, |(_, s)| s);
        format!("{} / {}", parent_code, suffix)
    } else {
        format!("{} / {}", parent_code, child_code)
    }
}

fn render_children_block(children: &[(String, String)]) -> String {
    let mut block = String::from(BLOCK_START);
    block.push_str("\n<p><strong>Cross-listed sections</strong></p>\n<ul>\n");
    for (code, name) in children {
        block.push_str(&format!("<li>{}: {}</li>\n", code, name));
    }
    block.push_str("</ul>\n");
    block.push_str(BLOCK_END);
    block
}

/// Replace the first marker-delimited block in place, or append the block
/// when no previous run left one.
fn splice_syllabus(existing: &str, block: &str) -> String {
    if block_re().is_match(existing) {
        return block_re()
            .replace(existing, regex::NoExpand(block))
            .into_owned();
    }
    if existing.trim().is_empty() {
        block.to_string()
    } else {
        format!("{}\n\n{}", existing, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn children() -> Vec<(String, String)> {
        vec![(
            "ENGL-1301-005".to_string(),
            "Composition I (Section 005)".to_string(),
        )]
    }

    #[test]
    fn test_compose_title_uses_first_child() {
        let title = compose_title(
            "ENGL-1301-001",
            "Composition I",
            "ENGL-1301-005",
            "Composition I (Section 005)",
        );
        assert_eq!(
            title,
            "ENGL-1301-001: Composition I and ENGL-1301-005: Composition I (Section 005)"
        );
    }

    #[test]
    fn test_combine_code_shortens_matching_base() {
        assert_eq!(
            combine_code("ENGL-1301-001", "ENGL-1301-005"),
            "ENGL-1301-001 / 005"
        );
        assert_eq!(
            combine_code("ENGL-1301-001", "HIST-1302-002"),
            "ENGL-1301-001 / HIST-1302-002"
        );
    }

    #[test]
    fn test_anchor_and_base_name_undo_previous_rewrite() {
        assert_eq!(anchor_code("ENGL-1301-001 / 005"), "ENGL-1301-001");
        assert_eq!(anchor_code("ENGL-1301-001"), "ENGL-1301-001");

        let rewritten =
            "ENGL-1301-001: Composition I and ENGL-1301-005: Composition I (Section 005)";
        assert_eq!(base_name(rewritten, "ENGL-1301-001"), "Composition I");
        assert_eq!(base_name("Composition I", "ENGL-1301-001"), "Composition I");
    }

    #[test]
    fn test_name_containing_and_survives_first_merge() {
        assert_eq!(
            base_name("Media and Society", "COMM-2300-001"),
            "Media and Society"
        );
        let title = compose_title(
            "COMM-2300-001",
            base_name("Media and Society", "COMM-2300-001"),
            "COMM-2300-005",
            "Media and Society (Section 005)",
        );
        assert_eq!(
            title,
            "COMM-2300-001: Media and Society and COMM-2300-005: Media and Society (Section 005)"
        );
    }

    #[test]
    fn test_name_containing_and_survives_rerun() {
        let rewritten =
            "COMM-2300-001: Media and Society and COMM-2300-005: Media and Society (Section 005)";
        assert_eq!(base_name(rewritten, "COMM-2300-001"), "Media and Society");
    }

    #[test]
    fn test_splice_appends_then_replaces_in_place() {
        let block = render_children_block(&children());

        let first = splice_syllabus("<p>Welcome to class.</p>", &block);
        assert!(first.starts_with("<p>Welcome to class.</p>\n\n<!-- CROSSLIST_CHILDREN -->"));
        assert!(first.contains("<li>ENGL-1301-005: Composition I (Section 005)</li>"));

        // Second run must be byte-identical.
        let second = splice_syllabus(&first, &block);
        assert_eq!(first, second);
    }

    #[test]
    fn test_splice_into_empty_body_is_just_the_block() {
        let block = render_children_block(&children());
        assert_eq!(splice_syllabus("", &block), block);
        assert_eq!(splice_syllabus("   \n", &block), block);
    }

    #[test]
    fn test_splice_replaces_only_first_block() {
        let stale = format!(
            "{}\nold\n{}\n\n{}\nalso old\n{}",
            BLOCK_START, BLOCK_END, BLOCK_START, BLOCK_END
        );
        let block = render_children_block(&children());
        let result = splice_syllabus(&stale, &block);
        assert!(result.contains("also old"));
        assert!(!result.contains("\nold\n"));
    }

    #[test]
    fn test_block_with_dollar_signs_is_inserted_verbatim() {
        let block = render_children_block(&[(
            "BUSI-1001".to_string(),
            "Money $1 Basics".to_string(),
        )]);
        let result = splice_syllabus(&format!("{}\nx\n{}", BLOCK_START, BLOCK_END), &block);
        assert!(result.contains("Money $1 Basics"));
    }
}
