use crate::config::CrosslistPolicy;
use crate::core::client::CanvasClient;
use crate::core::courses::{get_course, get_course_sections, get_section};
use crate::core::summarize::apply_post_merge_updates;
use crate::domain::model::{
    AuditAction, AuditResult, CrosslistAuditRecord, PostMergeUpdate,
};
use crate::domain::ports::AuditSink;
use chrono::Utc;
use reqwest::Method;

/// Request-scoped identifiers carried into every audit record.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    pub as_user_id: Option<i64>,
    pub term_id: Option<i64>,
    pub instructor_id: Option<i64>,
}

/// Orchestrates the merge and reversal state transitions.
///
/// Every remote failure is caught, converted to a message, and audited;
/// callers only ever see a boolean. The remote platform's observed state,
/// not the mutating call's HTTP response, decides success.
pub struct CrosslistService<A: AuditSink> {
    client: CanvasClient,
    policy: CrosslistPolicy,
    audit: A,
}

impl<A: AuditSink> CrosslistService<A> {
    pub fn new(client: CanvasClient, policy: CrosslistPolicy, audit: A) -> Self {
        Self {
            client,
            policy,
            audit,
        }
    }

    pub fn client(&self) -> &CanvasClient {
        &self.client
    }

    /// Merge a child section into a parent course shell.
    pub async fn cross_list(
        &self,
        child_section_id: i64,
        parent_course_id: i64,
        dry_run: bool,
        override_sis: bool,
        ctx: &OperationContext,
    ) -> bool {
        let action = AuditAction::CrossList;
        let parent = Some(parent_course_id);

        // 取得 section 目前的真實狀態,失敗就直接結束
        let section = match get_section(&self.client, child_section_id).await {
            Ok(section) => section,
            Err(e) => {
                let message = format!("Failed to fetch section {}: {}", child_section_id, e);
                return self
                    .finish(action, parent, child_section_id, false, dry_run, message, None, ctx)
                    .await;
            }
        };

        if section.course_id == Some(parent_course_id) {
            let message = format!(
                "Section {} is already in course {}; nothing to do",
                child_section_id, parent_course_id
            );
            return self
                .finish(action, parent, child_section_id, true, dry_run, message, None, ctx)
                .await;
        }

        if section.is_cross_listed() {
            let current = section.course_id.unwrap_or_default();
            let message = format!(
                "Section {} is already cross-listed into course {}; reverse that merge before cross-listing into course {}",
                child_section_id, current, parent_course_id
            );
            return self
                .finish(action, parent, child_section_id, false, dry_run, message, None, ctx)
                .await;
        }

        let parent_course = match get_course(
            &self.client,
            parent_course_id,
            &["term", "teachers", "total_students"],
        )
        .await
        {
            Ok(course) => course,
            Err(e) => {
                let message = format!("Failed to fetch parent course {}: {}", parent_course_id, e);
                return self
                    .finish(action, parent, child_section_id, false, dry_run, message, None, ctx)
                    .await;
            }
        };

        let child_course_id = match section.course_id {
            Some(id) => id,
            None => {
                let message = format!(
                    "Section {} reports no owning course; cannot cross-list",
                    child_section_id
                );
                return self
                    .finish(action, parent, child_section_id, false, dry_run, message, None, ctx)
                    .await;
            }
        };
        let child_course = match get_course(&self.client, child_course_id, &["term"]).await {
            Ok(course) => course,
            Err(e) => {
                let message = format!("Failed to fetch child course {}: {}", child_course_id, e);
                return self
                    .finish(action, parent, child_section_id, false, dry_run, message, None, ctx)
                    .await;
            }
        };

        if self.policy.require_same_term {
            if let (Some(parent_term), Some(child_term)) = (
                parent_course.enrollment_term_id,
                child_course.enrollment_term_id,
            ) {
                if parent_term != child_term {
                    let message = format!(
                        "Parent course {} and child course {} are in different enrollment terms ({} vs {})",
                        parent_course_id, child_course_id, parent_term, child_term
                    );
                    return self
                        .finish(action, parent, child_section_id, false, dry_run, message, None, ctx)
                        .await;
                }
            }
        }

        if dry_run {
            let message = format!(
                "Dry run: would cross-list section {} into course {}",
                child_section_id, parent_course_id
            );
            return self
                .finish(action, parent, child_section_id, true, dry_run, message, None, ctx)
                .await;
        }

        let path = format!(
            "/api/v1/sections/{}/crosslist/{}",
            child_section_id, parent_course_id
        );
        let query = stickiness_query(override_sis);
        if let Err(e) = self.client.request(Method::POST, &path, &query, None).await {
            let message = format!(
                "Cross-list call failed for section {} into course {}: {}",
                child_section_id, parent_course_id, e
            );
            return self
                .finish(action, parent, child_section_id, false, dry_run, message, None, ctx)
                .await;
        }

        // 以 parent course 的 section 清單驗證,不信任 POST 的回應
        match self.verify_membership(parent_course_id, child_section_id).await {
            Ok(true) => {}
            Ok(false) => {
                let message = format!(
                    "Verification failed: section {} is not listed under course {} after the merge",
                    child_section_id, parent_course_id
                );
                return self
                    .finish(action, parent, child_section_id, false, dry_run, message, None, ctx)
                    .await;
            }
            Err(e) => {
                let message = format!(
                    "Verification failed for section {} in course {}: {}",
                    child_section_id, parent_course_id, e
                );
                return self
                    .finish(action, parent, child_section_id, false, dry_run, message, None, ctx)
                    .await;
            }
        }

        // The merge itself is done; content rewrite failures are not fatal.
        let (message, update) = match apply_post_merge_updates(&self.client, parent_course_id).await
        {
            Ok(update) => (
                format!(
                    "Cross-listed section {} into course {}",
                    child_section_id, parent_course_id
                ),
                Some(update),
            ),
            Err(e) => {
                tracing::warn!(
                    "Post-merge content update failed for course {}: {}",
                    parent_course_id,
                    e
                );
                (
                    format!(
                        "Cross-listed section {} into course {}; no updates applied",
                        child_section_id, parent_course_id
                    ),
                    None,
                )
            }
        };

        self.finish(action, parent, child_section_id, true, dry_run, message, update, ctx)
            .await
    }

    /// Reverse a merge, returning the section to its origin course.
    pub async fn un_cross_list(
        &self,
        section_id: i64,
        dry_run: bool,
        override_sis: bool,
        ctx: &OperationContext,
    ) -> bool {
        let action = AuditAction::UnCrossList;

        let section = match get_section(&self.client, section_id).await {
            Ok(section) => section,
            Err(e) => {
                let message = format!("Failed to fetch section {}: {}", section_id, e);
                return self
                    .finish(action, None, section_id, false, dry_run, message, None, ctx)
                    .await;
            }
        };

        if !section.is_cross_listed() {
            let message = format!("Section {} is not cross-listed; nothing to do", section_id);
            return self
                .finish(action, section.course_id, section_id, true, dry_run, message, None, ctx)
                .await;
        }

        // is_cross_listed guarantees both ids are present.
        let origin = section.nonxlist_course_id.unwrap_or_default();
        let current = section.course_id;

        if dry_run {
            let message = format!(
                "Dry run: would un-cross-list section {} back to course {}",
                section_id, origin
            );
            return self
                .finish(action, current, section_id, true, dry_run, message, None, ctx)
                .await;
        }

        let path = format!("/api/v1/sections/{}/crosslist", section_id);
        let query = stickiness_query(override_sis);
        if let Err(e) = self.client.request(Method::DELETE, &path, &query, None).await {
            let message = format!("Un-cross-list call failed for section {}: {}", section_id, e);
            return self
                .finish(action, current, section_id, false, dry_run, message, None, ctx)
                .await;
        }

        match self.verify_membership(origin, section_id).await {
            Ok(true) => {
                let message = format!(
                    "Un-cross-listed section {} back to course {}",
                    section_id, origin
                );
                self.finish(action, current, section_id, true, dry_run, message, None, ctx)
                    .await
            }
            Ok(false) => {
                let message = format!(
                    "Verification failed: section {} did not return to course {} after the reversal",
                    section_id, origin
                );
                self.finish(action, current, section_id, false, dry_run, message, None, ctx)
                    .await
            }
            Err(e) => {
                let message = format!(
                    "Verification failed for section {} in course {}: {}",
                    section_id, origin, e
                );
                self.finish(action, current, section_id, false, dry_run, message, None, ctx)
                    .await
            }
        }
    }

    /// Post-mutation check against the course's authoritative section list.
    async fn verify_membership(&self, course_id: i64, section_id: i64) -> crate::utils::error::Result<bool> {
        let sections = get_course_sections(&self.client, course_id).await?;
        Ok(sections
            .iter()
            .any(|s| s.id == section_id && s.course_id.unwrap_or(course_id) == course_id))
    }

    /// Write the audit record and map the outcome to the caller's boolean.
    /// A failing audit sink is logged but never changes the result.
    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        action: AuditAction,
        parent_course_id: Option<i64>,
        child_section_id: i64,
        success: bool,
        dry_run: bool,
        message: String,
        update: Option<PostMergeUpdate>,
        ctx: &OperationContext,
    ) -> bool {
        if success {
            tracing::info!("✅ {}", message);
        } else {
            tracing::error!("❌ {}", message);
        }

        let update = update.unwrap_or_default();
        let syllabus_changed = update.new_title.as_ref().map(|_| update.syllabus_changed);
        let record = CrosslistAuditRecord {
            timestamp: Utc::now(),
            actor_as_user_id: ctx.as_user_id,
            term_id: ctx.term_id,
            instructor_id: ctx.instructor_id,
            action,
            parent_course_id,
            child_section_id,
            result: if success {
                AuditResult::Success
            } else {
                AuditResult::Error
            },
            dry_run,
            message,
            new_title: update.new_title,
            touched_section_ids: update.touched_section_ids,
            syllabus_changed,
        };

        if let Err(e) = self.audit.record(&record).await {
            tracing::warn!("Failed to write audit record: {}", e);
        }

        success
    }
}

fn stickiness_query(override_sis: bool) -> Vec<(String, String)> {
    if override_sis {
        vec![("override_sis_stickiness".to_string(), "true".to_string())]
    } else {
        Vec::new()
    }
}
