use crate::config::CanvasConfig;
use crate::core::client::CanvasClient;
use crate::domain::model::{Course, Section, Term, UserCandidate};
use crate::domain::ports::{Cache, TokenProvider};
use crate::utils::error::Result;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

pub const ACTIVE_TERMS_CACHE_KEY: &str = "active_terms";

/// Active enrollment terms. Slow-changing, so cached with TTL; the terms
/// endpoint wraps its list in an `enrollment_terms` envelope.
pub async fn fetch_active_terms(client: &CanvasClient, cache: &dyn Cache) -> Result<Vec<Term>> {
    match cache.get(ACTIVE_TERMS_CACHE_KEY).await {
        Ok(Some(value)) => {
            if let Ok(terms) = serde_json::from_value::<Vec<Term>>(value) {
                tracing::debug!("Using {} cached active terms", terms.len());
                return Ok(terms);
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Cache read failed for active terms: {}", e),
    }

    let path = format!("/api/v1/accounts/{}/terms", client.config().account_id);
    let query = vec![("workflow_state[]".to_string(), "active".to_string())];
    let response = client.request(Method::GET, &path, &query, None).await?;

    let terms: Vec<Term> = match response.get("enrollment_terms") {
        Some(list) => serde_json::from_value(list.clone())?,
        None => Vec::new(),
    };

    let ttl = client.config().terms_cache_ttl_secs;
    if let Err(e) = cache
        .set(ACTIVE_TERMS_CACHE_KEY, serde_json::to_value(&terms)?, ttl)
        .await
    {
        tracing::warn!("Cache write failed for active terms: {}", e);
    }

    Ok(terms)
}

/// All of a user's courses with nested sections, teachers, and student
/// counts. Never cached: cross-list state changes must be observed
/// immediately. Term filtering happens client-side.
pub async fn get_user_courses(
    client: &CanvasClient,
    user_id: i64,
    term_id: Option<i64>,
) -> Result<Vec<Course>> {
    let path = format!("/api/v1/users/{}/courses", user_id);
    let query: Vec<(String, String)> = ["term", "sections", "teachers", "total_students"]
        .iter()
        .map(|inc| ("include[]".to_string(), inc.to_string()))
        .collect();

    let raw = client.get_paginated(&path, &query, None).await?;
    let mut courses = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value::<Course>(value) {
            Ok(course) => courses.push(course),
            Err(e) => tracing::warn!("Skipping malformed course payload: {}", e),
        }
    }

    if let Some(term_id) = term_id {
        courses.retain(|c| c.enrollment_term_id == Some(term_id));
    }

    tracing::info!("Fetched {} courses for user {}", courses.len(), user_id);
    Ok(courses)
}

pub async fn get_course(client: &CanvasClient, course_id: i64, include: &[&str]) -> Result<Course> {
    let path = format!("/api/v1/courses/{}", course_id);
    let query: Vec<(String, String)> = include
        .iter()
        .map(|inc| ("include[]".to_string(), inc.to_string()))
        .collect();
    client.get_json(&path, &query).await
}

pub async fn get_section(client: &CanvasClient, section_id: i64) -> Result<Section> {
    let path = format!("/api/v1/sections/{}", section_id);
    client.get_json(&path, &[]).await
}

/// A course's current section list, used for post-mutation verification and
/// the post-merge content rewrite.
pub async fn get_course_sections(client: &CanvasClient, course_id: i64) -> Result<Vec<Section>> {
    let path = format!("/api/v1/courses/{}/sections", course_id);
    let raw = client.get_paginated(&path, &[], None).await?;
    let mut sections = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value::<Section>(value) {
            Ok(section) => sections.push(section),
            Err(e) => tracing::warn!("Skipping malformed section payload: {}", e),
        }
    }
    Ok(sections)
}

/// Resolve an instructor by SIS id, then Canvas id, then name/login search.
/// Candidate lists are cached with a short TTL.
pub async fn resolve_instructor(
    client: &CanvasClient,
    cache: &dyn Cache,
    input: &str,
) -> Result<Vec<UserCandidate>> {
    let input = input.trim();
    let cache_key = format!("instructor:{}", input);

    match cache.get(&cache_key).await {
        Ok(Some(value)) => {
            if let Ok(candidates) = serde_json::from_value::<Vec<UserCandidate>>(value) {
                return Ok(candidates);
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Cache read failed for '{}': {}", cache_key, e),
    }

    let mut candidates: Vec<UserCandidate> = Vec::new();

    // SIS lookup first, even for numeric inputs.
    let sis_id = input.strip_prefix("sis:").unwrap_or(input);
    let sis_path = format!("/api/v1/users/sis_user_id:{}", sis_id);
    match client.get_json::<UserCandidate>(&sis_path, &[]).await {
        Ok(user) => {
            tracing::info!("Found user {} via SIS id '{}'", user.id, sis_id);
            candidates.push(user);
        }
        Err(e) => tracing::debug!("SIS lookup failed for '{}': {}", sis_id, e),
    }

    if candidates.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        let id_path = format!("/api/v1/users/{}", input);
        match client.get_json::<UserCandidate>(&id_path, &[]).await {
            Ok(user) => {
                tracing::info!("Found user {} via Canvas id", user.id);
                candidates.push(user);
            }
            Err(e) => tracing::debug!("Canvas id lookup failed for '{}': {}", input, e),
        }
    }

    if candidates.is_empty() && !input.chars().all(|c| c.is_ascii_digit()) {
        let path = format!("/api/v1/accounts/{}/users", client.config().account_id);
        let query = vec![("search_term".to_string(), input.to_string())];
        match client.get_json::<Vec<UserCandidate>>(&path, &query).await {
            Ok(found) => candidates.extend(found),
            Err(e) => tracing::debug!("Name search failed for '{}': {}", input, e),
        }
    }

    let ttl = client.config().instructor_cache_ttl_secs;
    if let Err(e) = cache
        .set(&cache_key, serde_json::to_value(&candidates)?, ttl)
        .await
    {
        tracing::warn!("Cache write failed for '{}': {}", cache_key, e);
    }

    Ok(candidates)
}

/// Hydrate course detail records in parallel. Read-only fan-out bounded by
/// the configured worker count; every task builds its own client so no
/// mutable state is shared. Best-effort: failed fetches are logged and
/// dropped from the result.
pub async fn hydrate_courses(
    config: &CanvasConfig,
    tokens: &Arc<dyn TokenProvider>,
    course_ids: &[i64],
    include: &[&str],
) -> Vec<Course> {
    let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
    let mut courses = Vec::with_capacity(course_ids.len());

    for chunk in course_ids.chunks(config.concurrent_requests.max(1)) {
        let mut set = JoinSet::new();
        for &course_id in chunk {
            let client = CanvasClient::new(config.clone(), Arc::clone(tokens));
            let include = include.clone();
            set.spawn(async move {
                let include_refs: Vec<&str> = include.iter().map(String::as_str).collect();
                (course_id, get_course(&client, course_id, &include_refs).await)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(course))) => courses.push(course),
                Ok((course_id, Err(e))) => {
                    tracing::warn!("Failed to hydrate course {}: {}", course_id, e)
                }
                Err(e) => tracing::warn!("Hydration worker panicked: {}", e),
            }
        }
    }

    courses.sort_by_key(|c| c.id);
    courses
}

/// Probe whether the caller can manage sections on each course. Same
/// bounded fan-out shape as `hydrate_courses`; a failed probe maps to
/// `false` rather than an error.
pub async fn check_course_permissions(
    config: &CanvasConfig,
    tokens: &Arc<dyn TokenProvider>,
    course_ids: &[i64],
) -> HashMap<i64, bool> {
    let mut permissions = HashMap::with_capacity(course_ids.len());

    for chunk in course_ids.chunks(config.concurrent_requests.max(1)) {
        let mut set = JoinSet::new();
        for &course_id in chunk {
            let client = CanvasClient::new(config.clone(), Arc::clone(tokens));
            set.spawn(async move {
                let path = format!("/api/v1/courses/{}/permissions", course_id);
                let query = vec![("permissions[]".to_string(), "manage_sections_add".to_string())];
                (course_id, client.request(Method::GET, &path, &query, None).await)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((course_id, Ok(value))) => {
                    let allowed = value
                        .get("manage_sections_add")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    permissions.insert(course_id, allowed);
                }
                Ok((course_id, Err(e))) => {
                    tracing::debug!("Permission probe failed for course {}: {}", course_id, e);
                    permissions.insert(course_id, false);
                }
                Err(e) => tracing::warn!("Permission worker panicked: {}", e),
            }
        }
    }

    permissions
}
