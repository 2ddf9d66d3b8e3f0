use canvas_crosslist::{CanvasClient, CanvasConfig, StaticTokenProvider};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn test_config(base_url: String, per_page: usize) -> CanvasConfig {
    CanvasConfig {
        base_url,
        per_page,
        max_retries: 3,
        retry_delay_ms: 1,
        pacing_delay_ms: 0,
        rate_limit_backoff_secs: 0,
        max_pages_absolute: 50,
        ..Default::default()
    }
}

fn client_for(server: &MockServer, per_page: usize) -> CanvasClient {
    let config = test_config(server.base_url(), per_page);
    CanvasClient::new(config, Arc::new(StaticTokenProvider::new("test-token")))
}

#[tokio::test]
async fn merges_pages_and_stops_on_short_page() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/accounts/1/courses")
            .query_param("page", "1");
        then.status(200).json_body(json!([{"id": 1}, {"id": 2}]));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/accounts/1/courses")
            .query_param("page", "2");
        then.status(200).json_body(json!([{"id": 3}]));
    });

    let client = client_for(&server, 2);
    let items = client
        .get_paginated("/api/v1/accounts/1/courses", &[], None)
        .await
        .unwrap();

    let ids: Vec<i64> = items.iter().map(|v| v["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn stops_on_empty_page() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/items").query_param("page", "1");
        then.status(200).json_body(json!([{"id": 1}, {"id": 2}]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/items").query_param("page", "2");
        then.status(200).json_body(json!([]));
    });

    let client = client_for(&server, 2);
    let items = client.get_paginated("/api/v1/items", &[], None).await.unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn discards_repeated_page_and_stops() {
    // A server that keeps serving the same items regardless of the page
    // number must not produce duplicates or an infinite loop.
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/items");
        then.status(200).json_body(json!([{"id": 2}, {"id": 1}]));
    });

    let client = client_for(&server, 2);
    let items = client.get_paginated("/api/v1/items", &[], None).await.unwrap();

    let ids: Vec<i64> = items.iter().map(|v| v["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[tokio::test]
async fn caller_page_limit_is_respected() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/items").query_param("page", "1");
        then.status(200).json_body(json!([{"id": 1}, {"id": 2}]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/items").query_param("page", "2");
        then.status(200).json_body(json!([{"id": 3}, {"id": 4}]));
    });
    // Page 3 exists but must never be requested.
    let page3 = server.mock(|when, then| {
        when.method(GET).path("/api/v1/items").query_param("page", "3");
        then.status(200).json_body(json!([{"id": 5}, {"id": 6}]));
    });

    let client = client_for(&server, 2);
    let items = client
        .get_paginated("/api/v1/items", &[], Some(2))
        .await
        .unwrap();

    assert_eq!(items.len(), 4);
    page3.assert_hits(0);
}

#[tokio::test]
async fn absolute_page_ceiling_stops_runaway_pagination() {
    let server = MockServer::start();
    // Every page is full and every page has distinct ids, so only the
    // absolute ceiling can stop the loop.
    for page in 1..=4u32 {
        let base = page as i64 * 10;
        server.mock(move |when, then| {
            when.method(GET)
                .path("/api/v1/items")
                .query_param("page", page.to_string());
            then.status(200)
                .json_body(json!([{"id": base}, {"id": base + 1}]));
        });
    }

    let mut config = test_config(server.base_url(), 2);
    config.max_pages_absolute = 3;
    let client = CanvasClient::new(config, Arc::new(StaticTokenProvider::new("test-token")));

    let items = client.get_paginated("/api/v1/items", &[], None).await.unwrap();
    assert_eq!(items.len(), 6);
}

#[tokio::test]
async fn rate_limit_is_retried_then_surfaced() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/items");
        then.status(429).body("{\"errors\":[{\"message\":\"throttled\"}]}");
    });

    let client = client_for(&server, 2);
    let err = client
        .get_paginated("/api/v1/items", &[], None)
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    // One initial attempt plus retries up to the configured budget.
    mock.assert_hits(3);
}

#[tokio::test]
async fn auth_failure_returns_partial_results_without_retry() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/items").query_param("page", "1");
        then.status(200).json_body(json!([{"id": 1}, {"id": 2}]));
    });
    let unauthorized = server.mock(|when, then| {
        when.method(GET).path("/api/v1/items").query_param("page", "2");
        then.status(401).body("{\"errors\":[{\"message\":\"bad token\"}]}");
    });

    let client = client_for(&server, 2);
    let items = client.get_paginated("/api/v1/items", &[], None).await.unwrap();

    assert_eq!(items.len(), 2);
    unauthorized.assert_hits(1);
}

#[tokio::test]
async fn server_error_exhausts_retries_and_errors() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/items");
        then.status(500).body("internal error");
    });

    let client = client_for(&server, 2);
    let err = client
        .get_paginated("/api/v1/items", &[], None)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    mock.assert_hits(3);
}

#[tokio::test]
async fn bearer_token_and_per_page_are_sent() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/items")
            .header("Authorization", "Bearer test-token")
            .query_param("per_page", "2");
        then.status(200).json_body(json!([{"id": 1}]));
    });

    let client = client_for(&server, 2);
    client.get_paginated("/api/v1/items", &[], None).await.unwrap();
    mock.assert_hits(1);
}
