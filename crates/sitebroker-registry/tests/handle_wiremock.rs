//! Integration tests for `RegistryHandle` against mocked site APIs

use serde_json::json;
use sitebroker_config_file::BrokerConfig;
use sitebroker_core::service::{CommerceCredential, TransactionalEmailCredential};
use sitebroker_core::tenant::ServicesConfig;
use sitebroker_core::{Error, ServiceCredential, ServiceKind, TenantConfig, TenantId};
use sitebroker_egress::{CallOptions, DispatchOutput, Method, Payload, RetryConfig};
use sitebroker_observability::DispatchMetrics;
use sitebroker_registry::RegistryHandle;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn site(id: &str, url: &str) -> TenantConfig {
    TenantConfig::new(TenantId::from_string(id).unwrap(), url, "admin", "secret")
}

fn config(sites: Vec<TenantConfig>) -> BrokerConfig {
    let mut config = BrokerConfig::with_sites(sites);
    config.preflight = false;
    config.retry = RetryConfig {
        max_retries: 3,
        base_delay_ms: 5,
        max_jitter_ms: 0,
    };
    config
}

#[tokio::test]
async fn test_call_uses_active_site() {
    let blog = MockServer::start().await;
    let shop = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&blog)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 2}])))
        .expect(1)
        .mount(&shop)
        .await;

    let handle = RegistryHandle::from_config(
        config(vec![site("blog", &blog.uri()), site("shop", &shop.uri())]),
        None,
    )
    .await
    .unwrap();
    assert_eq!(handle.get_active().unwrap().as_str(), "blog");

    let output = handle
        .call(None, Method::GET, "posts", None, &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(output, DispatchOutput::Body(json!([{"id": 1}])));

    handle.switch_active("shop").unwrap();
    let output = handle
        .call(None, Method::GET, "posts", None, &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(output, DispatchOutput::Body(json!([{"id": 2}])));
}

#[tokio::test]
async fn test_default_site_is_initially_active() {
    let mut config = config(vec![
        site("blog", "https://blog.example.com"),
        site("shop", "https://shop.example.com"),
    ]);
    config.default_site = Some("shop".to_string());

    let handle = RegistryHandle::from_config(config, None).await.unwrap();
    assert_eq!(handle.get_active().unwrap().as_str(), "shop");
    let ids: Vec<String> = handle.list_tenants().iter().map(|t| t.to_string()).collect();
    assert_eq!(ids, vec!["blog", "shop"]);
}

#[tokio::test]
async fn test_empty_config_is_fatal() {
    let result = RegistryHandle::from_config(config(vec![]), None).await;
    assert!(result.err().is_some_and(|e| e.is_config()));
}

#[tokio::test]
async fn test_service_override_routes_to_secondary() {
    let server = MockServer::start().await;

    // base64("ck_1:cs_1")
    Mock::given(method("POST"))
        .and(path("/wp-json/wc/v3/coupons"))
        .and(header("authorization", "Basic Y2tfMTpjc18x"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 77, "code": "SAVE10"})))
        .expect(1)
        .mount(&server)
        .await;

    let shop = site("shop", &server.uri()).with_services(ServicesConfig {
        commerce: Some(CommerceCredential {
            consumer_key: "ck_1".to_string(),
            consumer_secret: "cs_1".to_string(),
            base_url: None,
        }),
        ..Default::default()
    });
    let handle = RegistryHandle::from_config(config(vec![shop]), None).await.unwrap();

    let payload = Payload::from(json!({"code": "SAVE10", "amount": "10"}));
    let output = handle
        .call(
            Some("shop"),
            Method::POST,
            "/coupons",
            Some(&payload),
            &CallOptions::new().service(ServiceKind::Commerce),
        )
        .await
        .unwrap();
    assert_eq!(output.into_value().unwrap()["code"], "SAVE10");
}

#[tokio::test]
async fn test_configure_service_after_startup() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(header("authorization", "Bearer SG.key"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let handle = RegistryHandle::from_config(config(vec![site("siteA", &server.uri())]), None)
        .await
        .unwrap();

    let options = CallOptions::new().service(ServiceKind::TransactionalEmail);
    let err = handle
        .call(Some("siteA"), Method::POST, "mail/send", None, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ServiceNotConfigured { field: "api_key", .. }));

    handle
        .configure_service(
            "siteA",
            ServiceCredential::TransactionalEmail(TransactionalEmailCredential {
                api_key: "SG.key".to_string(),
                base_url: Some(server.uri()),
            }),
        )
        .unwrap();

    let output = handle
        .call(Some("siteA"), Method::POST, "mail/send", None, &options)
        .await
        .unwrap();
    // 202 with an empty body
    assert_eq!(output, DispatchOutput::Body(serde_json::Value::Null));
}

#[tokio::test]
async fn test_call_tool_normalizes_errors() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/wp-json/wp/v2/posts/5"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "rest_cannot_delete",
            "message": "Sorry, you are not allowed to delete this post."
        })))
        .mount(&server)
        .await;

    let handle = RegistryHandle::from_config(config(vec![site("blog", &server.uri())]), None)
        .await
        .unwrap();

    let result = handle
        .call_tool(None, Method::DELETE, "posts/5", None, &CallOptions::default())
        .await;
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({
            "isError": true,
            "message": "Sorry, you are not allowed to delete this post."
        })
    );

    let result = handle
        .call_tool(Some("missing"), Method::GET, "posts", None, &CallOptions::default())
        .await;
    assert!(result.is_error);
    assert_eq!(
        result.message.as_deref(),
        Some("Site 'missing' not found. Available sites: blog")
    );
}

#[tokio::test]
async fn test_call_tool_success_wraps_paginated_content() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-WP-Total", "12")
                .insert_header("X-WP-TotalPages", "2")
                .set_body_json(json!([{"id": 1}])),
        )
        .mount(&server)
        .await;

    let handle = RegistryHandle::from_config(config(vec![site("blog", &server.uri())]), None)
        .await
        .unwrap();

    let result = handle
        .call_tool(
            None,
            Method::GET,
            "posts",
            Some(&Payload::from(json!({"per_page": 10}))),
            &CallOptions::new().paginated(),
        )
        .await;
    assert!(!result.is_error);
    assert_eq!(
        result.content.unwrap(),
        json!({
            "items": [{"id": 1}],
            "pagination": {"total": 12, "totalPages": 2, "page": 1, "perPage": 10}
        })
    );
}

#[tokio::test]
async fn test_preflight_failure_does_not_abort_registration() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(vec![
        site("blog", &server.uri()),
        // nothing listens here
        site("offline", "http://127.0.0.1:1"),
    ]);
    config.preflight = true;

    let handle = RegistryHandle::from_config(config, None).await.unwrap();
    assert_eq!(handle.list_tenants().len(), 2);
    assert!(handle.resolve(Some("offline"), ServiceKind::Primary).is_ok());
}

#[tokio::test]
async fn test_metrics_recorded_per_site() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let metrics = DispatchMetrics::new().unwrap();
    let handle = RegistryHandle::from_config(
        config(vec![site("blog", &server.uri())]),
        Some(metrics.clone()),
    )
    .await
    .unwrap();

    for _ in 0..3 {
        handle
            .call(None, Method::GET, "posts", None, &CallOptions::default())
            .await
            .unwrap();
    }

    assert_eq!(
        metrics
            .requests_total
            .with_label_values(&["blog", "primary", "GET"])
            .get(),
        3.0
    );
    assert_eq!(metrics.inflight.with_label_values(&["blog"]).get(), 0.0);
}
