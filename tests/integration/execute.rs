use std::{sync::Arc, time::Duration};

use anyhow::Result;
use rmcp::model::ErrorCode;
use serde_json::{json, Value};
use tokio::task::JoinSet;

use mcp_copilot::{
    connection::SessionStatus,
    registry::ServerEntry,
    router::RouterService,
    server::{
        config::{CopilotConfig, RouterSection, ServerSection},
        runtime::build_router_service,
    },
};

use crate::common::{call, error_data, router_service, start_copilot, stdio, DuplexConnector};

#[tokio::test]
async fn execute_returns_backend_payload_unchanged() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new());
    let (client, server_task) = start_copilot(router_service(Arc::clone(&connector))).await?;

    let response = call(
        &client,
        "execute-tool",
        json!({
            "server_name": "weather",
            "tool_name": "get_forecast",
            "params": { "city": "Boston" }
        }),
    )
    .await?;

    assert_eq!(
        response.structured_content,
        Some(json!({ "city": "Boston", "forecast": "sunny" }))
    );
    assert_ne!(response.is_error, Some(true));
    assert_eq!(connector.connects("weather"), 1);

    let _ = client.cancel().await;
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn misspelled_server_is_unknown_and_never_connects() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new());
    let (client, server_task) = start_copilot(router_service(Arc::clone(&connector))).await?;

    let err = call(
        &client,
        "execute-tool",
        json!({
            "server_name": "weahter",
            "tool_name": "get_forecast",
            "params": { "city": "Boston" }
        }),
    )
    .await
    .expect_err("typo must fail");
    let (error, data) = error_data(err);

    assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
    assert_eq!(data.get("code"), Some(&Value::from("unknown_server")));
    assert_eq!(data.get("server_name"), Some(&Value::from("weahter")));
    assert_eq!(connector.connects("weahter"), 0);
    assert_eq!(connector.connects("weather"), 0);

    let _ = client.cancel().await;
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn undeclared_tool_is_unknown() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new());
    let (client, server_task) = start_copilot(router_service(Arc::clone(&connector))).await?;

    let err = call(
        &client,
        "execute-tool",
        json!({ "server_name": "calendar", "tool_name": "delete_everything" }),
    )
    .await
    .expect_err("undeclared tool must fail");
    let (_, data) = error_data(err);

    assert_eq!(data.get("code"), Some(&Value::from("unknown_tool")));
    assert_eq!(data.get("tool_name"), Some(&Value::from("delete_everything")));
    assert_eq!(connector.connects("calendar"), 0);

    let _ = client.cancel().await;
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn unreachable_calendar_does_not_affect_weather() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new().unreachable("calendar"));
    let router = router_service(Arc::clone(&connector));
    let (client, server_task) = start_copilot(Arc::clone(&router)).await?;

    let err = call(
        &client,
        "execute-tool",
        json!({ "server_name": "calendar", "tool_name": "list_events" }),
    )
    .await
    .expect_err("calendar is down");
    let (_, data) = error_data(err);
    assert_eq!(data.get("code"), Some(&Value::from("connect_failed")));
    assert_eq!(data.get("retryable"), Some(&Value::Bool(true)));

    let response = call(
        &client,
        "execute-tool",
        json!({
            "server_name": "weather",
            "tool_name": "get_forecast",
            "params": { "city": "Boston" }
        }),
    )
    .await?;
    assert_eq!(
        response.structured_content,
        Some(json!({ "city": "Boston", "forecast": "sunny" }))
    );
    assert_eq!(
        router.connections().status("calendar"),
        Some(SessionStatus::Failed)
    );
    assert_eq!(
        router.connections().status("weather"),
        Some(SessionStatus::Ready)
    );

    let _ = client.cancel().await;
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn backend_error_keeps_backend_code_and_session() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new());
    let router = router_service(Arc::clone(&connector));
    let (client, server_task) = start_copilot(Arc::clone(&router)).await?;

    let err = call(
        &client,
        "execute-tool",
        json!({ "server_name": "weather", "tool_name": "get_alerts" }),
    )
    .await
    .expect_err("backend rejects the call");
    let (error, data) = error_data(err);

    assert_eq!(error.code, ErrorCode(-32042));
    assert_eq!(error.message, "alerts feed unavailable");
    assert_eq!(data.get("code"), Some(&Value::from("execution_failed")));
    assert_eq!(
        data.get("backend_data"),
        Some(&json!({ "feed": "severe-weather" }))
    );
    assert_eq!(
        router.connections().status("weather"),
        Some(SessionStatus::Ready)
    );

    call(
        &client,
        "execute-tool",
        json!({
            "server_name": "weather",
            "tool_name": "get_forecast",
            "params": { "city": "Oslo" }
        }),
    )
    .await?;
    assert_eq!(connector.connects("weather"), 1, "session is reused");

    let _ = client.cancel().await;
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn concurrent_first_calls_open_one_session() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new().with_delay(Duration::from_millis(50)));
    let router = router_service(Arc::clone(&connector));

    let mut calls = JoinSet::new();
    for _ in 0..6 {
        let router: Arc<RouterService> = Arc::clone(&router);
        calls.spawn(async move { router.execute_tool("calendar", "list_events", None).await });
    }
    while let Some(joined) = calls.join_next().await {
        let result = joined?.expect("every call succeeds");
        assert_eq!(
            result.structured_content,
            Some(json!({ "events": ["standup"] }))
        );
    }

    assert_eq!(connector.connects("calendar"), 1);
    router.shutdown().await;
    assert_eq!(
        router.connections().status("calendar"),
        Some(SessionStatus::Closed)
    );
    Ok(())
}

#[tokio::test]
async fn discovery_fills_tools_and_reuses_its_session() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new().unreachable("search"));
    let config = CopilotConfig {
        server: ServerSection::default(),
        router: RouterSection::default(),
        servers: vec![
            ServerEntry::new("notes", None, stdio("notes-mcp")),
            ServerEntry::new("search", Some("Web search".into()), stdio("search-mcp")),
        ],
        source_path: "config.toml".into(),
    };

    let router = build_router_service(&config, connector.clone()).await?;
    let names: Vec<_> = router
        .registry()
        .servers()
        .iter()
        .map(|server| server.name.as_str())
        .collect();
    assert_eq!(names, vec!["notes"], "unreachable server is dropped");

    let notes = router.registry().server("notes").expect("notes kept");
    assert!(notes.tool("get_forecast").is_some());
    assert_eq!(
        router.connections().status("notes"),
        Some(SessionStatus::Ready)
    );

    let result = router
        .execute_tool("notes", "get_forecast", json!({ "city": "Lima" }).as_object().cloned())
        .await?;
    assert_eq!(
        result.structured_content,
        Some(json!({ "city": "Lima", "forecast": "sunny" }))
    );
    assert_eq!(connector.connects("notes"), 1, "discovery session is adopted");

    router.shutdown().await;
    Ok(())
}
