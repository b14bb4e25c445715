use std::sync::Arc;

use anyhow::Result;
use rmcp::model::ErrorCode;
use serde_json::{json, Value};

use crate::common::{call, error_data, router_service, start_copilot, DuplexConnector};

#[tokio::test]
async fn lists_exactly_the_three_routing_tools() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new());
    let (client, server_task) = start_copilot(router_service(Arc::clone(&connector))).await?;

    let list = client.list_tools(None).await?;
    let mut names: Vec<_> = list.tools.iter().map(|tool| tool.name.to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["execute-tool", "route-tools", "router-servers"]);

    let _ = client.cancel().await;
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn forecast_query_routes_to_get_forecast() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new());
    let (client, server_task) = start_copilot(router_service(Arc::clone(&connector))).await?;

    let response = call(
        &client,
        "route-tools",
        json!({ "query": "forecast for tomorrow", "top_k": 1 }),
    )
    .await?;
    let payload = response.structured_content.expect("structured_content");
    let tools = payload["tools"].as_array().expect("tools array");

    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["server_name"], "weather");
    assert_eq!(tools[0]["tool_name"], "get_forecast");
    assert!(tools[0]["score"].as_f64().expect("numeric score") > 0.0);
    assert_eq!(tools[0]["input_schema"]["required"], json!(["city"]));
    assert_eq!(connector.connects("weather"), 0, "routing never connects");

    let _ = client.cancel().await;
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn meeting_query_ranks_calendar_above_weather() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new());
    let (client, server_task) = start_copilot(router_service(Arc::clone(&connector))).await?;

    let response = call(
        &client,
        "router-servers",
        json!({ "query": "schedule a meeting" }),
    )
    .await?;
    let payload = response.structured_content.expect("structured_content");
    let names: Vec<_> = payload["servers"]
        .as_array()
        .expect("servers array")
        .iter()
        .filter_map(|server| server["name"].as_str())
        .collect();

    assert_eq!(names, vec!["calendar", "weather"]);

    let _ = client.cancel().await;
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn empty_query_lists_servers_in_registration_order() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new());
    let (client, server_task) = start_copilot(router_service(Arc::clone(&connector))).await?;

    let response = call(&client, "router-servers", json!({ "query": "the of and" })).await?;
    let payload = response.structured_content.expect("structured_content");
    let servers = payload["servers"].as_array().expect("servers array");

    assert_eq!(servers[0]["name"], "weather");
    assert_eq!(servers[1]["name"], "calendar");
    assert!(servers
        .iter()
        .all(|server| server["score"].as_f64() == Some(0.0)));

    let _ = client.cancel().await;
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn non_positive_top_k_is_an_invalid_argument() -> Result<()> {
    let connector = Arc::new(DuplexConnector::new());
    let (client, server_task) = start_copilot(router_service(Arc::clone(&connector))).await?;

    let err = call(
        &client,
        "route-tools",
        json!({ "query": "forecast", "top_k": 0 }),
    )
    .await
    .expect_err("top_k=0 must fail");
    let (error, data) = error_data(err);

    assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
    assert_eq!(data.get("code"), Some(&Value::from("invalid_argument")));
    assert_eq!(data.get("retryable"), Some(&Value::Bool(false)));

    let _ = client.cancel().await;
    let _ = server_task.await;
    Ok(())
}
