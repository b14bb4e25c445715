use std::{process::Stdio, time::Duration};

use anyhow::Result;
use rmcp::{model::ClientInfo, serve_client};
use serde_json::json;
use tokio::{process::Command, time::timeout};

use crate::common::{call, fixture, spawn_server_process, BINARY_PATH};

#[tokio::test]
async fn inspector_style_spawn_lists_and_routes() -> Result<()> {
    let (mut child, transport, stderr_task) = spawn_server_process().await?;

    let client = serve_client(ClientInfo::default(), transport).await?;
    let list = client.list_tools(None).await?;
    assert_eq!(list.tools.len(), 3, "tools: {:?}", list.tools);
    assert!(
        list.tools
            .iter()
            .any(|tool| tool.name.as_ref() == "execute-tool"),
        "list_tools should include execute-tool: {:?}",
        list.tools
    );

    let response = call(
        &client,
        "route-tools",
        json!({ "query": "schedule a meeting", "top_k": 1 }),
    )
    .await?;
    let payload = response.structured_content.expect("structured_content");
    assert_eq!(payload["tools"][0]["tool_name"], "create_event");

    client.cancel().await?;
    let status = timeout(Duration::from_secs(5), child.wait()).await??;
    assert!(
        status.success(),
        "server should exit cleanly but exit status was {status:?}"
    );
    if let Some(handle) = stderr_task {
        let _ = handle.await;
    }
    Ok(())
}

#[tokio::test]
async fn rank_command_prints_json() -> Result<()> {
    let output = Command::new(BINARY_PATH)
        .args([
            "--config",
            &fixture("tests/fixtures/config_runtime.toml"),
            "rank",
            "forecast for tomorrow",
            "--tools",
            "--top-k",
            "1",
        ])
        .stdin(Stdio::null())
        .output()
        .await?;

    assert!(output.status.success(), "rank failed: {output:?}");
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(payload["tools"][0]["server_name"], "weather");
    assert_eq!(payload["tools"][0]["tool_name"], "get_forecast");
    Ok(())
}

#[tokio::test]
async fn missing_config_exits_with_failure() -> Result<()> {
    let output = Command::new(BINARY_PATH)
        .args(["--config", &fixture("tests/fixtures/does_not_exist.toml")])
        .stdin(Stdio::null())
        .output()
        .await?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("does_not_exist.toml"),
        "stderr should name the config file: {stderr}"
    );
    Ok(())
}
