use anyhow::Context as _;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;

pub use openapi_mcp_test_support::EchoServer;

pub const SECURED_API: &str = r"
openapi: 3.0.0
info: {title: People, version: '1'}
components:
  securitySchemes:
    apiKeyAuth: {type: apiKey, in: header, name: X-API-Key}
paths:
  /api/person/{id}:
    get:
      summary: Get person
      parameters:
        - {name: id, in: path, required: true, schema: {type: integer}}
  /api/person:
    post:
      summary: Create person
      security:
        - apiKeyAuth: []
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              properties: {name: {type: string}}
              required: [name]
";

pub fn write_spec(dir: &Path, file: &str, body: &str) -> anyhow::Result<String> {
    let path = dir.join(file);
    std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(path.display().to_string())
}

/// Run the binary with a clean environment for its own variables.
pub async fn run_cli(args: &[&str], envs: &[(&str, &str)]) -> anyhow::Result<Output> {
    let bin = env!("CARGO_BIN_EXE_openapi-mcp");
    let mut cmd = Command::new(bin);
    cmd.args(args)
        .env_remove("OPENAPI_MCP_SPEC")
        .env_remove("OPENAPI_MCP_DIR")
        .env_remove("OPENAPI_MCP_BASE_URL")
        .env_remove("X_API_KEY")
        .env("RUST_LOG", "warn");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.output().await.context("run openapi-mcp")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
