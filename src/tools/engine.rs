//! The tool execution engine.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::{Duration, Instant};

use base64::Engine as _;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::types::{Authentication, ToolExecutionConfig, ToolExecutionResult, ToolKind};

use super::template::{render_value, substitute_placeholders};
use super::Escaping;

/// Synthetic cost rate per second of execution, by tool kind. Display
/// approximation, not a billing ledger.
fn cost_rate(kind: ToolKind) -> f64 {
    match kind {
        ToolKind::Api => 0.0001,
        ToolKind::Cli => 0.00001,
        ToolKind::Function => 0.000001,
        ToolKind::Database => 0.0001,
    }
}

/// Estimated cost for an execution of the given duration. Linear in duration.
pub fn execution_cost(kind: ToolKind, duration: Duration) -> f64 {
    duration.as_secs_f64() * cost_rate(kind)
}

/// Executes single tool invocations, polymorphic over capability kinds.
///
/// Every call returns a [`ToolExecutionResult`]; errors while building or
/// sending the request/command are converted into a failed envelope.
pub struct ToolExecutionEngine {
    http: reqwest::Client,
}

impl Default for ToolExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolExecutionEngine {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Use an explicit HTTP client (shared connection pool, test doubles).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Execute one tool invocation.
    pub async fn execute(
        &self,
        kind: ToolKind,
        config: &ToolExecutionConfig,
        parameters: &HashMap<String, Value>,
    ) -> ToolExecutionResult {
        let start = Instant::now();

        match self.dispatch(kind, config, parameters).await {
            Ok(output) => {
                let duration = start.elapsed();
                ToolExecutionResult {
                    success: true,
                    output: Some(output),
                    error: None,
                    duration_ms: duration.as_millis() as u64,
                    cost: Some(execution_cost(kind, duration)),
                }
            }
            Err(e) => {
                let duration = start.elapsed();
                tracing::warn!(kind = %kind, error = %e, "tool execution failed");
                ToolExecutionResult {
                    success: false,
                    output: None,
                    error: Some(format!("{:#}", e)),
                    duration_ms: duration.as_millis() as u64,
                    cost: None,
                }
            }
        }
    }

    async fn dispatch(
        &self,
        kind: ToolKind,
        config: &ToolExecutionConfig,
        parameters: &HashMap<String, Value>,
    ) -> anyhow::Result<Value> {
        match kind {
            ToolKind::Api => self.execute_api(config, parameters).await,
            ToolKind::Cli => execute_cli(config, parameters).await,
            ToolKind::Function => execute_function(config),
            ToolKind::Database => execute_database(config),
        }
    }

    async fn execute_api(
        &self,
        config: &ToolExecutionConfig,
        parameters: &HashMap<String, Value>,
    ) -> anyhow::Result<Value> {
        let url_template = config
            .url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("API tool requires a URL"))?;

        let url = substitute_placeholders(url_template, parameters, Escaping::Url);

        let method: reqwest::Method = config
            .method
            .as_deref()
            .unwrap_or("GET")
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid HTTP method: {:?}", config.method))?;

        let is_get = method == reqwest::Method::GET;
        let mut request = self.http.request(method, &url);

        if let Some(headers) = &config.headers {
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }

        if let Some(auth) = &config.authentication {
            request = apply_authentication(request, auth);
        }

        // GET sends parameters as query string; everything else as the body.
        if is_get {
            let query: Vec<(String, String)> = parameters
                .iter()
                .map(|(k, v)| (k.clone(), render_value(v)))
                .collect();
            request = request.query(&query);
        } else {
            request = request.json(parameters);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            anyhow::bail!("HTTP {}: {}", status, body);
        }

        // Decoded body, unmodified: JSON when it parses, raw text otherwise.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

fn apply_authentication(
    request: reqwest::RequestBuilder,
    auth: &Authentication,
) -> reqwest::RequestBuilder {
    match auth {
        Authentication::Bearer { token } => {
            request.header("Authorization", format!("Bearer {}", token))
        }
        Authentication::ApiKey { header, key } => {
            request.header(header.as_deref().unwrap_or("X-API-Key"), key)
        }
        Authentication::Basic { username, password } => {
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
            request.header("Authorization", format!("Basic {}", encoded))
        }
    }
}

async fn execute_cli(
    config: &ToolExecutionConfig,
    parameters: &HashMap<String, Value>,
) -> anyhow::Result<Value> {
    let command_template = config
        .command
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("CLI tool requires a command"))?;

    // Values go in verbatim; the tool config author owns quoting.
    let command = substitute_placeholders(command_template, parameters, Escaping::None);

    tracing::info!(command = %command, "executing CLI tool");

    let (shell, shell_arg) = if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    };

    let mut cmd = Command::new(shell);
    cmd.arg(shell_arg)
        .arg(&command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(cwd) = &config.working_directory {
        cmd.current_dir(cwd);
    }
    if let Some(env) = &config.env {
        cmd.envs(env);
    }

    let output = match config.timeout {
        Some(timeout_ms) => {
            tokio::time::timeout(Duration::from_millis(timeout_ms), cmd.output())
                .await
                .map_err(|_| anyhow::anyhow!("Command timed out after {} ms", timeout_ms))?
        }
        None => cmd.output().await,
    }
    .map_err(|e| anyhow::anyhow!("Failed to execute command: {}", e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        anyhow::bail!(
            "Command exited with {}: {}",
            output.status.code().unwrap_or(-1),
            if stderr.is_empty() { &stdout } else { &stderr }
        );
    }

    // Exit 0 with nothing on stdout but noise on stderr is still a failure.
    if stdout.is_empty() && !stderr.is_empty() {
        anyhow::bail!("{}", stderr);
    }

    Ok(json!({ "stdout": stdout, "stderr": stderr }))
}

fn execute_function(config: &ToolExecutionConfig) -> anyhow::Result<Value> {
    if config.function_name.is_none() {
        anyhow::bail!("Function tool requires a function name");
    }
    anyhow::bail!("Function tools are not yet implemented")
}

fn execute_database(config: &ToolExecutionConfig) -> anyhow::Result<Value> {
    if config.connection_string.is_none() || config.query.is_none() {
        anyhow::bail!("Database tool requires a connection string and a query");
    }
    anyhow::bail!("Database tools are not yet implemented")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn cost_is_linear_in_duration() {
        for kind in [
            ToolKind::Api,
            ToolKind::Cli,
            ToolKind::Function,
            ToolKind::Database,
        ] {
            let x = Duration::from_millis(1500);
            assert_eq!(execution_cost(kind, 2 * x), 2.0 * execution_cost(kind, x));
        }
    }

    #[tokio::test]
    async fn cli_tool_returns_trimmed_streams() {
        let engine = ToolExecutionEngine::new();
        let config = ToolExecutionConfig {
            command: Some("echo {{msg}}".to_string()),
            ..Default::default()
        };

        let result = engine
            .execute(ToolKind::Cli, &config, &params(&[("msg", json!("hi"))]))
            .await;

        assert!(result.success);
        assert_eq!(result.output.unwrap()["stdout"], "hi");
        assert!(result.cost.is_some());
    }

    #[tokio::test]
    async fn cli_stderr_only_is_a_failure_even_on_exit_zero() {
        let engine = ToolExecutionEngine::new();
        let config = ToolExecutionConfig {
            command: Some("echo oops 1>&2".to_string()),
            ..Default::default()
        };

        let result = engine.execute(ToolKind::Cli, &config, &HashMap::new()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("oops"));
        assert!(result.cost.is_none());
    }

    #[tokio::test]
    async fn cli_nonzero_exit_is_a_failure() {
        let engine = ToolExecutionEngine::new();
        let config = ToolExecutionConfig {
            command: Some("exit 3".to_string()),
            ..Default::default()
        };

        let result = engine.execute(ToolKind::Cli, &config, &HashMap::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("3"));
    }

    #[tokio::test]
    async fn cli_timeout_kills_the_process() {
        let engine = ToolExecutionEngine::new();
        let config = ToolExecutionConfig {
            command: Some("sleep 5".to_string()),
            timeout: Some(100),
            ..Default::default()
        };

        let result = engine.execute(ToolKind::Cli, &config, &HashMap::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn cli_respects_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ToolExecutionEngine::new();
        let config = ToolExecutionConfig {
            command: Some("pwd".to_string()),
            working_directory: Some(dir.path().to_string_lossy().into_owned()),
            ..Default::default()
        };

        let result = engine.execute(ToolKind::Cli, &config, &HashMap::new()).await;
        assert!(result.success);
        let stdout = result.output.unwrap()["stdout"].as_str().unwrap().to_string();
        // Compare canonicalized paths; macOS tempdirs live behind /private.
        assert_eq!(
            std::fs::canonicalize(stdout).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn function_kind_is_unimplemented() {
        let engine = ToolExecutionEngine::new();
        let config = ToolExecutionConfig {
            function_name: Some("summarize".to_string()),
            ..Default::default()
        };

        let result = engine
            .execute(ToolKind::Function, &config, &HashMap::new())
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("not yet implemented"));
    }

    #[tokio::test]
    async fn database_kind_reports_missing_config_first() {
        let engine = ToolExecutionEngine::new();
        let result = engine
            .execute(ToolKind::Database, &ToolExecutionConfig::default(), &HashMap::new())
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("requires a connection string"));
    }

    #[tokio::test]
    async fn api_tool_without_url_fails_inside_the_envelope() {
        let engine = ToolExecutionEngine::new();
        let result = engine
            .execute(ToolKind::Api, &ToolExecutionConfig::default(), &HashMap::new())
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("requires a URL"));
    }
}
