use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::process::Command;

/// Execute gh CLI command and return stdout
/// Uses spawn_blocking to avoid blocking the tokio runtime
pub async fn gh_command(args: &[&str]) -> Result<String> {
    gh_command_in(None, args).await
}

/// `gh_command` with an explicit working directory (used by `gh repo view`).
pub async fn gh_command_in(dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let dir = dir.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || {
        let mut command = Command::new("gh");
        command.args(&args);
        if let Some(dir) = dir {
            command.current_dir(dir);
        }
        let output = command
            .output()
            .context("Failed to execute gh CLI - is it installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("gh {} failed: {}", args.join(" "), stderr.trim());
        }

        String::from_utf8(output.stdout).context("gh output contains invalid UTF-8")
    })
    .await
    .context("spawn_blocking task panicked")?
}

/// Execute gh api command against `host` with JSON output
pub async fn gh_api(host: &str, endpoint: &str) -> Result<Value> {
    let output = gh_command(&["api", "--hostname", host, endpoint]).await?;
    serde_json::from_str(&output).context("Failed to parse gh api response as JSON")
}

/// Execute gh api over every page and return the items as one JSON array
pub async fn gh_api_paginate(host: &str, endpoint: &str) -> Result<Value> {
    let output = gh_command(&[
        "api",
        "--hostname",
        host,
        "--paginate",
        "--slurp",
        endpoint,
    ])
    .await?;
    let pages: Value =
        serde_json::from_str(&output).context("Failed to parse gh api response as JSON")?;
    Ok(flatten_pages(pages))
}

/// `--slurp` wraps each page in an outer array: `[[...], [...]]` → `[...]`
fn flatten_pages(pages: Value) -> Value {
    match pages {
        Value::Array(pages) if pages.iter().all(Value::is_array) => Value::Array(
            pages
                .into_iter()
                .flat_map(|page| match page {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                })
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_pages_concatenates_in_order() {
        let pages = json!([[{"id": 1}, {"id": 2}], [], [{"id": 3}]]);
        assert_eq!(
            flatten_pages(pages),
            json!([{"id": 1}, {"id": 2}, {"id": 3}])
        );
    }

    #[test]
    fn test_flatten_pages_leaves_single_object_untouched() {
        let value = json!({"login": "alice"});
        assert_eq!(flatten_pages(value.clone()), value);
    }
}
