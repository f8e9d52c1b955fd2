//! `code_interpreter` tool (§4.4.2): runs Python against the configured
//! `SandboxProvider`, wraps the source with a matplotlib prologue/epilogue,
//! and writes any captured figures to disk rather than inlining base64 into
//! the tool response.

use std::path::Path;

use dr_domain::error::Error as DomainError;
use dr_domain::tool_error::{ToolError, ToolErrorCode};
use dr_providers::sandbox::SandboxOutcome;
use serde::Deserialize;
use serde_json::Value;

use crate::context::EngineContext;

const PROLOGUE: &str = "import matplotlib\nmatplotlib.rcParams['figure.dpi'] = 100\n";

#[derive(Debug, Deserialize)]
pub struct CodeInterpreterInput {
    pub code: String,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(rename = "outputFile", default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn looks_like_javascript(code: &str) -> bool {
    let trimmed = code.trim_start();
    trimmed.starts_with("const ")
        || trimmed.starts_with("let ")
        || trimmed.starts_with("function ")
        || trimmed.starts_with("console.log")
        || trimmed.contains("=>")
        || trimmed.contains("require(")
}

pub async fn code_interpreter(
    ctx: &EngineContext,
    agent_dir: &Path,
    input: CodeInterpreterInput,
) -> Result<Value, ToolError> {
    if looks_like_javascript(&input.code) {
        return Err(ToolError::new(
            ToolErrorCode::ValidationFailed,
            "only Python source is accepted by this sandbox".to_string(),
            "rewrite the snippet in Python".to_string(),
            false,
        ));
    }

    let wrapped = wrap_source(&input.code);
    let timeout_ms = ctx.config.sandbox_timeout_ms;

    let outcome = tokio::time::timeout(
        std::time::Duration::from_millis(timeout_ms),
        ctx.sandbox.run_python(&wrapped, timeout_ms),
    )
    .await
    .map_err(|_| {
        ToolError::new(
            ToolErrorCode::CodeExecutionTimeout,
            format!("execution did not finish within {timeout_ms}ms"),
            "simplify the computation or split it across multiple calls".to_string(),
            true,
        )
    })?
    .map_err(map_sandbox_error)?;

    if let Some(error) = &outcome.error {
        return Err(ToolError::new(
            ToolErrorCode::CodeExecutionFailed,
            format!("{}: {}", error.name, error.value),
            "inspect the traceback and fix the snippet before retrying".to_string(),
            true,
        ));
    }

    let charts_dir = agent_dir.join("charts");
    let files = persist_artifacts(&charts_dir, &outcome, input.output_file.as_deref())
        .await
        .map_err(ToolError::from)?;

    Ok(serde_json::json!({
        "purpose": input.purpose,
        "stdout": outcome.logs.stdout,
        "stderr": outcome.logs.stderr,
        "text_results": outcome
            .results
            .iter()
            .filter_map(|r| r.text.clone())
            .collect::<Vec<_>>(),
        "files": files,
    }))
}

fn wrap_source(code: &str) -> String {
    let creates_figures = code.contains("plt.") || code.contains("pyplot");
    let epilogue = if creates_figures {
        "\nplt.show()\nplt.close('all')\n"
    } else {
        ""
    };
    format!("{PROLOGUE}{code}{epilogue}")
}

async fn persist_artifacts(
    charts_dir: &Path,
    outcome: &SandboxOutcome,
    output_file: Option<&str>,
) -> Result<Vec<Value>, DomainError> {
    let mut images: Vec<(&str, &str)> = Vec::new();
    for result in &outcome.results {
        if let Some(png) = &result.png {
            images.push((png.as_str(), "png"));
        }
        if let Some(jpeg) = &result.jpeg {
            images.push((jpeg.as_str(), "jpg"));
        }
    }

    if images.is_empty() {
        return Ok(Vec::new());
    }

    tokio::fs::create_dir_all(charts_dir).await?;

    let mut files = Vec::with_capacity(images.len());
    for (index, (encoded, ext)) in images.iter().enumerate() {
        let name = if images.len() == 1 {
            output_file
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("chart_{index}.{ext}"))
        } else {
            format!("chart_{index}.{ext}")
        };
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
            .map_err(|e| DomainError::Other(format!("invalid base64 artifact: {e}")))?;
        let dest = charts_dir.join(&name);
        tokio::fs::write(&dest, &bytes).await?;
        files.push(serde_json::json!({
            "path": format!("charts/{name}"),
            "type": "image",
            "content": "[image saved to disk]",
            "size": bytes.len(),
        }));
    }
    Ok(files)
}

fn map_sandbox_error(error: DomainError) -> ToolError {
    ToolError::new(
        ToolErrorCode::CodeSandboxError,
        error.to_string(),
        "the sandbox is unavailable; retry shortly or continue without it".to_string(),
        true,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_javascript_source() {
        assert!(looks_like_javascript("const x = 1;\nconsole.log(x)"));
        assert!(!looks_like_javascript("x = 1\nprint(x)"));
    }

    #[test]
    fn wraps_with_epilogue_only_when_figures_created() {
        let wrapped = wrap_source("import matplotlib.pyplot as plt\nplt.plot([1,2,3])");
        assert!(wrapped.contains("plt.show()"));
        let bare = wrap_source("print('hi')");
        assert!(!bare.contains("plt.show()"));
    }
}
