//! `view_image` tool: resolves an image path relative to the agent
//! directory, base64-encodes it, and hands back a multimodal message for
//! the sub-agent loop to append to its own chat history.

use std::path::Path;

use base64::Engine;
use dr_domain::message::Message;
use dr_domain::tool_error::{ToolError, ToolErrorCode};
use serde::Deserialize;
use serde_json::Value;

use dr_workspace::validate_path;

#[derive(Debug, Deserialize)]
pub struct ViewImageInput {
    #[serde(rename = "imagePath")]
    pub image_path: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct ViewImageOutcome {
    pub tool_result: Value,
    pub followup_message: Message,
}

fn media_type_for(path: &str) -> &'static str {
    let lower = path.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

pub async fn view_image(agent_dir: &Path, input: ViewImageInput) -> Result<ViewImageOutcome, ToolError> {
    let resolved = validate_path(agent_dir, &input.image_path)?;
    let bytes = tokio::fs::read(&resolved)
        .await
        .map_err(|_| ToolError::new(
            ToolErrorCode::ImageNotFound,
            format!("no image at {}", input.image_path),
            "check the chart path returned by code_interpreter".to_string(),
            false,
        ))?;

    let media_type = media_type_for(&input.image_path);
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    let data_url = format!("data:{media_type};base64,{encoded}");

    let prompt = input
        .question
        .clone()
        .unwrap_or_else(|| format!("Here is the image at {}.", input.image_path));
    let followup_message = Message::user_with_image(prompt, data_url, media_type);

    Ok(ViewImageOutcome {
        tool_result: serde_json::json!({
            "path": input.image_path,
            "viewed": true,
            "size": bytes.len(),
        }),
        followup_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn media_type_detected_from_extension() {
        assert_eq!(media_type_for("charts/chart_0.png"), "image/png");
        assert_eq!(media_type_for("charts/chart_0.jpg"), "image/jpeg");
        assert_eq!(media_type_for("charts/chart_0.bin"), "application/octet-stream");
    }

    #[tokio::test]
    async fn missing_image_returns_image_not_found() {
        let dir = TempDir::new().unwrap();
        let input = ViewImageInput {
            image_path: "charts/missing.png".to_string(),
            question: None,
            description: None,
        };
        let err = view_image(dir.path(), input).await.unwrap_err();
        assert_eq!(err.error_code, ToolErrorCode::ImageNotFound);
    }

    #[tokio::test]
    async fn existing_image_is_encoded() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("charts")).unwrap();
        std::fs::write(dir.path().join("charts/chart_0.png"), b"\x89PNG\r\n").unwrap();
        let input = ViewImageInput {
            image_path: "charts/chart_0.png".to_string(),
            question: Some("what trend does this show?".to_string()),
            description: None,
        };
        let outcome = view_image(dir.path(), input).await.unwrap();
        assert_eq!(outcome.tool_result["viewed"], true);
    }
}
