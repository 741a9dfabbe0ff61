use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use vidcap_api::{mime_type_for, Screenshot, ScreenshotApi};
use vidcap_core::tools::{Content, Tool, ToolContext, ToolError, ToolOutput};

pub struct TakeScreenshotTool {
    api: Arc<ScreenshotApi>,
}

impl TakeScreenshotTool {
    pub fn new(api: Arc<ScreenshotApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for TakeScreenshotTool {
    fn name(&self) -> &str {
        "take_screenshot"
    }

    fn description(&self) -> &str {
        "Takes a screenshot of a webpage or HTML content.\n\
         Requires either a URL or HTML content.\n\
         Returns the screenshot as an image or JSON with metadata.\n\
         Supports a wide range of customization options including viewport size, format, selectors, and more."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "URL of the webpage to take a screenshot of"},
                "html": {"type": "string", "description": "HTML content to render and take a screenshot of"},
                "access_key": {"type": "string", "description": "Your ScreenshotOne access key"},
                "format": {"type": "string", "enum": ["png", "jpeg", "jpg", "webp", "pdf"], "description": "Output format of the screenshot"},
                "response_type": {"type": "string", "enum": ["by_format", "empty", "json"]},
                "viewport_width": {"type": "integer"},
                "viewport_height": {"type": "integer"},
                "viewport_device": {"type": "string", "description": "Emulate specific device (e.g., \"iPhone X\")"},
                "device_scale_factor": {"type": "number"},
                "viewport_mobile": {"type": "boolean"},
                "full_page": {"type": "boolean", "description": "Capture full page screenshot"},
                "full_page_scroll": {"type": "boolean"},
                "full_page_scroll_delay": {"type": "integer"},
                "selector": {"type": "string", "description": "CSS selector to capture specific element"},
                "selector_scroll_into_view": {"type": "boolean"},
                "image_quality": {"type": "integer", "minimum": 1, "maximum": 100},
                "image_width": {"type": "integer"},
                "image_height": {"type": "integer"},
                "omit_background": {"type": "boolean"},
                "clip_x": {"type": "integer"},
                "clip_y": {"type": "integer"},
                "clip_width": {"type": "integer"},
                "clip_height": {"type": "integer"},
                "wait_until": {"type": "array", "items": {"type": "string", "enum": ["load", "domcontentloaded", "networkidle0", "networkidle2"]}},
                "delay": {"type": "integer"},
                "timeout": {"type": "integer"},
                "wait_for_selector": {"type": "string"},
                "block_ads": {"type": "boolean"},
                "block_trackers": {"type": "boolean"},
                "block_cookie_banners": {"type": "boolean"},
                "hide_selectors": {"type": "array", "items": {"type": "string"}},
                "styles": {"type": "string"},
                "scripts": {"type": "string"},
                "cache": {"type": "boolean"},
                "cache_ttl": {"type": "integer"},
                "pdf_landscape": {"type": "boolean"},
                "pdf_paper_format": {"type": "string", "enum": ["a0", "a1", "a2", "a3", "a4", "a5", "a6", "legal", "letter", "tabloid"]},
                "pdf_print_background": {"type": "boolean"},
                "pdf_fit_one_page": {"type": "boolean"}
            }
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let Value::Object(options) = args else {
            return Err(ToolError::InvalidArguments("arguments must be an object".into()));
        };

        let has = |key: &str| {
            options
                .get(key)
                .and_then(Value::as_str)
                .is_some_and(|v| !v.is_empty())
        };
        if !has("url") && !has("html") {
            return Err(ToolError::InvalidArguments("either url or html is required".into()));
        }

        let format = options
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or("png")
            .to_string();

        tracing::debug!(
            html = has("html"),
            format = %format,
            "taking screenshot"
        );

        match self.api.take(options).await? {
            Screenshot::Json(body) => Ok(ToolOutput::text(body.to_string())),
            Screenshot::Binary { bytes, content_type } => {
                let mime_type = content_type
                    .filter(|ct| ct.starts_with("image/") || ct == "application/pdf")
                    .unwrap_or_else(|| mime_type_for(&format).to_string());
                Ok(ToolOutput {
                    content: vec![Content::Image {
                        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
                        mime_type,
                    }],
                    is_error: false,
                })
            }
        }
    }
}
