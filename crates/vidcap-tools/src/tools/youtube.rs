use async_trait::async_trait;
use serde_json::{json, Map, Value};
use vidcap_api::{to_query_pairs, Endpoint, VidcapApi};
use vidcap_core::tools::{Tool, ToolContext, ToolError, ToolOutput};

/// Static description of one VidCap-backed tool.
pub struct YoutubeToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub endpoint: Endpoint,
    /// At least one of these arguments must be a non-empty string.
    pub one_of: &'static [&'static str],
    schema: fn() -> Value,
}

pub const YOUTUBE_TOOLS: [YoutubeToolDef; 8] = [
    YoutubeToolDef {
        name: "youtube_getInfo",
        description: "Get and save YouTube video information. Provide a YouTube video URL.",
        endpoint: Endpoint::Info,
        one_of: &["url"],
        schema: info_schema,
    },
    YoutubeToolDef {
        name: "youtube_getMedia",
        description: "Get available media formats for a YouTube video. Provide a YouTube video URL.",
        endpoint: Endpoint::Media,
        one_of: &["url"],
        schema: media_schema,
    },
    YoutubeToolDef {
        name: "youtube_getCaption",
        description: "Get video captions/transcript. Provide a YouTube video URL and optionally locale, model, and extension.",
        endpoint: Endpoint::Caption,
        one_of: &["url"],
        schema: caption_schema,
    },
    YoutubeToolDef {
        name: "youtube_getSummary",
        description: "Get AI-generated summary of video content. Provide a YouTube video URL and optionally locale, model, screenshot flag, and cache preference.",
        endpoint: Endpoint::Summary,
        one_of: &["url"],
        schema: summary_schema,
    },
    YoutubeToolDef {
        name: "youtube_getScreenshot",
        description: "Get screenshot from video at specific timestamp. Provide a YouTube video URL and optionally a timestamp (in seconds or YouTube format).",
        endpoint: Endpoint::Screenshot,
        one_of: &["url"],
        schema: screenshot_schema,
    },
    YoutubeToolDef {
        name: "youtube_getScreenshotMultiple",
        description: "Get multiple screenshots from video at different timestamps. Provide a YouTube video URL and an array of timestamps.",
        endpoint: Endpoint::ScreenshotMultiple,
        one_of: &["url"],
        schema: screenshot_multiple_schema,
    },
    YoutubeToolDef {
        name: "youtube_getComments",
        description: "Get YouTube video comments with optional pagination and replies. Provide a YouTube video ID.",
        endpoint: Endpoint::Comments,
        one_of: &["url", "videoId"],
        schema: comments_schema,
    },
    YoutubeToolDef {
        name: "youtube_search",
        description: "Search YouTube videos with query and optional filters. Provide search query and optional parameters for pagination and filtering.",
        endpoint: Endpoint::Search,
        one_of: &["query"],
        schema: search_schema,
    },
];

/// A tool that forwards its arguments to one VidCap endpoint using the
/// caller's cached client.
pub struct YoutubeTool {
    def: &'static YoutubeToolDef,
    api: VidcapApi,
}

impl YoutubeTool {
    pub fn new(def: &'static YoutubeToolDef, api: VidcapApi) -> Self {
        Self { def, api }
    }
}

#[async_trait]
impl Tool for YoutubeTool {
    fn name(&self) -> &str {
        self.def.name
    }

    fn description(&self) -> &str {
        self.def.description
    }

    fn input_schema(&self) -> Value {
        (self.def.schema)()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let args = prepare_args(args, &self.input_schema(), self.def.one_of)?;
        tracing::debug!(tool = self.def.name, params = args.len(), "calling VidCap");

        let body = self
            .api
            .call(self.def.endpoint, &to_query_pairs(&args))
            .await
            .map_err(|e| {
                tracing::warn!(tool = self.def.name, kind = e.error_kind(), error = %e, "VidCap call failed");
                ToolError::from(e)
            })?;

        let payload = match body.get("data") {
            Some(data) => data,
            None => &body,
        };
        Ok(ToolOutput::text(payload.to_string()))
    }
}

/// Validate that `args` is an object carrying one of `one_of`, and fill in
/// schema defaults for absent properties.
fn prepare_args(
    args: Value,
    schema: &Value,
    one_of: &[&str],
) -> Result<Map<String, Value>, ToolError> {
    let mut args = match args {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => return Err(ToolError::InvalidArguments("arguments must be an object".into())),
    };

    let present = one_of.iter().any(|key| {
        args.get(*key)
            .and_then(Value::as_str)
            .is_some_and(|v| !v.trim().is_empty())
    });
    if !present {
        return Err(ToolError::InvalidArguments(format!(
            "{} is required",
            one_of.join(" or ")
        )));
    }

    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (key, prop) in props {
            if let Some(default) = prop.get("default") {
                args.entry(key.clone()).or_insert_with(|| default.clone());
            }
        }
    }
    Ok(args)
}

fn url_property() -> Value {
    json!({"type": "string", "format": "uri", "description": "YouTube video URL"})
}

fn info_schema() -> Value {
    json!({
        "type": "object",
        "required": ["url"],
        "properties": {
            "url": url_property(),
            "cache": {"type": "boolean", "default": true, "description": "Use cached result when available"}
        }
    })
}

fn media_schema() -> Value {
    json!({
        "type": "object",
        "required": ["url"],
        "properties": { "url": url_property() }
    })
}

fn caption_schema() -> Value {
    json!({
        "type": "object",
        "required": ["url"],
        "properties": {
            "url": url_property(),
            "locale": {"type": "string", "default": "en"},
            "model": {"type": "string"},
            "ext": {"type": "string", "enum": ["json3", "srv1", "srv2", "srv3", "ttml", "vtt"]}
        }
    })
}

fn summary_schema() -> Value {
    json!({
        "type": "object",
        "required": ["url"],
        "properties": {
            "url": url_property(),
            "locale": {"type": "string", "default": "en"},
            "model": {"type": "string"},
            "screenshot": {"type": "string", "default": "0", "description": "'1' to include screenshots"},
            "cache": {"type": "boolean"}
        }
    })
}

fn screenshot_schema() -> Value {
    json!({
        "type": "object",
        "required": ["url"],
        "properties": {
            "url": url_property(),
            "second": {"type": "string", "default": "0", "description": "Timestamp in seconds or YouTube format"}
        }
    })
}

fn screenshot_multiple_schema() -> Value {
    json!({
        "type": "object",
        "required": ["url"],
        "properties": {
            "url": url_property(),
            "second": {"type": "array", "items": {"type": "string"}, "default": ["0"]}
        }
    })
}

fn comments_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "url": url_property(),
            "videoId": {"type": "string", "description": "YouTube video ID"},
            "order": {"type": "string", "enum": ["time", "relevance"]},
            "format": {"type": "string", "enum": ["plainText", "html"]},
            "pageToken": {"type": "string"},
            "includeReplies": {"type": "boolean"},
            "hl": {"type": "string"}
        }
    })
}

fn search_schema() -> Value {
    json!({
        "type": "object",
        "required": ["query"],
        "properties": {
            "query": {"type": "string", "description": "Search query"},
            "maxResults": {"type": "integer", "minimum": 1, "maximum": 50},
            "order": {"type": "string", "enum": ["date", "rating", "relevance", "title", "viewCount"]},
            "publishedAfter": {"type": "string", "format": "date-time"},
            "publishedBefore": {"type": "string", "format": "date-time"},
            "videoDuration": {"type": "string", "enum": ["any", "long", "medium", "short"]},
            "videoDefinition": {"type": "string", "enum": ["any", "high", "standard"]},
            "pageToken": {"type": "string"}
        }
    })
}
