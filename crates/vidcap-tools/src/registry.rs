use std::collections::HashMap;
use std::sync::Arc;

use vidcap_core::tools::{Tool, ToolDefinition};

/// Upstream service a registered tool forwards to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolSource {
    Vidcap,
    ScreenshotOne,
}

struct ToolEntry {
    tool: Arc<dyn Tool>,
    source: ToolSource,
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. A later registration under the same name replaces
    /// the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>, source: ToolSource) {
        let name = tool.name().to_string();
        self.tools.insert(name, ToolEntry { tool, source });
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|e| Arc::clone(&e.tool))
    }

    pub fn source(&self, name: &str) -> Option<ToolSource> {
        self.tools.get(name).map(|e| e.source)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Definitions advertised by `tools/list`, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|e| e.tool.to_definition())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vidcap_core::tools::{ToolContext, ToolError, ToolOutput};

    struct DummyTool {
        name: String,
    }

    impl DummyTool {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
            }
        }
    }

    #[async_trait]
    impl Tool for DummyTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "A dummy tool for testing"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _args: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text("ok"))
        }
    }

    #[test]
    fn register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(DummyTool::new("youtube_getInfo")), ToolSource::Vidcap);

        assert!(registry.contains("youtube_getInfo"));
        assert!(!registry.contains("youtube_search"));
        assert_eq!(registry.count(), 1);
        assert!(registry.get("youtube_getInfo").is_some());
        assert_eq!(registry.source("youtube_getInfo"), Some(ToolSource::Vidcap));
    }

    #[test]
    fn re_register_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(DummyTool::new("take_screenshot")), ToolSource::Vidcap);
        registry.register(Arc::new(DummyTool::new("take_screenshot")), ToolSource::ScreenshotOne);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.source("take_screenshot"), Some(ToolSource::ScreenshotOne));
    }

    #[test]
    fn names_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(DummyTool::new("youtube_search")), ToolSource::Vidcap);
        registry.register(Arc::new(DummyTool::new("take_screenshot")), ToolSource::ScreenshotOne);
        registry.register(Arc::new(DummyTool::new("youtube_getInfo")), ToolSource::Vidcap);

        assert_eq!(
            registry.names(),
            vec!["take_screenshot", "youtube_getInfo", "youtube_search"]
        );
    }

    #[test]
    fn definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(DummyTool::new("b")), ToolSource::Vidcap);
        registry.register(Arc::new(DummyTool::new("a")), ToolSource::Vidcap);

        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "a");
        assert_eq!(defs[1].name, "b");
        assert_eq!(defs[0].input_schema["type"], "object");
    }
}
