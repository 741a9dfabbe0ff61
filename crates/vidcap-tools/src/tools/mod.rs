pub mod screenshot;
pub mod youtube;

use std::sync::Arc;

use vidcap_api::{ScreenshotApi, VidcapApi};

use crate::registry::{ToolRegistry, ToolSource};

/// Create a ToolRegistry with every provider tool.
pub fn create_default_registry(vidcap: VidcapApi, screenshots: Arc<ScreenshotApi>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    for def in &youtube::YOUTUBE_TOOLS {
        registry.register(
            Arc::new(youtube::YoutubeTool::new(def, vidcap.clone())),
            ToolSource::Vidcap,
        );
    }

    registry.register(
        Arc::new(screenshot::TakeScreenshotTool::new(screenshots)),
        ToolSource::ScreenshotOne,
    );

    tracing::debug!(count = registry.count(), "tools registered");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vidcap_api::{ClientCache, ClientConfig};

    #[test]
    fn default_registry_has_all_tools() {
        let vidcap = VidcapApi::new(Arc::new(ClientCache::new(ClientConfig::default())));
        let screenshots =
            Arc::new(ScreenshotApi::new("http://localhost:1", None, Duration::from_secs(1)).unwrap());
        let registry = create_default_registry(vidcap, screenshots);

        assert_eq!(registry.count(), 9);
        assert_eq!(
            registry.names(),
            vec![
                "take_screenshot",
                "youtube_getCaption",
                "youtube_getComments",
                "youtube_getInfo",
                "youtube_getMedia",
                "youtube_getScreenshot",
                "youtube_getScreenshotMultiple",
                "youtube_getSummary",
                "youtube_search",
            ]
        );
        assert_eq!(registry.source("take_screenshot"), Some(ToolSource::ScreenshotOne));
    }
}
