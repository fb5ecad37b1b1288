//! Server-side drawing surface
//!
//! The browser captures strokes and uploads the raster as a data URL; the
//! surface keeps the latest one so analysis can export it at any time.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// 1x1 white PNG, exported when nothing has been drawn yet
const BLANK_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mP8/x8AAwMCAO+ip1sAAAAASUVORK5CYII=";

/// An encoded raster image as a `data:image/...;base64,` URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanvasImage(String);

impl CanvasImage {
    /// Validate a data URL coming from the client
    pub fn from_data_url(url: String, max_bytes: usize) -> Result<Self, String> {
        if url.len() > max_bytes {
            return Err(format!(
                "snapshot is {} bytes, limit is {}",
                url.len(),
                max_bytes
            ));
        }

        let (header, payload) = url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or_else(|| "snapshot must be a data URL".to_string())?;

        if !header.starts_with("image/") || !header.ends_with(";base64") {
            return Err(format!("unsupported snapshot encoding '{}'", header));
        }

        if STANDARD.decode(payload).is_err() {
            return Err("snapshot payload is not valid base64".to_string());
        }

        Ok(Self(url))
    }

    pub fn from_png_bytes(bytes: &[u8]) -> Self {
        Self(format!("data:image/png;base64,{}", STANDARD.encode(bytes)))
    }

    pub fn blank() -> Self {
        Self(format!("data:image/png;base64,{}", BLANK_PNG_BASE64))
    }

    pub fn as_data_url(&self) -> &str {
        &self.0
    }
}

/// Result of handing a stroke to the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeOutcome {
    /// Surface is disabled, the stroke was dropped
    Rejected,
    /// First stroke since the last clear (the draw-start notification)
    Started,
    Continued,
}

/// Contract between the session controller and the drawing surface
#[async_trait]
pub trait DrawingSurface: Send + Sync {
    async fn clear(&self);

    /// Latest raster, or a blank canvas when nothing has been drawn
    async fn export_image(&self) -> CanvasImage;

    async fn set_enabled(&self, enabled: bool);

    async fn is_enabled(&self) -> bool;

    /// Accept a raster update from the client
    async fn apply_stroke(&self, image: CanvasImage) -> StrokeOutcome;
}

#[derive(Debug, Default)]
struct CanvasState {
    enabled: bool,
    latest: Option<CanvasImage>,
}

/// Drawing surface that keeps the most recent snapshot in memory
#[derive(Debug, Default)]
pub struct SnapshotCanvas {
    state: RwLock<CanvasState>,
}

impl SnapshotCanvas {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DrawingSurface for SnapshotCanvas {
    async fn clear(&self) {
        self.state.write().await.latest = None;
    }

    async fn export_image(&self) -> CanvasImage {
        self.state
            .read()
            .await
            .latest
            .clone()
            .unwrap_or_else(CanvasImage::blank)
    }

    async fn set_enabled(&self, enabled: bool) {
        self.state.write().await.enabled = enabled;
    }

    async fn is_enabled(&self) -> bool {
        self.state.read().await.enabled
    }

    async fn apply_stroke(&self, image: CanvasImage) -> StrokeOutcome {
        let mut state = self.state.write().await;
        if !state.enabled {
            return StrokeOutcome::Rejected;
        }
        let first = state.latest.replace(image).is_none();
        if first {
            StrokeOutcome::Started
        } else {
            StrokeOutcome::Continued
        }
    }
}
