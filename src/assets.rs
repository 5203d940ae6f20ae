//! Image assets for the UI: decode from disk or HTTP and hand the pixels to
//! the texture registry. URL loads are cached so a panel can request the same
//! image every frame without re-fetching.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::render::textures::{SamplingMode, TextureHandle, TextureRegistry};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A texture the UI can draw, with its pixel dimensions for sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedTexture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

impl LoadedTexture {
    pub fn size_vec2(&self) -> egui::Vec2 {
        egui::vec2(self.width as f32, self.height as f32)
    }

    pub fn texture_id(&self) -> egui::TextureId {
        egui::TextureId::User(self.handle)
    }
}

/// Decode any supported image format into a top-left-origin RGBA8 buffer.
pub fn decode_image(bytes: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let image = image::load_from_memory(bytes).context("decoding image")?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok((rgba.into_raw(), width, height))
}

#[derive(Default)]
pub struct AssetLoader {
    url_cache: HashMap<String, LoadedTexture>,
    client: Option<Client>,
}

impl AssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_file(
        &mut self,
        registry: &mut TextureRegistry,
        path: &Path,
    ) -> Result<LoadedTexture> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading image {}", path.display()))?;
        let (pixels, width, height) = decode_image(&bytes)?;
        let handle = registry.upload(&pixels, width, height, SamplingMode::Linear);
        info!(path = %path.display(), width, height, handle, "loaded image file");
        Ok(LoadedTexture {
            handle,
            width,
            height,
        })
    }

    /// Fetch and upload an image over HTTP. Repeat requests for the same URL
    /// return the cached handle.
    pub fn load_url(
        &mut self,
        registry: &mut TextureRegistry,
        url: &str,
    ) -> Result<LoadedTexture> {
        if let Some(cached) = self.url_cache.get(url) {
            debug!(url, handle = cached.handle, "image cache hit");
            return Ok(*cached);
        }

        if self.client.is_none() {
            let client = Client::builder()
                .user_agent("overlay-renderer asset loader")
                .timeout(HTTP_TIMEOUT)
                .build()?;
            self.client = Some(client);
        }
        let client = self.client.as_ref().expect("client initialised above");

        let response = client
            .get(url)
            .send()
            .with_context(|| format!("fetching {url}"))?
            .error_for_status()?;
        let bytes = response.bytes()?;
        let (pixels, width, height) = decode_image(&bytes)?;
        let handle = registry.upload(&pixels, width, height, SamplingMode::Linear);
        info!(url, width, height, handle, "loaded image url");

        let loaded = LoadedTexture {
            handle,
            width,
            height,
        };
        self.url_cache.insert(url.to_string(), loaded);
        Ok(loaded)
    }

    /// Drop a cached URL entry and its texture.
    pub fn evict_url(&mut self, registry: &mut TextureRegistry, url: &str) {
        if let Some(loaded) = self.url_cache.remove(url) {
            registry.destroy(loaded.handle);
        }
    }
}
