//! Image to PDF conversion.
//!
//! Decodes any supported raster image, flattens it to 8-bit RGB (dropping
//! alpha and palette information) and embeds it as a single PDF page sized
//! for a fixed resolution.

use std::path::Path;

use crate::error::MediaError;
use crate::media::pdf;
use crate::media::temp::{TempResource, TempStore};
use crate::media::ConversionResult;

/// Rendering resolution of the produced page.
pub const DEFAULT_DPI: f32 = 100.0;

/// JPEG quality used when re-encoding the RGB raster.
const JPEG_QUALITY: u8 = 90;

/// Converts images into single-page PDF documents.
pub struct ImageToDocument {
    temp: TempStore,
    dpi: f32,
}

impl ImageToDocument {
    pub fn new(temp: TempStore) -> Self {
        Self {
            temp,
            dpi: DEFAULT_DPI,
        }
    }

    /// Override the page resolution.
    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    pub async fn convert(&self, source: &Path) -> ConversionResult {
        match self.render(source).await {
            Ok(doc) => ConversionResult::Document(doc),
            Err(e) => ConversionResult::from_error(&e),
        }
    }

    async fn render(&self, source: &Path) -> Result<TempResource, MediaError> {
        let data = tokio::fs::read(source).await?;
        let dpi = self.dpi;

        let pdf_bytes = tokio::task::spawn_blocking(move || image_to_pdf(&data, dpi))
            .await
            .map_err(|e| MediaError::Decode {
                reason: format!("render task failed: {}", e),
            })??;

        let output = self.temp.acquire("pdf")?;
        tokio::fs::write(output.path(), &pdf_bytes).await?;
        tracing::debug!(
            bytes = pdf_bytes.len(),
            path = %output.path().display(),
            "Rendered image to PDF"
        );
        Ok(output)
    }
}

/// Decode `data`, normalize to RGB and wrap it in a one-page PDF.
pub fn image_to_pdf(data: &[u8], dpi: f32) -> Result<Vec<u8>, MediaError> {
    let decoded = image::load_from_memory(data).map_err(|e| MediaError::Decode {
        reason: e.to_string(),
    })?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| MediaError::Decode {
            reason: format!("failed to re-encode as JPEG: {}", e),
        })?;

    pdf::jpeg_to_pdf(jpeg, width, height, dpi)
}
