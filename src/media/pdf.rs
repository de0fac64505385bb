//! Single-page PDF assembly.
//!
//! Wraps one baseline JPEG as a DCTDecode image XObject that fills a page.
//! The JPEG bytes are embedded as-is, so no pixel data is re-encoded here.

use lopdf::{Document, Object, Stream, dictionary};

use crate::error::MediaError;

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f32 = 72.0;

/// Physical page size for an image of `pixels` at `dpi`, in points.
pub fn page_extent(pixels: u32, dpi: f32) -> f32 {
    pixels as f32 * POINTS_PER_INCH / dpi
}

/// Build a one-page PDF showing an RGB JPEG of `width` x `height` pixels.
pub fn jpeg_to_pdf(jpeg: Vec<u8>, width: u32, height: u32, dpi: f32) -> Result<Vec<u8>, MediaError> {
    if width == 0 || height == 0 {
        return Err(MediaError::Decode {
            reason: format!("image has empty dimensions {}x{}", width, height),
        });
    }

    let page_w = page_extent(width, dpi);
    let page_h = page_extent(height, dpi);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "DCTDecode",
        },
        jpeg,
    )
    .with_compression(false);
    let image_id = doc.add_object(image);

    let content = format!("q\n{:.4} 0 0 {:.4} 0 0 cm\n/Im0 Do\nQ\n", page_w, page_h);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1_i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| MediaError::Decode {
        reason: format!("failed to write PDF: {}", e),
    })?;
    Ok(out)
}
