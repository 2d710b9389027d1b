use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::state::data::ImagePayload;

/// Longer edge of generated thumbnails
pub const THUMBNAIL_MAX_EDGE: u32 = 300;

/// Dimensions after uniform scaling so the longer edge equals `max_edge`.
///
/// `scale = max_edge / max(width, height)`, each side rounded and kept
/// at least 1 pixel. Small images are scaled up as well.
pub fn scaled_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest == 0 {
        return (max_edge.max(1), max_edge.max(1));
    }

    let scale = f64::from(max_edge) / f64::from(longest);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Resize an image so its longer edge equals `max_edge`, preserving aspect ratio
pub fn scale_to_max_edge(img: &DynamicImage, max_edge: u32) -> DynamicImage {
    let (width, height) = scaled_dimensions(img.width(), img.height(), max_edge);
    img.resize_exact(width, height, FilterType::Lanczos3)
}

/// Encode an image as PNG into a payload
pub fn encode_png(img: &DynamicImage) -> image::ImageResult<ImagePayload> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(ImagePayload::new(buffer.into_inner(), img.width(), img.height()))
}

/// Build the thumbnail payload for a decoded image.
/// Output is always 8-bit RGBA so high bit depth sources still encode as PNG.
pub fn generate_thumbnail(img: &DynamicImage, max_edge: u32) -> image::ImageResult<ImagePayload> {
    let scaled = scale_to_max_edge(img, max_edge);
    encode_png(&DynamicImage::ImageRgba8(scaled.to_rgba8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn assert_aspect_preserved(src: (u32, u32), dst: (u32, u32)) {
        // Rounding each side moves it by at most half a pixel
        let src_ratio = src.0 as f64 / src.1 as f64;
        let lo = (dst.0 as f64 - 0.5) / (dst.1 as f64 + 0.5);
        let hi = (dst.0 as f64 + 0.5) / (dst.1 as f64 - 0.5);
        assert!(
            src_ratio >= lo && src_ratio <= hi,
            "ratio {src_ratio} outside [{lo}, {hi}] for {src:?} -> {dst:?}"
        );
    }

    #[test]
    fn test_landscape_longer_edge_is_max() {
        assert_eq!(scaled_dimensions(1200, 800, 300), (300, 200));
    }

    #[test]
    fn test_portrait_longer_edge_is_max() {
        assert_eq!(scaled_dimensions(750, 1000, 300), (225, 300));
    }

    #[test]
    fn test_small_images_are_scaled_up() {
        assert_eq!(scaled_dimensions(100, 50, 300), (300, 150));
        assert_eq!(scaled_dimensions(1, 1, 300), (300, 300));
    }

    #[test]
    fn test_extreme_aspect_keeps_one_pixel() {
        assert_eq!(scaled_dimensions(10_000, 3, 300), (300, 1));
    }

    #[test]
    fn test_longer_edge_and_ratio_hold_across_sizes() {
        let sizes = [
            (4032, 3024),
            (3024, 4032),
            (1001, 999),
            (333, 777),
            (640, 480),
            (7, 13),
            (2500, 1),
        ];
        for (w, h) in sizes {
            let (tw, th) = scaled_dimensions(w, h, THUMBNAIL_MAX_EDGE);
            let longest = tw.max(th);
            assert!(
                longest.abs_diff(THUMBNAIL_MAX_EDGE) <= 1,
                "{w}x{h} scaled to {tw}x{th}"
            );
            if tw > 1 && th > 1 {
                assert_aspect_preserved((w, h), (tw, th));
            }
        }
    }

    #[test]
    fn test_scale_to_max_edge_resizes_pixels() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(900, 600));
        let thumb = scale_to_max_edge(&img, THUMBNAIL_MAX_EDGE);
        assert_eq!((thumb.width(), thumb.height()), (300, 200));
    }

    #[test]
    fn test_generate_thumbnail_round_trips_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(240, 480));
        let payload = generate_thumbnail(&img, THUMBNAIL_MAX_EDGE).unwrap();
        assert_eq!((payload.width(), payload.height()), (150, 300));

        let decoded = payload.decode().unwrap();
        assert_eq!((decoded.width(), decoded.height()), (150, 300));
    }
}
