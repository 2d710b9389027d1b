//! The fixed "broken image" asset
//!
//! Substituted for both the full image and the thumbnail whenever a
//! download fails or returns bytes that do not decode.

use image::{DynamicImage, Rgba, RgbaImage};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::error;

use super::thumbnail::encode_png;
use crate::state::data::{ImagePair, ImagePayload};

const BACKGROUND: Rgba<u8> = Rgba([224, 224, 224, 255]);
const FRAME: Rgba<u8> = Rgba([160, 160, 160, 255]);
const CROSS: Rgba<u8> = Rgba([200, 48, 48, 255]);

/// Border and cross stroke width in pixels
const STROKE: u32 = 6;

/// Largest placeholder ever drawn
const MAX_EDGE: u32 = 1024;

/// Encoded placeholders keyed by edge length
static PLACEHOLDERS: Lazy<Mutex<HashMap<u32, ImagePayload>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn placeholder_payload(edge: u32) -> ImagePayload {
    let edge = edge.min(MAX_EDGE);
    let mut rendered = PLACEHOLDERS.lock().unwrap_or_else(|e| e.into_inner());
    rendered.entry(edge).or_insert_with(|| render(edge)).clone()
}

fn render(edge: u32) -> ImagePayload {
    let img = DynamicImage::ImageRgba8(draw_broken_image(edge));
    match encode_png(&img) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to encode placeholder image: {}", e);
            ImagePayload::new(Vec::new(), img.width(), img.height())
        }
    }
}

/// Placeholder used for both halves of the pair, drawn `edge` pixels square
pub fn placeholder_pair(edge: u32) -> ImagePair {
    let payload = placeholder_payload(edge);
    ImagePair {
        full: payload.clone(),
        thumbnail: payload,
    }
}

/// True if the payload is the placeholder asset at any edge length
pub fn is_placeholder(payload: &ImagePayload) -> bool {
    payload.width() == payload.height()
        && payload.width() <= MAX_EDGE
        && *payload == placeholder_payload(payload.width())
}

/// Grey tile with a frame and a red diagonal cross
fn draw_broken_image(size: u32) -> RgbaImage {
    let size = size.max(STROKE * 2 + 1);
    RgbaImage::from_fn(size, size, |x, y| {
        let on_frame = x < STROKE || y < STROKE || x >= size - STROKE || y >= size - STROKE;
        let on_cross = x.abs_diff(y) < STROKE / 2 || (x + y).abs_diff(size - 1) < STROKE / 2;
        if on_frame {
            FRAME
        } else if on_cross {
            CROSS
        } else {
            BACKGROUND
        }
    })
}
