//! QR rendering of pairing payloads.

use std::io::Cursor;

use {
    image::{GrayImage, Luma},
    qrcode::{Color, QrCode},
};

use wamux_sessions::SessionError;

/// Pixels per QR module.
const SCALE: u32 = 8;
/// Quiet-zone width in modules on each side.
const QUIET_ZONE: u32 = 4;

/// Render a pairing payload as a PNG image.
pub fn render_png(payload: &str) -> Result<Vec<u8>, SessionError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| SessionError::Internal(format!("qr encoding failed: {e}")))?;

    let modules = code.width() as u32;
    let colors = code.to_colors();
    let size = (modules + 2 * QUIET_ZONE) * SCALE;

    let img = GrayImage::from_fn(size, size, |x, y| {
        let mx = (x / SCALE).checked_sub(QUIET_ZONE);
        let my = (y / SCALE).checked_sub(QUIET_ZONE);
        let dark = match (mx, my) {
            (Some(mx), Some(my)) if mx < modules && my < modules => {
                colors[(my * modules + mx) as usize] == Color::Dark
            },
            _ => false,
        };
        if dark { Luma([0u8]) } else { Luma([255u8]) }
    });

    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| SessionError::Internal(format!("png encoding failed: {e}")))?;
    Ok(png.into_inner())
}
