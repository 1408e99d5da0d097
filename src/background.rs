//! Optional user picture behind everything, darkened toward the bottom so the
//! controls stay readable.
use image::{RgbaImage, imageops::FilterType};
use ratatui::{buffer::Buffer, layout::Rect, style::Color};

use crate::{
    error::ImageLoadError,
    store::Blob,
    visualizer::{Rgba, UPPER_HALF},
};

#[derive(Default)]
pub struct Background {
    picture: Option<RgbaImage>,
    // picture scaled to the last area it was drawn into
    scaled: Option<((u16, u16), RgbaImage)>,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn has_picture(&self) -> bool {
        self.picture.is_some()
    }

    /// Decodes `blob`. On failure the current picture is kept.
    pub fn set_from_blob(&mut self, blob: Option<Blob>) -> Result<(), ImageLoadError> {
        let blob = blob.ok_or(ImageLoadError::Revoked)?;
        let picture = image::load_from_memory(&blob)?.to_rgba8();
        self.picture = Some(picture);
        self.scaled = None;
        Ok(())
    }

    pub fn render(&mut self, area: Rect, buf: &mut Buffer, fallback: Color) {
        if area.is_empty() {
            return;
        }
        let base = Rgba::from_color(fallback);
        let size = (area.width, area.height);
        let rows = u32::from(area.height) * 2;
        if let Some(picture) = &self.picture {
            if self.scaled.as_ref().is_none_or(|(cached, _)| *cached != size) {
                let resized = image::imageops::resize(picture, u32::from(area.width), rows, FilterType::Triangle);
                self.scaled = Some((size, resized));
            }
        }
        let scaled = self.scaled.as_ref().map(|(_, img)| img);

        for row in 0..area.height {
            for col in 0..area.width {
                let pixel = |y: u32| {
                    let color = scaled.map_or(base, |img| {
                        let [r, g, b, _] = img.get_pixel(u32::from(col), y).0;
                        Rgba::opaque(r, g, b)
                    });
                    darken(color, shade(y, rows)).to_color()
                };
                let y = u32::from(row) * 2;
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_symbol(UPPER_HALF).set_fg(pixel(y)).set_bg(pixel(y + 1));
                }
            }
        }
    }
}

/// Overlay darkness at pixel row `y`: clear at the top, 60% by the middle, black at the bottom.
fn shade(y: u32, rows: u32) -> f32 {
    let t = (y as f32 + 0.5) / rows.max(1) as f32;
    if t < 0.5 { t * 2.0 * 0.6 } else { 0.6 + (t - 0.5) * 2.0 * 0.4 }
}

fn darken(color: Rgba, amount: f32) -> Rgba {
    let keep = 1.0 - amount.clamp(0.0, 1.0);
    Rgba::new(color.r * keep, color.g * keep, color.b * keep, 1.0)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba as Px};

    use super::*;

    fn png(color: [u8; 4]) -> Blob {
        let img = RgbaImage::from_pixel(4, 4, Px(color));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Png).unwrap();
        Blob::from(bytes.into_inner())
    }

    #[test]
    fn broken_images_keep_the_previous_picture() {
        let mut bg = Background::new();
        bg.set_from_blob(Some(png([255, 0, 0, 255]))).unwrap();
        assert!(bg.has_picture());

        let err = bg.set_from_blob(Some(Blob::from(&b"not a png"[..])));
        assert!(matches!(err, Err(ImageLoadError::Decode(_))));
        assert!(bg.has_picture());

        assert!(matches!(bg.set_from_blob(None), Err(ImageLoadError::Revoked)));
        assert!(bg.has_picture());
    }

    #[test]
    fn top_rows_are_brighter_than_bottom_rows() {
        let mut bg = Background::new();
        bg.set_from_blob(Some(png([200, 200, 200, 255]))).unwrap();
        let area = Rect::new(0, 0, 3, 4);
        let mut buf = Buffer::empty(area);
        bg.render(area, &mut buf, Color::Black);

        let red = |c: Color| match c {
            Color::Rgb(r, _, _) => r,
            _ => 0,
        };
        let top = red(buf[(1, 0)].fg);
        let bottom = red(buf[(1, 3)].bg);
        assert!(top > 150, "{top}");
        assert!(bottom < 20, "{bottom}");
    }

    #[test]
    fn without_a_picture_the_theme_colour_is_used() {
        let mut bg = Background::new();
        let area = Rect::new(0, 0, 1, 1);
        let mut buf = Buffer::empty(area);
        bg.render(area, &mut buf, Color::Rgb(100, 100, 100));
        assert!(matches!(buf[(0, 0)].fg, Color::Rgb(r, _, _) if r > 60));
    }
}
