use ratatui::{buffer::Buffer, layout::Rect, style::Color, widgets::Widget};

use super::canvas::{Canvas, Rgba};

pub(crate) const UPPER_HALF: &str = "▀";

/// Paints a canvas into terminal cells, two pixels per cell (upper half block),
/// over whatever was drawn there before.
pub struct CanvasView<'a> {
    canvas: &'a Canvas,
    backdrop: Rgba,
}

impl<'a> CanvasView<'a> {
    pub fn new(canvas: &'a Canvas, backdrop: Color) -> Self {
        Self {
            canvas,
            backdrop: Rgba::from_color(backdrop),
        }
    }

    /// Premultiplied average of the canvas pixels under one output pixel.
    fn sample(&self, px: u32, py: u32, out_w: u32, out_h: u32) -> (f32, f32, f32, f32) {
        let (cw, ch) = (self.canvas.width() as u32, self.canvas.height() as u32);
        let x0 = px * cw / out_w;
        let x1 = ((px + 1) * cw / out_w).max(x0 + 1).min(cw);
        let y0 = py * ch / out_h;
        let y1 = ((py + 1) * ch / out_h).max(y0 + 1).min(ch);
        let (mut r, mut g, mut b, mut a) = (0.0, 0.0, 0.0, 0.0);
        for y in y0..y1 {
            for x in x0..x1 {
                let p = self.canvas.pixel(x as usize, y as usize);
                r += p.r * p.a;
                g += p.g * p.a;
                b += p.b * p.a;
                a += p.a;
            }
        }
        let n = ((x1 - x0) * (y1 - y0)).max(1) as f32;
        (r / n, g / n, b / n, a / n)
    }

    fn composite(&self, px: u32, py: u32, out_w: u32, out_h: u32, under: Rgba) -> Color {
        let (r, g, b, a) = self.sample(px, py, out_w, out_h);
        Rgba::new(
            r + under.r * (1.0 - a),
            g + under.g * (1.0 - a),
            b + under.b * (1.0 - a),
            1.0,
        )
        .to_color()
    }
}

impl Widget for CanvasView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.is_empty() || self.canvas.width() == 0 || self.canvas.height() == 0 {
            return;
        }
        let out_w = u32::from(area.width);
        let out_h = u32::from(area.height) * 2;
        for row in 0..area.height {
            for col in 0..area.width {
                let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) else {
                    continue;
                };
                // keep whatever the background painted under us
                let (under_top, under_bottom) = match (cell.symbol() == UPPER_HALF, cell.fg, cell.bg) {
                    (true, Color::Rgb(..), Color::Rgb(..)) => (Rgba::from_color(cell.fg), Rgba::from_color(cell.bg)),
                    (_, _, Color::Rgb(..)) => (Rgba::from_color(cell.bg), Rgba::from_color(cell.bg)),
                    _ => (self.backdrop, self.backdrop),
                };
                let (px, py) = (u32::from(col), u32::from(row) * 2);
                let top = self.composite(px, py, out_w, out_h, under_top);
                let bottom = self.composite(px, py + 1, out_w, out_h, under_bottom);
                cell.set_symbol(UPPER_HALF).set_fg(top).set_bg(bottom);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualizer::canvas::Paint;

    #[test]
    fn canvas_is_scaled_into_half_blocks() {
        let mut canvas = Canvas::new(4, 4);
        // bottom half white
        canvas.fill_rect(0.0, 2.0, 4.0, 2.0, &Paint::Solid(Rgba::new(1.0, 1.0, 1.0, 1.0)));

        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);
        CanvasView::new(&canvas, Color::Rgb(0, 0, 0)).render(area, &mut buf);

        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), UPPER_HALF);
        assert_eq!(cell.fg, Color::Rgb(0, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(255, 255, 255));
    }

    #[test]
    fn transparent_pixels_show_the_cell_below() {
        let canvas = Canvas::new(2, 2);
        let area = Rect::new(0, 0, 1, 1);
        let mut buf = Buffer::empty(area);
        buf[(0, 0)]
            .set_symbol(UPPER_HALF)
            .set_fg(Color::Rgb(10, 20, 30))
            .set_bg(Color::Rgb(40, 50, 60));
        CanvasView::new(&canvas, Color::Rgb(0, 0, 0)).render(area, &mut buf);
        assert_eq!(buf[(0, 0)].fg, Color::Rgb(10, 20, 30));
        assert_eq!(buf[(0, 0)].bg, Color::Rgb(40, 50, 60));
    }
}
