use super::analyser::AnalyserFrame;
use super::canvas::{Canvas, LinearGradient, Paint, Rgba};

/// Bars are this many times wider than an even split of the canvas, so the
/// audible low end fills it and the top bins run off the right edge.
const BAR_STRETCH: f32 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumStyle {
    pub accent: Rgba,
    pub peak: Rgba,
    pub fade: f32,
    pub bar_gap: f32,
    pub bar_radius: f32,
}

pub struct SpectrumRenderer {
    style: SpectrumStyle,
}

impl SpectrumRenderer {
    pub fn new(style: SpectrumStyle) -> Self {
        Self { style }
    }

    pub fn draw(&self, canvas: &mut Canvas, frame: &AnalyserFrame) {
        let width = canvas.width() as f32;
        let height = canvas.height() as f32;
        canvas.fade(self.style.fade);

        let bar_width = width / frame.len() as f32 * BAR_STRETCH;
        let rounded = canvas.supports_round_rect() && self.style.bar_radius > 0.0;
        let paint = Paint::Gradient(LinearGradient {
            y0: height,
            y1: 0.0,
            from: self.style.accent,
            to: self.style.peak,
        });

        let mut x = 0.0;
        for &value in frame {
            if x >= width {
                break;
            }
            let bar_height = f32::from(value) / 255.0 * height;
            if bar_height > 0.0 {
                let (y, w) = (height - bar_height, bar_width - self.style.bar_gap);
                if rounded {
                    canvas.fill_round_rect_top(x, y, w, bar_height, self.style.bar_radius, &paint);
                } else {
                    canvas.fill_rect(x, y, w, bar_height, &paint);
                }
            }
            x += bar_width;
        }
    }
}
