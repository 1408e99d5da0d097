use ratatui::style::Color;

/// Straight-alpha colour with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(f32::from(r) / 255.0, f32::from(g) / 255.0, f32::from(b) / 255.0, 1.0)
    }

    /// Terminal colours that are not rgb get a rough equivalent.
    pub fn from_color(color: Color) -> Self {
        let (r, g, b) = match color {
            Color::Rgb(r, g, b) => (r, g, b),
            Color::Black | Color::Reset => (0, 0, 0),
            Color::Red => (205, 49, 49),
            Color::Green => (13, 188, 121),
            Color::Yellow => (229, 229, 16),
            Color::Blue => (36, 114, 200),
            Color::Magenta => (128, 0, 128),
            Color::Cyan => (17, 168, 205),
            Color::Gray => (204, 204, 204),
            Color::DarkGray => (102, 102, 102),
            Color::LightRed => (241, 76, 76),
            Color::LightGreen => (35, 209, 139),
            Color::LightYellow => (245, 245, 67),
            Color::LightBlue => (59, 142, 234),
            Color::LightMagenta => (214, 112, 214),
            Color::LightCyan => (41, 184, 219),
            Color::White => (255, 255, 255),
            Color::Indexed(i) => (i, i, i),
        };
        Self::opaque(r, g, b)
    }

    pub fn to_color(self) -> Color {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color::Rgb(byte(self.r), byte(self.g), byte(self.b))
    }

    pub fn lerp(self, other: Rgba, t: f32) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Rgba::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    /// `self` drawn over `dst`.
    fn over(self, dst: Rgba) -> Rgba {
        let a = self.a + dst.a * (1.0 - self.a);
        if a <= f32::EPSILON {
            return Rgba::TRANSPARENT;
        }
        let mix = |s: f32, d: f32| (s * self.a + d * dst.a * (1.0 - self.a)) / a;
        Rgba::new(mix(self.r, dst.r), mix(self.g, dst.g), mix(self.b, dst.b), a)
    }
}

/// Vertical gradient: `from` at `y0`, `to` at `y1`, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearGradient {
    pub y0: f32,
    pub y1: f32,
    pub from: Rgba,
    pub to: Rgba,
}

impl LinearGradient {
    pub fn at(&self, y: f32) -> Rgba {
        let span = self.y1 - self.y0;
        if span.abs() <= f32::EPSILON {
            return self.to;
        }
        self.from.lerp(self.to, (y - self.y0) / span)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    Gradient(LinearGradient),
}

impl Paint {
    fn at(&self, y: f32) -> Rgba {
        match self {
            Paint::Solid(color) => *color,
            Paint::Gradient(gradient) => gradient.at(y),
        }
    }
}

/// Pixel surface the spectrum is drawn on. Its size is independent of both the
/// analyser resolution and the terminal.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
    round_rect: bool,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::TRANSPARENT; width * height],
            round_rect: true,
        }
    }

    /// Turns rounded rectangles off, as on surfaces that cannot draw them.
    #[cfg(test)]
    pub fn without_round_rect(mut self) -> Self {
        self.round_rect = false;
        self
    }

    pub fn supports_round_rect(&self) -> bool {
        self.round_rect
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgba {
        self.pixels[y * self.width + x]
    }

    pub fn clear(&mut self) {
        self.pixels.fill(Rgba::TRANSPARENT);
    }

    /// Erases `amount` of every pixel's coverage, leaving a fading trail.
    pub fn fade(&mut self, amount: f32) {
        let keep = 1.0 - amount.clamp(0.0, 1.0);
        for px in &mut self.pixels {
            px.a *= keep;
        }
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: &Paint) {
        self.fill_where(x, y, w, h, paint, |_, _| true);
    }

    /// A rectangle whose two top corners are rounded by `radius`. Callers check
    /// [`Canvas::supports_round_rect`] first.
    pub fn fill_round_rect_top(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, paint: &Paint) {
        if radius <= 0.0 {
            self.fill_rect(x, y, w, h, paint);
            return;
        }
        let r = radius.min(w / 2.0).min(h);
        let (left, right, top) = (x + r, x + w - r, y + r);
        self.fill_where(x, y, w, h, paint, |cx, cy| {
            if cy >= top {
                return true;
            }
            let corner_x = if cx < left {
                left
            } else if cx > right {
                right
            } else {
                return true;
            };
            let (dx, dy) = (cx - corner_x, cy - top);
            dx * dx + dy * dy <= r * r
        });
    }

    fn fill_where(&mut self, x: f32, y: f32, w: f32, h: f32, paint: &Paint, inside: impl Fn(f32, f32) -> bool) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        // pixels whose centre falls in the rectangle
        let x_start = (x - 0.5).ceil().max(0.0) as usize;
        let x_end = ((x + w - 0.5).ceil().max(0.0) as usize).min(self.width);
        let y_start = (y - 0.5).ceil().max(0.0) as usize;
        let y_end = ((y + h - 0.5).ceil().max(0.0) as usize).min(self.height);
        for py in y_start..y_end {
            let cy = py as f32 + 0.5;
            let color = paint.at(cy);
            for px in x_start..x_end {
                let cx = px as f32 + 0.5;
                if inside(cx, cy) {
                    let idx = py * self.width + px;
                    self.pixels[idx] = color.over(self.pixels[idx]);
                }
            }
        }
    }
}
