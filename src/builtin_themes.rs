//! Built-in themes for tunedrop
//!
//! Each theme colours the chrome and the spectrum bars, which run from
//! `bar_base` at the bottom to `bar_peak` at the top.

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

pub const DEFAULT_THEME: &str = "Midnight";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub background: Color,
    pub foreground: Color,
    pub highlight: Color,
    pub bar_base: Color,
    pub bar_peak: Color,
}

impl Default for Theme {
    fn default() -> Self {
        midnight()
    }
}

// Helper function to convert hex RGB to Color::Rgb
const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb(r, g, b)
}

/// Midnight theme
///
/// Black stage, white type, purple bars that turn white at the peaks.
pub fn midnight() -> Theme {
    Theme {
        background: rgb(0, 0, 0),        // #000000
        foreground: rgb(255, 255, 255),  // #ffffff
        highlight: rgb(128, 0, 128),     // #800080 (purple)
        bar_base: rgb(128, 0, 128),      // #800080
        bar_peak: rgb(255, 255, 255),    // #ffffff
    }
}

/// Catppuccin Mocha theme
///
/// Based on [Catppuccin](https://github.com/catppuccin/catppuccin)
pub fn catppuccin_mocha() -> Theme {
    Theme {
        background: rgb(30, 30, 46),     // #1e1e2e
        foreground: rgb(205, 214, 244),  // #cdd6f4
        highlight: rgb(203, 166, 247),   // #cba6f7 (mauve)
        bar_base: rgb(203, 166, 247),    // #cba6f7 (mauve)
        bar_peak: rgb(245, 194, 231),    // #f5c2e7 (pink)
    }
}

pub fn dracula() -> Theme {
    Theme {
        background: rgb(40, 42, 54),     // #282a36
        foreground: rgb(248, 248, 242),  // #f8f8f2
        highlight: rgb(189, 147, 249),   // #bd93f9 (purple)
        bar_base: rgb(189, 147, 249),    // #bd93f9 (purple)
        bar_peak: rgb(255, 121, 198),    // #ff79c6 (pink)
    }
}

pub fn gruvbox_dark() -> Theme {
    Theme {
        background: rgb(40, 40, 40),     // #282828
        foreground: rgb(235, 219, 178),  // #ebdbb2
        highlight: rgb(254, 128, 25),    // #fe8019 (orange)
        bar_base: rgb(254, 128, 25),     // #fe8019 (orange)
        bar_peak: rgb(250, 189, 47),     // #fabd2f (yellow)
    }
}

/// Nord theme
///
/// Based on [Nord](https://www.nordtheme.com/)
pub fn nord() -> Theme {
    Theme {
        background: rgb(46, 52, 64),     // #2E3440 (nord0)
        foreground: rgb(216, 222, 233),  // #D8DEE9 (nord4)
        highlight: rgb(136, 192, 208),   // #88C0D0 (nord8 - frost)
        bar_base: rgb(94, 129, 172),     // #5E81AC (nord10)
        bar_peak: rgb(143, 188, 187),    // #8FBCBB (nord7)
    }
}

pub fn tokyo_night() -> Theme {
    Theme {
        background: rgb(26, 27, 38),     // #1a1b26
        foreground: rgb(192, 202, 245),  // #c0caf5
        highlight: rgb(187, 154, 247),   // #bb9af7 (magenta)
        bar_base: rgb(122, 162, 247),    // #7aa2f7 (blue)
        bar_peak: rgb(187, 154, 247),    // #bb9af7 (magenta)
    }
}

pub fn one_dark() -> Theme {
    Theme {
        background: rgb(40, 44, 52),     // #282C34
        foreground: rgb(171, 178, 191),  // #ABB2BF
        highlight: rgb(198, 120, 221),   // #C678DD (purple)
        bar_base: rgb(97, 175, 239),     // #61AFEF (blue)
        bar_peak: rgb(198, 120, 221),    // #C678DD (purple)
    }
}

pub fn solarized_dark() -> Theme {
    Theme {
        background: rgb(0, 43, 54),      // #002B36 (base03)
        foreground: rgb(131, 148, 150),  // #839496 (base0)
        highlight: rgb(42, 161, 152),    // #2aa198 (cyan)
        bar_base: rgb(38, 139, 210),     // #268bd2 (blue)
        bar_peak: rgb(42, 161, 152),     // #2aa198 (cyan)
    }
}

pub fn solarized_light() -> Theme {
    Theme {
        background: rgb(253, 246, 227),  // #FDF6E3 (base3)
        foreground: rgb(101, 123, 131),  // #657B83 (base00)
        highlight: rgb(38, 139, 210),    // #268bd2 (blue)
        bar_base: rgb(38, 139, 210),     // #268bd2 (blue)
        bar_peak: rgb(211, 54, 130),     // #d33682 (magenta)
    }
}

/// Get a theme by name
pub fn get_by_name(name: &str) -> Option<Theme> {
    match name {
        "Midnight" => Some(midnight()),
        "Catppuccin Mocha" => Some(catppuccin_mocha()),
        "Dracula" => Some(dracula()),
        "Gruvbox Dark" => Some(gruvbox_dark()),
        "Nord" => Some(nord()),
        "One Dark" => Some(one_dark()),
        "Solarized Dark" => Some(solarized_dark()),
        "Solarized Light" => Some(solarized_light()),
        "Tokyo Night" => Some(tokyo_night()),
        _ => None,
    }
}

/// Get a list of all available theme names
pub fn list_themes() -> &'static [&'static str] {
    &[
        "Catppuccin Mocha",
        "Dracula",
        "Gruvbox Dark",
        "Midnight",
        "Nord",
        "One Dark",
        "Solarized Dark",
        "Solarized Light",
        "Tokyo Night",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_theme_resolves() {
        for name in list_themes() {
            assert!(get_by_name(name).is_some(), "{name}");
        }
    }

    #[test]
    fn default_is_midnight() {
        assert!(list_themes().contains(&DEFAULT_THEME));
        let theme = Theme::default();
        assert_eq!(theme.background, Color::Rgb(0, 0, 0));
        assert_eq!(theme.bar_base, Color::Rgb(128, 0, 128));
        assert_eq!(theme.bar_peak, Color::Rgb(255, 255, 255));
    }
}
