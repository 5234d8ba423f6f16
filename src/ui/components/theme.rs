//! Review palette and the name-to-color lookup used by the row color policy.
//!
//! Row backgrounds are requested by name (`"tag.csam"`, `"stripe.odd"`, ...) so the
//! table never hard-codes colors; config overrides can replace any name with a hex
//! color.

use ratatui::style::{Color, Modifier, Style};
use std::collections::{BTreeMap, HashMap};

/// Base colors for the dark palette.
pub mod colors {
    use ratatui::style::Color;

    pub const BG_DEEP: Color = Color::Rgb(26, 27, 38); // #1a1b26
    pub const BG_SURFACE: Color = Color::Rgb(36, 40, 59); // #24283b
    pub const BORDER: Color = Color::Rgb(59, 66, 97); // #3b4261
    pub const BORDER_FOCUS: Color = Color::Rgb(125, 145, 200); // #7d91c8

    pub const TEXT_PRIMARY: Color = Color::Rgb(192, 202, 245); // #c0caf5
    pub const TEXT_MUTED: Color = Color::Rgb(105, 114, 158);

    pub const ACCENT_PRIMARY: Color = Color::Rgb(122, 162, 247); // #7aa2f7

    // Tag backgrounds, strongest first.
    pub const TAG_CSAM: Color = Color::Rgb(120, 20, 36);
    pub const TAG_EVIDENCE: Color = Color::Rgb(110, 72, 16);
    pub const TAG_OF_INTEREST: Color = Color::Rgb(28, 72, 104);
    pub const TAG_CUSTOM: Color = Color::Rgb(62, 40, 92);

    pub const KEYWORD_HIT: Color = Color::Rgb(86, 80, 20);
    pub const SENDER_FIRST: Color = Color::Rgb(24, 38, 32);
    pub const SENDER_SECOND: Color = Color::Rgb(24, 30, 52);
}

/// Color names the display model asks for.
pub mod names {
    pub const STRIPE_EVEN: &str = "stripe.even";
    pub const STRIPE_ODD: &str = "stripe.odd";
    pub const KEYWORD_HIT: &str = "keyword.hit";
    pub const SENDER_FIRST: &str = "sender.1";
    pub const SENDER_SECOND: &str = "sender.2";
    pub const HEADER: &str = "header";
}

/// Opaque `name -> Color` lookup.
pub trait ThemeProvider {
    fn color(&self, name: &str) -> Option<Color>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThemePalette {
    pub accent: Color,
    pub bg: Color,
    pub fg: Color,
    pub surface: Color,
    pub hint: Color,
    pub border: Color,
    pub header: Color,
    pub stripe_even: Color,
    pub stripe_odd: Color,
    pub keyword_hit: Color,
    pub sender_first: Color,
    pub sender_second: Color,
    pub tag_csam: Color,
    pub tag_evidence: Color,
    pub tag_of_interest: Color,
    pub tag_custom: Color,
}

impl ThemePalette {
    pub fn dark() -> Self {
        Self {
            accent: colors::ACCENT_PRIMARY,
            bg: colors::BG_DEEP,
            fg: colors::TEXT_PRIMARY,
            surface: colors::BG_SURFACE,
            hint: colors::TEXT_MUTED,
            border: colors::BORDER,
            header: colors::BG_SURFACE,
            stripe_even: colors::BG_DEEP,
            stripe_odd: Color::Rgb(30, 32, 48), // #1e2030
            keyword_hit: colors::KEYWORD_HIT,
            sender_first: colors::SENDER_FIRST,
            sender_second: colors::SENDER_SECOND,
            tag_csam: colors::TAG_CSAM,
            tag_evidence: colors::TAG_EVIDENCE,
            tag_of_interest: colors::TAG_OF_INTEREST,
            tag_custom: colors::TAG_CUSTOM,
        }
    }

    pub fn light() -> Self {
        Self {
            accent: Color::Rgb(47, 107, 231),
            bg: Color::Rgb(250, 250, 252),
            fg: Color::Rgb(36, 41, 46),
            surface: Color::Rgb(240, 241, 245),
            hint: Color::Rgb(125, 134, 144),
            border: Color::Rgb(216, 222, 228),
            header: Color::Rgb(226, 230, 238),
            stripe_even: Color::Rgb(250, 250, 252),
            stripe_odd: Color::Rgb(240, 241, 245),
            keyword_hit: Color::Rgb(255, 244, 160),
            sender_first: Color::Rgb(222, 242, 226),
            sender_second: Color::Rgb(222, 232, 250),
            tag_csam: Color::Rgb(255, 180, 188),
            tag_evidence: Color::Rgb(255, 214, 150),
            tag_of_interest: Color::Rgb(176, 220, 250),
            tag_custom: Color::Rgb(222, 200, 250),
        }
    }

    /// Maximum contrast for projector and screen-share review.
    pub fn high_contrast() -> Self {
        Self {
            accent: Color::Rgb(0, 255, 255),
            bg: Color::Rgb(0, 0, 0),
            fg: Color::Rgb(255, 255, 255),
            surface: Color::Rgb(20, 20, 20),
            hint: Color::Rgb(200, 200, 200),
            border: Color::Rgb(255, 255, 255),
            header: Color::Rgb(40, 40, 40),
            stripe_even: Color::Rgb(0, 0, 0),
            stripe_odd: Color::Rgb(24, 24, 24),
            keyword_hit: Color::Rgb(128, 128, 0),
            sender_first: Color::Rgb(0, 64, 0),
            sender_second: Color::Rgb(0, 0, 96),
            tag_csam: Color::Rgb(160, 0, 0),
            tag_evidence: Color::Rgb(160, 96, 0),
            tag_of_interest: Color::Rgb(0, 80, 160),
            tag_custom: Color::Rgb(96, 0, 128),
        }
    }

    pub fn title(self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn hint_style(self) -> Style {
        Style::default().fg(self.hint)
    }

    pub fn border_style(self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn border_focus_style(self) -> Style {
        Style::default().fg(colors::BORDER_FOCUS)
    }

    pub fn header_row_style(self) -> Style {
        Style::default()
            .bg(self.header)
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn selected_style(self) -> Style {
        Style::default().add_modifier(Modifier::REVERSED | Modifier::BOLD)
    }
}

impl ThemeProvider for ThemePalette {
    fn color(&self, name: &str) -> Option<Color> {
        let color = match name {
            names::STRIPE_EVEN => self.stripe_even,
            names::STRIPE_ODD => self.stripe_odd,
            names::KEYWORD_HIT => self.keyword_hit,
            names::SENDER_FIRST => self.sender_first,
            names::SENDER_SECOND => self.sender_second,
            names::HEADER => self.header,
            "tag.csam" => self.tag_csam,
            "tag.evidence" => self.tag_evidence,
            "tag.of_interest" => self.tag_of_interest,
            "tag.custom" => self.tag_custom,
            "fg" => self.fg,
            "bg" => self.bg,
            _ => return None,
        };
        Some(color)
    }
}

/// Palette plus per-name overrides from the config file.
#[derive(Clone, Debug)]
pub struct ConfiguredTheme {
    pub palette: ThemePalette,
    overrides: HashMap<String, Color>,
}

impl ConfiguredTheme {
    /// Unparseable override values are logged and skipped.
    pub fn new(palette: ThemePalette, overrides: &BTreeMap<String, String>) -> Self {
        let mut parsed = HashMap::with_capacity(overrides.len());
        for (name, value) in overrides {
            match parse_hex_color(value) {
                Some(color) => {
                    parsed.insert(name.clone(), color);
                }
                None => {
                    tracing::warn!(name = %name, value = %value, "ignoring color override; expected #rrggbb");
                }
            }
        }
        Self {
            palette,
            overrides: parsed,
        }
    }

    pub fn with_palette(&self, palette: ThemePalette) -> Self {
        Self {
            palette,
            overrides: self.overrides.clone(),
        }
    }
}

impl ThemeProvider for ConfiguredTheme {
    fn color(&self, name: &str) -> Option<Color> {
        self.overrides
            .get(name)
            .copied()
            .or_else(|| self.palette.color(name))
    }
}

/// `#rrggbb` or `rrggbb`.
pub fn parse_hex_color(raw: &str) -> Option<Color> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// Relative luminance per WCAG 2.1, 0.0 (black) to 1.0 (white).
pub fn relative_luminance(color: Color) -> f64 {
    let (r, g, b) = match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Black => (0, 0, 0),
        Color::White => (255, 255, 255),
        Color::Gray => (128, 128, 128),
        Color::DarkGray => (64, 64, 64),
        _ => (128, 128, 128),
    };

    fn linearize(c: u8) -> f64 {
        let c = f64::from(c) / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }

    0.2126 * linearize(r) + 0.7152 * linearize(g) + 0.0722 * linearize(b)
}

pub fn contrast_ratio(fg: Color, bg: Color) -> f64 {
    let (a, b) = (relative_luminance(fg), relative_luminance(bg));
    let (lighter, darker) = if a > b { (a, b) } else { (b, a) };
    (lighter + 0.05) / (darker + 0.05)
}

/// Black or white text, whichever reads better on `bg`.
pub fn readable_fg(bg: Color) -> Color {
    let black = Color::Rgb(0, 0, 0);
    let white = Color::Rgb(255, 255, 255);
    if contrast_ratio(black, bg) >= contrast_ratio(white, bg) {
        black
    } else {
        white
    }
}

/// Presets cycled from the TUI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThemePreset {
    #[default]
    Dark,
    Light,
    HighContrast,
}

impl ThemePreset {
    pub fn name(self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Light => "Light",
            Self::HighContrast => "High Contrast",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::HighContrast,
            Self::HighContrast => Self::Dark,
        }
    }

    pub fn to_palette(self) -> ThemePalette {
        match self {
            Self::Dark => ThemePalette::dark(),
            Self::Light => ThemePalette::light(),
            Self::HighContrast => ThemePalette::high_contrast(),
        }
    }
}
