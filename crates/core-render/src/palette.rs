//! Color palettes per terminal capability tier.
//!
//! The tier is decided once at startup from the capability probe and never
//! changes at runtime:
//!
//! | capability | palette |
//! |-----------|---------|
//! | < 8 colors | monochrome, bold/dim/reverse only |
//! | 8–15 | hard-coded 8-color palette |
//! | 16–255 | the same palette with brighter variants |
//! | >= 256 | full semantic palette plus `colors.*` user overrides |

use std::collections::HashMap;

use core_config::Config;
use core_syntax::ColorSlot;
use core_terminal::{Attr, TerminalCaps};
use crossterm::style::Color;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Monochrome,
    Basic8,
    Bright16,
    Full,
}

#[derive(Debug, Clone)]
pub struct Palette {
    tier: Tier,
    overrides: HashMap<ColorSlot, Color>,
    search_bg: Color,
}

impl Palette {
    pub fn for_caps(caps: TerminalCaps, config: &Config) -> Self {
        let tier = match caps.colors {
            0..=7 => Tier::Monochrome,
            8..=15 => Tier::Basic8,
            16..=255 => Tier::Bright16,
            _ => Tier::Full,
        };
        let mut overrides = HashMap::new();
        let mut search_bg = Color::Rgb {
            r: 0x30,
            g: 0x50,
            b: 0x30,
        };
        if tier == Tier::Full {
            for slot in [
                ColorSlot::Default,
                ColorSlot::Keyword,
                ColorSlot::String,
                ColorSlot::Comment,
                ColorSlot::Number,
                ColorSlot::Function,
                ColorSlot::Type,
                ColorSlot::Constant,
                ColorSlot::Operator,
                ColorSlot::Decorator,
                ColorSlot::Error,
            ] {
                if let Some(hex) = config.color_override(slot.semantic_name()) {
                    match parse_hex(hex) {
                        Some(color) => {
                            overrides.insert(slot, color);
                        }
                        None => {
                            warn!(target: "render.palette", slot = slot.semantic_name(), hex, "invalid_color_override")
                        }
                    }
                }
            }
            if let Some(hex) = config.color_override("search_highlight_bg") {
                match parse_hex(hex) {
                    Some(color) => search_bg = color,
                    None => {
                        warn!(target: "render.palette", hex, "invalid_search_highlight_bg")
                    }
                }
            }
        }
        Self {
            tier,
            overrides,
            search_bg,
        }
    }

    /// Attribute for one semantic slot.
    pub fn attr(&self, slot: ColorSlot) -> Attr {
        match self.tier {
            Tier::Monochrome => match slot {
                ColorSlot::Keyword | ColorSlot::Type => Attr::default().with_bold(),
                ColorSlot::Comment => Attr::default().with_dim(),
                ColorSlot::Error => Attr::default().with_reverse(),
                _ => Attr::default(),
            },
            Tier::Basic8 => Attr::fg(basic8(slot)),
            Tier::Bright16 => Attr::fg(bright16(slot)),
            Tier::Full => {
                if let Some(color) = self.overrides.get(&slot) {
                    Attr::fg(*color)
                } else {
                    Attr::fg(full(slot))
                }
            }
        }
    }

    /// Patch applied over search hit cells.
    pub fn search_patch(&self) -> Attr {
        match self.tier {
            Tier::Monochrome => Attr::reverse(),
            Tier::Basic8 | Tier::Bright16 => Attr::bg(Color::DarkGreen),
            Tier::Full => Attr::bg(self.search_bg),
        }
    }

    /// Patch applied over selected cells.
    pub fn selection_patch(&self) -> Attr {
        match self.tier {
            Tier::Monochrome => Attr::reverse(),
            Tier::Basic8 | Tier::Bright16 => Attr::bg(Color::DarkBlue),
            Tier::Full => Attr::bg(Color::Rgb {
                r: 0x2d,
                g: 0x3a,
                b: 0x55,
            }),
        }
    }

    pub fn bracket_patch(&self) -> Attr {
        Attr::reverse()
    }

    pub fn gutter(&self) -> Attr {
        match self.tier {
            Tier::Monochrome => Attr::default().with_dim(),
            Tier::Basic8 | Tier::Bright16 => Attr::fg(Color::DarkGrey),
            Tier::Full => Attr::fg(Color::Rgb {
                r: 0x6a,
                g: 0x6a,
                b: 0x6a,
            }),
        }
    }

    pub fn status(&self) -> Attr {
        match self.tier {
            Tier::Monochrome => Attr::reverse(),
            Tier::Basic8 | Tier::Bright16 => {
                Attr::fg(Color::White).merged(Attr::bg(Color::Black))
            }
            Tier::Full => Attr::fg(Color::White).merged(Attr::bg(Color::Rgb {
                r: 0x30,
                g: 0x30,
                b: 0x30,
            })),
        }
    }

    pub fn status_error(&self) -> Attr {
        self.status().with_bold().merged(match self.tier {
            Tier::Monochrome => Attr::default(),
            Tier::Basic8 | Tier::Bright16 => Attr::fg(Color::Red),
            Tier::Full => Attr::fg(Color::Rgb {
                r: 0xff,
                g: 0x55,
                b: 0x55,
            }),
        })
    }

    pub fn separator(&self) -> Attr {
        self.gutter()
    }
}

fn basic8(slot: ColorSlot) -> Color {
    match slot {
        ColorSlot::Default => Color::White,
        ColorSlot::Keyword => Color::DarkYellow,
        ColorSlot::String => Color::DarkGreen,
        ColorSlot::Comment => Color::DarkGrey,
        ColorSlot::Number => Color::DarkMagenta,
        ColorSlot::Function => Color::DarkCyan,
        ColorSlot::Type => Color::DarkBlue,
        ColorSlot::Constant => Color::DarkMagenta,
        ColorSlot::Operator => Color::White,
        ColorSlot::Decorator => Color::DarkCyan,
        ColorSlot::Error => Color::DarkRed,
    }
}

fn bright16(slot: ColorSlot) -> Color {
    match slot {
        ColorSlot::Default => Color::White,
        ColorSlot::Keyword => Color::Yellow,
        ColorSlot::String => Color::Green,
        ColorSlot::Comment => Color::DarkGrey,
        ColorSlot::Number => Color::Magenta,
        ColorSlot::Function => Color::Cyan,
        ColorSlot::Type => Color::Blue,
        ColorSlot::Constant => Color::Magenta,
        ColorSlot::Operator => Color::White,
        ColorSlot::Decorator => Color::Cyan,
        ColorSlot::Error => Color::Red,
    }
}

fn full(slot: ColorSlot) -> Color {
    let (r, g, b) = match slot {
        ColorSlot::Default => (0xd4, 0xd4, 0xd4),
        ColorSlot::Keyword => (0xc5, 0x86, 0xc0),
        ColorSlot::String => (0xce, 0x91, 0x78),
        ColorSlot::Comment => (0x6a, 0x99, 0x55),
        ColorSlot::Number => (0xb5, 0xce, 0xa8),
        ColorSlot::Function => (0xdc, 0xdc, 0xaa),
        ColorSlot::Type => (0x4e, 0xc9, 0xb0),
        ColorSlot::Constant => (0x56, 0x9c, 0xd6),
        ColorSlot::Operator => (0xd4, 0xd4, 0xd4),
        ColorSlot::Decorator => (0xdc, 0xdc, 0xaa),
        ColorSlot::Error => (0xf4, 0x47, 0x47),
    };
    Color::Rgb { r, g, b }
}

/// Parse `#rrggbb` (leading `#` optional).
pub fn parse_hex(hex: &str) -> Option<Color> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb { r, g, b })
}
