//! Terminal capability probing.
//!
//! Detection runs once at startup; the result is an immutable value the
//! renderer consults when choosing a palette tier. Probing is environment
//! based (no round-trip queries): `COLORTERM` for truecolor and the
//! crossterm color count estimate otherwise.

/// Immutable snapshot of what the terminal can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct TerminalCaps {
    /// Number of colors the terminal claims to support.
    pub colors: u32,
    pub truecolor: bool,
}

impl TerminalCaps {
    pub fn detect() -> Self {
        let truecolor = std::env::var("COLORTERM")
            .map(|v| {
                let v = v.to_lowercase();
                v.contains("truecolor") || v.contains("24bit")
            })
            .unwrap_or(false);
        let colors = if truecolor {
            16_777_216
        } else {
            u32::from(crossterm::style::available_color_count())
        };
        Self { colors, truecolor }
    }

    /// Fixed capability value for tests and palette selection tables.
    pub fn with_colors(colors: u32) -> Self {
        Self {
            colors,
            truecolor: colors >= 1 << 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_reports_at_least_monochrome() {
        let caps = TerminalCaps::detect();
        assert!(caps.colors >= 1);
    }

    #[test]
    fn with_colors_is_exact() {
        assert_eq!(TerminalCaps::with_colors(8).colors, 8);
        assert!(!TerminalCaps::with_colors(256).truecolor);
    }
}
