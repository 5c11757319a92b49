//! Color themes for the terminal UI.

use ratatui::style::{Color, Modifier, Style};

const GREEN: Color = Color::Rgb(0x50, 0xfa, 0x7b);
const RED: Color = Color::Rgb(0xff, 0x55, 0x55);
const WHITE: Color = Color::Rgb(0xff, 0xff, 0xff);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    /// Key used in config and the settings table.
    pub name: &'static str,
    pub title: &'static str,
    pub primary: Color,
    pub secondary: Color,
    pub accent: Color,
    pub bg: Color,
    pub fg: Color,
    pub gray: Color,
    pub profit: Color,
    pub loss: Color,
}

pub const DRACULA: Theme = Theme {
    name: "dracula",
    title: "Dracula",
    primary: Color::Rgb(0xbd, 0x93, 0xf9),
    secondary: Color::Rgb(0xff, 0x79, 0xc6),
    accent: Color::Rgb(0x50, 0xfa, 0x7b),
    bg: Color::Rgb(0x28, 0x2a, 0x36),
    fg: Color::Rgb(0xf8, 0xf8, 0xf2),
    gray: Color::Rgb(0x62, 0x72, 0xa4),
    profit: GREEN,
    loss: RED,
};

pub const NORD: Theme = Theme {
    name: "nord",
    title: "Nord",
    primary: Color::Rgb(0x81, 0xa1, 0xc1),
    secondary: Color::Rgb(0x88, 0xc0, 0xd0),
    accent: Color::Rgb(0xa3, 0xbe, 0x8c),
    bg: Color::Rgb(0x2e, 0x34, 0x40),
    fg: Color::Rgb(0xec, 0xef, 0xf4),
    gray: Color::Rgb(0x4c, 0x56, 0x6a),
    profit: Color::Rgb(0xa3, 0xbe, 0x8c),
    loss: Color::Rgb(0xbf, 0x61, 0x6a),
};

pub const GRUVBOX: Theme = Theme {
    name: "gruvbox",
    title: "Gruvbox",
    primary: Color::Rgb(0x45, 0x85, 0x88),
    secondary: Color::Rgb(0xb1, 0x62, 0x86),
    accent: Color::Rgb(0x68, 0x9d, 0x6a),
    bg: Color::Rgb(0x28, 0x28, 0x28),
    fg: Color::Rgb(0xeb, 0xdb, 0xb2),
    gray: Color::Rgb(0x92, 0x83, 0x74),
    profit: Color::Rgb(0x98, 0x97, 0x1a),
    loss: Color::Rgb(0xcc, 0x24, 0x1d),
};

pub const CATPPUCCIN: Theme = Theme {
    name: "catppuccin",
    title: "Catppuccin",
    primary: Color::Rgb(0xcb, 0xa6, 0xf7),
    secondary: Color::Rgb(0xf5, 0xc2, 0xe7),
    accent: Color::Rgb(0xa6, 0xe3, 0xa1),
    bg: Color::Rgb(0x1e, 0x1e, 0x2e),
    fg: Color::Rgb(0xcd, 0xd6, 0xf4),
    gray: Color::Rgb(0x58, 0x5b, 0x70),
    profit: Color::Rgb(0xa6, 0xe3, 0xa1),
    loss: Color::Rgb(0xf3, 0x8b, 0xa8),
};

pub const TOKYO: Theme = Theme {
    name: "tokyo",
    title: "Tokyo Night",
    primary: Color::Rgb(0x7a, 0xa2, 0xf7),
    secondary: Color::Rgb(0xbb, 0x9a, 0xf7),
    accent: Color::Rgb(0x9e, 0xce, 0x6a),
    bg: Color::Rgb(0x1a, 0x1b, 0x26),
    fg: Color::Rgb(0xc0, 0xca, 0xf5),
    gray: Color::Rgb(0x56, 0x5f, 0x89),
    profit: Color::Rgb(0x9e, 0xce, 0x6a),
    loss: Color::Rgb(0xf7, 0x76, 0x8e),
};

/// Cycle order for the settings view.
pub const THEMES: [Theme; 5] = [DRACULA, NORD, GRUVBOX, CATPPUCCIN, TOKYO];

impl Default for Theme {
    fn default() -> Self {
        DRACULA
    }
}

impl Theme {
    /// Case-insensitive lookup. Unknown names fall back to dracula.
    pub fn by_name(name: &str) -> Theme {
        Self::find(name).unwrap_or(DRACULA)
    }

    pub fn find(name: &str) -> Option<Theme> {
        let name = name.trim();
        THEMES.iter().copied().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn names() -> Vec<&'static str> {
        THEMES.iter().map(|t| t.name).collect()
    }

    pub fn next(&self) -> Theme {
        let idx = THEMES.iter().position(|t| t.name == self.name).unwrap_or(0);
        THEMES[(idx + 1) % THEMES.len()]
    }

    pub fn base(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    pub fn header_style(&self) -> Style {
        Style::default().fg(WHITE).bg(self.primary).add_modifier(Modifier::BOLD)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.primary)
    }

    pub fn title_style(&self) -> Style {
        Style::default().fg(self.primary).add_modifier(Modifier::BOLD)
    }

    pub fn tab_style(&self) -> Style {
        Style::default().fg(self.fg)
    }

    pub fn active_tab_style(&self) -> Style {
        Style::default()
            .fg(self.secondary)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    }

    pub fn highlight(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn subtle(&self) -> Style {
        Style::default().fg(self.gray)
    }

    pub fn key_style(&self) -> Style {
        Style::default().fg(self.secondary)
    }

    pub fn table_header(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn selected_row(&self) -> Style {
        Style::default().fg(WHITE).bg(self.secondary).add_modifier(Modifier::BOLD)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.loss)
    }

    /// Green for zero and up, red below.
    pub fn signed(&self, value: f64) -> Style {
        if value >= 0.0 {
            Style::default().fg(self.profit)
        } else {
            Style::default().fg(self.loss)
        }
    }

    /// Win rates of 60% and up read as good, below 40% as bad.
    pub fn win_rate(&self, rate: f64) -> Style {
        if rate >= 0.6 {
            Style::default().fg(self.profit)
        } else if rate < 0.4 {
            Style::default().fg(self.loss)
        } else {
            self.highlight()
        }
    }
}
