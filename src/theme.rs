use ratatui::style::Color;

/// A complete color palette for the UI.
#[derive(Debug)]
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
  /// Selected tag chips in the tag pane.
  pub tag_on: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "Sketchbook",
    bg: Color::Rgb(250, 246, 240),
    fg: Color::Rgb(60, 56, 54),
    accent: Color::Rgb(214, 93, 14),
    muted: Color::Rgb(146, 131, 116),
    border: Color::Rgb(213, 196, 161),
    highlight_fg: Color::Rgb(250, 246, 240),
    highlight_bg: Color::Rgb(214, 93, 14),
    stripe_bg: Color::Rgb(242, 236, 226),
    status: Color::Rgb(69, 133, 136),
    error: Color::Rgb(204, 36, 29),
    key_fg: Color::Rgb(250, 246, 240),
    key_bg: Color::Rgb(124, 111, 100),
    tag_on: Color::Rgb(152, 151, 26),
  },
  Theme {
    name: "Midnight",
    bg: Color::Rgb(26, 27, 38),
    fg: Color::Rgb(192, 202, 245),
    accent: Color::Rgb(122, 162, 247),
    muted: Color::Rgb(86, 95, 137),
    border: Color::Rgb(59, 66, 97),
    highlight_fg: Color::Rgb(26, 27, 38),
    highlight_bg: Color::Rgb(122, 162, 247),
    stripe_bg: Color::Rgb(31, 35, 53),
    status: Color::Rgb(125, 207, 255),
    error: Color::Rgb(247, 118, 142),
    key_fg: Color::Rgb(26, 27, 38),
    key_bg: Color::Rgb(169, 177, 214),
    tag_on: Color::Rgb(158, 206, 106),
  },
  Theme {
    name: "Terminal",
    bg: Color::Reset,
    fg: Color::Reset,
    accent: Color::Cyan,
    muted: Color::DarkGray,
    border: Color::Gray,
    highlight_fg: Color::Black,
    highlight_bg: Color::Cyan,
    stripe_bg: Color::Reset,
    status: Color::Blue,
    error: Color::Red,
    key_fg: Color::Black,
    key_bg: Color::Gray,
    tag_on: Color::Green,
  },
];

/// Index of the theme named `name`, falling back to the first.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(n))).unwrap_or(0)
}
