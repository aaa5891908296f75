use ratatui::style::Color;

/// Palette for one of the two modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
  pub primary: Color,
  pub secondary: Color,
  pub background: Color,
  pub paper: Color,
  pub text: Color,
  pub muted: Color,
  pub error: Color,
}

impl Theme {
  pub const fn dark() -> Self {
    Self {
      primary: Color::Rgb(0x21, 0x96, 0xf3),
      secondary: Color::Rgb(0x4c, 0xaf, 0x50),
      background: Color::Rgb(0x12, 0x12, 0x12),
      paper: Color::Rgb(0x1e, 0x1e, 0x1e),
      text: Color::Rgb(0xff, 0xff, 0xff),
      muted: Color::Rgb(0x9e, 0x9e, 0x9e),
      error: Color::Rgb(0xf4, 0x43, 0x36),
    }
  }

  pub const fn light() -> Self {
    Self {
      primary: Color::Rgb(0x21, 0x96, 0xf3),
      secondary: Color::Rgb(0x4c, 0xaf, 0x50),
      background: Color::Rgb(0xf5, 0xf5, 0xf5),
      paper: Color::Rgb(0xff, 0xff, 0xff),
      text: Color::Rgb(0x21, 0x21, 0x21),
      muted: Color::Rgb(0x75, 0x75, 0x75),
      error: Color::Rgb(0xd3, 0x2f, 0x2f),
    }
  }

  pub const fn for_mode(dark_mode: bool) -> Self {
    if dark_mode {
      Self::dark()
    } else {
      Self::light()
    }
  }
}
