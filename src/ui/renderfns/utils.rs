/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Word-wrap text to a width in characters.
///
/// Explicit newlines start a new line; words longer than the width are
/// split. Always returns at least one line.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
  let width = width.max(1);
  let mut lines = Vec::new();

  for paragraph in text.split('\n') {
    let mut current = String::new();
    let mut current_len = 0;

    for word in paragraph.split_whitespace() {
      let mut chars: Vec<char> = word.chars().collect();

      // Hard-split words that cannot fit on any line
      while chars.len() > width {
        if current_len > 0 {
          lines.push(std::mem::take(&mut current));
          current_len = 0;
        }
        let rest = chars.split_off(width);
        lines.push(chars.into_iter().collect());
        chars = rest;
      }

      let word_len = chars.len();
      if word_len == 0 {
        continue;
      }

      let needed = if current_len == 0 { word_len } else { current_len + 1 + word_len };
      if needed > width {
        lines.push(std::mem::take(&mut current));
        current_len = 0;
      }
      if current_len > 0 {
        current.push(' ');
        current_len += 1;
      }
      current.extend(chars);
      current_len += word_len;
    }

    lines.push(current);
  }

  lines
}
