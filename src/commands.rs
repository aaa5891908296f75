/// Available commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "list",
    aliases: &["l", "groceries"],
    description: "Focus the grocery list items",
  },
  Command {
    name: "chat",
    aliases: &["c", "assistant"],
    description: "Focus the chat assistant",
  },
  Command {
    name: "theme",
    aliases: &["t", "dark", "light"],
    description: "Toggle dark mode",
  },
  Command {
    name: "clear",
    aliases: &["reset"],
    description: "Clear the chat transcript and messages",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit grocer",
  },
];

impl Command {
  fn names(&self) -> impl Iterator<Item = &'static str> {
    std::iter::once(self.name).chain(self.aliases.iter().copied())
  }

  /// How well `query` matches, lower is better.
  ///
  /// Whole names beat prefixes, prefixes beat substrings and the description
  /// is the last resort, so "items" or "transcript" still find a command.
  fn rank(&self, query: &str) -> Option<u8> {
    if self.name == query {
      return Some(0);
    }
    if self.aliases.contains(&query) {
      return Some(1);
    }
    if let Some(pos) = self.names().position(|n| n.starts_with(query)) {
      return Some(if pos == 0 { 2 } else { 3 });
    }
    if self.names().any(|n| n.contains(query)) {
      return Some(4);
    }
    // Short queries would match every "the"
    let by_description = query.len() >= 3
      && self
        .description
        .to_lowercase()
        .split_whitespace()
        .any(|word| word.starts_with(query));
    by_description.then_some(5)
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let query = input.trim().to_lowercase();
  if query.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&'static Command, u8)> = COMMANDS
    .iter()
    .filter_map(|cmd| cmd.rank(&query).map(|rank| (cmd, rank)))
    .collect();
  // Stable sort keeps declaration order within a rank
  matches.sort_by_key(|(_, rank)| *rank);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("theme");
    assert_eq!(suggestions[0].name, "theme");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("dark");
    assert_eq!(suggestions[0].name, "theme");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("cl");
    assert_eq!(suggestions[0].name, "clear");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("eme");
    assert_eq!(suggestions[0].name, "theme");
  }

  #[test]
  fn test_light_and_dark_both_reach_theme() {
    assert_eq!(get_suggestions("light")[0].name, "theme");
    assert_eq!(get_suggestions("Dark ")[0].name, "theme");
  }

  #[test]
  fn test_description_words_match_last() {
    let suggestions = get_suggestions("transcript");
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].name, "clear");

    assert_eq!(get_suggestions("items")[0].name, "list");
  }

  #[test]
  fn test_exact_alias_beats_name_prefix() {
    let suggestions = get_suggestions("c");
    assert_eq!(suggestions[0].name, "chat");
    assert_eq!(suggestions[1].name, "clear");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }
}
