/// Palette commands and autocomplete logic

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
  /// Open the list view of the collection at this REST path
  Collection(&'static str),
  /// Spell out the current view's keys on the status line
  Help,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub kind: CommandKind,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "items",
    aliases: &["i", "item", "stock"],
    description: "Inventory items and stock levels",
    kind: CommandKind::Collection("items"),
  },
  Command {
    name: "categories",
    aliases: &["c", "cat", "category"],
    description: "Item categories",
    kind: CommandKind::Collection("categories"),
  },
  Command {
    name: "units",
    aliases: &["u", "unit"],
    description: "Units of measure",
    kind: CommandKind::Collection("units"),
  },
  Command {
    name: "locations",
    aliases: &["l", "loc", "location"],
    description: "Storage locations and bins",
    kind: CommandKind::Collection("locations"),
  },
  Command {
    name: "suppliers",
    aliases: &["s", "sup", "supplier"],
    description: "Suppliers and contacts",
    kind: CommandKind::Collection("suppliers"),
  },
  Command {
    name: "requisitions",
    aliases: &["r", "req", "pr"],
    description: "Purchase requisitions and reorders",
    kind: CommandKind::Collection("requisitions"),
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    description: "Keys for the current collection",
    kind: CommandKind::Help,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit stockroom",
    kind: CommandKind::Quit,
  },
];

/// Look up a command by its canonical name
pub fn find(name: &str) -> Option<&'static Command> {
  COMMANDS.iter().find(|cmd| cmd.name == name)
}

/// Rank a command against lowercased input; lower is better
fn rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) || cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(4)
  } else if cmd
    .description
    .to_lowercase()
    .split_whitespace()
    .any(|word| word.starts_with(input))
  {
    // "purchase" finds requisitions, "bins" finds locations
    Some(5)
  } else {
    None
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&'static Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();

  // Stable sort keeps table order within a rank
  matches.sort_by_key(|(_, rank)| *rank);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_alias_beats_prefix() {
    assert_eq!(get_suggestions("u")[0].name, "units");
    assert_eq!(get_suggestions("r")[0].name, "requisitions");
    assert_eq!(get_suggestions("?")[0].name, "help");
  }

  #[test]
  fn test_prefix_and_substring() {
    assert_eq!(get_suggestions("loc")[0].name, "locations");
    let names: Vec<_> = get_suggestions("egor").iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["categories"]);
  }

  #[test]
  fn test_description_words_match_last() {
    assert_eq!(get_suggestions("purchase")[0].name, "requisitions");
    assert_eq!(get_suggestions("bins")[0].name, "locations");
    // "stock" is an items alias, which outranks the description hit
    assert_eq!(get_suggestions("stock")[0].name, "items");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }

  #[test]
  fn test_find_by_name() {
    assert_eq!(
      find("suppliers").map(|c| c.kind),
      Some(CommandKind::Collection("suppliers"))
    );
    assert_eq!(find("help").map(|c| c.kind), Some(CommandKind::Help));
    assert!(find("sup").is_none());
  }
}
