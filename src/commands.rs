/// Command-mode verbs and their fuzzy lookup

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  People,
  Planets,
  Refresh,
  Reset,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: Action,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "people",
    aliases: &["p", "person", "characters"],
    description: "Browse people",
    action: Action::People,
  },
  Command {
    name: "planets",
    aliases: &["pl", "planet", "worlds"],
    description: "Browse planets",
    action: Action::Planets,
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Force-refetch the current view",
    action: Action::Refresh,
  },
  Command {
    name: "reset",
    aliases: &["defaults"],
    description: "Reset columns and sort",
    action: Action::Reset,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit holocron",
    action: Action::Quit,
  },
];

/// Resolve typed text to a command: exact name or alias only.
pub fn lookup(input: &str) -> Option<&'static Command> {
  let input = input.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == input || cmd.aliases.contains(&input.as_str()))
}

/// Ranked suggestions: exact name, exact alias, name prefix, alias prefix,
/// then substring matches.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let needle = input.trim().to_lowercase();

  if needle.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut ranked: Vec<(&'static Command, u8)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &needle).map(|r| (cmd, r)))
    .collect();
  ranked.sort_by_key(|(_, r)| *r);
  ranked.into_iter().map(|(cmd, _)| cmd).collect()
}

fn rank(cmd: &Command, needle: &str) -> Option<u8> {
  if cmd.name == needle {
    Some(0)
  } else if cmd.aliases.contains(&needle) {
    Some(1)
  } else if cmd.name.starts_with(needle) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(needle)) {
    Some(3)
  } else if cmd.name.contains(needle) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(needle)) {
    Some(5)
  } else {
    None
  }
}
