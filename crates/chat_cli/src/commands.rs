#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Help,
    New,
    Cancel,
    Quit,
    Unknown(String),
}

pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let command = trimmed
        .split_whitespace()
        .next()
        .unwrap_or(trimmed)
        .to_string();

    let parsed = match command.as_str() {
        "/help" => ChatCommand::Help,
        "/new" => ChatCommand::New,
        "/cancel" => ChatCommand::Cancel,
        "/quit" | "/exit" => ChatCommand::Quit,
        _ => ChatCommand::Unknown(command),
    };

    Some(parsed)
}
