//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to manage their account, attachments and saved chat
//! without sending messages to the model.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Log in to an existing account.
    Login,

    /// Create an account.
    SignUp,

    /// Log out and discard the conversation.
    Logout,

    /// Upgrade to PRO.
    Upgrade,

    /// Start a new conversation.
    NewChat,

    /// Save the conversation.
    Save,

    /// Replace the conversation with the saved one.
    Load,

    /// Attach files to the next message.
    Attach(Vec<String>),

    /// Remove a pending attachment by zero-based index.
    Detach(usize),

    /// List pending attachments.
    Attachments,

    /// Show the current user and tier.
    WhoAmI,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics.
    Stats,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use lexa::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/detach 1"), Some(ChatCommand::Detach(0)));
/// assert!(parse_command("Hello, Lexa!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "login" => ChatCommand::Login,
        "signup" | "register" => ChatCommand::SignUp,
        "logout" => ChatCommand::Logout,
        "upgrade" => ChatCommand::Upgrade,
        "new" | "clear" => ChatCommand::NewChat,
        "save" => ChatCommand::Save,
        "load" => ChatCommand::Load,
        "attach" => match argument.map(split_paths) {
            Some(Ok(paths)) if !paths.is_empty() => ChatCommand::Attach(paths),
            Some(Err(err)) => ChatCommand::Invalid(format!("/attach {err}")),
            _ => ChatCommand::Invalid("/attach requires at least one file path".to_string()),
        },
        "detach" => match argument.map(str::parse::<usize>) {
            Some(Ok(0)) => ChatCommand::Invalid("/detach numbers start at 1".to_string()),
            Some(Ok(index)) => ChatCommand::Detach(index - 1),
            Some(Err(_)) => {
                ChatCommand::Invalid("/detach expects an attachment number".to_string())
            }
            None => ChatCommand::Invalid("/detach requires an attachment number".to_string()),
        },
        "attachments" | "files" => ChatCommand::Attachments,
        "whoami" | "me" => ChatCommand::WhoAmI,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Split an argument into paths, honoring double quotes around paths that
/// contain spaces.
fn split_paths(argument: &str) -> Result<Vec<String>, String> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in argument.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    paths.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if quoted {
        return Err("has an unterminated quote".to_string());
    }
    if !current.is_empty() {
        paths.push(current);
    }
    Ok(paths)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /login                 Log in (prompts for email and password)
  /signup                Create an account (prompts for details)
  /logout                Log out and clear the conversation
  /upgrade               Upgrade to PRO
  /new                   Start a new conversation
  /save                  Save the conversation (replaces the previous save)
  /load                  Load the saved conversation
  /attach <path>...      Attach images or documents to the next message
  /detach <n>            Remove pending attachment number n
  /attachments           List pending attachments
  /whoami                Show login state and tier
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl-C while a reply is streaming to cancel it."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_account_commands() {
        assert_eq!(parse_command("/login"), Some(ChatCommand::Login));
        assert_eq!(parse_command("/SIGNUP"), Some(ChatCommand::SignUp));
        assert_eq!(parse_command("/logout"), Some(ChatCommand::Logout));
        assert_eq!(parse_command("/upgrade"), Some(ChatCommand::Upgrade));
        assert_eq!(parse_command("/whoami"), Some(ChatCommand::WhoAmI));
    }

    #[test]
    fn parse_history_commands() {
        assert_eq!(parse_command("/new"), Some(ChatCommand::NewChat));
        assert_eq!(parse_command("/clear"), Some(ChatCommand::NewChat));
        assert_eq!(parse_command("/save"), Some(ChatCommand::Save));
        assert_eq!(parse_command("/load"), Some(ChatCommand::Load));
    }

    #[test]
    fn parse_attach() {
        assert_eq!(
            parse_command("/attach cat.png notes.pdf"),
            Some(ChatCommand::Attach(vec![
                "cat.png".to_string(),
                "notes.pdf".to_string()
            ]))
        );
        assert_eq!(
            parse_command(r#"/attach "my photos/cat.png"  b.txt"#),
            Some(ChatCommand::Attach(vec![
                "my photos/cat.png".to_string(),
                "b.txt".to_string()
            ]))
        );
        assert!(matches!(
            parse_command("/attach"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
        assert!(matches!(
            parse_command(r#"/attach "open.png"#),
            Some(ChatCommand::Invalid(msg)) if msg.contains("unterminated")
        ));
    }

    #[test]
    fn parse_detach() {
        assert_eq!(parse_command("/detach 2"), Some(ChatCommand::Detach(1)));
        assert!(matches!(
            parse_command("/detach 0"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("start at 1")
        ));
        assert!(matches!(
            parse_command("/detach two"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/detach"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
    }

    #[test]
    fn parse_stats_and_attachments() {
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/attachments"), Some(ChatCommand::Attachments));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/model gemini-2.5-pro"),
            Some(ChatCommand::Invalid("Unknown command: /model".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello, Lexa!"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
        assert_eq!(parse_command("what about a/b?"), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/attach"));
        assert!(help.contains("/upgrade"));
        assert!(help.contains("/save"));
    }
}
