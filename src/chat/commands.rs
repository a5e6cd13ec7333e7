//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the API.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear the conversation history.
    Clear,

    /// Change the model.
    Model(String),

    /// Set or clear the system prompt.
    /// `None` clears the current system prompt.
    System(Option<String>),

    /// Set the maximum tokens per response.
    MaxTokens(u32),

    /// Clear the maximum tokens (use the service default).
    ClearMaxTokens,

    /// Set the sampling temperature.
    Temperature(f32),

    /// Clear the sampling temperature (use the service default).
    ClearTemperature,

    /// Show the token count and estimated cost of the conversation.
    Tokens,

    /// Display session statistics (message count, current model, etc.).
    Stats,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use colloquy::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/model gpt-4").is_some());
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" => ChatCommand::Clear,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "system" => ChatCommand::System(argument.map(|s| s.to_string())),
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "tokens" | "cost" => ChatCommand::Tokens,
        "max_tokens" => match argument {
            Some(arg) if arg.eq_ignore_ascii_case("clear") => ChatCommand::ClearMaxTokens,
            Some(arg) => match arg.parse::<u32>() {
                Ok(value) if value > 0 => ChatCommand::MaxTokens(value),
                _ => ChatCommand::Invalid("/max_tokens expects a positive integer".to_string()),
            },
            None => ChatCommand::Invalid("/max_tokens requires a value".to_string()),
        },
        "temperature" => match argument {
            Some(arg) if arg.eq_ignore_ascii_case("clear") => ChatCommand::ClearTemperature,
            Some(arg) => match parse_f32_in_range(arg, 0.0, 2.0) {
                Ok(value) => ChatCommand::Temperature(value),
                Err(err) => ChatCommand::Invalid(format!("/temperature {err}")),
            },
            None => ChatCommand::Invalid("/temperature requires a value".to_string()),
        },
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Returns the help text describing all commands.
pub fn help_text() -> &'static str {
    "Available commands:\n\
     /help              Show this help\n\
     /clear             Clear conversation history\n\
     /model <name>      Change the model\n\
     /system [prompt]   Set or clear the system prompt\n\
     /max_tokens <n>    Cap tokens per response ('clear' to unset)\n\
     /temperature <t>   Set sampling temperature 0.0-2.0 ('clear' to unset)\n\
     /tokens            Show token count and estimated cost\n\
     /stats             Show session statistics\n\
     /quit              Exit\n\
     \n\
     Press Ctrl+C while a reply is streaming to cancel it."
}

fn parse_f32_in_range(arg: &str, min: f32, max: f32) -> Result<f32, String> {
    match arg.parse::<f32>() {
        Ok(value) if value >= min && value <= max => Ok(value),
        Ok(_) => Err(format!("expects a value between {min:.1} and {max:.1}")),
        Err(_) => Err("expects a number".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_commands_pass_through() {
        assert!(parse_command("Hello there").is_none());
        assert!(parse_command("").is_none());
        assert!(parse_command("what does /help do?").is_none());
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/tokens"), Some(ChatCommand::Tokens));
        assert_eq!(parse_command("/cost"), Some(ChatCommand::Tokens));
    }

    #[test]
    fn model_command() {
        assert_eq!(
            parse_command("/model gpt-4"),
            Some(ChatCommand::Model("gpt-4".to_string()))
        );
        assert!(matches!(
            parse_command("/model"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn system_command() {
        assert_eq!(
            parse_command("/system Be terse."),
            Some(ChatCommand::System(Some("Be terse.".to_string())))
        );
        assert_eq!(parse_command("/system"), Some(ChatCommand::System(None)));
    }

    #[test]
    fn max_tokens_command() {
        assert_eq!(
            parse_command("/max_tokens 512"),
            Some(ChatCommand::MaxTokens(512))
        );
        assert_eq!(
            parse_command("/max_tokens clear"),
            Some(ChatCommand::ClearMaxTokens)
        );
        assert!(matches!(
            parse_command("/max_tokens zero"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/max_tokens 0"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn temperature_command() {
        assert_eq!(
            parse_command("/temperature 0.7"),
            Some(ChatCommand::Temperature(0.7))
        );
        assert_eq!(
            parse_command("/temperature clear"),
            Some(ChatCommand::ClearTemperature)
        );
        assert!(matches!(
            parse_command("/temperature 9.5"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn unknown_command() {
        assert!(matches!(
            parse_command("/frobnicate"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn command_case_is_normalized() {
        assert_eq!(parse_command("/QUIT"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /clear  "), Some(ChatCommand::Clear));
    }
}
