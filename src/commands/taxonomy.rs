//! The fixed command vocabulary.
//!
//! Rules are checked in order against the case-folded utterance; the first
//! substring match wins:
//!
//! | # | Command | Matches | Response |
//! |---|---------|---------|----------|
//! | 1 | `Greeting` | `hello`, `hi` | "Hello! I am your emotion recognition assistant." |
//! | 2 | `Wellbeing` | `how are you` | "I'm functioning properly, thank you for asking." |
//! | 3 | `DescribeEmotion` | `what do you see` | "I can see that you appear to be {emotion}." |
//! | 4 | `Farewell` | `goodbye`, `bye` | "Goodbye! Have a nice day." |
//! | 5 | `Quit` | `quit`, `exit` | "Shutting down the application." |
//! | 6 | `Echo` | anything else | "I heard you say: {text}" |
//!
//! Matching is plain substring search, so `"this"` counts as a greeting.

/// What an utterance asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Greeting,
    Wellbeing,
    DescribeEmotion,
    Farewell,
    Quit,
    Echo,
}

const RULES: &[(Command, &[&str])] = &[
    (Command::Greeting, &["hello", "hi"]),
    (Command::Wellbeing, &["how are you"]),
    (Command::DescribeEmotion, &["what do you see"]),
    (Command::Farewell, &["goodbye", "bye"]),
    (Command::Quit, &["quit", "exit"]),
];

/// Classify `text` by the first matching rule.
pub fn classify(text: &str) -> Command {
    let folded = text.to_lowercase();
    RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| folded.contains(*n)))
        .map(|&(command, _)| command)
        .unwrap_or(Command::Echo)
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Text to speak, plus whether it is the shutdown announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub text: String,
    pub terminal: bool,
}

impl Response {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            terminal: false,
        }
    }

    pub fn terminal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            terminal: true,
        }
    }
}

/// Build the reply for `command`.
///
/// `text` is the utterance as heard (casing preserved for echo) and
/// `emotion` the latest dominant emotion, if any.
pub fn respond(command: Command, text: &str, emotion: Option<&str>) -> Response {
    match command {
        Command::Greeting => Response::new("Hello! I am your emotion recognition assistant."),
        Command::Wellbeing => Response::new("I'm functioning properly, thank you for asking."),
        Command::DescribeEmotion => match emotion {
            Some(emotion) => Response::new(format!("I can see that you appear to be {emotion}.")),
            None => Response::new("I don't detect any emotions at the moment."),
        },
        Command::Farewell => Response::new("Goodbye! Have a nice day."),
        Command::Quit => Response::terminal("Shutting down the application."),
        Command::Echo => Response::new(format!("I heard you say: {text}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins() {
        assert_eq!(classify("Hello there"), Command::Greeting);
        assert_eq!(classify("how are you today"), Command::Wellbeing);
        assert_eq!(classify("What do you see?"), Command::DescribeEmotion);
        assert_eq!(classify("goodbye"), Command::Farewell);
        assert_eq!(classify("please quit now"), Command::Quit);
        assert_eq!(classify("EXIT"), Command::Quit);
        assert_eq!(classify("tell me a joke"), Command::Echo);
    }

    #[test]
    fn substring_matching_is_literal() {
        // "this" contains "hi", greeting outranks quit.
        assert_eq!(classify("exit this"), Command::Greeting);
        assert_eq!(classify("lullabye"), Command::Farewell);
        assert_eq!(classify("maybe"), Command::Echo);
    }

    #[test]
    fn greeting_outranks_farewell() {
        assert_eq!(classify("hi and bye"), Command::Greeting);
    }

    #[test]
    fn describe_emotion_with_and_without_reading() {
        assert_eq!(
            respond(Command::DescribeEmotion, "what do you see", Some("happy")).text,
            "I can see that you appear to be happy."
        );
        assert_eq!(
            respond(Command::DescribeEmotion, "what do you see", None).text,
            "I don't detect any emotions at the moment."
        );
    }

    #[test]
    fn echo_preserves_original_casing() {
        let r = respond(Command::Echo, "Tell Me A Joke", None);
        assert_eq!(r.text, "I heard you say: Tell Me A Joke");
        assert!(!r.terminal);
    }

    #[test]
    fn only_quit_is_terminal() {
        for command in [
            Command::Greeting,
            Command::Wellbeing,
            Command::DescribeEmotion,
            Command::Farewell,
            Command::Echo,
        ] {
            assert!(!respond(command, "x", None).terminal, "{command:?}");
        }
        let quit = respond(Command::Quit, "quit", None);
        assert!(quit.terminal);
        assert_eq!(quit.text, "Shutting down the application.");
    }
}
