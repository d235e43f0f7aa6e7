//! Parsing of the lines typed at the prompt.

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Login(String),
    Logout,
    /// Set the signed-in user's profile name.
    Profile { first: String, last: String },
    /// Advertise a service as the signed-in user.
    Listing(String),
    /// Register a mobile-money payment method for the signed-in user.
    Payment { network: String, name: String, number: String },
    List,
    /// Open or start a conversation with a participant, with an optional
    /// display name to use if they have no profile.
    Open { counterpart: String, hint: Option<String> },
    /// Open an existing conversation by key.
    Chat(String),
    Close,
    Retry,
    Pay,
    Delete(String),
    Confirm,
    Cancel,
    /// Anything not starting with `/` is a message.
    Say(String),
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        let Some(rest) = line.trim_start().strip_prefix('/') else {
            return Some(Command::Say(line.to_string()));
        };

        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        let command = match (name, args.as_slice()) {
            ("help" | "h", _) => Command::Help,
            ("quit" | "q" | "exit", _) => Command::Quit,
            ("login", [who]) => Command::Login(who.to_string()),
            ("logout", []) => Command::Logout,
            ("profile", [first, last @ ..]) if !last.is_empty() => Command::Profile {
                first: first.to_string(),
                last: last.join(" "),
            },
            ("listing", service) if !service.is_empty() => Command::Listing(service.join(" ")),
            ("payment", [network, name @ .., number]) if !name.is_empty() => Command::Payment {
                network: network.to_string(),
                name: name.join(" "),
                number: number.to_string(),
            },
            ("list" | "ls", []) => Command::List,
            ("open", [who, hint @ ..]) => Command::Open {
                counterpart: who.to_string(),
                hint: (!hint.is_empty()).then(|| hint.join(" ")),
            },
            ("chat", [key]) => Command::Chat(key.to_string()),
            ("close", []) => Command::Close,
            ("retry", []) => Command::Retry,
            ("pay", []) => Command::Pay,
            ("delete", [key]) => Command::Delete(key.to_string()),
            ("yes" | "y", []) => Command::Confirm,
            ("no" | "n", []) => Command::Cancel,
            _ => Command::Unknown(line.trim().to_string()),
        };
        Some(command)
    }
}

pub const HELP: &str = "\
Commands:
  /login <id>                      sign in
  /logout                          sign out
  /profile <first> <last>          set your name
  /listing <service name>          advertise a service
  /payment <network> <name> <num>  set your payment method
  /list                            show your conversations
  /open <id> [display name]        message someone
  /chat <key>                      open a conversation from the list
  /close                           leave the open conversation
  /retry                           retry after a connection problem
  /pay                             show how to pay the other participant
  /delete <key>                    delete a conversation (asks first)
  /quit                            exit
Anything else is sent to the open conversation.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            Command::parse("  hello there \n"),
            Some(Command::Say("  hello there ".into()))
        );
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(
            Command::parse("/open u2 Kojo the plumber"),
            Some(Command::Open {
                counterpart: "u2".into(),
                hint: Some("Kojo the plumber".into()),
            })
        );
        assert_eq!(
            Command::parse("/open u2"),
            Some(Command::Open {
                counterpart: "u2".into(),
                hint: None,
            })
        );
        assert_eq!(
            Command::parse("/payment MTN Kojo Boateng 0240000000"),
            Some(Command::Payment {
                network: "MTN".into(),
                name: "Kojo Boateng".into(),
                number: "0240000000".into(),
            })
        );
        assert_eq!(
            Command::parse("/profile Ama Mensah"),
            Some(Command::Profile {
                first: "Ama".into(),
                last: "Mensah".into(),
            })
        );
        assert_eq!(Command::parse("/delete u1_u2"), Some(Command::Delete("u1_u2".into())));
    }

    #[test]
    fn malformed_commands_are_unknown() {
        assert_eq!(Command::parse("/login"), Some(Command::Unknown("/login".into())));
        assert_eq!(Command::parse("/profile Ama"), Some(Command::Unknown("/profile Ama".into())));
        assert_eq!(Command::parse("/frobnicate"), Some(Command::Unknown("/frobnicate".into())));
    }
}
