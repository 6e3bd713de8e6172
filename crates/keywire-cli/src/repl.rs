//! Command parsing for the interactive shell.
//!
//! Commands are case-insensitive and whitespace-tokenised, which also
//! means arguments can never contain whitespace.

use std::fmt;

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print usage.
    Help,
    /// Leave the shell.
    Exit,
    /// Connect and authenticate against a server.
    Connect {
        /// Server host or IP.
        host: String,
        /// Server port.
        port: u16,
        /// Shared secret.
        api_key: String,
    },
    /// Store a key; the value is always sent as a string.
    Add {
        /// Key to store.
        key: String,
        /// Value to store.
        value: String,
    },
    /// Look up a key.
    Find {
        /// Key to look up.
        key: String,
    },
    /// Remove a key.
    Remove {
        /// Key to remove.
        key: String,
    },
}

/// A line that could not be parsed into a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&word, args)) = tokens.split_first() else {
        return Ok(None);
    };

    let command = match word.to_ascii_uppercase().as_str() {
        "HELP" => expect_args(args, 0, "HELP").map(|()| Command::Help)?,
        "EXIT" => expect_args(args, 0, "EXIT").map(|()| Command::Exit)?,
        "CONNECT" => {
            expect_args(args, 3, "CONNECT <ip> <port> <api-key>")?;
            let port = args[1].parse().map_err(|_| {
                ParseError(format!("invalid port {:?}: expected an integer in [0, 65535]", args[1]))
            })?;
            Command::Connect { host: args[0].to_owned(), port, api_key: args[2].to_owned() }
        },
        "ADD" => {
            expect_args(args, 2, "ADD <key> <value>")?;
            Command::Add { key: args[0].to_owned(), value: args[1].to_owned() }
        },
        "FIND" => {
            expect_args(args, 1, "FIND <key>")?;
            Command::Find { key: args[0].to_owned() }
        },
        "REMOVE" => {
            expect_args(args, 1, "REMOVE <key>")?;
            Command::Remove { key: args[0].to_owned() }
        },
        other => return Err(ParseError(format!("unknown command {other:?}; try HELP"))),
    };
    Ok(Some(command))
}

fn expect_args(args: &[&str], count: usize, usage: &str) -> Result<(), ParseError> {
    if args.len() == count {
        Ok(())
    } else {
        Err(ParseError(format!("usage: {usage}")))
    }
}

/// Usage text for `HELP`.
pub const USAGE: &str = "\
commands (case-insensitive):
  HELP                              print this text
  EXIT                              leave the shell
  CONNECT <ip> <port> <api-key>     connect and authenticate
  ADD <key> <value>                 store a key (value is sent as a string)
  FIND <key>                        look up a key
  REMOVE <key>                      remove a key";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(parse_line("help"), Ok(Some(Command::Help)));
        assert_eq!(parse_line("HeLp"), Ok(Some(Command::Help)));
        assert_eq!(parse_line("EXIT"), Ok(Some(Command::Exit)));
    }

    #[test]
    fn blank_lines_parse_to_nothing() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   \t "), Ok(None));
    }

    #[test]
    fn connect_takes_host_port_and_key() {
        assert_eq!(
            parse_line("connect 127.0.0.1 3000 hunter2"),
            Ok(Some(Command::Connect {
                host: "127.0.0.1".into(),
                port: 3000,
                api_key: "hunter2".into(),
            }))
        );
        assert!(parse_line("connect 127.0.0.1 notaport hunter2").is_err());
        assert!(parse_line("connect 127.0.0.1").is_err());
    }

    #[test]
    fn data_commands_tokenise_arguments() {
        assert_eq!(
            parse_line("ADD greeting hello"),
            Ok(Some(Command::Add { key: "greeting".into(), value: "hello".into() }))
        );
        assert_eq!(parse_line("FIND greeting"), Ok(Some(Command::Find { key: "greeting".into() })));
        assert_eq!(
            parse_line("remove greeting"),
            Ok(Some(Command::Remove { key: "greeting".into() }))
        );
    }

    #[test]
    fn wrong_arity_is_rejected() {
        assert!(parse_line("ADD onlykey").is_err());
        assert!(parse_line("ADD key value extra").is_err());
        assert!(parse_line("FIND").is_err());
        assert!(parse_line("HELP me").is_err());
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(parse_line("FROB key").is_err());
    }
}
