//! Line-oriented command handlers.
//!
//! Each sub-module groups related commands by domain. [`parse`] turns one
//! input line into a [`Command`] and [`execute`] runs it against the shared
//! [`AppState`].

pub mod session;
pub mod tasks;

use thiserror::Error;

use taskflow_shared::TaskId;

use crate::state::AppState;

pub const HELP: &str = "\
Commands:
  signup <email> <password>   create an account and sign in
  signin <email> <password>   sign in to an existing account
  guest                       continue as a guest
  signout                     end the session
  add <text...>               add a task
  toggle <id|#n>              flip a task between open and done
  rm <id|#n>                  delete a task
  list                        show the task list
  whoami                      show the session
  help                        show this message
  quit                        exit";

/// A reference to a task: its id, or `#n` for the n-th row (from 1) of the
/// list as currently shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    Index(usize),
    Id(TaskId),
}

impl TaskRef {
    fn parse(token: &str) -> Result<Self, ParseError> {
        match token.strip_prefix('#') {
            Some(n) => match n.parse::<usize>() {
                Ok(index) if index > 0 => Ok(TaskRef::Index(index)),
                _ => Err(ParseError::BadIndex(token.to_string())),
            },
            None => Ok(TaskRef::Id(TaskId::new(token))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SignUp { email: String, password: String },
    SignIn { email: String, password: String },
    Guest,
    SignOut,
    Add(String),
    Toggle(TaskRef),
    Remove(TaskRef),
    List,
    WhoAmI,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command `{0}`. Type `help` for a list of commands.")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("`{0}` is not a valid row number.")]
    BadIndex(String),
}

/// Result of running one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue(String),
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Result<Command, ParseError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    Some(parse_verb(&verb.to_ascii_lowercase(), rest))
}

fn parse_verb(verb: &str, rest: &str) -> Result<Command, ParseError> {
    let args: Vec<&str> = rest.split_whitespace().collect();
    match verb {
        "signup" | "signin" => {
            let [email, password] = args[..] else {
                return Err(ParseError::Usage(if verb == "signup" {
                    "signup <email> <password>"
                } else {
                    "signin <email> <password>"
                }));
            };
            let (email, password) = (email.to_string(), password.to_string());
            Ok(if verb == "signup" {
                Command::SignUp { email, password }
            } else {
                Command::SignIn { email, password }
            })
        }
        "guest" => Ok(Command::Guest),
        "signout" | "logout" => Ok(Command::SignOut),
        // Blank text is passed through; the task store rejects it.
        "add" => Ok(Command::Add(rest.to_string())),
        "toggle" | "rm" => {
            let [target] = args[..] else {
                return Err(ParseError::Usage(if verb == "rm" {
                    "rm <id|#n>"
                } else {
                    "toggle <id|#n>"
                }));
            };
            let target = TaskRef::parse(target)?;
            Ok(if verb == "rm" {
                Command::Remove(target)
            } else {
                Command::Toggle(target)
            })
        }
        "list" | "ls" => Ok(Command::List),
        "whoami" => Ok(Command::WhoAmI),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

/// Run `command`. Failures are reported in the returned text rather than as
/// an error, so the shell keeps going.
pub async fn execute(state: &AppState, command: Command) -> Outcome {
    let text = match command {
        Command::SignUp { email, password } => session::sign_up(state, &email, &password).await,
        Command::SignIn { email, password } => session::sign_in(state, &email, &password).await,
        Command::Guest => session::guest(state).await,
        Command::SignOut => session::sign_out(state).await,
        Command::WhoAmI => session::who_am_i(state),
        Command::Add(text) => tasks::add(state, &text).await,
        Command::Toggle(target) => tasks::toggle(state, &target).await,
        Command::Remove(target) => tasks::remove(state, &target).await,
        Command::List => tasks::list(state),
        Command::Help => HELP.to_string(),
        Command::Quit => return Outcome::Quit,
    };
    Outcome::Continue(text)
}
