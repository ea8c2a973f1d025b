//! Interactive numbered menu.
//!
//! The menu reads choices and prompt answers line by line from any
//! [`BufRead`] and writes to any [`Write`], so it runs the same over a
//! terminal and over a scripted input in tests.
//!
//! # Options
//!
//! | # | Operation |
//! |---|-----------|
//! | 1 | generate one key |
//! | 2-5 | list all / valid / used / expired |
//! | 6 | find key |
//! | 7 | mark key as used |
//! | 8 | clean expired keys |
//! | 9 | generate batch |
//! | 10 | statistics |
//! | 11 | export valid keys |
//! | 12 | reload from file |
//! | 13 | validate key |
//! | 0 | quit |

use std::io::{self, BufRead, Write};

use crate::error::AppError;
use crate::handlers::{self, Command, normalize_key, render};
use crate::models::key_record::KeyFilter;
use crate::services::key_store::KeyStore;
use crate::services::publish::Publisher;

/// Default number of keys for the batch option.
pub const DEFAULT_BATCH_COUNT: u32 = 10;

const OPTIONS: &[(&str, &str)] = &[
    (" 1", "Generate new key"),
    (" 2", "List all keys"),
    (" 3", "List valid keys"),
    (" 4", "List used keys"),
    (" 5", "List expired keys"),
    (" 6", "Find key"),
    (" 7", "Mark key as used"),
    (" 8", "Clean expired keys"),
    (" 9", "Generate multiple keys"),
    ("10", "Statistics"),
    ("11", "Export valid keys"),
    ("12", "Reload keys from file"),
    ("13", "Validate key"),
    (" 0", "Quit"),
];

/// What a menu choice resolved to.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Run(Command),
    Quit,
    Unknown,
}

pub struct Menu<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Menu<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Run until the user quits or input ends.
    ///
    /// Operation errors are printed and the loop continues. Only failures to
    /// read input or write output end the loop with an error.
    pub fn run(&mut self, store: &mut KeyStore, publisher: &dyn Publisher) -> io::Result<()> {
        loop {
            self.print_options()?;

            let Some(choice) = self.prompt("Choose an option: ")? else {
                break;
            };

            let action = match self.resolve(&choice, store.default_duration_hours()) {
                Ok(Some(action)) => action,
                // Input ended inside a prompt
                Ok(None) => break,
                Err(e) => {
                    writeln!(self.output, "\nError: {}", e)?;
                    continue;
                }
            };

            match action {
                Action::Quit => break,
                Action::Unknown => writeln!(self.output, "\nInvalid option!")?,
                Action::Run(command) => match handlers::execute(store, publisher, command) {
                    Ok(text) => writeln!(self.output, "\n{}", text)?,
                    Err(e) => {
                        tracing::debug!("Command failed with {}", e.code());
                        writeln!(self.output, "\nError: {}", e)?;
                    }
                },
            }
        }

        writeln!(self.output, "\nGoodbye!")?;
        self.output.flush()
    }

    fn print_options(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n{}", render::rule())?;
        writeln!(self.output, "KEY MANAGER")?;
        writeln!(self.output, "{}", render::rule())?;
        for (number, label) in OPTIONS {
            writeln!(self.output, "{}. {}", number, label)?;
        }
        writeln!(self.output, "{}", render::rule())
    }

    /// Print `message` and read one trimmed line. `None` at end of input.
    fn prompt(&mut self, message: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", message)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn prompt_duration(&mut self, default_hours: u32) -> Result<Option<u32>, AppError> {
        let message = format!("Duration in hours (default {}): ", default_hours);
        match self.prompt(&message)? {
            Some(raw) => parse_number(&raw, default_hours, "duration").map(Some),
            None => Ok(None),
        }
    }

    /// Map a menu choice to an action, asking follow-up questions as needed.
    fn resolve(
        &mut self,
        choice: &str,
        default_hours: u32,
    ) -> Result<Option<Action>, AppError> {
        let command = match choice {
            "0" => return Ok(Some(Action::Quit)),
            "1" => {
                let Some(hours) = self.prompt_duration(default_hours)? else {
                    return Ok(None);
                };
                Command::Generate { hours: Some(hours) }
            }
            "2" => Command::List(KeyFilter::All),
            "3" => Command::List(KeyFilter::Valid),
            "4" => Command::List(KeyFilter::Used),
            "5" => Command::List(KeyFilter::Expired),
            "6" | "7" | "13" => {
                let Some(key) = self.prompt("Enter the key: ")? else {
                    return Ok(None);
                };
                let key = normalize_key(&key);
                match choice {
                    "6" => Command::Find(key),
                    "7" => Command::MarkUsed(key),
                    _ => Command::Validate(key),
                }
            }
            "8" => Command::CleanExpired,
            "9" => {
                let message = format!("How many keys (default {}): ", DEFAULT_BATCH_COUNT);
                let Some(count) = self.prompt(&message)? else {
                    return Ok(None);
                };
                let count = parse_number(&count, DEFAULT_BATCH_COUNT, "count")?;

                let Some(hours) = self.prompt_duration(default_hours)? else {
                    return Ok(None);
                };
                Command::GenerateBatch {
                    count,
                    hours: Some(hours),
                }
            }
            "10" => Command::Statistics,
            "11" => Command::ExportValid,
            "12" => Command::Reload,
            _ => return Ok(Some(Action::Unknown)),
        };

        Ok(Some(Action::Run(command)))
    }
}

/// Parse a positive whole number, taking `default` for empty input.
fn parse_number(raw: &str, default: u32, what: &str) -> Result<u32, AppError> {
    if raw.is_empty() {
        return Ok(default);
    }

    match raw.parse::<u32>() {
        Ok(0) | Err(_) => Err(AppError::InvalidInput(format!(
            "{} must be a positive whole number, got '{}'",
            what, raw
        ))),
        Ok(value) => Ok(value),
    }
}
