//! Interactive stdin prompts for `dump --interactive`.
//!
//! Mirrors the original tool's `console` package (`ExpectIntRange`,
//! `ExpectAnyString`, `ExpectRestrictedString`): print a prompt, read a
//! line, retry on bad input up to a fixed attempt budget. No extra prompt
//! crate is pulled in for this — `std::io::stdin` plus `FromStr` is
//! enough for three small helpers.

use std::io::{self, Write};

use crate::error::{CliError, Result};

const MAX_ATTEMPTS: u32 = 5;

fn read_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Prompt until the user enters an integer in `min..=max` (1-based menu
/// indices), or give up after [`MAX_ATTEMPTS`] bad attempts.
pub fn expect_int_range(prompt: impl Fn(), min: usize, max: usize) -> Result<usize> {
    for _ in 0..MAX_ATTEMPTS {
        prompt();
        io::stdout().flush().ok();
        let line = read_line()?;
        if let Ok(value) = line.parse::<usize>() {
            if (min..=max).contains(&value) {
                return Ok(value);
            }
        }
        println!("enter a number between {min} and {max}");
    }
    Err(CliError::InvalidInput(MAX_ATTEMPTS))
}

/// Prompt until the user enters any non-empty line.
pub fn expect_any_string(prompt: impl Fn()) -> Result<String> {
    for _ in 0..MAX_ATTEMPTS {
        prompt();
        io::stdout().flush().ok();
        let line = read_line()?;
        if !line.is_empty() {
            return Ok(line);
        }
    }
    Err(CliError::InvalidInput(MAX_ATTEMPTS))
}

/// Prompt until the user enters one of `values`.
pub fn expect_restricted_string(prompt: impl Fn(), values: &[&str]) -> Result<String> {
    for _ in 0..MAX_ATTEMPTS {
        prompt();
        io::stdout().flush().ok();
        let line = read_line()?;
        if values.contains(&line.as_str()) {
            return Ok(line);
        }
        println!("enter one of: {}", values.join(", "));
    }
    Err(CliError::InvalidInput(MAX_ATTEMPTS))
}
