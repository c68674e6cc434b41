//! Interactive `[y/N]` confirmation on stdin.

use std::io::{self, BufRead, Write};

use nostrpress_sync::Confirm;

/// Asks on the terminal. The engine calls [`Confirm::confirm`] from async
/// code, so the blocking read runs under `block_in_place` and the runtime's
/// other workers keep going. Needs the multi-thread runtime.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        tokio::task::block_in_place(|| ask(prompt, io::stdin().lock(), io::stdout()))
    }
}

fn ask(prompt: &str, mut input: impl BufRead, mut output: impl Write) -> bool {
    if write!(output, "{prompt} [y/N] ")
        .and_then(|()| output.flush())
        .is_err()
    {
        return false;
    }
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
