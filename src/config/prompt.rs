//! Operator input sources.
//!
//! The collector only talks to `InteractiveSource`, so the same collection
//! logic runs against a live terminal or a scripted list of answers.

use nix::sys::termios::{self, LocalFlags, SetArg};
use std::collections::VecDeque;
use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};

/// A line-oriented conversation with the operator.
pub trait InteractiveSource {
    /// Show `prompt` and read one answer.
    ///
    /// Returns `Ok(None)` when input is exhausted (EOF). Answers are trimmed.
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Like `ask`, but the answer is not echoed where the source can avoid it.
    fn ask_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.ask(prompt)
    }

    /// Show informational text (no answer expected).
    fn say(&mut self, text: &str) -> io::Result<()>;
}

/// Terminal-backed source: prompts on `output`, reads lines from `input`.
pub struct TerminalSource<R, W> {
    input: R,
    output: W,
    /// Toggle echo on the process stdin for secret answers
    hide_secrets: bool,
}

impl TerminalSource<StdinLock<'static>, Stdout> {
    /// Source bound to the process stdin/stdout.
    pub fn stdio() -> Self {
        let stdin: Stdin = io::stdin();
        TerminalSource {
            input: stdin.lock(),
            output: io::stdout(),
            hide_secrets: true,
        }
    }
}

impl<R: BufRead, W: Write> TerminalSource<R, W> {
    pub fn new(input: R, output: W) -> Self {
        TerminalSource {
            input,
            output,
            hide_secrets: false,
        }
    }

    fn read_answer(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> InteractiveSource for TerminalSource<R, W> {
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        self.read_answer()
    }

    fn ask_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        // Not a terminal (piped input): nothing to hide
        let saved = if self.hide_secrets {
            termios::tcgetattr(io::stdin()).ok()
        } else {
            None
        };
        if let Some(original) = &saved {
            let mut silent = original.clone();
            silent.local_flags.remove(LocalFlags::ECHO);
            termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &silent).map_err(io::Error::from)?;
        }

        let answer = self.read_answer();

        if let Some(original) = &saved {
            termios::tcsetattr(io::stdin(), SetArg::TCSANOW, original).map_err(io::Error::from)?;
            writeln!(self.output)?;
        }
        answer
    }

    fn say(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)?;
        self.output.flush()
    }
}

/// Pre-recorded answers, consumed in order. Records everything shown.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    answers: VecDeque<String>,
    /// Prompts and messages in the order they were shown
    pub transcript: Vec<String>,
}

impl ScriptedSource {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedSource {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    /// Answers not consumed yet
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl InteractiveSource for ScriptedSource {
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.transcript.push(prompt.to_string());
        Ok(self.answers.pop_front().map(|a| a.trim().to_string()))
    }

    fn say(&mut self, text: &str) -> io::Result<()> {
        self.transcript.push(text.to_string());
        Ok(())
    }
}
