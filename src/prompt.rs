//! Interactive questions asked while a run is in progress.

use std::io::{self, BufRead, Write};

/// Answer to the save confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Yes,
    No,
    /// Save this page and every following one without asking.
    All,
    Quit,
}

impl Choice {
    /// Parse an answer, anything unrecognized (including an empty line)
    /// counts as the default `No`.
    pub fn from_answer(answer: &str) -> Self {
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => Choice::Yes,
            "a" | "all" => Choice::All,
            "q" | "quit" => Choice::Quit,
            _ => Choice::No,
        }
    }
}

pub trait Prompt {
    /// Show `text` to the operator, e.g. the diff of a pending edit.
    fn show(&mut self, text: &str) -> io::Result<()>;

    /// Ask for a free-form value.
    fn input(&mut self, question: &str) -> io::Result<String>;

    /// Ask `[y]es, [N]o, [a]ll, [q]uit`.
    fn choice(&mut self, question: &str) -> io::Result<Choice>;
}

/// Reads answers from stdin, writes questions and diffs to stderr.
#[derive(Debug, Default)]
pub struct Terminal;

impl Terminal {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        let mut stderr = io::stderr().lock();
        write!(stderr, "{} ", question)?;
        stderr.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "standard input closed",
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Prompt for Terminal {
    fn show(&mut self, text: &str) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{}", text)?;
        stderr.flush()
    }

    fn input(&mut self, question: &str) -> io::Result<String> {
        self.ask(question)
    }

    fn choice(&mut self, question: &str) -> io::Result<Choice> {
        let answer = self.ask(&format!("{} ([y]es, [N]o, [a]ll, [q]uit)", question))?;
        Ok(Choice::from_answer(&answer))
    }
}
