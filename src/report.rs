//! User-facing build messages.
//!
//! A [Reporter] lives for one build invocation and is passed to whatever
//! needs to tell the user something. Messages are written to a sink (stderr
//! by default) and kept in memory for the caller.

use console::style;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{self, Write};

/// Severity of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        f.write_str(name)
    }
}

/// Whether messages are coloured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Colour iff stderr is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn enabled(self) -> bool {
        match self {
            ColorChoice::Auto => console::Term::stderr().features().is_attended(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

/// A message as it was reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub level: Level,
    pub depth: usize,
    pub text: String,
}

/// Reporting interface of one build
pub struct Reporter {
    sink: RefCell<Box<dyn Write>>,
    colored: bool,
    min_level: Level,
    depth: Cell<usize>,
    messages: RefCell<Vec<Message>>,
}

impl Reporter {
    /// Report to stderr
    pub fn stderr(color: ColorChoice, min_level: Level) -> Self {
        Self::with_sink(Box::new(io::stderr()), color.enabled(), min_level)
    }

    /// Report to any writer
    pub fn with_sink(sink: Box<dyn Write>, colored: bool, min_level: Level) -> Self {
        Reporter {
            sink: RefCell::new(sink),
            colored,
            min_level,
            depth: Cell::new(0),
            messages: RefCell::new(Vec::new()),
        }
    }

    /// Keep messages in memory only
    pub fn silent() -> Self {
        Self::with_sink(Box::new(io::sink()), false, Level::Debug)
    }

    pub fn debug(&self, text: impl Into<String>) {
        self.inform(Level::Debug, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.inform(Level::Info, text);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.inform(Level::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.inform(Level::Error, text);
    }

    /// Report `text` at `level`, indented by the open clusters
    pub fn inform(&self, level: Level, text: impl Into<String>) {
        let message = Message {
            level,
            depth: self.depth.get(),
            text: text.into(),
        };

        if level >= self.min_level {
            let line = self.format(&message);
            // Losing a progress line is not worth failing the build over
            let _ = writeln!(self.sink.borrow_mut(), "{}", line);
        }
        self.messages.borrow_mut().push(message);
    }

    fn format(&self, message: &Message) -> String {
        let indent = "  ".repeat(message.depth);
        let marker = match message.level {
            Level::Debug => "D",
            Level::Info => "I",
            Level::Warning => "W",
            Level::Error => "E",
        };

        if !self.colored {
            return format!("{}{} {}", marker, indent, message.text);
        }

        let marker = match message.level {
            Level::Debug => style(marker).dim(),
            Level::Info => style(marker).green(),
            Level::Warning => style(marker).yellow().bold(),
            Level::Error => style(marker).red().bold(),
        }
        .force_styling(true);
        let text = match message.level {
            Level::Debug => style(message.text.as_str()).dim(),
            Level::Error => style(message.text.as_str()).red(),
            _ => style(message.text.as_str()),
        }
        .force_styling(true);
        format!("{}{} {}", marker, indent, text)
    }

    /// Open a titled group; messages until the guard is dropped are indented
    pub fn cluster(&self, title: impl Into<String>) -> Cluster<'_> {
        self.info(title);
        self.depth.set(self.depth.get() + 1);
        Cluster { reporter: self }
    }

    /// Everything reported so far, including messages below the output level
    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    /// Number of messages at `level`
    pub fn count(&self, level: Level) -> usize {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.level == level)
            .count()
    }
}

/// Guard of [Reporter::cluster]
pub struct Cluster<'a> {
    reporter: &'a Reporter,
}

impl Drop for Cluster<'_> {
    fn drop(&mut self) {
        let depth = self.reporter.depth.get();
        self.reporter.depth.set(depth.saturating_sub(1));
    }
}
