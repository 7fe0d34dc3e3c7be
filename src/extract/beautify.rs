//! Line-breaking pass applied before context extraction
//!
//! Minified scripts are frequently a single line, which makes the
//! "surrounding line" of an endpoint useless. This pass puts statements and
//! blocks on their own lines and indents them by brace depth. It understands
//! string literals and comments well enough not to break inside them; it is
//! not a full JavaScript formatter.

use std::time::{Duration, Instant};

/// Inputs above this many bytes only get the cheap heuristic pass
pub const LARGE_INPUT_THRESHOLD: usize = 1_000_000;

/// Wall-clock budget for the full pass
pub const DEFAULT_BEAUTIFY_TIMEOUT: Duration = Duration::from_secs(2);

/// How many characters are processed between deadline checks
const DEADLINE_CHECK_INTERVAL: usize = 4096;

const INDENT: &str = "    ";

/// Reformats content with the default time budget
///
/// Falls back to the original content if the budget is exceeded.
pub fn beautify(content: &str) -> String {
    beautify_within(content, DEFAULT_BEAUTIFY_TIMEOUT)
}

/// Reformats content, giving up after `budget`
///
/// # Returns
///
/// * The reformatted text when the full pass finishes in time
/// * A `;`/`,` line-broken copy for inputs larger than [`LARGE_INPUT_THRESHOLD`]
/// * The original text, unchanged, when the budget runs out
pub fn beautify_within(content: &str, budget: Duration) -> String {
    if content.len() > LARGE_INPUT_THRESHOLD {
        return break_on_separators(content);
    }

    match Formatter::new(content.len(), budget).run(content) {
        Some(formatted) => formatted,
        None => {
            tracing::debug!(
                "Beautifier exceeded {:?} on {} bytes, keeping original content",
                budget,
                content.len()
            );
            content.to_string()
        }
    }
}

/// Cheap pass for very large inputs
fn break_on_separators(content: &str) -> String {
    content.replace(';', ";\r\n").replace(',', ",\r\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Str(char),
    LineComment,
    BlockComment,
}

struct Formatter {
    out: String,
    depth: usize,
    parens: usize,
    // Paren depth outside each open brace
    saved_parens: Vec<usize>,
    at_line_start: bool,
    started: Instant,
    budget: Duration,
}

impl Formatter {
    fn new(capacity: usize, budget: Duration) -> Self {
        Self {
            out: String::with_capacity(capacity + capacity / 4),
            depth: 0,
            parens: 0,
            saved_parens: Vec::new(),
            at_line_start: true,
            started: Instant::now(),
            budget,
        }
    }

    /// Returns `None` if the deadline passes before the input is consumed
    fn run(mut self, content: &str) -> Option<String> {
        let chars: Vec<char> = content.chars().collect();
        let mut mode = Mode::Code;
        let mut i = 0;

        while i < chars.len() {
            if i % DEADLINE_CHECK_INTERVAL == 0 && self.started.elapsed() >= self.budget {
                return None;
            }

            let c = chars[i];
            let next = chars.get(i + 1).copied();

            match mode {
                Mode::Str(quote) => {
                    self.out.push(c);
                    if c == '\\' {
                        if let Some(escaped) = next {
                            self.out.push(escaped);
                            i += 1;
                        }
                    } else if c == quote || (c == '\n' && quote != '`') {
                        mode = Mode::Code;
                        self.at_line_start = c == '\n';
                    }
                }
                Mode::LineComment => {
                    self.out.push(c);
                    if c == '\n' {
                        mode = Mode::Code;
                        self.at_line_start = true;
                    }
                }
                Mode::BlockComment => {
                    self.out.push(c);
                    if c == '*' && next == Some('/') {
                        self.out.push('/');
                        i += 1;
                        mode = Mode::Code;
                    }
                }
                Mode::Code => {
                    mode = self.code_char(c, next, &chars[i + 1..]);
                }
            }

            i += 1;
        }

        Some(self.out)
    }

    fn code_char(&mut self, c: char, next: Option<char>, rest: &[char]) -> Mode {
        if self.at_line_start && (c == ' ' || c == '\t' || c == '\r' || c == '\n') {
            return Mode::Code;
        }

        if c == '\n' {
            self.newline();
            return Mode::Code;
        }

        if c == '}' {
            self.depth = self.depth.saturating_sub(1);
            if !self.at_line_start {
                self.newline();
            }
        }

        if self.at_line_start {
            for _ in 0..self.depth {
                self.out.push_str(INDENT);
            }
            self.at_line_start = false;
        }

        self.out.push(c);

        match c {
            '"' | '\'' | '`' => return Mode::Str(c),
            '/' if next == Some('/') => return Mode::LineComment,
            '/' if next == Some('*') => return Mode::BlockComment,
            '(' | '[' => self.parens += 1,
            ')' | ']' => self.parens = self.parens.saturating_sub(1),
            '{' => {
                self.depth += 1;
                self.saved_parens.push(self.parens);
                self.parens = 0;
                self.newline();
            }
            '}' => {
                self.parens = self.saved_parens.pop().unwrap_or(0);
                let follower = rest.iter().find(|ch| !ch.is_whitespace());
                if !matches!(follower, Some(')' | ',' | ';' | '.') | None) {
                    self.newline();
                }
            }
            ';' if self.parens == 0 => self.newline(),
            _ => {}
        }

        Mode::Code
    }

    fn newline(&mut self) {
        // Trailing spaces before an inserted break are noise
        let trimmed = self.out.trim_end_matches([' ', '\t']).len();
        self.out.truncate(trimmed);
        self.out.push('\n');
        self.at_line_start = true;
    }
}
