//! Job payload text.
//!
//! Everything that knows what a stored payload looks like lives here:
//! quoting, the self-contained bootstrap script, and how the identifier
//! token is found and hidden again. The rest of the crate treats payloads
//! as opaque strings.

use crate::fingerprint;
use std::borrow::Cow;
use std::path::Path;

/// Flag carrying the fingerprint through every scheduled command line.
pub const IDENTIFIER_FLAG: &str = "--identifier";

const BOOTSTRAP_TEMPLATE: &str = include_str!("../../templates/bootstrap.sh");

/// Here-document terminator; `_` is outside the base64 alphabet.
const PROGRAM_DELIMITER: &str = "TINYBACKUP_PROGRAM_EOF";

/// Entry point of the unpacked program inside a bootstrap payload.
const INLINE_ENTRY: &str = "\"$tinybackup_dir/tinybackup\"";

const BASE64_LINE_WIDTH: usize = 76;

/// Where the scheduled command finds the program.
#[derive(Debug, Clone, Copy)]
pub enum EntryPoint<'a> {
    /// Run an installed binary by absolute path.
    Path(&'a Path),
    /// Carry the base64-encoded binary inside the payload.
    Inline { encoded: &'a str },
}

/// Quote one token for /bin/sh. Plain tokens pass through untouched so
/// stored command lines stay readable.
pub fn shell_quote(token: &str) -> Cow<'_, str> {
    let plain = !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"_@%+=:,./-".contains(&b));
    if plain {
        Cow::Borrowed(token)
    } else {
        Cow::Owned(format!("'{}'", token.replace('\'', r"'\''")))
    }
}

/// Join already-split arguments into one quoted command line.
pub fn command_line<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&shell_quote(arg.as_ref()));
    }
    line
}

/// Build the full payload text for one scheduled occurrence.
pub fn assemble<S: AsRef<str>>(entry: EntryPoint<'_>, args: &[S]) -> String {
    match entry {
        EntryPoint::Path(program) => {
            let program = program.to_string_lossy();
            let mut payload = command_line(&shell_quote(&program), args);
            payload.push('\n');
            payload
        }
        EntryPoint::Inline { encoded } => BOOTSTRAP_TEMPLATE
            .replace("@@DELIMITER@@", PROGRAM_DELIMITER)
            .replace("@@PROGRAM@@", &wrap_lines(encoded, BASE64_LINE_WIDTH))
            .replace("@@COMMAND@@", &command_line(INLINE_ENTRY, args)),
    }
}

fn wrap_lines(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / width + 1);
    let mut rest = text;
    while rest.len() > width {
        let (line, tail) = rest.split_at(width);
        out.push_str(line);
        out.push('\n');
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// Literal containment: the only query the queue supports.
pub fn contains_token(payload: &str, token: &str) -> bool {
    payload.contains(token)
}

/// The scheduled command line inside a stored payload, with the identifier
/// segment removed. Falls back to the last non-empty line for payloads this
/// tool did not write.
pub fn display_command(payload: &str) -> String {
    let line = payload
        .lines()
        .rev()
        .find(|line| line.contains(IDENTIFIER_FLAG))
        .or_else(|| payload.lines().rev().find(|line| !line.trim().is_empty()))
        .unwrap_or("");
    strip_identifier(line.trim())
}

/// Remove every standalone `--identifier <fingerprint>` pair from a command
/// line. The same text inside a quoted path is left alone.
pub fn strip_identifier(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find(IDENTIFIER_FLAG) {
        let flag_end = start + IDENTIFIER_FLAG.len();
        let after_flag = &rest[flag_end..];
        let value = after_flag.trim_start();
        let value_len = value.find(char::is_whitespace).unwrap_or(value.len());
        let preceded_by_space = rest[..start]
            .chars()
            .next_back()
            .or_else(|| out.chars().next_back())
            .map_or(true, char::is_whitespace);
        let separated = value.len() < after_flag.len();

        if preceded_by_space && separated && fingerprint::is_full_identifier(&value[..value_len]) {
            out.push_str(rest[..start].trim_end());
            rest = &value[value_len..];
        } else {
            out.push_str(&rest[..flag_end]);
            rest = after_flag;
        }
    }
    out.push_str(rest);
    out
}
