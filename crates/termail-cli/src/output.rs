use crossterm::style::Stylize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use termail_core::CachedMessage;

const DATE_WIDTH: usize = 12;
const MIN_SUBJECT_WIDTH: usize = 80;
const DEFAULT_TERMINAL_WIDTH: usize = 80;
const PLACEHOLDER: &str = " [...]";

/// An error whose message is all the user needs to see.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct UserError(pub(crate) String);

pub(crate) fn bail(message: impl Into<String>) -> anyhow::Error {
    UserError(message.into()).into()
}

pub(crate) fn info(message: &str) {
    println!("[*] {}", message);
}

pub(crate) fn warn(message: &str) {
    eprintln!("{}", format!("[!] {}", message).yellow());
}

pub(crate) fn err(message: &str) {
    eprintln!("{}", format!("[!!] {}", message).red());
}

/// Bold title underlined with `=`, padded by blank lines.
pub(crate) fn header(message: &str) {
    let border = "=".repeat(message.width());
    println!("{}", format!("\n{}\n{}\n", message, border).bold());
}

pub(crate) fn section(name: &str, value: &str) {
    println!("{}{}", format!("{}: ", name).bold(), value);
}

/// Collapses whitespace and cuts `text` to `width` cells, marking the cut
/// with a trailing placeholder.
pub(crate) fn shorten(text: &str, width: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.width() <= width {
        return collapsed;
    }
    let placeholder_width = PLACEHOLDER.width();
    if width <= placeholder_width {
        return truncate_to_width(PLACEHOLDER.trim_start(), width);
    }
    let budget = width - placeholder_width;
    let mut out = String::new();
    for word in collapsed.split(' ') {
        let sep = if out.is_empty() { 0 } else { 1 };
        if out.width() + sep + word.width() > budget {
            if out.is_empty() {
                out = truncate_to_width(word, budget);
            }
            break;
        }
        if sep == 1 {
            out.push(' ');
        }
        out.push_str(word);
    }
    out.push_str(PLACEHOLDER);
    out
}

fn truncate_to_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Shortens and left-pads `text` to exactly `width` cells. Zero width hides the column.
pub(crate) fn fit(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let short = shorten(text, width);
    let pad = width.saturating_sub(short.width());
    format!("{}{}", short, " ".repeat(pad))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Columns {
    pub(crate) folder: usize,
    pub(crate) date: usize,
    pub(crate) from: usize,
    pub(crate) subject: usize,
}

impl Columns {
    /// Column widths for a terminal `cols` wide. Sender, folder and date
    /// columns are dropped in that order while the subject would be narrower
    /// than 80 cells.
    pub(crate) fn for_width(cols: usize, messages: &[CachedMessage]) -> Self {
        let from = messages.iter().map(|m| m.from.width()).max().unwrap_or(0) + 2;
        let folder = messages
            .iter()
            .map(|m| m.config_name.width())
            .max()
            .unwrap_or(0)
            + 2;
        let mut columns = Columns {
            folder,
            date: DATE_WIDTH,
            from,
            subject: cols.saturating_sub(DATE_WIDTH + from + folder),
        };
        if columns.subject < MIN_SUBJECT_WIDTH {
            columns.subject += columns.from;
            columns.from = 0;
        }
        if columns.subject < MIN_SUBJECT_WIDTH {
            columns.subject += columns.folder;
            columns.folder = 0;
        }
        if columns.subject < MIN_SUBJECT_WIDTH {
            columns.subject += columns.date;
            columns.date = 0;
        }
        columns
    }
}

fn terminal_width() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .unwrap_or(DEFAULT_TERMINAL_WIDTH)
}

pub(crate) fn message_line(message: &CachedMessage, columns: &Columns) -> String {
    let date = message
        .date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    format!(
        "{}{}{}{}",
        fit(&message.config_name, columns.folder),
        fit(&date, columns.date),
        fit(&message.from, columns.from),
        fit(&message.subject, columns.subject).trim_end()
    )
}

pub(crate) fn print_messages(messages: &[CachedMessage]) {
    if messages.is_empty() {
        return;
    }
    let columns = Columns::for_width(terminal_width(), messages);
    for message in messages {
        println!("{}", message_line(message, &columns));
    }
}

/// One-line rendering of an address list.
pub(crate) fn join_addresses(addresses: &[String]) -> String {
    addresses.join(", ")
}

#[cfg(test)]
mod tests {
    use termail_core::{CachedMessage, Flags};

    use super::{Columns, fit, message_line, shorten};

    fn message(config_name: &str, from: &str, subject: &str) -> CachedMessage {
        CachedMessage {
            id: 1,
            config_name: config_name.to_string(),
            server: "imap.example.com".to_string(),
            folder: "INBOX".to_string(),
            uid: Some(1),
            subject: subject.to_string(),
            from: from.to_string(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: Vec::new(),
            date_str: "Tue, 03 Jan 2017 22:26:59 +0000".to_string(),
            timestamp: 0,
            text: String::new(),
            html: String::new(),
            flags: Flags::new(),
            headers: Default::default(),
            size: 0,
            size_rfc822: 0,
        }
    }

    #[test]
    fn shorten_keeps_short_text_and_cuts_on_words() {
        assert_eq!(shorten("Hello   world", 30), "Hello world");
        assert_eq!(shorten("Hello world, this is long", 17), "Hello [...]");
        assert_eq!(shorten("Hello world, this is long", 18), "Hello world, [...]");
        assert_eq!(shorten("Supercalifragilistic", 12), "Superc [...]");
    }

    #[test]
    fn fit_pads_to_width_and_hides_zero_columns() {
        assert_eq!(fit("abc", 6), "abc   ");
        assert_eq!(fit("abc", 0), "");
    }

    #[test]
    fn narrow_terminals_drop_sender_then_folder_then_date() {
        let messages = vec![message("work", "someone@example.com", "Hi")];
        let wide = Columns::for_width(200, &messages);
        assert_eq!(wide.from, 21);
        assert_eq!(wide.folder, 6);
        assert_eq!(wide.date, 12);
        assert_eq!(wide.subject, 200 - 21 - 6 - 12);

        let medium = Columns::for_width(100, &messages);
        assert_eq!(medium.from, 0);
        assert_eq!(medium.folder, 6);
        assert_eq!(medium.subject, 100 - 6 - 12);

        let narrow = Columns::for_width(60, &messages);
        assert_eq!((narrow.from, narrow.folder, narrow.date), (0, 0, 0));
        assert_eq!(narrow.subject, 60);
    }

    #[test]
    fn message_line_lays_out_columns() {
        let msg = message("work", "a@b.c", "Invoice");
        let columns = Columns {
            folder: 6,
            date: 0,
            from: 7,
            subject: 80,
        };
        assert_eq!(message_line(&msg, &columns), "work  a@b.c  Invoice");
    }
}
