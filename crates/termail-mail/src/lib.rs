//! Mail protocol integration: IMAP mailboxes and the SMTP send path.

mod mailbox;
mod smtp;

pub use mailbox::ImapMailbox;
pub use smtp::{OutgoingMessage, send_message};
