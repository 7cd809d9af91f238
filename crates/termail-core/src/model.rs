use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::date::local_date;

pub const DEFAULT_IMAP_PORT: u16 = 993;
pub const DEFAULT_REMOTE_FOLDER: &str = "INBOX";

/// Keyword set on every message read through termail.
pub const TERMAIL_KEYWORD: &str = "TERMAIL";

/// A named binding of one IMAP account to one remote mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(default = "default_remote_folder")]
    pub folder: String,
    #[serde(default = "default_primary")]
    pub primary: bool,
    #[serde(default)]
    pub skip_tls_verify: bool,
}

fn default_port() -> u16 {
    DEFAULT_IMAP_PORT
}

fn default_remote_folder() -> String {
    DEFAULT_REMOTE_FOLDER.to_string()
}

fn default_primary() -> bool {
    true
}

impl FolderConfig {
    pub fn new(name: &str, host: &str, user: &str, password: &str) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            port: DEFAULT_IMAP_PORT,
            user: user.to_string(),
            password: password.to_string(),
            folder: DEFAULT_REMOTE_FOLDER.to_string(),
            primary: true,
            skip_tls_verify: false,
        }
    }
}

/// IMAP message flag. System flags are recognised, everything else is kept as a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Recent,
    Keyword(String),
}

impl Flag {
    pub fn as_str(&self) -> &str {
        match self {
            Flag::Seen => "\\Seen",
            Flag::Answered => "\\Answered",
            Flag::Flagged => "\\Flagged",
            Flag::Deleted => "\\Deleted",
            Flag::Draft => "\\Draft",
            Flag::Recent => "\\Recent",
            Flag::Keyword(keyword) => keyword,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Flag {
    fn from(value: &str) -> Self {
        match value {
            s if s.eq_ignore_ascii_case("\\Seen") => Flag::Seen,
            s if s.eq_ignore_ascii_case("\\Answered") => Flag::Answered,
            s if s.eq_ignore_ascii_case("\\Flagged") => Flag::Flagged,
            s if s.eq_ignore_ascii_case("\\Deleted") => Flag::Deleted,
            s if s.eq_ignore_ascii_case("\\Draft") => Flag::Draft,
            s if s.eq_ignore_ascii_case("\\Recent") => Flag::Recent,
            other => Flag::Keyword(other.to_string()),
        }
    }
}

impl FromStr for Flag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Flag::from(s))
    }
}

/// Ordered set of flag tokens. Order carries no meaning but is preserved for storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(Vec<Flag>);

impl Flags {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, flag: &Flag) -> bool {
        self.0.contains(flag)
    }

    /// Adds `flag` at the front. Returns false if it was already present.
    pub fn insert(&mut self, flag: Flag) -> bool {
        if self.contains(&flag) {
            return false;
        }
        self.0.insert(0, flag);
        true
    }

    pub fn remove(&mut self, flag: &Flag) -> bool {
        let before = self.0.len();
        self.0.retain(|f| f != flag);
        self.0.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.0.iter().map(|f| f.as_str().to_string()).collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Flags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut flags = Flags::new();
        for token in iter {
            let flag = Flag::from(token.as_ref());
            if !flags.contains(&flag) {
                flags.0.push(flag);
            }
        }
        flags
    }
}

/// Header name (lower-cased) to every value it appeared with.
pub type Headers = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedAttachment {
    pub filename: String,
    pub payload: Vec<u8>,
    pub content_id: String,
    pub content_type: String,
    pub content_disposition: String,
    pub size: i64,
}

/// A message as delivered by a remote mailbox, before it is tagged and cached.
#[derive(Debug, Clone, Default)]
pub struct FetchedMessage {
    pub uid: Option<u32>,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Vec<String>,
    pub date_str: String,
    pub text: String,
    pub html: String,
    pub flags: Flags,
    pub headers: Headers,
    pub size: i64,
    pub size_rfc822: i64,
    pub attachments: Vec<FetchedAttachment>,
}

/// A fetched message together with the folder it was fetched from.
#[derive(Debug, Clone)]
pub struct TaggedMessage {
    pub config_name: String,
    pub server: String,
    pub folder: String,
    pub message: FetchedMessage,
}

impl TaggedMessage {
    pub fn new(folder: &FolderConfig, message: FetchedMessage) -> Self {
        Self {
            config_name: folder.name.clone(),
            server: folder.host.clone(),
            folder: folder.folder.clone(),
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: i64,
    pub message_id: i64,
    pub filename: String,
    pub payload: Vec<u8>,
    pub content_id: String,
    pub content_type: String,
    pub content_disposition: String,
    pub size: i64,
}

/// A row of the message cache.
///
/// `id` is assigned on insert and is only meaningful within the cache
/// generation that produced it. Two cached messages are equal when their
/// uid, subject and original date string match.
#[derive(Debug, Clone)]
pub struct CachedMessage {
    pub id: i64,
    pub config_name: String,
    pub server: String,
    pub folder: String,
    pub uid: Option<u32>,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Vec<String>,
    pub date_str: String,
    /// Derived from `date_str`, for ordering only.
    pub timestamp: i64,
    pub text: String,
    pub html: String,
    pub flags: Flags,
    pub headers: Headers,
    pub size: i64,
    pub size_rfc822: i64,
}

impl CachedMessage {
    pub fn identity(&self) -> (Option<u32>, &str, &str) {
        (self.uid, &self.subject, &self.date_str)
    }

    pub fn seen(&self) -> bool {
        self.flags.contains(&Flag::Seen)
    }

    pub fn flagged(&self) -> bool {
        self.flags.contains(&Flag::Flagged)
    }

    pub fn answered(&self) -> bool {
        self.flags.contains(&Flag::Answered)
    }

    pub fn date(&self) -> Option<DateTime<Local>> {
        local_date(&self.date_str, self.timestamp)
    }
}

impl PartialEq for CachedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for CachedMessage {}

impl Hash for CachedMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}
