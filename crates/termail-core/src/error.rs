use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TermailError>;

#[derive(Debug, Error)]
pub enum TermailError {
    /// Transport, authentication or protocol failure talking to a mail server.
    #[error("mail server error for folder \"{folder}\" ({host}): {reason}")]
    RemoteMailbox {
        folder: String,
        host: String,
        reason: String,
    },

    #[error("Folder config not found for \"{0}\"")]
    FolderNotFound(String),

    #[error("Folder \"{0}\" already exists")]
    FolderExists(String),

    #[error("Last message not found.")]
    NoLastMessage,

    #[error("No message matched search pattern.")]
    NoMatch,

    #[error("Multiple messages ({count}) matched search pattern.")]
    AmbiguousSelection { count: usize },

    #[error("Message {0} is not in the cache")]
    MessageNotFound(i64),

    #[error("No {}folders to list messages from.", primary_prefix(.primary_only))]
    NoFolders { primary_only: bool },

    #[error("No folders matching pattern.")]
    NoFolderMatch,

    #[error("Email is not configured")]
    EmailNotConfigured,

    #[error("config file {} should only be readable by user (current mode: 0o{mode:04o})", .path.display())]
    ConfigUnsafe { path: PathBuf, mode: u32 },

    #[error("failed to send mail: {0}")]
    Send(String),

    /// The user declined to choose between candidates.
    #[error("selection cancelled")]
    Cancelled,

    #[error("cache inconsistency: {0}")]
    CacheInconsistency(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("invalid stored value: {0}")]
    Codec(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn primary_prefix(primary_only: &bool) -> &'static str {
    if *primary_only { "primary " } else { "" }
}

impl TermailError {
    pub fn remote(folder: &str, host: &str, reason: impl ToString) -> Self {
        TermailError::RemoteMailbox {
            folder: folder.to_string(),
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }

    /// User-facing errors are reported with their message alone; everything
    /// else signals a bug or a broken environment.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            TermailError::RemoteMailbox { .. }
                | TermailError::FolderNotFound(_)
                | TermailError::FolderExists(_)
                | TermailError::NoLastMessage
                | TermailError::NoMatch
                | TermailError::AmbiguousSelection { .. }
                | TermailError::MessageNotFound(_)
                | TermailError::NoFolders { .. }
                | TermailError::NoFolderMatch
                | TermailError::EmailNotConfigured
                | TermailError::ConfigUnsafe { .. }
                | TermailError::Send(_)
                | TermailError::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::TermailError;

    #[test]
    fn partitions_user_facing_and_internal_errors() {
        assert!(TermailError::NoMatch.is_user_facing());
        assert!(TermailError::remote("work", "imap.example.com", "timeout").is_user_facing());
        assert!(!TermailError::CacheInconsistency("x".into()).is_user_facing());
        assert!(!TermailError::Codec("bad".into()).is_user_facing());
    }

    #[test]
    fn no_folders_message_mentions_primary_only_when_relevant() {
        let primary = TermailError::NoFolders { primary_only: true }.to_string();
        let all = TermailError::NoFolders { primary_only: false }.to_string();
        assert_eq!(primary, "No primary folders to list messages from.");
        assert_eq!(all, "No folders to list messages from.");
    }

    #[test]
    fn remote_error_carries_folder_and_host() {
        let err = TermailError::remote("work", "imap.example.com", "login failed");
        let text = err.to_string();
        assert!(text.contains("work"));
        assert!(text.contains("imap.example.com"));
        assert!(text.contains("login failed"));
    }
}
