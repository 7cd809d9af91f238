pub mod cache;
pub mod codec;
pub mod config;
pub mod date;
pub mod error;
pub mod model;
pub mod mutate;
pub mod remote;
pub mod select;
pub mod sync;

pub use cache::{MessageQuery, SortKey, SqliteMessageCache};
pub use config::{Config, SmtpSettings, SmtpTls};
pub use error::{Result, TermailError};
pub use model::{
    Attachment, CachedMessage, FetchedAttachment, FetchedMessage, Flag, Flags, FolderConfig,
    Headers, TaggedMessage, DEFAULT_IMAP_PORT, DEFAULT_REMOTE_FOLDER, TERMAIL_KEYWORD,
};
pub use mutate::MutationCoordinator;
pub use remote::RemoteMailbox;
pub use select::{Chooser, Interaction, select_message};
pub use sync::{CacheSynchronizer, SyncOutcome, SyncProgress};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use async_trait::async_trait;

    use crate::cache::SqliteMessageCache;
    use crate::error::{Result, TermailError};
    use crate::model::{FetchedMessage, Flag, FolderConfig};
    use crate::remote::RemoteMailbox;

    pub fn temp_db_path() -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "termail-core-{}-{}.db",
            std::process::id(),
            ts
        ))
    }

    pub async fn open_cache() -> anyhow::Result<(SqliteMessageCache, PathBuf)> {
        let path = temp_db_path();
        let _ = std::fs::remove_file(&path);
        let cache = SqliteMessageCache::connect(
            path.to_str()
                .ok_or_else(|| anyhow::anyhow!("invalid temp db path"))?,
        )
        .await?;
        cache.init().await?;
        Ok((cache, path))
    }

    pub fn remove_db(path: &PathBuf) {
        let _ = std::fs::remove_file(path);
        for suffix in ["-wal", "-shm"] {
            let mut side = path.clone().into_os_string();
            side.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(side));
        }
    }

    pub fn folder(name: &str) -> FolderConfig {
        FolderConfig::new(name, "imap.example.com", "me", "secret")
    }

    pub fn fetched(uid: u32, subject: &str, date: &str) -> FetchedMessage {
        FetchedMessage {
            uid: Some(uid),
            subject: subject.to_string(),
            from: "Sender <sender@example.com>".to_string(),
            to: vec!["me@example.com".to_string()],
            date_str: date.to_string(),
            text: format!("body of {}", subject),
            size: 100,
            size_rfc822: 100,
            ..Default::default()
        }
    }

    /// In-memory mail server keyed by folder config name.
    #[derive(Default)]
    pub struct FakeRemote {
        pub mailboxes: Mutex<HashMap<String, Vec<FetchedMessage>>>,
        pub failing: AtomicBool,
        pub fetch_calls: AtomicUsize,
        pub flag_calls: AtomicUsize,
        pub delete_calls: AtomicUsize,
    }

    impl FakeRemote {
        pub fn with_mailbox(self, name: &str, messages: Vec<FetchedMessage>) -> Self {
            if let Ok(mut boxes) = self.mailboxes.lock() {
                boxes.insert(name.to_string(), messages);
            }
            self
        }

        pub fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn flag_calls(&self) -> usize {
            self.flag_calls.load(Ordering::SeqCst)
        }

        pub fn delete_calls(&self) -> usize {
            self.delete_calls.load(Ordering::SeqCst)
        }

        fn check(&self, folder: &FolderConfig) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(TermailError::remote(
                    &folder.name,
                    &folder.host,
                    "connection refused",
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteMailbox for FakeRemote {
        async fn fetch(
            &self,
            folder: &FolderConfig,
            limit: Option<usize>,
            reverse: bool,
        ) -> Result<Vec<FetchedMessage>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.check(folder)?;
            let boxes = self
                .mailboxes
                .lock()
                .map_err(|e| TermailError::remote(&folder.name, &folder.host, e))?;
            let mut messages = boxes.get(&folder.name).cloned().unwrap_or_default();
            if reverse {
                messages.reverse();
            }
            if let Some(limit) = limit {
                messages.truncate(limit);
            }
            Ok(messages)
        }

        async fn set_flag(
            &self,
            folder: &FolderConfig,
            _uid: u32,
            _flag: &Flag,
            _value: bool,
        ) -> Result<()> {
            self.flag_calls.fetch_add(1, Ordering::SeqCst);
            self.check(folder)
        }

        async fn delete(&self, folder: &FolderConfig, uid: u32) -> Result<()> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            self.check(folder)?;
            let mut boxes = self
                .mailboxes
                .lock()
                .map_err(|e| TermailError::remote(&folder.name, &folder.host, e))?;
            if let Some(messages) = boxes.get_mut(&folder.name) {
                messages.retain(|m| m.uid != Some(uid));
            }
            Ok(())
        }

        async fn list_mailboxes(&self, folder: &FolderConfig) -> Result<Vec<String>> {
            self.check(folder)?;
            Ok(vec!["INBOX".to_string(), "Sent".to_string()])
        }
    }
}
