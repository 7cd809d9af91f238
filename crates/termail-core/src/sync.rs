use tracing::{debug, info};

use crate::cache::SqliteMessageCache;
use crate::error::Result;
use crate::model::{FolderConfig, TaggedMessage};
use crate::remote::RemoteMailbox;

/// Per-folder progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncProgress<'a> {
    Started { folder: &'a str },
    Finished { folder: &'a str, fetched: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cache now holds exactly the fetched messages.
    Replaced { generation: i64, messages: usize },
    /// Nothing was fetched from any folder; the cache was left as it was.
    Empty,
}

/// Rebuilds the message cache from a fresh fetch of every folder.
pub struct CacheSynchronizer<'a> {
    remote: &'a dyn RemoteMailbox,
    cache: &'a SqliteMessageCache,
}

impl<'a> CacheSynchronizer<'a> {
    pub fn new(remote: &'a dyn RemoteMailbox, cache: &'a SqliteMessageCache) -> Self {
        Self { remote, cache }
    }

    /// Fetches `folders` in order and replaces the cache with the union.
    ///
    /// Any folder failing aborts the run before the cache is touched.
    /// A `limit` of 0 fetches every message.
    pub async fn synchronize(
        &self,
        folders: &[FolderConfig],
        limit: Option<usize>,
        mut progress: impl FnMut(SyncProgress<'_>),
    ) -> Result<SyncOutcome> {
        let limit = limit.filter(|&n| n > 0);
        let mut collected = Vec::new();
        for folder in folders {
            progress(SyncProgress::Started {
                folder: &folder.name,
            });
            let messages = self.remote.fetch(folder, limit, true).await?;
            let fetched = messages.len();
            debug!(
                "fetched folder={} host={} messages={}",
                folder.name, folder.host, fetched
            );
            collected.extend(
                messages
                    .into_iter()
                    .map(|message| TaggedMessage::new(folder, message)),
            );
            progress(SyncProgress::Finished {
                folder: &folder.name,
                fetched,
            });
        }

        if collected.is_empty() {
            info!("no messages fetched from {} folders, cache kept", folders.len());
            return Ok(SyncOutcome::Empty);
        }

        let generation = self.cache.replace_all(&collected).await?;
        Ok(SyncOutcome::Replaced {
            generation,
            messages: collected.len(),
        })
    }
}
