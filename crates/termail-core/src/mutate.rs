use tracing::info;

use crate::cache::SqliteMessageCache;
use crate::error::{Result, TermailError};
use crate::model::{CachedMessage, Flag, FolderConfig, TERMAIL_KEYWORD};
use crate::remote::RemoteMailbox;

/// Applies flag changes and deletions to the server first, then to the cache.
pub struct MutationCoordinator<'a> {
    remote: &'a dyn RemoteMailbox,
    cache: &'a SqliteMessageCache,
    folders: &'a [FolderConfig],
}

impl<'a> MutationCoordinator<'a> {
    pub fn new(
        remote: &'a dyn RemoteMailbox,
        cache: &'a SqliteMessageCache,
        folders: &'a [FolderConfig],
    ) -> Self {
        Self {
            remote,
            cache,
            folders,
        }
    }

    /// Sets or clears `flag`. Returns false when the message already had the
    /// desired state and nothing was done.
    ///
    /// On success `message.flags` matches what was written to the cache.
    pub async fn set_flag(
        &self,
        message: &mut CachedMessage,
        flag: Flag,
        value: bool,
    ) -> Result<bool> {
        if message.flags.contains(&flag) == value {
            return Ok(false);
        }
        let uid = require_uid(message)?;
        let folder = self.folder_for(message)?;
        self.remote.set_flag(folder, uid, &flag, value).await?;

        let mut flags = message.flags.clone();
        if value {
            flags.insert(flag.clone());
        } else {
            flags.remove(&flag);
        }
        self.cache.update_flags(message.id, &flags).await?;
        message.flags = flags;
        info!(
            "flag {} set={} on message {} (uid {} in {})",
            flag, value, message.id, uid, folder.name
        );
        Ok(true)
    }

    /// Marks a message as seen and as read through termail.
    pub async fn mark_read(&self, message: &mut CachedMessage) -> Result<()> {
        self.set_flag(message, Flag::Seen, true).await?;
        self.set_flag(message, Flag::Keyword(TERMAIL_KEYWORD.to_string()), true)
            .await?;
        Ok(())
    }

    /// Deletes the message on the server, then drops its cached row.
    ///
    /// The last-selected pointer is left alone.
    pub async fn delete(&self, message: &CachedMessage) -> Result<()> {
        let uid = require_uid(message)?;
        let folder = self.folder_for(message)?;
        self.remote.delete(folder, uid).await?;
        if !self.cache.delete_message(message.id).await? {
            return Err(TermailError::CacheInconsistency(format!(
                "message {} was deleted remotely but missing from the cache",
                message.id
            )));
        }
        info!(
            "deleted message {} (uid {} in {})",
            message.id, uid, folder.name
        );
        Ok(())
    }

    fn folder_for(&self, message: &CachedMessage) -> Result<&'a FolderConfig> {
        self.folders
            .iter()
            .find(|f| f.name == message.config_name)
            .ok_or_else(|| TermailError::FolderNotFound(message.config_name.clone()))
    }
}

fn require_uid(message: &CachedMessage) -> Result<u32> {
    message.uid.ok_or_else(|| {
        TermailError::CacheInconsistency(format!("message {} has no server uid", message.id))
    })
}
