use async_trait::async_trait;

use crate::error::Result;
use crate::model::{FetchedMessage, Flag, FolderConfig};

/// Access to the mail server behind a folder config.
///
/// Each call opens its own authenticated session, performs one operation and
/// releases the session on every exit path. Failures surface as
/// `TermailError::RemoteMailbox` and are never retried.
#[async_trait]
pub trait RemoteMailbox: Send + Sync {
    /// Fetches up to `limit` messages without touching their read state,
    /// newest arrivals first when `reverse` is set.
    async fn fetch(
        &self,
        folder: &FolderConfig,
        limit: Option<usize>,
        reverse: bool,
    ) -> Result<Vec<FetchedMessage>>;

    async fn set_flag(&self, folder: &FolderConfig, uid: u32, flag: &Flag, value: bool)
        -> Result<()>;

    async fn delete(&self, folder: &FolderConfig, uid: u32) -> Result<()>;

    /// Selectable mailbox names on the folder's server.
    async fn list_mailboxes(&self, folder: &FolderConfig) -> Result<Vec<String>>;
}
