use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use anyhow::Result;
use async_trait::async_trait;
use imap::{ClientBuilder, ConnectionMode};
use tracing::debug;

use termail_core::{FetchedMessage, Flag, Flags, FolderConfig, RemoteMailbox, TermailError};

const DEFAULT_FETCH_CHUNK_SIZE: usize = 50;

/// IMAP implementation of [`RemoteMailbox`].
///
/// Sessions are blocking and run on the tokio blocking pool, one session per call.
#[derive(Debug, Clone)]
pub struct ImapMailbox {
    fetch_chunk_size: usize,
}

impl Default for ImapMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ImapMailbox {
    pub fn new() -> Self {
        Self {
            fetch_chunk_size: DEFAULT_FETCH_CHUNK_SIZE,
        }
    }

    pub fn with_fetch_chunk_size(mut self, size: usize) -> Self {
        self.fetch_chunk_size = size.max(1);
        self
    }
}

#[async_trait]
impl RemoteMailbox for ImapMailbox {
    async fn fetch(
        &self,
        folder: &FolderConfig,
        limit: Option<usize>,
        reverse: bool,
    ) -> termail_core::Result<Vec<FetchedMessage>> {
        let chunk_size = self.fetch_chunk_size;
        run_blocking(folder, move |folder| {
            fetch_messages(folder, limit, reverse, chunk_size)
        })
        .await
    }

    async fn set_flag(
        &self,
        folder: &FolderConfig,
        uid: u32,
        flag: &Flag,
        value: bool,
    ) -> termail_core::Result<()> {
        let flag = flag.clone();
        run_blocking(folder, move |folder| store_flag(folder, uid, &flag, value)).await
    }

    async fn delete(&self, folder: &FolderConfig, uid: u32) -> termail_core::Result<()> {
        run_blocking(folder, move |folder| delete_message(folder, uid)).await
    }

    async fn list_mailboxes(&self, folder: &FolderConfig) -> termail_core::Result<Vec<String>> {
        run_blocking(folder, list_mailboxes).await
    }
}

async fn run_blocking<T, F>(folder: &FolderConfig, op: F) -> termail_core::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&FolderConfig) -> Result<T> + Send + 'static,
{
    let owned = folder.clone();
    match tokio::task::spawn_blocking(move || op(&owned)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TermailError::remote(
            &folder.name,
            &folder.host,
            format!("{:#}", err),
        )),
        Err(err) => Err(TermailError::remote(&folder.name, &folder.host, err)),
    }
}

/// Authenticated session that logs out when dropped.
struct ScopedSession(imap::Session<imap::Connection>);

impl ScopedSession {
    fn open(folder: &FolderConfig) -> Result<Self> {
        debug!(
            "imap connect host={} port={} user={}",
            folder.host, folder.port, folder.user
        );
        let client = ClientBuilder::new(folder.host.as_str(), folder.port)
            .tls_kind(imap::TlsKind::Native)
            .mode(ConnectionMode::AutoTls)
            .danger_skip_tls_verify(folder.skip_tls_verify)
            .connect()?;
        let session = client
            .login(&folder.user, &folder.password)
            .map_err(|e| e.0)?;
        debug!("imap login ok host={}", folder.host);
        Ok(Self(session))
    }
}

impl Deref for ScopedSession {
    type Target = imap::Session<imap::Connection>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ScopedSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if let Err(err) = self.0.logout() {
            debug!("imap logout failed: {}", err);
        }
    }
}

fn fetch_messages(
    folder: &FolderConfig,
    limit: Option<usize>,
    reverse: bool,
    chunk_size: usize,
) -> Result<Vec<FetchedMessage>> {
    let mut session = ScopedSession::open(folder)?;
    // EXAMINE opens read-only, so fetching never sets \Seen.
    let mailbox = session.examine(&folder.folder)?;
    debug!(
        "imap examine folder={} exists={}",
        folder.folder, mailbox.exists
    );
    if mailbox.exists == 0 {
        return Ok(Vec::new());
    }

    let uids = order_uids(session.uid_search("ALL")?, limit, reverse);
    let mut messages = Vec::with_capacity(uids.len());
    for chunk in uids.chunks(chunk_size.max(1)) {
        debug!(
            "imap uid_fetch folder={} count={}",
            folder.folder,
            chunk.len()
        );
        let fetches = session.uid_fetch(uid_set(chunk), "(UID FLAGS RFC822.SIZE BODY.PEEK[])")?;
        let mut by_uid: HashMap<u32, FetchedMessage> = HashMap::new();
        for fetch in fetches.iter() {
            let Some(uid) = fetch.uid else { continue };
            let Some(raw) = fetch.body() else { continue };
            let mut message = termail_content::parse_message(raw)?;
            message.uid = Some(uid);
            message.flags = fetch
                .flags()
                .iter()
                .map(|flag| flag.to_string())
                .collect::<Flags>();
            if let Some(size) = fetch.size {
                message.size_rfc822 = i64::from(size);
            }
            by_uid.insert(uid, message);
        }
        messages.extend(chunk.iter().filter_map(|uid| by_uid.remove(uid)));
    }
    Ok(messages)
}

fn store_flag(folder: &FolderConfig, uid: u32, flag: &Flag, value: bool) -> Result<()> {
    let mut session = ScopedSession::open(folder)?;
    session.select(&folder.folder)?;
    let command = flag_store_command(flag, value);
    debug!(
        "imap uid_store folder={} uid={} {}",
        folder.folder, uid, command
    );
    session.uid_store(uid.to_string(), command)?;
    Ok(())
}

fn delete_message(folder: &FolderConfig, uid: u32) -> Result<()> {
    let mut session = ScopedSession::open(folder)?;
    session.select(&folder.folder)?;
    session.uid_store(uid.to_string(), "+FLAGS.SILENT (\\Deleted)")?;
    session.expunge()?;
    debug!("imap deleted folder={} uid={}", folder.folder, uid);
    Ok(())
}

fn list_mailboxes(folder: &FolderConfig) -> Result<Vec<String>> {
    let mut session = ScopedSession::open(folder)?;
    let list = session.list(None, Some("*"))?;
    Ok(list
        .iter()
        .filter(|name| {
            !name
                .attributes()
                .iter()
                .any(|attr| matches!(attr, imap_proto::NameAttribute::NoSelect))
        })
        .map(|name| name.name().to_string())
        .collect())
}

fn order_uids<I>(uids: I, limit: Option<usize>, reverse: bool) -> Vec<u32>
where
    I: IntoIterator<Item = u32>,
{
    let mut ordered: Vec<u32> = uids.into_iter().collect();
    if reverse {
        ordered.sort_unstable_by(|a, b| b.cmp(a));
    } else {
        ordered.sort_unstable();
    }
    if let Some(limit) = limit {
        ordered.truncate(limit);
    }
    ordered
}

fn flag_store_command(flag: &Flag, value: bool) -> String {
    let sign = if value { '+' } else { '-' };
    format!("{}FLAGS.SILENT ({})", sign, flag.as_str())
}

fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(|uid| uid.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
