use std::cmp::Ordering;

use sqlx::{SqlitePool, sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions};
use tracing::{debug, info};

use crate::codec::{
    decode_flags, decode_headers, decode_list, encode_flags, encode_headers, encode_list,
};
use crate::date::timestamp_for;
use crate::error::{Result, TermailError};
use crate::model::{Attachment, CachedMessage, Flags, TaggedMessage};

const MESSAGE_COLUMNS: &str = "id, config_name, server, folder, uid, subject, from_addr, \
     to_addrs, cc_addrs, bcc_addrs, reply_to, date, date_ts, text, html, flags, headers, \
     size, size_rfc822";

/// Order applied to a listing after rows are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Date,
    Subject,
    Sender,
    Folder,
}

impl SortKey {
    fn compare(self, a: &CachedMessage, b: &CachedMessage) -> Ordering {
        match self {
            SortKey::Date => a.timestamp.cmp(&b.timestamp),
            SortKey::Subject => a.subject.cmp(&b.subject),
            SortKey::Sender => a.from.cmp(&b.from),
            SortKey::Folder => a.config_name.cmp(&b.config_name),
        }
    }
}

/// Read request against the cache.
///
/// `limit` caps the rows the query returns, newest first, *before* `sort`
/// is applied. With several folders the capped set is taken across all of
/// them, not per folder. A limit of 0 means no limit.
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub folders: Option<Vec<String>>,
    pub limit: Option<usize>,
    pub sort: SortKey,
    pub descending: bool,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    config_name: String,
    server: String,
    folder: String,
    uid: Option<i64>,
    subject: String,
    from_addr: String,
    to_addrs: Option<String>,
    cc_addrs: Option<String>,
    bcc_addrs: Option<String>,
    reply_to: Option<String>,
    date: String,
    date_ts: i64,
    text: String,
    html: String,
    flags: Option<String>,
    headers: Option<String>,
    size: i64,
    size_rfc822: i64,
}

impl TryFrom<MessageRow> for CachedMessage {
    type Error = TermailError;

    fn try_from(row: MessageRow) -> Result<Self> {
        let uid = row
            .uid
            .map(u32::try_from)
            .transpose()
            .map_err(|e| TermailError::Codec(format!("uid of message {}: {}", row.id, e)))?;
        Ok(CachedMessage {
            id: row.id,
            config_name: row.config_name,
            server: row.server,
            folder: row.folder,
            uid,
            subject: row.subject,
            from: row.from_addr,
            to: decode_list(row.to_addrs.as_deref())?,
            cc: decode_list(row.cc_addrs.as_deref())?,
            bcc: decode_list(row.bcc_addrs.as_deref())?,
            reply_to: decode_list(row.reply_to.as_deref())?,
            date_str: row.date,
            timestamp: row.date_ts,
            text: row.text,
            html: row.html,
            flags: decode_flags(row.flags.as_deref())?,
            headers: decode_headers(row.headers.as_deref())?,
            size: row.size,
            size_rfc822: row.size_rfc822,
        })
    }
}

/// Local snapshot of fetched messages plus the last-selected pointer.
#[derive(Clone)]
pub struct SqliteMessageCache {
    pool: SqlitePool,
}

impl SqliteMessageCache {
    pub async fn connect(path: &str) -> Result<Self> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{}", path)
        };
        let options = SqliteConnectOptions::new()
            .filename(url.trim_start_matches("sqlite:"))
            .foreign_keys(true)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Replaces every cached message with `messages` in one transaction.
    ///
    /// The last-selected pointer is cleared and the generation counter bumped
    /// as part of the same transaction. Returns the new generation.
    pub async fn replace_all(&self, messages: &[TaggedMessage]) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM attachments")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM messages").execute(&mut *tx).await?;

        for tagged in messages {
            let msg = &tagged.message;
            let result = sqlx::query(
                "INSERT INTO messages (config_name, server, folder, uid, subject, from_addr,
                     to_addrs, cc_addrs, bcc_addrs, reply_to, date, date_ts, text, html, flags,
                     headers, size, size_rfc822)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&tagged.config_name)
            .bind(&tagged.server)
            .bind(&tagged.folder)
            .bind(msg.uid.map(i64::from))
            .bind(&msg.subject)
            .bind(&msg.from)
            .bind(encode_list(&msg.to)?)
            .bind(encode_list(&msg.cc)?)
            .bind(encode_list(&msg.bcc)?)
            .bind(encode_list(&msg.reply_to)?)
            .bind(&msg.date_str)
            .bind(timestamp_for(&msg.date_str))
            .bind(&msg.text)
            .bind(&msg.html)
            .bind(encode_flags(&msg.flags)?)
            .bind(encode_headers(&msg.headers)?)
            .bind(msg.size)
            .bind(msg.size_rfc822)
            .execute(&mut *tx)
            .await?;
            let message_id = result.last_insert_rowid();

            for attachment in &msg.attachments {
                sqlx::query(
                    "INSERT INTO attachments (message_id, filename, payload, content_id,
                         content_type, content_disposition, size)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(message_id)
                .bind(&attachment.filename)
                .bind(&attachment.payload)
                .bind(&attachment.content_id)
                .bind(&attachment.content_type)
                .bind(&attachment.content_disposition)
                .bind(attachment.size)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query("UPDATE cache_meta SET generation = generation + 1 WHERE id = 1")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE session SET last_message_id = NULL WHERE id = 1")
            .execute(&mut *tx)
            .await?;
        let (generation,) =
            sqlx::query_as::<_, (i64,)>("SELECT generation FROM cache_meta WHERE id = 1")
                .fetch_one(&mut *tx)
                .await?;
        tx.commit().await?;

        info!(
            "cache replaced generation={} messages={}",
            generation,
            messages.len()
        );
        Ok(generation)
    }

    pub async fn query(&self, query: &MessageQuery) -> Result<Vec<CachedMessage>> {
        let mut sql = format!("SELECT {} FROM messages", MESSAGE_COLUMNS);
        if let Some(folders) = &query.folders {
            if folders.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = folders.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            sql.push_str(&format!(" WHERE config_name IN ({})", placeholders));
        }
        sql.push_str(" ORDER BY date_ts DESC, id ASC");
        let limit = query.limit.filter(|&n| n > 0);
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query_as::<_, MessageRow>(&sql);
        if let Some(folders) = &query.folders {
            for name in folders {
                q = q.bind(name);
            }
        }
        if let Some(limit) = limit {
            q = q.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        let rows = q.fetch_all(&self.pool).await?;
        let mut messages = rows
            .into_iter()
            .map(CachedMessage::try_from)
            .collect::<Result<Vec<_>>>()?;

        let key = query.sort;
        if query.descending {
            messages.sort_by(|a, b| key.compare(b, a));
        } else {
            messages.sort_by(|a, b| key.compare(a, b));
        }
        debug!(
            "cache query folders={:?} limit={:?} sort={:?} desc={} rows={}",
            query.folders,
            query.limit,
            query.sort,
            query.descending,
            messages.len()
        );
        Ok(messages)
    }

    pub async fn get(&self, id: i64) -> Result<Option<CachedMessage>> {
        let sql = format!("SELECT {} FROM messages WHERE id = ?", MESSAGE_COLUMNS);
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CachedMessage::try_from).transpose()
    }

    pub async fn require(&self, id: i64) -> Result<CachedMessage> {
        self.get(id)
            .await?
            .ok_or(TermailError::MessageNotFound(id))
    }

    /// Messages whose subject contains any of `patterns`, case-sensitively.
    pub async fn find_by_subject(&self, patterns: &[String]) -> Result<Vec<CachedMessage>> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }
        let conditions = patterns
            .iter()
            .map(|_| "instr(subject, ?) > 0")
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT {} FROM messages WHERE {} ORDER BY date_ts DESC, id ASC",
            MESSAGE_COLUMNS, conditions
        );
        let mut q = sqlx::query_as::<_, MessageRow>(&sql);
        for pattern in patterns {
            q = q.bind(pattern);
        }
        q.fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CachedMessage::try_from)
            .collect()
    }

    pub async fn update_flags(&self, id: i64, flags: &Flags) -> Result<()> {
        let result = sqlx::query("UPDATE messages SET flags = ? WHERE id = ?")
            .bind(encode_flags(flags)?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(TermailError::CacheInconsistency(format!(
                "flag update for message {} matched no cached row",
                id
            )));
        }
        Ok(())
    }

    /// Removes one message and its attachments. Returns false if it was not cached.
    pub async fn delete_message(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM attachments WHERE message_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn attachments(&self, message_id: i64) -> Result<Vec<Attachment>> {
        let rows = sqlx::query_as::<_, (i64, i64, String, Vec<u8>, String, String, String, i64)>(
            "SELECT id, message_id, filename, payload, content_id, content_type,
                    content_disposition, size
             FROM attachments WHERE message_id = ? ORDER BY id",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| Attachment {
                id: row.0,
                message_id: row.1,
                filename: row.2,
                payload: row.3,
                content_id: row.4,
                content_type: row.5,
                content_disposition: row.6,
                size: row.7,
            })
            .collect())
    }

    pub async fn count_for_folder(&self, config_name: &str) -> Result<i64> {
        let (count,) =
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM messages WHERE config_name = ?")
                .bind(config_name)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn generation(&self) -> Result<i64> {
        let (generation,) =
            sqlx::query_as::<_, (i64,)>("SELECT generation FROM cache_meta WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(generation)
    }

    pub async fn last_selected(&self) -> Result<Option<i64>> {
        let row = sqlx::query_as::<_, (Option<i64>,)>(
            "SELECT last_message_id FROM session WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(|r| r.0))
    }

    pub async fn set_last_selected(&self, id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO session (id, last_message_id) VALUES (1, ?)
             ON CONFLICT(id) DO UPDATE SET last_message_id = excluded.last_message_id",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_last_selected(&self) -> Result<()> {
        sqlx::query("UPDATE session SET last_message_id = NULL WHERE id = 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
