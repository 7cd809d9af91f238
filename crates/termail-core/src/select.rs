use tracing::{debug, warn};

use crate::cache::SqliteMessageCache;
use crate::error::{Result, TermailError};
use crate::model::CachedMessage;

/// Asks the user to pick one of several matching messages.
pub trait Chooser {
    /// Index into `candidates`, or `None` when the user declines to choose.
    fn choose(&self, candidates: &[CachedMessage]) -> Result<Option<usize>>;
}

#[derive(Clone, Copy)]
pub enum Interaction<'a> {
    NonInteractive,
    Interactive(&'a dyn Chooser),
}

/// Resolves `patterns` to exactly one cached message.
///
/// An empty pattern targets the last selected message. Otherwise every
/// message whose subject contains any of the terms is a candidate. The
/// resolved message becomes the new last selection.
pub async fn select_message(
    cache: &SqliteMessageCache,
    patterns: &[String],
    interaction: Interaction<'_>,
) -> Result<CachedMessage> {
    if patterns.is_empty() {
        return last_selected(cache).await;
    }

    let mut candidates = cache.find_by_subject(patterns).await?;
    debug!("patterns={:?} candidates={}", patterns, candidates.len());
    let message = match candidates.len() {
        0 => return Err(TermailError::NoMatch),
        1 => candidates.remove(0),
        count => match interaction {
            Interaction::NonInteractive => {
                return Err(TermailError::AmbiguousSelection { count });
            }
            Interaction::Interactive(chooser) => {
                let index = chooser
                    .choose(&candidates)?
                    .ok_or(TermailError::Cancelled)?;
                if index >= count {
                    return Err(TermailError::Cancelled);
                }
                candidates.swap_remove(index)
            }
        },
    };

    cache.set_last_selected(message.id).await?;
    Ok(message)
}

async fn last_selected(cache: &SqliteMessageCache) -> Result<CachedMessage> {
    let id = cache
        .last_selected()
        .await?
        .ok_or(TermailError::NoLastMessage)?;
    match cache.get(id).await? {
        Some(message) => Ok(message),
        None => {
            warn!("last selected message {} is gone from the cache", id);
            cache.clear_last_selected().await?;
            Err(TermailError::NoLastMessage)
        }
    }
}
