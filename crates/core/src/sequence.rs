//! Per-image save ordering.
//!
//! Saves are fire-and-forget and may overlap for the same image. Each save
//! takes a [`SaveTicket`] carrying a sequence number that increases
//! monotonically per image. When a response arrives the ticket is completed;
//! if a later save for the same image already completed, the response is
//! [`Completion::Stale`] and the caller must not apply its side effects.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::types::EntityId;

/// Header carrying the sequence number on save requests.
pub const SAVE_SEQUENCE_HEADER: &str = "x-save-sequence";

/// Sequence number issued for one save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    pub image_id: EntityId,
    pub sequence: u64,
}

/// Result of completing a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// This is the newest completed save for the image.
    Current,
    /// A save with sequence `latest` completed first; discard this one.
    Stale { latest: u64 },
}

#[derive(Debug, Default, Clone, Copy)]
struct ImageSequence {
    issued: u64,
    completed: u64,
}

/// Issues and tracks save sequence numbers for every image in a session.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared with spawned save tasks.
#[derive(Debug, Default)]
pub struct SaveSequencer {
    images: RwLock<HashMap<EntityId, ImageSequence>>,
}

impl SaveSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next sequence number for `image_id`, starting at 1.
    pub async fn issue(&self, image_id: &str) -> SaveTicket {
        let mut images = self.images.write().await;
        let entry = images.entry(image_id.to_string()).or_default();
        entry.issued += 1;
        SaveTicket {
            image_id: image_id.to_string(),
            sequence: entry.issued,
        }
    }

    /// Record that the request for `ticket` finished.
    ///
    /// Completing an older ticket after a newer one returns
    /// [`Completion::Stale`] and leaves the recorded state untouched.
    pub async fn complete(&self, ticket: &SaveTicket) -> Completion {
        let mut images = self.images.write().await;
        let entry = images.entry(ticket.image_id.clone()).or_default();
        if entry.completed > ticket.sequence {
            tracing::debug!(
                image_id = %ticket.image_id,
                sequence = ticket.sequence,
                latest = entry.completed,
                "Discarding stale save response"
            );
            return Completion::Stale {
                latest: entry.completed,
            };
        }
        entry.completed = ticket.sequence;
        Completion::Current
    }

    /// Number of issued saves for `image_id` that have not been completed
    /// by a ticket at least as new. Failed saves never complete, so this
    /// stays non-zero until a later save for the image succeeds.
    pub async fn outstanding(&self, image_id: &str) -> u64 {
        self.images
            .read()
            .await
            .get(image_id)
            .map_or(0, |s| s.issued - s.completed.min(s.issued))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn sequences_increase_per_image() {
        let seq = SaveSequencer::new();
        assert_eq!(seq.issue("a").await.sequence, 1);
        assert_eq!(seq.issue("a").await.sequence, 2);
        assert_eq!(seq.issue("b").await.sequence, 1);
        assert_eq!(seq.outstanding("a").await, 2);
        assert_eq!(seq.outstanding("c").await, 0);
    }

    #[tokio::test]
    async fn in_order_completion_is_current() {
        let seq = SaveSequencer::new();
        let t1 = seq.issue("a").await;
        let t2 = seq.issue("a").await;
        assert_eq!(seq.complete(&t1).await, Completion::Current);
        assert_eq!(seq.complete(&t2).await, Completion::Current);
        assert_eq!(seq.outstanding("a").await, 0);
    }

    #[tokio::test]
    async fn out_of_order_completion_is_stale() {
        let seq = SaveSequencer::new();
        let t1 = seq.issue("a").await;
        let t2 = seq.issue("a").await;
        assert_eq!(seq.complete(&t2).await, Completion::Current);
        assert_eq!(seq.complete(&t1).await, Completion::Stale { latest: 2 });
    }

    #[tokio::test]
    async fn images_are_independent() {
        let seq = SaveSequencer::new();
        let a1 = seq.issue("a").await;
        let b1 = seq.issue("b").await;
        let a2 = seq.issue("a").await;
        assert_eq!(seq.complete(&a2).await, Completion::Current);
        assert_eq!(seq.complete(&b1).await, Completion::Current);
        assert_eq!(seq.complete(&a1).await, Completion::Stale { latest: 2 });
    }

    #[tokio::test]
    async fn newer_completion_clears_older_outstanding() {
        let seq = SaveSequencer::new();
        let _failed = seq.issue("a").await;
        let t2 = seq.issue("a").await;
        assert_eq!(seq.outstanding("a").await, 2);
        assert_eq!(seq.complete(&t2).await, Completion::Current);
        assert_eq!(seq.outstanding("a").await, 0);
    }

    #[tokio::test]
    async fn concurrent_issues_are_unique() {
        let seq = Arc::new(SaveSequencer::new());
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let seq = Arc::clone(&seq);
                tokio::spawn(async move { seq.issue("img").await.sequence })
            })
            .collect();

        let mut seen = Vec::new();
        for h in handles {
            seen.push(h.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=20).collect::<Vec<u64>>());
    }
}
