//! Periodic publish tick.
//!
//! A timer wakes every few minutes and flips due scheduled articles
//! visible. The same operation backs the HTTP tick endpoint, so a missed
//! timer run can be made up for manually at any time.

use std::time::Duration;

use newsdesk_shared::{now_ms, ArticleStore};

pub fn spawn_publish_scheduler(store: ArticleStore, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately, which doubles as a catch-up
        // after a restart.
        loop {
            ticker.tick().await;
            let updated = run_due_transitions(&store, now_ms()).await;
            if updated > 0 {
                tracing::info!(updated, "publish tick flipped articles visible");
            }
        }
    });
}

/// One tick: publish every article whose schedule came due. Per-article
/// failures are logged and skipped; the batch always finishes and only a
/// success count comes back.
pub async fn run_due_transitions(store: &ArticleStore, now: i64) -> usize {
    let due = match store.due_for_publish(now).await {
        Ok(batch) => batch,
        Err(err) => {
            tracing::warn!("publish tick could not scan for due articles: {err}");
            return 0;
        },
    };

    let mut updated = 0;
    for article in due {
        let Some(scheduled_at) = article.scheduled_at else {
            continue;
        };
        match store.mark_published(&article.id, scheduled_at).await {
            Ok(true) => {
                tracing::info!(id = %article.id, title = %article.title, "article published");
                updated += 1;
            },
            // A concurrent edit or earlier tick got there first.
            Ok(false) => {},
            Err(err) => {
                tracing::warn!(id = %article.id, "skipping article in publish tick: {err}");
            },
        }
    }
    updated
}
