//! Change notifications for the four per-user tables.
//!
//! Writes publish a `ChangeEvent`; signed-in sessions subscribe and reload.
//! With Redis attached, events travel through a pub/sub channel so every API
//! instance sees every write. Without it they stay in-process.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CHANGE_CHANNEL: &str = "linkflow:changes";
const LOCAL_CAPACITY: usize = 256;
const RELAY_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Drafts,
    LearnedTones,
    Logs,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Table::Profiles => "profiles",
            Table::Drafts => "drafts",
            Table::LearnedTones => "learned_tones",
            Table::Logs => "logs",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub user_id: Uuid,
    pub table: Table,
}

#[derive(Clone)]
pub struct ChangeFeed {
    local: broadcast::Sender<ChangeEvent>,
    redis: Option<RedisLink>,
}

/// One publishing connection shared by every clone of the feed, opened on
/// first use and dropped after an error so the next publish reconnects.
#[derive(Clone)]
struct RedisLink {
    client: redis::Client,
    conn: Arc<Mutex<Option<MultiplexedConnection>>>,
    relay_live: Arc<AtomicBool>,
}

impl RedisLink {
    async fn connection(&self) -> redis::RedisResult<MultiplexedConnection> {
        let mut cached = self.conn.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *cached = Some(conn.clone());
        Ok(conn)
    }

    /// Returns the number of subscribers that received the event.
    async fn publish(&self, event: &ChangeEvent) -> anyhow::Result<i64> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.connection().await?;
        let receivers = redis::cmd("PUBLISH")
            .arg(CHANGE_CHANNEL)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await;
        if receivers.is_err() {
            *self.conn.lock().await = None;
        }
        Ok(receivers?)
    }
}

impl ChangeFeed {
    /// In-process only.
    pub fn local() -> Self {
        let (local, _) = broadcast::channel(LOCAL_CAPACITY);
        Self { local, redis: None }
    }

    /// Routes events through Redis. Call `spawn_relay` once so they come back in.
    pub fn with_redis(client: redis::Client) -> Self {
        let (local, _) = broadcast::channel(LOCAL_CAPACITY);
        Self {
            local,
            redis: Some(RedisLink {
                client,
                conn: Arc::new(Mutex::new(None)),
                relay_live: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.local.subscribe()
    }

    /// Best effort. The event is also sent on the local channel whenever this
    /// instance's relay cannot be relied on to bring it back: the publish
    /// failed, nobody was subscribed, or the relay is between subscriptions.
    pub async fn publish(&self, event: ChangeEvent) {
        if let Some(link) = &self.redis {
            let receivers = match link.publish(&event).await {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("Redis publish of {} change failed, delivering locally: {e}", event.table);
                    None
                }
            };
            if !needs_local_delivery(receivers, link.relay_live.load(Ordering::SeqCst)) {
                return;
            }
            debug!("Delivering {} change locally", event.table);
        }
        // No receivers is fine: nobody is signed in.
        let _ = self.local.send(event);
    }

    /// Forwards events from the Redis channel to local subscribers.
    /// Returns `None` for an in-process feed.
    pub fn spawn_relay(&self) -> Option<JoinHandle<()>> {
        let link = self.redis.clone()?;
        let local = self.local.clone();
        Some(tokio::spawn(async move {
            loop {
                let outcome = relay_once(&link.client, &local, &link.relay_live).await;
                link.relay_live.store(false, Ordering::SeqCst);
                match outcome {
                    Ok(()) => warn!("Redis change subscription ended, resubscribing"),
                    Err(e) => warn!("Redis change subscription failed: {e}"),
                }
                tokio::time::sleep(RELAY_BACKOFF).await;
            }
        }))
    }
}

/// `receivers` is `None` when the publish itself failed.
fn needs_local_delivery(receivers: Option<i64>, relay_live: bool) -> bool {
    match receivers {
        Some(n) => n == 0 || !relay_live,
        None => true,
    }
}

async fn relay_once(
    client: &redis::Client,
    local: &broadcast::Sender<ChangeEvent>,
    live: &AtomicBool,
) -> anyhow::Result<()> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(CHANGE_CHANNEL).await?;
    live.store(true, Ordering::SeqCst);
    info!("Subscribed to Redis channel {CHANGE_CHANNEL}");

    let mut messages = pubsub.on_message();
    while let Some(msg) = messages.next().await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!("Unreadable change payload: {e}");
                continue;
            }
        };
        match decode_event(&payload) {
            Some(event) => {
                let _ = local.send(event);
            }
            None => warn!("Ignoring malformed change payload: {payload}"),
        }
    }
    Ok(())
}

fn decode_event(payload: &str) -> Option<ChangeEvent> {
    serde_json::from_str(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_feed_delivers_to_subscribers() {
        let feed = ChangeFeed::local();
        let mut rx = feed.subscribe();
        let event = ChangeEvent {
            user_id: Uuid::new_v4(),
            table: Table::Drafts,
        };
        feed.publish(event).await;
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let feed = ChangeFeed::local();
        feed.publish(ChangeEvent {
            user_id: Uuid::new_v4(),
            table: Table::Logs,
        })
        .await;
        assert!(feed.spawn_relay().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_redis_delivers_locally() {
        let client = redis::Client::open("redis://127.0.0.1:9/").unwrap();
        let feed = ChangeFeed::with_redis(client);
        let mut rx = feed.subscribe();
        let event = ChangeEvent {
            user_id: Uuid::new_v4(),
            table: Table::Drafts,
        };

        feed.publish(event).await;
        assert_eq!(rx.recv().await.unwrap(), event);
        // A failed connect is not cached.
        let link = feed.redis.as_ref().unwrap();
        assert!(link.conn.lock().await.is_none());
    }

    #[test]
    fn test_local_delivery_when_relay_cannot_bring_event_back() {
        // Published and our relay is subscribed: it will redeliver.
        assert!(!needs_local_delivery(Some(1), true));
        assert!(!needs_local_delivery(Some(3), true));
        // Nobody listening, including our own relay.
        assert!(needs_local_delivery(Some(0), true));
        // Other instances heard it but our relay is resubscribing.
        assert!(needs_local_delivery(Some(2), false));
        assert!(needs_local_delivery(None, true));
    }

    #[test]
    fn test_event_wire_format() {
        let id = Uuid::nil();
        let event = ChangeEvent {
            user_id: id,
            table: Table::LearnedTones,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"user_id":"00000000-0000-0000-0000-000000000000","table":"learned_tones"}"#
        );
        assert_eq!(decode_event(&json), Some(event));
        assert_eq!(decode_event("not json"), None);
    }
}
