//! Best-effort change notifications. Mutating handlers publish a topic
//! after committing; the SSE endpoint relays them so the mini-app can
//! refetch. Delivery is advisory only: the ledger stays correct if events
//! are dropped, duplicated, or delayed, and lagging subscribers just skip.

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
  Users,
  Balance,
  Tasks,
  Referrals,
  Prizes,
  Taps,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
  pub topic: Topic,
  pub tg_user_id: i64,
}

#[derive(Debug, Clone)]
pub struct Hub {
  tx: broadcast::Sender<Event>,
}

impl Hub {
  pub fn new() -> Self {
    let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
    Self { tx }
  }

  pub fn publish(&self, topic: Topic, tg_user_id: i64) {
    let _ = self.tx.send(Event { topic, tg_user_id });
  }

  pub fn subscribe(&self) -> broadcast::Receiver<Event> {
    self.tx.subscribe()
  }
}

impl Default for Hub {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn publish_without_subscribers_is_a_noop() {
    let hub = Hub::new();
    hub.publish(Topic::Balance, 1);
  }

  #[tokio::test]
  async fn subscriber_receives_events_in_order() {
    let hub = Hub::new();
    let mut rx = hub.subscribe();

    hub.publish(Topic::Tasks, 7);
    hub.publish(Topic::Balance, 7);

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.topic, Topic::Tasks);
    assert_eq!(second.topic, Topic::Balance);
    assert_eq!(second.tg_user_id, 7);
  }
}
