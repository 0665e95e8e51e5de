//! Role-addressed message delivery.
//!
//! Each registered role owns a priority queue and a wake primitive.
//! A receiver only ever touches its own queue, so a message can never be
//! consumed by the wrong agent no matter how many receivers are waiting.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use agentnet_common::{Message, NetworkError, Result, Role};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// A queued message plus the keys that order it.
struct Envelope {
    priority: u32,
    seq: u64,
    message: Message,
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Envelope {}

impl PartialOrd for Envelope {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Envelope {
    // BinaryHeap pops the greatest element, so both keys are reversed:
    // lowest priority number first, then earliest enqueue.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct Slot {
    queue: Mutex<BinaryHeap<Envelope>>,
    notify: Notify,
}

/// Delivers every message to exactly the role it is addressed to.
///
/// Messages to one role come out by ascending priority value, FIFO within
/// a priority. There is no ordering across roles.
pub struct Mailbox {
    slots: HashMap<Role, Slot>,
    seq: AtomicU64,
    closed: AtomicBool,
}

impl Mailbox {
    /// A mailbox with a queue for each of `roles`.
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            slots: roles.into_iter().map(|r| (r, Slot::default())).collect(),
            seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// A mailbox with every role registered.
    pub fn for_all_roles() -> Self {
        Self::new(Role::ALL)
    }

    pub fn is_registered(&self, role: Role) -> bool {
        self.slots.contains_key(&role)
    }

    /// Queue `message` for its recipient and wake that recipient.
    ///
    /// Fails with [`NetworkError::Delivery`] if the recipient is not
    /// registered or the mailbox is closed. The message is dropped.
    pub fn enqueue(&self, message: Message) -> Result<()> {
        let to = message.to();

        if self.is_closed() {
            warn!(to = %to, from = %message.from(), id = %message.id(), "Mailbox closed, dropping message");
            return Err(NetworkError::delivery(to, "mailbox is closed"));
        }

        let Some(slot) = self.slots.get(&to) else {
            warn!(to = %to, from = %message.from(), id = %message.id(), "No mailbox for role, dropping message");
            return Err(NetworkError::delivery(to, "role is not registered"));
        };

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        debug!(
            to = %to,
            from = %message.from(),
            priority = message.priority(),
            seq,
            "Enqueued message"
        );
        slot.queue.lock().push(Envelope {
            priority: message.priority(),
            seq,
            message,
        });
        slot.notify.notify_one();
        Ok(())
    }

    /// Wait for the next message addressed to `role`.
    ///
    /// Returns `None` once the mailbox is closed and the role's queue has
    /// drained, or immediately for a role that is not registered.
    pub async fn receive(&self, role: Role) -> Option<Message> {
        let Some(slot) = self.slots.get(&role) else {
            warn!(role = %role, "Receive on unregistered role");
            return None;
        };

        loop {
            // Register interest before checking, so a wake between the
            // check and the await is not lost.
            let notified = slot.notify.notified();

            let next = slot.queue.lock().pop();
            if let Some(envelope) = next {
                return Some(envelope.message);
            }
            if self.is_closed() {
                return None;
            }

            notified.await;
        }
    }

    /// Number of messages waiting for `role`.
    pub fn pending(&self, role: Role) -> usize {
        self.slots
            .get(&role)
            .map(|slot| slot.queue.lock().len())
            .unwrap_or(0)
    }

    /// Refuse new messages and wake every waiting receiver.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Closing mailbox");
        for slot in self.slots.values() {
            slot.notify.notify_waiters();
            slot.notify.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::for_all_roles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn msg(to: Role, priority: u32, tag: &str) -> Message {
        Message::new(Role::Coordinator, to, json!({ "tag": tag })).with_priority(priority)
    }

    fn tag(message: &Message) -> &str {
        message.get("tag").and_then(|v| v.as_str()).unwrap_or_default()
    }

    #[tokio::test]
    async fn delivers_by_priority_then_fifo() {
        let mailbox = Mailbox::for_all_roles();
        mailbox.enqueue(msg(Role::Architect, 5, "low")).unwrap();
        mailbox.enqueue(msg(Role::Architect, 1, "high-a")).unwrap();
        mailbox.enqueue(msg(Role::Architect, 3, "mid")).unwrap();
        mailbox.enqueue(msg(Role::Architect, 1, "high-b")).unwrap();

        let mut order = vec![];
        for _ in 0..4 {
            let m = mailbox.receive(Role::Architect).await.unwrap();
            order.push(tag(&m).to_string());
        }
        assert_eq!(order, vec!["high-a", "high-b", "mid", "low"]);
    }

    #[tokio::test]
    async fn unregistered_role_is_a_delivery_failure() {
        let mailbox = Mailbox::new([Role::Coordinator, Role::Researcher]);
        let err = mailbox.enqueue(msg(Role::Security, 1, "x")).unwrap_err();
        assert!(matches!(err, NetworkError::Delivery { role: Role::Security, .. }));
        assert_eq!(mailbox.pending(Role::Security), 0);
        assert!(mailbox.receive(Role::Security).await.is_none());
    }

    #[tokio::test]
    async fn enqueue_after_close_fails() {
        let mailbox = Mailbox::for_all_roles();
        mailbox.close();
        assert!(mailbox.enqueue(msg(Role::Developer, 1, "late")).is_err());
    }

    #[tokio::test]
    async fn receiver_wakes_on_enqueue() {
        let mailbox = Arc::new(Mailbox::for_all_roles());
        let receiver = {
            let mailbox = mailbox.clone();
            tokio::spawn(async move { mailbox.receive(Role::Reviewer).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        mailbox.enqueue(msg(Role::Reviewer, 1, "wake")).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), receiver)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(tag(&received), "wake");
    }

    #[tokio::test]
    async fn close_releases_blocked_receivers() {
        let mailbox = Arc::new(Mailbox::for_all_roles());
        let mut handles = vec![];
        for role in [Role::Architect, Role::Developer, Role::Security] {
            let mailbox = mailbox.clone();
            handles.push(tokio::spawn(async move { mailbox.receive(role).await }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        mailbox.close();

        for h in handles {
            let got = tokio::time::timeout(Duration::from_secs(1), h)
                .await
                .unwrap()
                .unwrap();
            assert!(got.is_none());
        }
    }

    #[tokio::test]
    async fn close_drains_queued_messages_first() {
        let mailbox = Mailbox::for_all_roles();
        mailbox.enqueue(msg(Role::Developer, 1, "queued")).unwrap();
        mailbox.close();

        let m = mailbox.receive(Role::Developer).await.unwrap();
        assert_eq!(tag(&m), "queued");
        assert!(mailbox.receive(Role::Developer).await.is_none());
    }

    #[tokio::test]
    async fn pending_counts_per_role() {
        let mailbox = Mailbox::for_all_roles();
        mailbox.enqueue(msg(Role::Researcher, 1, "a")).unwrap();
        mailbox.enqueue(msg(Role::Researcher, 2, "b")).unwrap();
        mailbox.enqueue(msg(Role::Security, 1, "c")).unwrap();
        assert_eq!(mailbox.pending(Role::Researcher), 2);
        assert_eq!(mailbox.pending(Role::Security), 1);
        assert_eq!(mailbox.pending(Role::Architect), 0);
    }
}
