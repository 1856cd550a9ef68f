//! Unbounded single-consumer work queue.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// FIFO queue guarded by its own lock, with a notifier the consumer waits on.
///
/// Producers never block. The consumer suspends in [`WorkQueue::pop`] until
/// an item arrives or its cancellation token fires. Items are removed under
/// the lock and handed out after it is released.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Wait for the next item. Returns `None` once `cancel` has fired.
    pub async fn pop(&self, cancel: &CancellationToken) -> Option<T> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = self.notify.notified() => {}
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Drop all pending items.
    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_fifo() {
        let queue = WorkQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        let queue = Arc::new(WorkQueue::new());
        let cancel = CancellationToken::new();

        let consumer = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.pop(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push("frame");

        assert_eq!(consumer.await.unwrap(), Some("frame"));
    }

    #[tokio::test]
    async fn test_pop_returns_none_on_cancel() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new());
        let cancel = CancellationToken::new();

        let consumer = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.pop(&cancel).await })
        };

        cancel.cancel();
        assert_eq!(consumer.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancelled_consumer_leaves_items() {
        let queue = WorkQueue::new();
        let cancel = CancellationToken::new();
        queue.push(7);
        cancel.cancel();

        assert_eq!(queue.pop(&cancel).await, None);
        assert_eq!(queue.len(), 1);
    }
}
