//! A bounded-waiting FIFO event queue shared between a simulation worker (or
//! heartbeat thread) and one HTTP drainer.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use super::event::Event;

/// Producers never block on `send`; a single consumer blocks in `drain` until
/// something arrives, then delivers events in FIFO order.
///
/// An event is removed from the queue only once `drain`'s write callback
/// accepts it — if the callback rejects an event (the transport became
/// unwritable), that event and everything behind it stays queued for the
/// next `drain` call.
#[derive(Default)]
pub struct EventStream {
    queue: Mutex<VecDeque<Event>>,
    condvar: Condvar,
}

impl EventStream {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
        }
    }

    /// Appends `event` and wakes one waiting consumer. Never blocks.
    pub fn send(&self, event: Event) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.push_back(event);
        self.condvar.notify_one();
    }

    /// Blocks until the queue is non-empty, then calls `write_fn` with each
    /// event's rendered SSE text in FIFO order. Stops as soon as `write_fn`
    /// returns `false`, leaving that event and the rest of the queue intact.
    pub fn drain<F: FnMut(String) -> bool>(&self, mut write_fn: F) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        while queue.is_empty() {
            queue = self
                .condvar
                .wait(queue)
                .unwrap_or_else(|e| e.into_inner());
        }

        while let Some(event) = queue.front() {
            if !write_fn(event.render()) {
                return;
            }
            queue.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_write_leaves_queue_intact() {
        let stream = EventStream::new();
        for _ in 0..10 {
            stream.send(Event::heartbeat());
        }

        stream.drain(|_| false);
        assert_eq!(stream.queue.lock().unwrap().len(), 10);

        let mut received = 0;
        stream.drain(|_| {
            received += 1;
            true
        });
        assert_eq!(received, 10);
        assert!(stream.queue.lock().unwrap().is_empty());
    }

    #[test]
    fn fifo_order_preserved() {
        let stream = EventStream::new();
        stream.send(Event::audio_block(0, vec![1.0]));
        stream.send(Event::audio_block(1, vec![2.0]));

        let mut seen = Vec::new();
        stream.drain(|rendered| {
            seen.push(rendered);
            true
        });
        assert!(seen[0].contains("id: 0"));
        assert!(seen[1].contains("id: 1"));
    }
}
