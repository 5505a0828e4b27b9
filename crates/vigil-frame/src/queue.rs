// vigil-frame/src/queue.rs
use crate::Frame;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What to do with a frame that arrives while the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest waiting frame to make room (keeps the feed live).
    #[default]
    DropOldest,
    /// Refuse the incoming frame and keep the backlog intact.
    RejectNewest,
}

/// Outcome of [`FrameQueue::push`].
///
/// Whichever frame lost its place is handed back so the caller can report it.
#[derive(Debug)]
pub enum Pushed {
    Queued,
    Evicted(Frame),
    Rejected(Frame),
}

/// Bounded FIFO of frames awaiting the scheduler.
#[derive(Debug)]
pub struct FrameQueue {
    frames: VecDeque<Frame>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl FrameQueue {
    /// A capacity of zero is bumped to one; the queue always holds at least a frame.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    pub fn push(&mut self, frame: Frame) -> Pushed {
        if self.frames.len() < self.capacity {
            self.frames.push_back(frame);
            return Pushed::Queued;
        }

        match self.policy {
            OverflowPolicy::DropOldest => {
                // len == capacity >= 1, so there is a head to evict
                let evicted = self.frames.pop_front();
                self.frames.push_back(frame);
                match evicted {
                    Some(old) => {
                        warn!("frame queue full ({}), dropping oldest frame {}", self.capacity, old.id());
                        Pushed::Evicted(old)
                    }
                    None => Pushed::Queued,
                }
            }
            OverflowPolicy::RejectNewest => {
                warn!("frame queue full ({}), rejecting frame {}", self.capacity, frame.id());
                Pushed::Rejected(frame)
            }
        }
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameId;

    fn frame(id: u64) -> Frame {
        Frame::new(id, 1, 1, vec![0u8; 4])
    }

    #[test]
    fn pops_in_submission_order() {
        let mut q = FrameQueue::new(8, OverflowPolicy::DropOldest);
        for id in 1..=5 {
            assert!(matches!(q.push(frame(id)), Pushed::Queued));
        }
        let order: Vec<u64> = std::iter::from_fn(|| q.pop()).map(|f| f.id().0).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
        assert!(q.is_empty());
    }

    #[test]
    fn drop_oldest_evicts_head() {
        let mut q = FrameQueue::new(2, OverflowPolicy::DropOldest);
        q.push(frame(1));
        q.push(frame(2));
        match q.push(frame(3)) {
            Pushed::Evicted(f) => assert_eq!(f.id(), FrameId(1)),
            other => panic!("expected eviction, got {other:?}"),
        }
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().map(|f| f.id()), Some(FrameId(2)));
        assert_eq!(q.pop().map(|f| f.id()), Some(FrameId(3)));
    }

    #[test]
    fn reject_newest_keeps_backlog() {
        let mut q = FrameQueue::new(1, OverflowPolicy::RejectNewest);
        q.push(frame(1));
        match q.push(frame(2)) {
            Pushed::Rejected(f) => assert_eq!(f.id(), FrameId(2)),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(q.pop().map(|f| f.id()), Some(FrameId(1)));
    }

    #[test]
    fn zero_capacity_is_bumped() {
        let q = FrameQueue::new(0, OverflowPolicy::DropOldest);
        assert_eq!(q.capacity(), 1);
    }
}
