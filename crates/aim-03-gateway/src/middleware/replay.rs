//! Replay protection: remembers `(sender, nonce)` pairs already accepted.
//!
//! Bounded; once `capacity` pairs are held the oldest is forgotten first.

use aim_01_protocol::Address;
use dashmap::DashSet;
use parking_lot::Mutex;
use std::collections::VecDeque;

type NonceKey = (Address, String);

/// Bounded set of seen nonces.
#[derive(Debug)]
pub struct NonceCache {
    seen: DashSet<NonceKey>,
    order: Mutex<VecDeque<NonceKey>>,
    capacity: usize,
}

impl NonceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: DashSet::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record the pair. Returns `false` when it was already present.
    pub fn check_and_insert(&self, sender: Address, nonce: &str) -> bool {
        let key = (sender, nonce.to_string());
        if !self.seen.insert(key.clone()) {
            return false;
        }

        let mut order = self.order.lock();
        order.push_back(key);
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
