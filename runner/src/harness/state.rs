//! Waiter queue and active connection registry
//!
//! Plain data, mutated under the harness lock. Every insert and removal
//! happens exactly once, in the handler that observes the matching event.

use std::collections::{HashMap, VecDeque};

use super::instance::{Instance, InstanceId};
use crate::transport::ConnectionId;

/// Outcome of releasing a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// The connection was serving this instance
    Registered(InstanceId),
    /// The connection never served anyone (failed or surplus attempt)
    Unmatched { waiting: usize },
}

#[derive(Default)]
pub(crate) struct HarnessState {
    /// Instances waiting for a connection, oldest first
    waiters: VecDeque<Instance>,
    /// Live connection -> instance it serves
    clients: HashMap<ConnectionId, InstanceId>,
}

impl HarnessState {
    pub fn enqueue(&mut self, instance: Instance) {
        self.waiters.push_back(instance);
    }

    /// Hand a ready connection to the oldest waiter
    pub fn assign(&mut self, connection: ConnectionId) -> Option<Instance> {
        let instance = self.waiters.pop_front()?;
        let previous = self.clients.insert(connection, instance.id());
        debug_assert!(previous.is_none(), "connection {} assigned twice", connection);
        Some(instance)
    }

    /// Forget a closed connection
    pub fn release(&mut self, connection: &ConnectionId) -> Release {
        match self.clients.remove(connection) {
            Some(instance) => Release::Registered(instance),
            None => Release::Unmatched {
                waiting: self.waiters.len(),
            },
        }
    }

    /// Remove every waiter without assigning it
    pub fn drain_waiters(&mut self) -> Vec<Instance> {
        self.waiters.drain(..).collect()
    }

    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }

    pub fn active(&self) -> usize {
        self.clients.len()
    }
}
