//! One running scenario driver and the connection it owns

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::scenario::{Action, Driver, Input};
use crate::transport::Connection;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonically increasing instance identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A driver plus its (optional) connection
///
/// Whoever holds the `Instance` value is the only party able to resume it:
/// the waiter queue while it waits for a connection, a notification task
/// while a request is in flight, or the drive loop otherwise.
pub struct Instance {
    id: InstanceId,
    driver: Box<dyn Driver>,
    connection: Option<Box<dyn Connection>>,
}

impl Instance {
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self {
            id: InstanceId::next(),
            driver,
            connection: None,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Deliver the result of the previous action and take the next one
    pub fn resume(&mut self, input: Input) -> Action {
        self.driver.resume(input)
    }

    pub(crate) fn attach(&mut self, connection: Box<dyn Connection>) {
        debug_assert!(self.connection.is_none(), "instance already connected");
        self.connection = Some(connection);
    }

    pub(crate) fn detach(&mut self) -> Option<Box<dyn Connection>> {
        self.connection.take()
    }

    pub(crate) fn connection_mut(&mut self) -> Option<&mut Box<dyn Connection>> {
        self.connection.as_mut()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("connection", &self.connection.as_ref().map(|c| c.id()))
            .finish()
    }
}
