//! Typed identifier newtypes backed by UUIDs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an [`Automation`](crate::automation::Automation).
    AutomationId
);

define_id!(
    /// Unique identifier for a subscriber.
    ///
    /// Subscribers are owned by an external directory; the engine only ever
    /// carries their identifier through runs and log entries.
    SubscriberId
);

define_id!(
    /// Unique identifier for a [`Run`](crate::run::Run).
    RunId
);

define_id!(
    /// Unique identifier for an [`Event`](crate::event::Event).
    ///
    /// Doubles as the trigger-instance id: re-delivering an event with the
    /// same id for the same automation and subscriber starts no second run.
    EventId
);

define_id!(
    /// Unique identifier for a [`LogEntry`](crate::run_log::LogEntry).
    LogEntryId
);
