//! Numeric ID newtypes.
//!
//! Connections and listeners are identified by locally assigned, monotonic
//! counters. Wrapping them keeps a listener ID from being passed where a
//! connection generation is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! counter_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw counter value.
            #[must_use]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw counter value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

counter_id!(
    /// Generation of a stream connection. Every reconnect gets a new one.
    ConnectionId,
    "conn"
);

counter_id!(
    /// Identifier of a single subscription in the dispatch registry.
    ListenerId,
    "listener"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefix() {
        assert_eq!(ConnectionId::from_raw(3).to_string(), "conn-3");
        assert_eq!(ListenerId::from_raw(12).to_string(), "listener-12");
    }

    #[test]
    fn ordering_follows_counter() {
        assert!(ConnectionId::from_raw(1) < ConnectionId::from_raw(2));
        assert_eq!(ListenerId::from(7).get(), 7);
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&ConnectionId::from_raw(9)).unwrap();
        assert_eq!(json, "9");
    }
}
