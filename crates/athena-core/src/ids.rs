//! Branded ID newtypes for type safety.
//!
//! A device identity, a single connection of that device, and a snapshot
//! request are all strings on the wire. Wrapping each in its own newtype keeps
//! a connection ID from being passed where a device ID is expected.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Stable external identity of a device (the "dongle id").
    ///
    /// Assigned outside the gateway and taken verbatim from the connection path.
    DeviceId
}

branded_id! {
    /// Identity of one physical channel of a device.
    ///
    /// A device that reconnects gets a fresh `ConnectionId`, which lets
    /// teardown of the old channel leave the new one untouched.
    ConnectionId
}

branded_id! {
    /// Identifier minted for a `takeSnapshot` request.
    SnapshotId
}

impl ConnectionId {
    /// Create a new random ID (`conn_` + UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotId {
    /// Mint `snap_<device>_<unix seconds>`.
    ///
    /// Two requests from the same device within one second share an ID.
    #[must_use]
    pub fn for_device(device_id: &DeviceId, at: DateTime<Utc>) -> Self {
        Self(format!("snap_{device_id}_{}", at.timestamp()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
