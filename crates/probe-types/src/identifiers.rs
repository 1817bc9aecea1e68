//! # Event Identifiers
//!
//! `EventType` and `EventSource` are namespaced strings compared on their
//! canonical form (trimmed, lowercase). The well-known values are constants;
//! any other string is accepted as a custom identifier.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

fn canonical(name: &str) -> String {
    name.trim().to_lowercase()
}

macro_rules! namespaced_id {
    (
        $(#[$meta:meta])*
        $name:ident, wildcard = $wildcard:literal, { $( $(#[$cmeta:meta])* $konst:ident => $value:literal ),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub struct $name(Cow<'static, str>);

        impl $name {
            /// Matches every value during dispatch.
            pub const WILDCARD: Self = Self(Cow::Borrowed($wildcard));

            $( $(#[$cmeta])* pub const $konst: Self = Self(Cow::Borrowed($value)); )*

            /// Build an identifier from a free-form string.
            pub fn new(name: impl AsRef<str>) -> Self {
                Self(Cow::Owned(canonical(name.as_ref())))
            }

            /// Canonical form.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            #[must_use]
            pub fn is_wildcard(&self) -> bool {
                self.as_str() == $wildcard
            }

            /// Whether a registration keyed on `self` accepts `other`.
            #[must_use]
            pub fn matches(&self, other: &Self) -> bool {
                self.is_wildcard() || self == other
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.as_str() == other.as_str()
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.as_str().hash(state);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.into_owned()
            }
        }
    };
}

namespaced_id!(
    /// The category of an event.
    EventType, wildcard = "com.probe.eventtype._wildcard_", {
        /// Events emitted by the hub itself (boot, shared-state changes).
        HUB => "com.probe.eventtype.hub",
        CUSTOM => "com.probe.eventtype.custom",
        CONFIGURATION => "com.probe.eventtype.configuration",
        LIFECYCLE => "com.probe.eventtype.lifecycle",
        IDENTITY => "com.probe.eventtype.identity",
        ANALYTICS => "com.probe.eventtype.analytics",
        RULES_ENGINE => "com.probe.eventtype.rulesengine",
        GENERIC_DATA => "com.probe.eventtype.generic.data",
    }
);

namespaced_id!(
    /// Where an event came from, or what it asks for.
    EventSource, wildcard = "com.probe.eventsource._wildcard_", {
        NONE => "com.probe.eventsource.none",
        /// Emitted once when module registration finishes.
        BOOTED => "com.probe.eventsource.booted",
        /// Emitted whenever a module's shared state changes.
        SHARED_STATE => "com.probe.eventsource.sharedstate",
        REQUEST_CONTENT => "com.probe.eventsource.requestcontent",
        RESPONSE_CONTENT => "com.probe.eventsource.responsecontent",
        REQUEST_IDENTITY => "com.probe.eventsource.requestidentity",
        RESPONSE_IDENTITY => "com.probe.eventsource.responseidentity",
        REQUEST_RESET => "com.probe.eventsource.requestreset",
        OS => "com.probe.eventsource.os",
    }
);
