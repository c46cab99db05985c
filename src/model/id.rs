//! Identity types for the timeline model.
//!
//! All IDs are newtypes over `u32` that index directly into the model's
//! storage vectors. IDs are only meaningful for the model generation that
//! issued them; a reset or reload invalidates every outstanding ID.

use serde::Serialize;
use std::fmt;

macro_rules! index_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

index_id!(
    /// Index into `TimelineModel::records`.
    RecordId
);
index_id!(
    /// Index into `TimelineModel::frames`.
    FrameId
);
index_id!(
    /// Index into `TimelineModel::network_requests`.
    RequestId
);
index_id!(
    /// Index into `TimelineModel::trace_events`.
    EventId
);
