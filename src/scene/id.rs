//! Process-unique identities for cache keys, and the scene epoch counter.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $counter:ident) => {
        static $counter: AtomicU64 = AtomicU64::new(1);

        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Allocates a fresh identity. Never returns the same value twice.
            pub fn new() -> Self {
                Self($counter.fetch_add(1, Ordering::Relaxed))
            }

            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

define_id!(
    /// Identity of a [`Geometry`](crate::scene::geometry::Geometry); keys the buffer cache.
    GeometryId,
    NEXT_GEOMETRY_ID
);
define_id!(
    /// Identity of a [`Material`](crate::scene::material::Material).
    MaterialId,
    NEXT_MATERIAL_ID
);
define_id!(
    /// Identity of an [`Image`](crate::scene::image::Image); keys the texture cache.
    ImageId,
    NEXT_IMAGE_ID
);
define_id!(
    /// Identity of a light; keys the shadow-map caches.
    LightId,
    NEXT_LIGHT_ID
);

static EPOCH: AtomicU64 = AtomicU64::new(1);

/// Advances the process-wide mutation epoch and returns the new value.
pub fn next_epoch() -> u64 {
    EPOCH.fetch_add(1, Ordering::Relaxed) + 1
}
