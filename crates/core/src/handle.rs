//! The opaque session handle type used to key the registry.
//!
//! `spec.md` describes the handle as "opaque handle supplied by the control
//! layer (used for lookup)" — the RTSP control surface this crate doesn't
//! implement already has its own id type for a subscription. Rather than
//! picking one (an integer, a UUID, a raw pointer) and forcing callers to
//! convert, [`SessionRegistry`](crate::registry::SessionRegistry) is generic
//! over any type satisfying [`Handle`].

use std::fmt::Debug;
use std::hash::Hash;

/// Blanket-implemented bound for registry keys.
pub trait Handle: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> Handle for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}
