//! Horizon Reactive - Notification plumbing for the Horizon engine.
//!
//! Every table and live view owns an `EventBus` for external listeners and
//! reports its changes as `ViewChange` sets. Bursts of changes can be merged
//! by an `UpdateCoalescer`, a self-tuning debounce driven by an explicit
//! `Clock` so that the host decides when time passes.
//!
//! # Core Concepts
//!
//! - `EventBus`: named events, reverse-order dispatch, `once`, context-scoped
//!   unsubscribe and an `all` wildcard channel
//! - `ViewChange`: added / updated / removed rows with net-effect merging
//! - `UpdateCoalescer`: adaptive quiet window plus a bounded maximum wait
//! - `Clock`: `ManualClock` for hosts and tests, `SystemClock` with `std`
//!
//! # Example
//!
//! ```rust
//! use horizon_reactive::{CoalesceConfig, UpdateCoalescer, ViewChange, UpdateReason};
//!
//! let mut coalescer = UpdateCoalescer::new(CoalesceConfig::new(10, 100));
//! coalescer.push(0, ViewChange::new(UpdateReason::Data));
//! coalescer.push(5, ViewChange::new(UpdateReason::Data));
//!
//! assert!(coalescer.poll(12).is_none()); // quiet window restarted at 5
//! assert!(coalescer.poll(15).is_some());
//! ```

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod change_set;
pub mod clock;
pub mod coalescer;
pub mod event_bus;

pub use change_set::{UpdateReason, ViewChange};
pub use clock::{Clock, ManualClock};
#[cfg(feature = "std")]
pub use clock::SystemClock;
pub use coalescer::{Coalesce, CoalesceConfig, UpdateCoalescer};
pub use event_bus::{ContextId, Event, EventBus, ListenerId, ALL_EVENTS};
