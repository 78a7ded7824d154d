//! Consumption styles over a [`CallHandle`](crate::CallHandle).
//!
//! Each adapter is an independent view of the same completion cell; none of
//! them can cancel the call it observes.

mod blocking;
mod future;
mod single;

pub use future::CallFuture;
pub use single::Single;
