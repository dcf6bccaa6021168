//! Small shared abstractions.

use futures::Stream;

/// Types that can signal changes to observers.
pub trait Watchable<T> {
    type WatchStream: Stream<Item = T>;

    /// Get a stream that yields whenever the underlying value changes.
    fn watch(&self) -> Self::WatchStream;
}
