/// A polled value with a remembered last observation
///
/// `changed` decides whether a fresh reading counts as new relative to the
/// last committed one. Checking and committing are separate so that a value
/// is only committed once the work it triggered has been persisted.
pub struct WatchedValue<T> {
    last: Option<T>,
    changed: fn(&T, &T) -> bool,
}

impl<T: Clone> WatchedValue<T> {
    pub fn new(changed: fn(&T, &T) -> bool) -> Self {
        Self {
            last: None,
            changed,
        }
    }

    /// True if `current` is new; the first observation always is
    pub fn is_changed(&self, current: &T) -> bool {
        match &self.last {
            None => true,
            Some(last) => (self.changed)(current, last),
        }
    }

    pub fn commit(&mut self, current: T) {
        self.last = Some(current);
    }
}

impl<T: Clone + PartialOrd> WatchedValue<T> {
    /// Watches a value that only counts when it moves forward
    pub fn advancing() -> Self {
        Self::new(|current, last| current > last)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for WatchedValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchedValue").field("last", &self.last).finish()
    }
}
