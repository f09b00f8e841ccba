use std::time::Duration;

/// Default delay before a queued file update is processed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Holds at most one pending update, keyed by file.
///
/// A newer update for the same key replaces the pending one. An update for a
/// different key forces the pending one out first, so nothing waits behind a
/// file the user has stopped editing. The owner arms a timer for
/// [`Debouncer::pending_generation`] and calls [`Debouncer::take_due`] when it
/// fires; a timer whose generation was superseded finds nothing to take.
#[derive(Debug)]
pub struct Debouncer<K, T> {
    delay: Duration,
    pending: Option<(K, T)>,
    generation: u64,
}

impl<K: PartialEq, T> Debouncer<K, T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Queue `item` under `key`.
    ///
    /// Returns the items that must be processed right away, oldest first: a
    /// displaced update for another key, and `item` itself when the delay is
    /// zero.
    pub fn push(&mut self, key: K, item: T) -> Vec<T> {
        let mut ready = Vec::new();
        match self.pending.take() {
            Some((pending_key, _)) if pending_key == key => {}
            Some((_, displaced)) => ready.push(displaced),
            None => {}
        }

        self.generation += 1;
        if self.delay.is_zero() {
            ready.push(item);
        } else {
            self.pending = Some((key, item));
        }
        ready
    }

    /// Generation of the pending update, if there is one.
    pub fn pending_generation(&self) -> Option<u64> {
        self.pending.as_ref().map(|_| self.generation)
    }

    /// Take the pending update if it is still the one `generation` was armed for.
    pub fn take_due(&mut self, generation: u64) -> Option<T> {
        if generation != self.generation {
            return None;
        }
        self.pending.take().map(|(_, item)| item)
    }

    /// Take the pending update regardless of its timer.
    pub fn take_pending(&mut self) -> Option<T> {
        self.pending.take().map(|(_, item)| item)
    }

    /// Drop the pending update without processing it.
    pub fn clear(&mut self) {
        self.pending = None;
        self.generation += 1;
    }
}

impl<K: PartialEq, T> Default for Debouncer<K, T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
