use std::sync::atomic::{AtomicU32, Ordering};

use futures::task;

/// Our receive window: starts at its maximum and is replenished back to
/// it once the peer consumed at least half of it.
pub struct LocalWindow {
    inner: AtomicU32,
}

impl LocalWindow {
    pub const INITIAL_WINDOW_SIZE: u32 = i32::MAX as u32;
    pub const MAXIMUM_PACKET_SIZE: u32 = 0x10000;

    const ADJUST_THRESHOLD: u32 = Self::INITIAL_WINDOW_SIZE / 2;

    /// The amount to hand back to the peer, if the consumed half-window
    /// threshold has been crossed.
    pub fn adjustable(&self) -> Option<u32> {
        let previous = self
            .inner
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |window| {
                if window <= Self::ADJUST_THRESHOLD {
                    Some(Self::INITIAL_WINDOW_SIZE)
                } else {
                    None
                }
            })
            .ok();

        previous.map(|previous| Self::INITIAL_WINDOW_SIZE - previous)
    }

    /// Account for received data; errors on a peer overflowing
    /// the window it was granted.
    pub fn consume(&self, size: u32) -> Result<(), u32> {
        self.inner
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |window| {
                window.checked_sub(size)
            })
            .map(|_| ())
            .map_err(|window| size - window)
    }
}

impl Default for LocalWindow {
    fn default() -> Self {
        Self {
            inner: Self::INITIAL_WINDOW_SIZE.into(),
        }
    }
}

/// The peer's receive window: every data packet reserves from it, and
/// `SSH_MSG_CHANNEL_WINDOW_ADJUST` replenishes it.
pub struct RemoteWindow {
    inner: AtomicU32,
    waker: task::AtomicWaker,
}

impl RemoteWindow {
    pub fn replenish(&self, bytes_to_add: u32) {
        self.inner.fetch_add(bytes_to_add, Ordering::SeqCst);
        self.waker.wake();
    }

    /// Reserve up to `amount` bytes from the window, returning the
    /// granted share, or nothing when the window is exhausted.
    pub fn try_reserve(&self, mut amount: u32) -> Option<u32> {
        let reserved = self
            .inner
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |window| {
                if amount <= window {
                    Some(window - amount)
                } else {
                    amount = window;

                    if amount > 0 {
                        Some(0)
                    } else {
                        None
                    }
                }
            })
            .is_ok();

        if reserved {
            Some(amount)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.load(Ordering::SeqCst) == 0
    }

    /// Register for a wake-up on the next replenishment.
    pub fn register(&self, cx: &mut task::Context) {
        self.waker.register(cx.waker());
    }
}

impl From<u32> for RemoteWindow {
    fn from(value: u32) -> Self {
        Self {
            inner: value.into(),
            waker: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_reserves_up_to_the_window() {
        let window = RemoteWindow::from(16);

        assert_eq!(window.try_reserve(10), Some(10));
        assert_eq!(window.try_reserve(10), Some(6));
        assert_eq!(window.try_reserve(10), None);

        window.replenish(9);

        assert_eq!(window.try_reserve(10), Some(9));
        assert!(window.is_empty());
    }

    #[test]
    fn it_adjusts_at_half_consumption() {
        let window = LocalWindow::default();

        assert_eq!(window.adjustable(), None);

        window
            .consume(LocalWindow::INITIAL_WINDOW_SIZE / 2 + 1)
            .expect("within the window");

        assert_eq!(
            window.adjustable(),
            Some(LocalWindow::INITIAL_WINDOW_SIZE / 2 + 1)
        );
        assert_eq!(window.adjustable(), None);
    }

    #[test]
    fn it_rejects_window_overflows() {
        let window = LocalWindow::default();

        window
            .consume(LocalWindow::INITIAL_WINDOW_SIZE)
            .expect("within the window");
        window.consume(1).expect_err("beyond the window");
    }
}
