//! Background thread that follows the target window's bounds so the overlay
//! can mirror them. The thread only publishes observations; the frame loop
//! applies them to the window and the swapchain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::overlay::ScreenRect;

const FAILURE_BACKOFF: Duration = Duration::from_millis(50);

/// One observation of the target window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Bounds(ScreenRect),
    /// The window exists but is not currently visible.
    Hidden,
    /// The window no longer exists; the overlay should shut down.
    Closed,
}

/// Queries the target window. Implemented over Win32 in production and by
/// fakes in tests.
pub trait TargetProbe: Send + 'static {
    fn query(&mut self) -> TargetState;
}

/// Remembers the last seen rect and reports whether a new one differs.
#[derive(Debug, Default)]
pub struct BoundsDiff {
    last: Option<ScreenRect>,
}

impl BoundsDiff {
    /// Returns `true` when `rect` differs from the previous observation.
    pub fn observe(&mut self, rect: ScreenRect) -> bool {
        if self.last == Some(rect) {
            false
        } else {
            self.last = Some(rect);
            true
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    /// Latest bounds change not yet consumed by the frame loop.
    pending_bounds: Mutex<Option<ScreenRect>>,
    visible: AtomicBool,
    closed: AtomicBool,
    cancel: AtomicBool,
}

/// Handle to the polling thread.
pub struct WindowTracker {
    state: Arc<TrackerState>,
    handle: Option<JoinHandle<()>>,
}

impl WindowTracker {
    pub fn spawn(mut probe: impl TargetProbe, poll_interval: Duration) -> Self {
        let state = Arc::new(TrackerState::default());
        let thread_state = Arc::clone(&state);

        let handle = std::thread::Builder::new()
            .name("window-tracker".into())
            .spawn(move || {
                let mut diff = BoundsDiff::default();
                info!("window tracker started");
                while !thread_state.cancel.load(Ordering::Relaxed) {
                    match probe.query() {
                        TargetState::Bounds(rect) => {
                            thread_state.visible.store(true, Ordering::Relaxed);
                            if diff.observe(rect) {
                                debug!(?rect, "target bounds changed");
                                *thread_state.pending_bounds.lock().unwrap() = Some(rect);
                            }
                            std::thread::sleep(poll_interval);
                        }
                        TargetState::Hidden => {
                            thread_state.visible.store(false, Ordering::Relaxed);
                            std::thread::sleep(FAILURE_BACKOFF);
                        }
                        TargetState::Closed => {
                            info!("target window closed");
                            thread_state.closed.store(true, Ordering::Relaxed);
                            break;
                        }
                    }
                }
            })
            .expect("spawning tracker thread");

        Self {
            state,
            handle: Some(handle),
        }
    }

    /// Bounds change since the last call, if any.
    pub fn take_bounds_change(&self) -> Option<ScreenRect> {
        self.state.pending_bounds.lock().unwrap().take()
    }

    pub fn target_visible(&self) -> bool {
        self.state.visible.load(Ordering::Relaxed)
    }

    pub fn target_closed(&self) -> bool {
        self.state.closed.load(Ordering::Relaxed)
    }

    pub fn shutdown(&mut self) {
        self.state.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("tracker thread panicked");
            }
        }
    }
}

impl Drop for WindowTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(windows)]
mod platform {
    use super::{TargetProbe, TargetState};
    use crate::overlay::ScreenRect;
    use windows::Win32::Foundation::{HWND, RECT};
    use windows::Win32::UI::WindowsAndMessaging::{GetWindowRect, IsWindow, IsWindowVisible};

    /// Probe over a raw window handle.
    pub struct Win32Probe {
        hwnd: isize,
    }

    impl Win32Probe {
        pub fn new(hwnd: isize) -> Self {
            Self { hwnd }
        }

        fn hwnd(&self) -> HWND {
            HWND(self.hwnd as *mut core::ffi::c_void)
        }
    }

    // HWNDs are process-global identifiers, safe to carry across threads.
    unsafe impl Send for Win32Probe {}

    impl TargetProbe for Win32Probe {
        fn query(&mut self) -> TargetState {
            let hwnd = self.hwnd();
            unsafe {
                if !IsWindow(hwnd).as_bool() {
                    return TargetState::Closed;
                }
                if !IsWindowVisible(hwnd).as_bool() {
                    return TargetState::Hidden;
                }
                let mut rect = RECT::default();
                if GetWindowRect(hwnd, &mut rect).is_err() {
                    return TargetState::Hidden;
                }
                TargetState::Bounds(ScreenRect {
                    left: rect.left,
                    top: rect.top,
                    right: rect.right,
                    bottom: rect.bottom,
                })
            }
        }
    }
}

#[cfg(windows)]
pub use platform::Win32Probe;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn rect(left: i32, top: i32, right: i32, bottom: i32) -> ScreenRect {
        ScreenRect {
            left,
            top,
            right,
            bottom,
        }
    }

    #[test]
    fn bounds_diff_reports_first_and_changed_rects() {
        let mut diff = BoundsDiff::default();
        assert!(diff.observe(rect(0, 0, 100, 100)));
        assert!(!diff.observe(rect(0, 0, 100, 100)));
        assert!(diff.observe(rect(10, 0, 110, 100)));
        assert!(!diff.observe(rect(10, 0, 110, 100)));
    }

    struct ScriptedProbe {
        states: std::vec::IntoIter<TargetState>,
        done: mpsc::Sender<()>,
    }

    impl TargetProbe for ScriptedProbe {
        fn query(&mut self) -> TargetState {
            match self.states.next() {
                Some(state) => state,
                None => {
                    let _ = self.done.send(());
                    TargetState::Closed
                }
            }
        }
    }

    #[test]
    fn tracker_publishes_latest_bounds_and_closes() {
        let (tx, rx) = mpsc::channel();
        let probe = ScriptedProbe {
            states: vec![
                TargetState::Bounds(rect(0, 0, 640, 480)),
                TargetState::Bounds(rect(0, 0, 640, 480)),
                TargetState::Bounds(rect(5, 5, 645, 485)),
            ]
            .into_iter(),
            done: tx,
        };

        let mut tracker = WindowTracker::spawn(probe, Duration::from_millis(1));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        tracker.shutdown();

        // Only the newest unconsumed change survives.
        assert_eq!(tracker.take_bounds_change(), Some(rect(5, 5, 645, 485)));
        assert_eq!(tracker.take_bounds_change(), None);
        assert!(tracker.target_closed());
    }

    #[test]
    fn hidden_target_reports_no_visibility_and_no_bounds() {
        let (tx, rx) = mpsc::channel();
        let probe = ScriptedProbe {
            states: vec![TargetState::Hidden, TargetState::Hidden].into_iter(),
            done: tx,
        };
        let mut tracker = WindowTracker::spawn(probe, Duration::from_millis(1));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        tracker.shutdown();

        // The frame loop keeps the overlay hidden until a rect arrives.
        assert!(!tracker.target_visible());
        assert_eq!(tracker.take_bounds_change(), None);
    }

    #[test]
    fn tracker_shutdown_is_idempotent() {
        let (tx, _rx) = mpsc::channel();
        let probe = ScriptedProbe {
            states: vec![TargetState::Closed].into_iter(),
            done: tx,
        };
        let mut tracker = WindowTracker::spawn(probe, Duration::from_millis(1));
        tracker.shutdown();
        tracker.shutdown();
        assert!(tracker.target_closed());
    }
}
