//! The overlay window: a topmost, never-activated popup that mirrors the
//! target window's client rect and passes mouse input through everywhere
//! outside the frame's hit regions.
//!
//! All Win32 work lives in the `platform` module; the state the window
//! procedure consults (event queue, hit regions, file drops, pass-through
//! flag) is platform independent and shared through [`OverlayShared`].

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;

use tracing::warn;

use crate::hit_regions::{hit_test, HitRegion};

/// Rectangle in screen coordinates, as reported by the window tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// A file dropped onto the overlay, with the drop point in client coords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDrop {
    pub path: PathBuf,
    pub point: (i32, i32),
}

const DROP_QUEUE_CAPACITY: usize = 64;

/// Bounded queue between the drop callback and the frame loop. Produced from
/// the OS callback, drained once per frame by `take_all`.
#[derive(Debug, Default)]
pub struct DropQueue {
    pending: Mutex<VecDeque<FileDrop>>,
}

impl DropQueue {
    pub fn push(&self, drop: FileDrop) {
        let mut pending = self.pending.lock().unwrap();
        if pending.len() >= DROP_QUEUE_CAPACITY {
            warn!(path = %drop.path.display(), "file-drop queue full, dropping entry");
            return;
        }
        pending.push_back(drop);
    }

    pub fn take_all(&self) -> Vec<FileDrop> {
        self.pending.lock().unwrap().drain(..).collect()
    }
}

/// State shared between the frame loop and the OS window procedure.
#[derive(Debug, Default)]
pub struct OverlayShared {
    /// Input events queued by the window procedure (wheel, text), drained
    /// into the frame's raw input.
    pub events: Mutex<Vec<egui::Event>>,
    pub drops: DropQueue,
    /// Region set consulted by synthetic hit-test queries.
    hit_regions: Mutex<Vec<HitRegion>>,
    /// When set, every hit-test query answers "transparent".
    pub force_pass_through: AtomicBool,
    /// True when the window is un-shaped and hit tests are answered per
    /// point instead of by the installed window region.
    pub synthetic_hit_test: AtomicBool,
    /// Inflation margin for synthetic hit tests, in pixels.
    pub hit_margin: AtomicI32,
    client_size: Mutex<(i32, i32)>,
}

/// Answer to the window manager's hit-test query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTestResponse {
    /// The point is interactive; the overlay takes the input.
    Client,
    /// Pass the input through to whatever window is beneath.
    Transparent,
}

impl OverlayShared {
    pub fn set_hit_regions(&self, regions: Vec<HitRegion>) {
        *self.hit_regions.lock().unwrap() = regions;
    }

    pub fn set_client_size(&self, width: i32, height: i32) {
        *self.client_size.lock().unwrap() = (width.max(1), height.max(1));
    }

    pub fn client_size(&self) -> (i32, i32) {
        *self.client_size.lock().unwrap()
    }

    /// Decide a hit-test query for a point in client coordinates.
    pub fn hit_test_response(&self, x: i32, y: i32) -> HitTestResponse {
        if self.force_pass_through.load(Ordering::Relaxed) {
            return HitTestResponse::Transparent;
        }
        if !self.synthetic_hit_test.load(Ordering::Relaxed) {
            // Native mode: the installed window region already excludes
            // everything outside the hit regions.
            return HitTestResponse::Client;
        }
        let (width, height) = self.client_size();
        let margin = self.hit_margin.load(Ordering::Relaxed);
        let regions = self.hit_regions.lock().unwrap();
        if hit_test(&regions, margin, width, height, x, y) {
            HitTestResponse::Client
        } else {
            HitTestResponse::Transparent
        }
    }

    pub fn push_event(&self, event: egui::Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn drain_events(&self) -> Vec<egui::Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

#[cfg(windows)]
mod platform {
    use super::{FileDrop, HitTestResponse, OverlayShared, ScreenRect};
    use crate::hit_regions::HitRegion;
    use crate::shaper::ShapeTarget;
    use anyhow::{anyhow, bail, Result};
    use once_cell::sync::Lazy;
    use raw_window_handle::{
        RawDisplayHandle, RawWindowHandle, Win32WindowHandle, WindowsDisplayHandle,
    };
    use std::collections::HashMap;
    use std::ffi::OsString;
    use std::num::NonZeroIsize;
    use std::os::windows::ffi::OsStringExt;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex, Once};
    use tracing::{debug, warn};
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
    use windows::Win32::Graphics::Dwm::{DwmEnableBlurBehindWindow, DWM_BB_ENABLE, DWM_BLURBEHIND};
    use windows::Win32::Graphics::Gdi::{
        CombineRgn, CreateRectRgn, DeleteObject, ScreenToClient, SetWindowRgn, HRGN, RGN_ERROR,
        RGN_OR,
    };
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::Shell::{
        DragAcceptFiles, DragFinish, DragQueryFileW, DragQueryPoint, HDROP,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, IsWindow, PeekMessageW,
        PostQuitMessage, RegisterClassW, SetWindowPos, ShowWindow,
        TranslateMessage, MSG, PM_REMOVE, SWP_NOACTIVATE, SWP_NOSENDCHANGING,
        SWP_NOZORDER, SW_HIDE, SW_SHOWNOACTIVATE, WM_CHAR, WM_DESTROY, WM_DROPFILES,
        WM_MOUSEACTIVATE, WM_MOUSEHWHEEL, WM_MOUSEWHEEL, WM_NCHITTEST, WM_QUIT, WM_SETCURSOR,
        WNDCLASSW, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_POPUP,
    };

    // Hit-test results (WinUser.h).
    const HTCLIENT: isize = 1;
    const HTTRANSPARENT: isize = -1;
    // Don't activate the overlay, but let the click through to it.
    const MA_NOACTIVATE: isize = 3;
    const WHEEL_DELTA: f32 = 120.0;
    const MK_SHIFT: usize = 0x0004;

    static WINDOW_SHARED: Lazy<Mutex<HashMap<isize, Arc<OverlayShared>>>> =
        Lazy::new(|| Mutex::new(HashMap::new()));

    fn widestring(value: &str) -> Vec<u16> {
        use std::os::windows::ffi::OsStrExt;
        std::ffi::OsStr::new(value)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect()
    }

    fn shared_for(hwnd: HWND) -> Option<Arc<OverlayShared>> {
        WINDOW_SHARED
            .lock()
            .ok()
            .and_then(|map| map.get(&(hwnd.0 as isize)).cloned())
    }

    /// Signed x/y packed into an lparam (screen coords for WM_NCHITTEST).
    fn point_from_lparam(lparam: LPARAM) -> (i32, i32) {
        let x = (lparam.0 & 0xffff) as i16 as i32;
        let y = ((lparam.0 >> 16) & 0xffff) as i16 as i32;
        (x, y)
    }

    fn wheel_delta_from_wparam(wparam: WPARAM) -> f32 {
        let delta = ((wparam.0 >> 16) & 0xffff) as u16 as i16;
        delta as f32 / WHEEL_DELTA
    }

    unsafe extern "system" fn overlay_wndproc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_MOUSEACTIVATE => LRESULT(MA_NOACTIVATE),

            WM_NCHITTEST => {
                let Some(shared) = shared_for(hwnd) else {
                    return LRESULT(HTCLIENT);
                };
                let (sx, sy) = point_from_lparam(lparam);
                let mut pt = POINT { x: sx, y: sy };
                let _ = unsafe { ScreenToClient(hwnd, &mut pt) };
                match shared.hit_test_response(pt.x, pt.y) {
                    HitTestResponse::Client => LRESULT(HTCLIENT),
                    HitTestResponse::Transparent => LRESULT(HTTRANSPARENT),
                }
            }

            WM_MOUSEWHEEL => {
                if let Some(shared) = shared_for(hwnd) {
                    let wheel = wheel_delta_from_wparam(wparam);
                    // Shift turns the vertical wheel into horizontal scroll.
                    let delta = if wparam.0 & MK_SHIFT != 0 {
                        egui::vec2(wheel, 0.0)
                    } else {
                        egui::vec2(0.0, wheel)
                    };
                    shared.push_event(egui::Event::MouseWheel {
                        unit: egui::MouseWheelUnit::Line,
                        delta,
                        modifiers: egui::Modifiers::default(),
                    });
                }
                LRESULT(0)
            }

            WM_MOUSEHWHEEL => {
                if let Some(shared) = shared_for(hwnd) {
                    let wheel = wheel_delta_from_wparam(wparam);
                    shared.push_event(egui::Event::MouseWheel {
                        unit: egui::MouseWheelUnit::Line,
                        delta: egui::vec2(wheel, 0.0),
                        modifiers: egui::Modifiers::default(),
                    });
                }
                LRESULT(0)
            }

            WM_CHAR => {
                if let Some(shared) = shared_for(hwnd) {
                    let code = wparam.0 as u32;
                    // Printable characters only; Enter, Tab, and the other
                    // control keys arrive as polled key events instead.
                    if code >= 0x20 {
                        if let Some(ch) = char::from_u32(code) {
                            shared.push_event(egui::Event::Text(ch.to_string()));
                        }
                    }
                }
                LRESULT(0)
            }

            WM_DROPFILES => {
                unsafe { handle_drop_files(hwnd, wparam) };
                LRESULT(0)
            }

            WM_SETCURSOR => LRESULT(1),

            WM_DESTROY => {
                unsafe { PostQuitMessage(0) };
                LRESULT(0)
            }

            _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
        }
    }

    unsafe fn handle_drop_files(hwnd: HWND, wparam: WPARAM) {
        let hdrop = HDROP(wparam.0 as *mut core::ffi::c_void);
        let Some(shared) = shared_for(hwnd) else {
            unsafe { DragFinish(hdrop) };
            return;
        };

        let mut pt = POINT::default();
        let _ = unsafe { DragQueryPoint(hdrop, &mut pt) };

        let count = unsafe { DragQueryFileW(hdrop, u32::MAX, None) };
        debug!(count, "drop received");

        for i in 0..count {
            let len = unsafe { DragQueryFileW(hdrop, i, None) };
            if len == 0 {
                continue;
            }
            let mut buffer = vec![0u16; len as usize + 1];
            let copied = unsafe { DragQueryFileW(hdrop, i, Some(&mut buffer)) };
            if copied == 0 {
                continue;
            }
            let path = OsString::from_wide(&buffer[..copied as usize]);
            shared.drops.push(FileDrop {
                path: path.into(),
                point: (pt.x, pt.y),
            });
        }

        unsafe { DragFinish(hdrop) };
    }

    pub struct OverlayWindow {
        hwnd: HWND,
        shared: Arc<OverlayShared>,
        visible: bool,
    }

    // The hwnd is only used from the render thread after creation; the
    // shared state is internally synchronized.
    unsafe impl Send for OverlayWindow {}

    impl OverlayWindow {
        /// Create the hidden overlay as an owned popup of the target window.
        pub fn create(owner: isize) -> Result<Self> {
            static REGISTER_CLASS: Once = Once::new();
            let class_name = widestring("OverlayRendererWindow");
            let hinstance = unsafe { GetModuleHandleW(PCWSTR::null()) }?;

            REGISTER_CLASS.call_once(|| unsafe {
                let wc = WNDCLASSW {
                    hInstance: hinstance.into(),
                    lpszClassName: PCWSTR(class_name.as_ptr()),
                    lpfnWndProc: Some(overlay_wndproc),
                    ..Default::default()
                };
                let _ = RegisterClassW(&wc);
            });

            // WS_EX_NOACTIVATE: never steals focus from the target.
            // WS_EX_TOOLWINDOW: hidden from Alt-Tab.
            // No WS_EX_TRANSPARENT: pass-through is per point via WM_NCHITTEST
            // or the installed window region, not whole-window.
            let hwnd = unsafe {
                CreateWindowExW(
                    WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                    PCWSTR(class_name.as_ptr()),
                    PCWSTR::null(),
                    WS_POPUP,
                    0,
                    0,
                    100,
                    100,
                    HWND(owner as *mut core::ffi::c_void),
                    None,
                    hinstance,
                    None,
                )
            }
            .map_err(|err| anyhow!("creating overlay window: {err}"))?;

            let shared = Arc::new(OverlayShared::default());
            if let Ok(mut map) = WINDOW_SHARED.lock() {
                map.insert(hwnd.0 as isize, Arc::clone(&shared));
            }

            // Make sure DWM never blurs behind the transparent surface.
            let blur = DWM_BLURBEHIND {
                dwFlags: DWM_BB_ENABLE,
                fEnable: false.into(),
                ..Default::default()
            };
            if let Err(err) = unsafe { DwmEnableBlurBehindWindow(hwnd, &blur) } {
                warn!("disabling DWM blur failed: {err}");
            }

            unsafe {
                DragAcceptFiles(hwnd, true);
                let _ = ShowWindow(hwnd, SW_HIDE);
            }

            Ok(Self {
                hwnd,
                shared,
                visible: false,
            })
        }

        pub fn shared(&self) -> Arc<OverlayShared> {
            Arc::clone(&self.shared)
        }

        pub fn is_alive(&self) -> bool {
            !self.hwnd.0.is_null() && unsafe { IsWindow(self.hwnd) }.as_bool()
        }

        pub fn hwnd(&self) -> isize {
            self.hwnd.0 as isize
        }

        pub fn client_size(&self) -> (i32, i32) {
            self.shared.client_size()
        }

        pub fn visible(&self) -> bool {
            self.visible
        }

        pub fn set_visible(&mut self, visible: bool) {
            self.visible = visible;
            unsafe {
                let _ = ShowWindow(self.hwnd, if visible { SW_SHOWNOACTIVATE } else { SW_HIDE });
            }
        }

        /// Mirror the target's client rect, keeping at least a 1x1 client
        /// area so swapchain configuration stays valid.
        pub fn update_bounds(&self, rect: ScreenRect) {
            let width = rect.width().max(1);
            let height = rect.height().max(1);
            self.shared.set_client_size(width, height);
            unsafe {
                let _ = SetWindowPos(
                    self.hwnd,
                    HWND::default(),
                    rect.left,
                    rect.top,
                    width,
                    height,
                    SWP_NOZORDER | SWP_NOACTIVATE | SWP_NOSENDCHANGING,
                );
            }
        }

        pub fn take_file_drops(&self) -> Vec<FileDrop> {
            self.shared.drops.take_all()
        }

        pub fn raw_window_handle(&self) -> RawWindowHandle {
            let handle = Win32WindowHandle::new(
                NonZeroIsize::new(self.hwnd.0 as isize).expect("overlay hwnd is non-null"),
            );
            RawWindowHandle::Win32(handle)
        }

        pub fn raw_display_handle(&self) -> RawDisplayHandle {
            RawDisplayHandle::Windows(WindowsDisplayHandle::new())
        }
    }

    impl ShapeTarget for OverlayWindow {
        fn apply_native_shape(&self, regions: &[HitRegion]) -> Result<()> {
            // Union all regions into one GDI region. An empty set installs an
            // empty region: the window accepts input nowhere.
            let union = if regions.is_empty() {
                unsafe { CreateRectRgn(0, 0, 0, 0) }
            } else {
                let mut union = HRGN::default();
                for region in regions {
                    let rect_rgn = unsafe {
                        CreateRectRgn(region.left, region.top, region.right, region.bottom)
                    };
                    if rect_rgn.is_invalid() {
                        warn!(?region, "CreateRectRgn failed, skipping region");
                        continue;
                    }
                    if union.is_invalid() {
                        union = rect_rgn;
                    } else {
                        let combined = unsafe { CombineRgn(union, union, rect_rgn, RGN_OR) };
                        unsafe {
                            let _ = DeleteObject(rect_rgn);
                        }
                        if combined == RGN_ERROR {
                            warn!(?region, "CombineRgn failed, skipping region");
                        }
                    }
                }
                if union.is_invalid() {
                    unsafe { CreateRectRgn(0, 0, 0, 0) }
                } else {
                    union
                }
            };

            if union.is_invalid() {
                bail!("could not create window region");
            }

            // SetWindowRgn transfers region ownership to the system.
            let installed = unsafe { SetWindowRgn(self.hwnd, union, true) };
            if installed == 0 {
                unsafe {
                    let _ = DeleteObject(union);
                }
                bail!("SetWindowRgn failed");
            }
            Ok(())
        }

        fn set_hit_test_regions(&self, regions: Vec<HitRegion>) {
            self.shared.set_hit_regions(regions);
        }
    }

    impl Drop for OverlayWindow {
        fn drop(&mut self) {
            if !self.hwnd.0.is_null() {
                if let Ok(mut map) = WINDOW_SHARED.lock() {
                    map.remove(&(self.hwnd.0 as isize));
                }
                unsafe {
                    let _ = DestroyWindow(self.hwnd);
                }
                self.hwnd = HWND::default();
            }
        }
    }

    /// Drain the thread's message queue. Returns `false` once WM_QUIT is
    /// seen; the frame loop then shuts down.
    pub fn pump_messages() -> bool {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).into() {
                if msg.message == WM_QUIT {
                    return false;
                }
                let _ = TranslateMessage(&msg);
                let _ = DispatchMessageW(&msg);
            }
        }
        true
    }

}

#[cfg(windows)]
pub use platform::{pump_messages, OverlayWindow};

#[cfg(not(windows))]
mod stub {
    use super::{FileDrop, OverlayShared, ScreenRect};
    use crate::hit_regions::HitRegion;
    use crate::shaper::ShapeTarget;
    use anyhow::Result;
    use std::sync::Arc;

    /// Non-Windows stand-in with the same surface, so the crate builds and
    /// the shared-state logic stays testable anywhere.
    pub struct OverlayWindow {
        shared: Arc<OverlayShared>,
        visible: bool,
    }

    impl OverlayWindow {
        pub fn create(_owner: isize) -> Result<Self> {
            Ok(Self {
                shared: Arc::new(OverlayShared::default()),
                visible: false,
            })
        }

        pub fn shared(&self) -> Arc<OverlayShared> {
            Arc::clone(&self.shared)
        }

        pub fn is_alive(&self) -> bool {
            true
        }

        pub fn hwnd(&self) -> isize {
            0
        }

        pub fn client_size(&self) -> (i32, i32) {
            self.shared.client_size()
        }

        pub fn visible(&self) -> bool {
            self.visible
        }

        pub fn set_visible(&mut self, visible: bool) {
            self.visible = visible;
        }

        pub fn update_bounds(&self, rect: ScreenRect) {
            self.shared
                .set_client_size(rect.width().max(1), rect.height().max(1));
        }

        pub fn take_file_drops(&self) -> Vec<FileDrop> {
            self.shared.drops.take_all()
        }
    }

    impl ShapeTarget for OverlayWindow {
        fn apply_native_shape(&self, _regions: &[HitRegion]) -> Result<()> {
            Ok(())
        }

        fn set_hit_test_regions(&self, regions: Vec<HitRegion>) {
            self.shared.set_hit_regions(regions);
        }
    }

    pub fn pump_messages() -> bool {
        true
    }
}

#[cfg(not(windows))]
pub use stub::{pump_messages, OverlayWindow};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit_regions::HitRegion;

    fn region(x: f32, y: f32, w: f32, h: f32) -> HitRegion {
        HitRegion::from_rect(x, y, w, h)
    }

    #[test]
    fn native_mode_answers_client() {
        let shared = OverlayShared::default();
        shared.set_client_size(800, 600);
        // In native mode the window region filters points before the query.
        assert_eq!(shared.hit_test_response(5, 5), HitTestResponse::Client);
    }

    #[test]
    fn synthetic_mode_scans_regions() {
        let shared = OverlayShared::default();
        shared.set_client_size(800, 600);
        shared.synthetic_hit_test.store(true, std::sync::atomic::Ordering::Relaxed);
        shared.set_hit_regions(vec![region(0.0, 0.0, 100.0, 50.0)]);

        assert_eq!(shared.hit_test_response(99, 49), HitTestResponse::Client);
        assert_eq!(
            shared.hit_test_response(100, 50),
            HitTestResponse::Transparent
        );
    }

    #[test]
    fn synthetic_mode_with_no_regions_is_fully_transparent() {
        let shared = OverlayShared::default();
        shared.set_client_size(800, 600);
        shared.synthetic_hit_test.store(true, std::sync::atomic::Ordering::Relaxed);
        for (x, y) in [(0, 0), (400, 300), (799, 599)] {
            assert_eq!(shared.hit_test_response(x, y), HitTestResponse::Transparent);
        }
    }

    #[test]
    fn force_pass_through_overrides_regions() {
        let shared = OverlayShared::default();
        shared.set_client_size(800, 600);
        shared.synthetic_hit_test.store(true, std::sync::atomic::Ordering::Relaxed);
        shared.set_hit_regions(vec![region(0.0, 0.0, 800.0, 600.0)]);
        shared
            .force_pass_through
            .store(true, std::sync::atomic::Ordering::Relaxed);

        assert_eq!(
            shared.hit_test_response(400, 300),
            HitTestResponse::Transparent
        );
    }

    #[test]
    fn hit_margin_widens_synthetic_regions() {
        let shared = OverlayShared::default();
        shared.set_client_size(800, 600);
        shared.synthetic_hit_test.store(true, std::sync::atomic::Ordering::Relaxed);
        shared.set_hit_regions(vec![region(100.0, 100.0, 50.0, 50.0)]);

        assert_eq!(shared.hit_test_response(97, 100), HitTestResponse::Transparent);
        shared
            .hit_margin
            .store(4, std::sync::atomic::Ordering::Relaxed);
        assert_eq!(shared.hit_test_response(97, 100), HitTestResponse::Client);
    }

    #[test]
    fn drop_queue_drains_once() {
        let queue = DropQueue::default();
        queue.push(FileDrop {
            path: "a.txt".into(),
            point: (1, 2),
        });
        queue.push(FileDrop {
            path: "b.txt".into(),
            point: (3, 4),
        });

        let drained = queue.take_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].path, std::path::PathBuf::from("a.txt"));
        assert!(queue.take_all().is_empty());
    }

    #[test]
    fn drop_queue_is_bounded() {
        let queue = DropQueue::default();
        for i in 0..(DROP_QUEUE_CAPACITY + 10) {
            queue.push(FileDrop {
                path: format!("{i}.txt").into(),
                point: (0, 0),
            });
        }
        assert_eq!(queue.take_all().len(), DROP_QUEUE_CAPACITY);
    }

    #[test]
    fn event_queue_is_taken_per_frame() {
        let shared = OverlayShared::default();
        shared.push_event(egui::Event::Text("a".into()));
        shared.push_event(egui::Event::Text("b".into()));
        assert_eq!(shared.drain_events().len(), 2);
        assert!(shared.drain_events().is_empty());
    }
}
