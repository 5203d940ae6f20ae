//! Resolve the process named on the command line to the top-level window the
//! overlay attaches to.

use std::time::Duration;

use sysinfo::System;
use tracing::{info, warn};

const WINDOW_WAIT_ATTEMPTS: u32 = 20;
const WINDOW_WAIT_DELAY: Duration = Duration::from_millis(500);

/// Case-insensitive process-name match; `name` may be given with or without
/// the `.exe` suffix.
pub fn process_name_matches(candidate: &str, name: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let name = name.to_lowercase();
    candidate == name || candidate == format!("{name}.exe") || format!("{candidate}.exe") == name
}

/// All PIDs whose process name matches `name`.
pub fn find_process_ids(name: &str) -> Vec<u32> {
    let system = System::new_all();
    system
        .processes()
        .values()
        .filter(|p| process_name_matches(&p.name().to_string_lossy(), name))
        .map(|p| p.pid().as_u32())
        .collect()
}

/// Poll until one of the named processes owns a visible top-level window.
/// Processes can take a while to create their main window after launch.
pub fn wait_for_main_window(name: &str) -> Option<isize> {
    for attempt in 0..WINDOW_WAIT_ATTEMPTS {
        let pids = find_process_ids(name);
        if pids.is_empty() {
            warn!(name, attempt, "no matching process yet");
        } else {
            for pid in &pids {
                if let Some(hwnd) = main_window_for_pid(*pid) {
                    info!(name, pid, hwnd, "attached to target window");
                    return Some(hwnd);
                }
            }
        }
        std::thread::sleep(WINDOW_WAIT_DELAY);
    }
    None
}

#[cfg(windows)]
fn main_window_for_pid(pid: u32) -> Option<isize> {
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindow, GetWindowThreadProcessId, IsWindowVisible, GW_OWNER,
    };

    struct Search {
        pid: u32,
        found: Option<isize>,
    }

    unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let search = unsafe { &mut *(lparam.0 as *mut Search) };
        unsafe {
            // Main window: visible and unowned.
            if !IsWindowVisible(hwnd).as_bool() {
                return BOOL(1);
            }
            if !GetWindow(hwnd, GW_OWNER).unwrap_or_default().0.is_null() {
                return BOOL(1);
            }
            let mut window_pid = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&mut window_pid));
            if window_pid == search.pid {
                search.found = Some(hwnd.0 as isize);
                return BOOL(0);
            }
        }
        BOOL(1)
    }

    let mut search = Search { pid, found: None };
    // EnumWindows reports an error when the callback stops the walk early,
    // which is the success path here.
    let _ = unsafe { EnumWindows(Some(enum_proc), LPARAM(&mut search as *mut Search as isize)) };
    search.found
}

#[cfg(not(windows))]
fn main_window_for_pid(_pid: u32) -> Option<isize> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_match_ignores_case_and_exe_suffix() {
        assert!(process_name_matches("Notepad.exe", "notepad"));
        assert!(process_name_matches("notepad", "Notepad.exe"));
        assert!(process_name_matches("NOTEPAD.EXE", "notepad.exe"));
        assert!(!process_name_matches("notepad2.exe", "notepad"));
    }

    #[test]
    fn finds_own_process_by_name() {
        let system = System::new_all();
        let me = sysinfo::get_current_pid().unwrap();
        let name = system
            .process(me)
            .map(|p| p.name().to_string_lossy().to_string())
            .unwrap();
        assert!(find_process_ids(&name).contains(&me.as_u32()));
    }
}
