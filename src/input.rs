//! Builds the per-frame [`egui::RawInput`]: polled pointer and keyboard
//! state plus the events the window procedure queued since the previous
//! frame.
//!
//! The overlay window is never activated, so it never sees normal mouse
//! button or key messages; both are polled instead.

use std::sync::Arc;
use std::time::Instant;

use egui::Key;

use crate::overlay::OverlayShared;

/// Virtual-key to UI key pairs polled every frame (WinUser.h values).
pub const KEY_TABLE: [(u16, Key); 63] = [
    (0x09, Key::Tab),
    (0x25, Key::ArrowLeft),
    (0x27, Key::ArrowRight),
    (0x26, Key::ArrowUp),
    (0x28, Key::ArrowDown),
    (0x21, Key::PageUp),
    (0x22, Key::PageDown),
    (0x24, Key::Home),
    (0x23, Key::End),
    (0x2D, Key::Insert),
    (0x2E, Key::Delete),
    (0x08, Key::Backspace),
    (0x20, Key::Space),
    (0x0D, Key::Enter),
    (0x1B, Key::Escape),
    (0x30, Key::Num0),
    (0x31, Key::Num1),
    (0x32, Key::Num2),
    (0x33, Key::Num3),
    (0x34, Key::Num4),
    (0x35, Key::Num5),
    (0x36, Key::Num6),
    (0x37, Key::Num7),
    (0x38, Key::Num8),
    (0x39, Key::Num9),
    (0x41, Key::A),
    (0x42, Key::B),
    (0x43, Key::C),
    (0x44, Key::D),
    (0x45, Key::E),
    (0x46, Key::F),
    (0x47, Key::G),
    (0x48, Key::H),
    (0x49, Key::I),
    (0x4A, Key::J),
    (0x4B, Key::K),
    (0x4C, Key::L),
    (0x4D, Key::M),
    (0x4E, Key::N),
    (0x4F, Key::O),
    (0x50, Key::P),
    (0x51, Key::Q),
    (0x52, Key::R),
    (0x53, Key::S),
    (0x54, Key::T),
    (0x55, Key::U),
    (0x56, Key::V),
    (0x57, Key::W),
    (0x58, Key::X),
    (0x59, Key::Y),
    (0x5A, Key::Z),
    (0x70, Key::F1),
    (0x71, Key::F2),
    (0x72, Key::F3),
    (0x73, Key::F4),
    (0x74, Key::F5),
    (0x75, Key::F6),
    (0x76, Key::F7),
    (0x77, Key::F8),
    (0x78, Key::F9),
    (0x79, Key::F10),
    (0x7A, Key::F11),
    (0x7B, Key::F12),
];

/// Snapshot of the polled keyboard state, parallel to [`KEY_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyboardState {
    pub down: [bool; KEY_TABLE.len()],
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self {
            down: [false; KEY_TABLE.len()],
        }
    }
}

impl KeyboardState {
    /// Marks the table entry for `key` as held. Test helper, mostly.
    pub fn press(&mut self, key: Key) {
        for (i, (_, entry)) in KEY_TABLE.iter().enumerate() {
            if *entry == key {
                self.down[i] = true;
            }
        }
    }
}

/// Turn the previous and current keyboard snapshot into key press/release
/// events.
pub fn key_transitions(
    previous: [bool; KEY_TABLE.len()],
    current: &KeyboardState,
    modifiers: egui::Modifiers,
) -> Vec<egui::Event> {
    let mut events = Vec::new();
    for (i, (_, key)) in KEY_TABLE.iter().enumerate() {
        if previous[i] != current.down[i] {
            events.push(egui::Event::Key {
                key: *key,
                physical_key: None,
                pressed: current.down[i],
                repeat: false,
                modifiers,
            });
        }
    }
    events
}

/// Snapshot of the polled pointer state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    /// Cursor position in client coordinates, if inside the client area.
    pub position: Option<(f32, f32)>,
    /// Primary, secondary, middle.
    pub buttons: [bool; 3],
    pub modifiers: egui::Modifiers,
}

const BUTTON_ORDER: [egui::PointerButton; 3] = [
    egui::PointerButton::Primary,
    egui::PointerButton::Secondary,
    egui::PointerButton::Middle,
];

/// Turn the previous and current button snapshot into press/release events.
pub fn button_transitions(
    previous: [bool; 3],
    current: &PointerState,
    last_pos: (f32, f32),
) -> Vec<egui::Event> {
    let pos = current.position.unwrap_or(last_pos);
    let pos = egui::pos2(pos.0, pos.1);
    let mut events = Vec::new();
    for (i, button) in BUTTON_ORDER.iter().enumerate() {
        if previous[i] != current.buttons[i] {
            events.push(egui::Event::PointerButton {
                pos,
                button: *button,
                pressed: current.buttons[i],
                modifiers: current.modifiers,
            });
        }
    }
    events
}

pub struct InputCollector {
    shared: Arc<OverlayShared>,
    start: Instant,
    last_buttons: [bool; 3],
    last_keys: [bool; KEY_TABLE.len()],
    last_position: (f32, f32),
    pointer_inside: bool,
}

impl InputCollector {
    pub fn new(shared: Arc<OverlayShared>) -> Self {
        Self {
            shared,
            start: Instant::now(),
            last_buttons: [false; 3],
            last_keys: [false; KEY_TABLE.len()],
            last_position: (0.0, 0.0),
            pointer_inside: false,
        }
    }

    /// Assemble the frame's input from polled pointer and keyboard
    /// snapshots and the queued window events.
    pub fn collect(
        &mut self,
        pointer: PointerState,
        keyboard: &KeyboardState,
        width: u32,
        height: u32,
    ) -> egui::RawInput {
        let mut events = Vec::new();

        match pointer.position {
            Some((x, y)) => {
                if !self.pointer_inside || (x, y) != self.last_position {
                    events.push(egui::Event::PointerMoved(egui::pos2(x, y)));
                }
                self.last_position = (x, y);
                self.pointer_inside = true;
            }
            None => {
                if self.pointer_inside {
                    events.push(egui::Event::PointerGone);
                }
                self.pointer_inside = false;
            }
        }

        events.extend(button_transitions(
            self.last_buttons,
            &pointer,
            self.last_position,
        ));
        self.last_buttons = pointer.buttons;

        events.extend(key_transitions(self.last_keys, keyboard, pointer.modifiers));
        self.last_keys = keyboard.down;

        events.extend(self.shared.drain_events());

        egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(
                egui::Pos2::ZERO,
                egui::vec2(width as f32, height as f32),
            )),
            time: Some(self.start.elapsed().as_secs_f64()),
            modifiers: pointer.modifiers,
            events,
            ..Default::default()
        }
    }
}

/// Poll cursor position, buttons, and modifiers for the given window.
#[cfg(windows)]
pub fn poll_pointer(hwnd: isize) -> PointerState {
    use windows::Win32::Foundation::{HWND, POINT};
    use windows::Win32::Graphics::Gdi::ScreenToClient;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        GetAsyncKeyState, VK_CONTROL, VK_LBUTTON, VK_MBUTTON, VK_MENU, VK_RBUTTON, VK_SHIFT,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetClientRect, GetCursorPos};

    fn key_down(vk: windows::Win32::UI::Input::KeyboardAndMouse::VIRTUAL_KEY) -> bool {
        (unsafe { GetAsyncKeyState(vk.0 as i32) } as u16 & 0x8000) != 0
    }

    let hwnd = HWND(hwnd as *mut core::ffi::c_void);
    let mut state = PointerState::default();

    unsafe {
        let mut pt = POINT::default();
        if GetCursorPos(&mut pt).is_ok() && ScreenToClient(hwnd, &mut pt).as_bool() {
            let mut client = windows::Win32::Foundation::RECT::default();
            if GetClientRect(hwnd, &mut client).is_ok()
                && pt.x >= 0
                && pt.y >= 0
                && pt.x < client.right
                && pt.y < client.bottom
            {
                state.position = Some((pt.x as f32, pt.y as f32));
            }
        }
    }

    state.buttons = [
        key_down(VK_LBUTTON),
        key_down(VK_RBUTTON),
        key_down(VK_MBUTTON),
    ];
    state.modifiers = egui::Modifiers {
        alt: key_down(VK_MENU),
        ctrl: key_down(VK_CONTROL),
        shift: key_down(VK_SHIFT),
        mac_cmd: false,
        command: key_down(VK_CONTROL),
    };
    state
}

#[cfg(not(windows))]
pub fn poll_pointer(_hwnd: isize) -> PointerState {
    PointerState::default()
}

/// Poll every key in [`KEY_TABLE`].
#[cfg(windows)]
pub fn poll_keyboard() -> KeyboardState {
    use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;

    let mut state = KeyboardState::default();
    for (i, (vk, _)) in KEY_TABLE.iter().enumerate() {
        state.down[i] = (unsafe { GetAsyncKeyState(*vk as i32) } as u16 & 0x8000) != 0;
    }
    state
}

#[cfg(not(windows))]
pub fn poll_keyboard() -> KeyboardState {
    KeyboardState::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer_at(x: f32, y: f32, buttons: [bool; 3]) -> PointerState {
        PointerState {
            position: Some((x, y)),
            buttons,
            modifiers: egui::Modifiers::default(),
        }
    }

    #[test]
    fn press_and_release_produce_edge_events() {
        let events = button_transitions(
            [false; 3],
            &pointer_at(10.0, 20.0, [true, false, false]),
            (0.0, 0.0),
        );
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            egui::Event::PointerButton {
                button: egui::PointerButton::Primary,
                pressed: true,
                ..
            }
        ));

        let events = button_transitions(
            [true, false, false],
            &pointer_at(10.0, 20.0, [false, false, false]),
            (10.0, 20.0),
        );
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            egui::Event::PointerButton { pressed: false, .. }
        ));
    }

    #[test]
    fn held_button_emits_nothing() {
        let held = [true, false, false];
        let events = button_transitions(held, &pointer_at(5.0, 5.0, held), (5.0, 5.0));
        assert!(events.is_empty());
    }

    #[test]
    fn collector_reports_motion_and_departure() {
        let shared = Arc::new(OverlayShared::default());
        let mut collector = InputCollector::new(shared);
        let keys = KeyboardState::default();

        let input = collector.collect(pointer_at(3.0, 4.0, [false; 3]), &keys, 800, 600);
        assert!(matches!(input.events[0], egui::Event::PointerMoved(_)));

        // Unmoved pointer: no event.
        let input = collector.collect(pointer_at(3.0, 4.0, [false; 3]), &keys, 800, 600);
        assert!(input.events.is_empty());

        let input = collector.collect(PointerState::default(), &keys, 800, 600);
        assert!(matches!(input.events[0], egui::Event::PointerGone));
    }

    #[test]
    fn queued_window_events_are_included() {
        let shared = Arc::new(OverlayShared::default());
        shared.push_event(egui::Event::Text("x".into()));
        let mut collector = InputCollector::new(Arc::clone(&shared));
        let input = collector.collect(PointerState::default(), &KeyboardState::default(), 800, 600);
        assert!(input
            .events
            .iter()
            .any(|e| matches!(e, egui::Event::Text(t) if t == "x")));
    }

    #[test]
    fn key_press_and_release_reach_the_frame_input() {
        let shared = Arc::new(OverlayShared::default());
        let mut collector = InputCollector::new(shared);

        let mut keys = KeyboardState::default();
        keys.press(Key::Enter);
        keys.press(Key::Tab);

        let input = collector.collect(PointerState::default(), &keys, 800, 600);
        let pressed: Vec<Key> = input
            .events
            .iter()
            .filter_map(|e| match e {
                egui::Event::Key {
                    key, pressed: true, ..
                } => Some(*key),
                _ => None,
            })
            .collect();
        assert_eq!(pressed, vec![Key::Tab, Key::Enter]);

        // Held keys stay silent.
        let input = collector.collect(PointerState::default(), &keys, 800, 600);
        assert!(input.events.is_empty());

        // Releasing emits the matching release edge.
        let input = collector.collect(PointerState::default(), &KeyboardState::default(), 800, 600);
        let released: Vec<Key> = input
            .events
            .iter()
            .filter_map(|e| match e {
                egui::Event::Key {
                    key,
                    pressed: false,
                    ..
                } => Some(*key),
                _ => None,
            })
            .collect();
        assert_eq!(released, vec![Key::Tab, Key::Enter]);
    }

    #[test]
    fn key_transitions_carry_the_frame_modifiers() {
        let mut keys = KeyboardState::default();
        keys.press(Key::C);
        let modifiers = egui::Modifiers {
            ctrl: true,
            command: true,
            ..Default::default()
        };
        let events = key_transitions([false; KEY_TABLE.len()], &keys, modifiers);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            egui::Event::Key {
                key: Key::C,
                pressed: true,
                repeat: false,
                modifiers: egui::Modifiers { ctrl: true, .. },
                ..
            }
        ));
    }
}
