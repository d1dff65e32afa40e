//! Boundary to the input backend.
//!
//! A backend enumerates keyboard/pointer/touch devices and delivers their raw
//! events as [`InputEvent`]s. Devices are owned by the backend; the router
//! only keeps a per-device bundle for as long as the device is announced.

use crate::seat::{ButtonState, KeyState, Modifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Keyboard,
    Pointer,
    Touch,
}

/// A device as announced by the backend. The handle is informational; the
/// backend keeps ownership and later revokes the id with
/// [`InputEvent::DeviceRemoved`].
#[derive(Debug, Clone)]
pub struct InputDevice {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub name: String,
}

#[derive(Debug, Clone, Copy)]
pub struct KeyboardKeyEvent {
    pub time: u32,
    pub code: u32,
    pub state: KeyState,
}

#[derive(Debug, Clone, Copy)]
pub struct KeyboardModifiersEvent {
    pub modifiers: Modifiers,
}

/// Relative pointer motion, in unaccelerated device units.
#[derive(Debug, Clone, Copy)]
pub struct PointerMotionEvent {
    pub time: u32,
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PointerButtonEvent {
    pub time: u32,
    pub button: u32,
    pub state: ButtonState,
}

/// Touch contact event. `x` and `y` are normalized to `[0, 1]` over the
/// device; `id` is the backend's contact id and may fall outside the tracked
/// slot range.
#[derive(Debug, Clone, Copy)]
pub struct TouchEvent {
    pub time: u32,
    pub id: i32,
    pub x: f64,
    pub y: f64,
}

/// Touch contact lift. Carries no coordinates.
#[derive(Debug, Clone, Copy)]
pub struct TouchUpEvent {
    pub time: u32,
    pub id: i32,
}

/// Everything a backend can hand to the router. Handlers run synchronously
/// inside the dispatch lock and must not block.
#[derive(Debug, Clone)]
pub enum InputEvent {
    DeviceAdded { device: InputDevice },
    DeviceRemoved { device: DeviceId },
    KeyboardKey { device: DeviceId, event: KeyboardKeyEvent },
    KeyboardModifiers { device: DeviceId, event: KeyboardModifiersEvent },
    PointerMotion { device: DeviceId, event: PointerMotionEvent },
    PointerButton { device: DeviceId, event: PointerButtonEvent },
    TouchDown { device: DeviceId, event: TouchEvent },
    TouchUp { device: DeviceId, event: TouchUpEvent },
    TouchMotion { device: DeviceId, event: TouchEvent },
}

impl InputEvent {
    /// The device an event originated from.
    pub fn device(&self) -> DeviceId {
        match self {
            InputEvent::DeviceAdded { device } => device.id,
            InputEvent::DeviceRemoved { device } => *device,
            InputEvent::KeyboardKey { device, .. }
            | InputEvent::KeyboardModifiers { device, .. }
            | InputEvent::PointerMotion { device, .. }
            | InputEvent::PointerButton { device, .. }
            | InputEvent::TouchDown { device, .. }
            | InputEvent::TouchUp { device, .. }
            | InputEvent::TouchMotion { device, .. } => *device,
        }
    }
}
