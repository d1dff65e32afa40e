//! Boundary to the seat-protocol layer.
//!
//! The router never talks to clients directly; every derived event ends up as
//! one of these notify calls on whatever implements [`SeatSink`]. The real
//! implementation lives in the protocol layer, tests use a recording sink.

use crate::surface::SurfaceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Released,
    Pressed,
}

impl KeyState {
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed {
            KeyState::Pressed
        } else {
            KeyState::Released
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Released,
    Pressed,
}

impl ButtonState {
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrientation {
    Horizontal,
    Vertical,
}

bitflags::bitflags! {
    /// Depressed/latched modifier state forwarded with keyboard focus.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const LOGO = 1 << 3;
        const CAPS_LOCK = 1 << 4;
        const NUM_LOCK = 1 << 5;
    }
}

/// The seat-protocol notify surface.
///
/// Call ordering matters to clients: pointer motion/button groups must be
/// terminated by `notify_pointer_frame`, and enter notifications precede any
/// motion for the entered surface. The router upholds those rules; an
/// implementation only transcribes calls onto the wire.
pub trait SeatSink {
    fn notify_key(&mut self, time: u32, code: u32, state: KeyState);
    fn notify_modifiers(&mut self, modifiers: Modifiers);
    fn notify_keyboard_enter(&mut self, surface: SurfaceId);

    fn notify_pointer_enter(&mut self, surface: SurfaceId, x: f64, y: f64);
    fn notify_pointer_motion(&mut self, time: u32, x: f64, y: f64);
    fn notify_pointer_button(&mut self, time: u32, button: u32, state: ButtonState);
    fn notify_pointer_axis(&mut self, time: u32, orientation: AxisOrientation, value: f64);
    fn notify_pointer_frame(&mut self);

    fn notify_touch_down(&mut self, surface: SurfaceId, time: u32, id: i32, x: f64, y: f64);
    fn notify_touch_up(&mut self, time: u32, id: i32);
    fn notify_touch_motion(&mut self, time: u32, id: i32, x: f64, y: f64);
}
