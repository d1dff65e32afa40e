pub mod backend;
pub mod headless;
pub mod input;
pub mod mapper;
pub mod seat;
pub mod server;
pub mod state;
pub mod surface;

pub use state::Wlnest;

/// Button codes from linux/input-event-codes.h, as carried on the wire by the
/// seat protocol.
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;

/// Number of touch contact slots tracked per seat. Contact ids outside
/// `0..TOUCH_SLOT_COUNT` are never indexed into the slot table.
pub const TOUCH_SLOT_COUNT: usize = 11;

/// Number of emulated-button slots, indexed by click-mode id.
pub const BUTTON_HELD_COUNT: usize = 4;

/// How a touch contact is translated before delivery to the seat.
///
/// Hover and the three button modes emulate a pointer; `Passthrough` delivers
/// native multi-touch events. Changed at runtime from the compositor control
/// path and read live by the touch handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClickMode {
    Hover = 0,
    #[default]
    Left = 1,
    Right = 2,
    Middle = 3,
    Passthrough = 4,
}

impl ClickMode {
    /// The synthesized button for this mode, if any.
    pub fn emulated_button(self) -> Option<u32> {
        match self {
            ClickMode::Hover | ClickMode::Passthrough => None,
            ClickMode::Left => Some(BTN_LEFT),
            ClickMode::Right => Some(BTN_RIGHT),
            ClickMode::Middle => Some(BTN_MIDDLE),
        }
    }

    /// Index into the held-button table, for the modes that can hold one.
    pub(crate) fn held_slot(self) -> Option<usize> {
        match self {
            ClickMode::Left | ClickMode::Right | ClickMode::Middle => Some(self as usize),
            ClickMode::Hover | ClickMode::Passthrough => None,
        }
    }

    /// Reverse of `held_slot`, used when draining the held-button table.
    pub(crate) fn from_held_slot(slot: usize) -> Option<ClickMode> {
        match slot {
            1 => Some(ClickMode::Left),
            2 => Some(ClickMode::Right),
            3 => Some(ClickMode::Middle),
            _ => None,
        }
    }
}
