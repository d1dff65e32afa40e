use indexmap::IndexMap;
use tracing::debug;

use crate::{
    backend::DeviceId,
    input::ListenerBundle,
    mapper::{FocusedWindowTransform, OutputGeometry},
    seat::{AxisOrientation, ButtonState, KeyState, SeatSink},
    surface::{LifecycleCtx, SurfaceError, SurfaceId, SurfaceMap, SurfaceRole},
    ClickMode, BUTTON_HELD_COUNT, TOUCH_SLOT_COUNT,
};

/// Focus and input-tracking state, bundled into one context object.
///
/// Mutated only from device-event handlers and compositor-facing operations,
/// all of which run inside the dispatch lock.
#[derive(Debug)]
pub struct RouterState {
    pub keyboard_focus: Option<SurfaceId>,
    pub pointer_focus: Option<SurfaceId>,
    pub cursor_x: f64,
    pub cursor_y: f64,
    /// Slot `i` is true between a delivered touch-down for contact `i` and
    /// its matching up.
    pub(crate) touch_down: [bool; TOUCH_SLOT_COUNT],
    /// Slot `i` is true while the emulated button for click-mode `i` is held.
    pub(crate) button_held: [bool; BUTTON_HELD_COUNT],
    pub(crate) click_mode: ClickMode,
    pub output: OutputGeometry,
    pub focus_transform: FocusedWindowTransform,
}

impl Default for RouterState {
    fn default() -> Self {
        RouterState {
            keyboard_focus: None,
            pointer_focus: None,
            cursor_x: 0.0,
            cursor_y: 0.0,
            touch_down: [false; TOUCH_SLOT_COUNT],
            button_held: [false; BUTTON_HELD_COUNT],
            click_mode: ClickMode::default(),
            output: OutputGeometry::default(),
            focus_transform: FocusedWindowTransform::default(),
        }
    }
}

/// Central compositor state: the surface side table, the focus router, and
/// the seat sink all derived events are delivered to.
pub struct Wlnest<S: SeatSink> {
    pub seat: S,
    pub surfaces: SurfaceMap,
    pub router: RouterState,
    pub(crate) devices: IndexMap<DeviceId, ListenerBundle>,
    destroyed: Vec<SurfaceId>,
}

impl<S: SeatSink> Wlnest<S> {
    pub fn new(seat: S) -> Self {
        Wlnest {
            seat,
            surfaces: SurfaceMap::new(),
            router: RouterState::default(),
            devices: IndexMap::new(),
            destroyed: Vec::new(),
        }
    }

    pub fn get_click_mode(&self) -> ClickMode {
        self.router.click_mode
    }

    pub fn set_click_mode(&mut self, mode: ClickMode) {
        if self.router.click_mode != mode {
            debug!(?mode, "click mode changed");
        }
        self.router.click_mode = mode;
    }

    pub fn set_output_geometry(&mut self, output: OutputGeometry) {
        self.router.output = output;
    }

    pub fn set_focused_window_transform(&mut self, transform: FocusedWindowTransform) {
        self.router.focus_transform = transform;
    }

    /// Move keyboard focus. `None` clears it without notifying anyone.
    pub fn set_keyboard_focus(&mut self, surface: Option<SurfaceId>) -> Result<(), SurfaceError> {
        let Some(id) = surface else {
            self.router.keyboard_focus = None;
            return Ok(());
        };
        if !self.surfaces.contains(id) {
            return Err(SurfaceError::UnknownSurface(id));
        }
        self.router.keyboard_focus = Some(id);
        self.seat.notify_keyboard_enter(id);
        Ok(())
    }

    /// Move pointer (and touch) focus. Resets the cursor to the surface
    /// center and sends enter + motion + frame so clients know where the
    /// pointer is before any delta arrives.
    pub fn set_pointer_focus(&mut self, surface: Option<SurfaceId>) -> Result<(), SurfaceError> {
        let Some(id) = surface else {
            self.router.pointer_focus = None;
            return Ok(());
        };
        let (width, height) = self
            .surfaces
            .size(id)
            .ok_or(SurfaceError::UnknownSurface(id))?;
        self.router.pointer_focus = Some(id);
        self.router.cursor_x = width as f64 / 2.0;
        self.router.cursor_y = height as f64 / 2.0;
        self.seat
            .notify_pointer_enter(id, self.router.cursor_x, self.router.cursor_y);
        self.seat
            .notify_pointer_motion(0, self.router.cursor_x, self.router.cursor_y);
        self.seat.notify_pointer_frame();
        Ok(())
    }

    /// Synthesize a key event, e.g. from the compositor's own shortcut
    /// handling or remote input.
    pub fn inject_key(&mut self, code: u32, press: bool, time: u32) {
        self.seat
            .notify_key(time, code, KeyState::from_pressed(press));
    }

    pub fn inject_pointer_button(&mut self, button: u32, press: bool, time: u32) {
        self.seat
            .notify_pointer_button(time, button, ButtonState::from_pressed(press));
        self.seat.notify_pointer_frame();
    }

    /// Synthesize wheel scrolling. Each nonzero axis gets its own axis
    /// notification; the frame marker is sent either way.
    pub fn inject_pointer_wheel(&mut self, dx: f64, dy: f64, time: u32) {
        if dx != 0.0 {
            self.seat
                .notify_pointer_axis(time, AxisOrientation::Horizontal, dx);
        }
        if dy != 0.0 {
            self.seat
                .notify_pointer_axis(time, AxisOrientation::Vertical, dy);
        }
        self.seat.notify_pointer_frame();
    }

    /// Track a surface for its whole lifetime: assign the bridge role and
    /// attach the destroy guard. A conflicting role fails this registration
    /// only; registering the same surface twice is a no-op.
    pub fn register_surface_for_lifecycle(&mut self, id: SurfaceId) -> Result<(), SurfaceError> {
        self.surfaces.set_role(id, SurfaceRole::Bridge)?;

        if self.surfaces.guard_token(id).is_some() {
            return Ok(());
        }

        let token = self.surfaces.subscribe_destroy(id, move |ctx, fired| {
            if ctx.router.pointer_focus == Some(fired) {
                ctx.router.pointer_focus = None;
            }
            if ctx.router.keyboard_focus == Some(fired) {
                ctx.router.keyboard_focus = None;
            }
            ctx.destroyed.push(fired);
        })?;
        self.surfaces.set_guard_token(id, token);
        Ok(())
    }

    /// The protocol layer reports a surface destroy. The registry entry is
    /// detached, its destroy listeners run (lifecycle guard first), and any
    /// focus still pointing at the id is invalidated so later routing is a
    /// silent no-op.
    pub fn surface_destroyed(&mut self, id: SurfaceId) {
        let Some(mut entry) = self.surfaces.take(id) else {
            debug!(?id, "destroy for untracked surface");
            return;
        };
        let mut ctx = LifecycleCtx {
            router: &mut self.router,
            destroyed: &mut self.destroyed,
        };
        entry.fire_destroy(&mut ctx, id);

        if self.router.pointer_focus == Some(id) {
            self.router.pointer_focus = None;
        }
        if self.router.keyboard_focus == Some(id) {
            self.router.keyboard_focus = None;
        }
    }

    /// Surfaces destroyed since the last drain, in destruction order. The
    /// compositor side consumes this to drop its own references.
    pub fn drain_destroyed(&mut self) -> Vec<SurfaceId> {
        std::mem::take(&mut self.destroyed)
    }
}
