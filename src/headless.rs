//! Headless stand-ins for the external transport and seat layers.
//!
//! Lets the server run without a real protocol connection: the display's
//! readiness fd is an eventfd nobody writes to unless asked, and the seat
//! sink just traces what would have gone on the wire.

use std::{io, os::unix::io::RawFd};

use nix::sys::eventfd::{eventfd, EfdFlags};
use tracing::{debug, info, trace};

use crate::{
    seat::{AxisOrientation, ButtonState, KeyState, Modifiers, SeatSink},
    server::{nix_to_io, Display},
    surface::SurfaceId,
};

pub struct HeadlessDisplay {
    event_fd: RawFd,
}

impl HeadlessDisplay {
    pub fn new() -> io::Result<Self> {
        let event_fd = eventfd(0, EfdFlags::EFD_CLOEXEC | EfdFlags::EFD_NONBLOCK)
            .map_err(nix_to_io)?;
        Ok(HeadlessDisplay { event_fd })
    }

    /// Make the readiness fd fire once, e.g. to let the dispatch loop
    /// re-check its flags.
    pub fn wake(&self) -> io::Result<()> {
        nix::unistd::write(self.event_fd, &1u64.to_ne_bytes())
            .map_err(nix_to_io)
            .map(|_| ())
    }
}

impl Drop for HeadlessDisplay {
    fn drop(&mut self) {
        let _ = nix::unistd::close(self.event_fd);
    }
}

impl Display for HeadlessDisplay {
    fn poll_fd(&self) -> RawFd {
        self.event_fd
    }

    fn flush_clients(&mut self) {}

    fn dispatch_pending(&mut self) -> io::Result<usize> {
        let mut counter = [0u8; 8];
        let _ = nix::unistd::read(self.event_fd, &mut counter);
        Ok(0)
    }

    fn shutdown_bridge(&mut self) {
        info!("headless bridge shut down");
    }

    fn destroy_clients(&mut self) {
        info!("headless display has no clients to disconnect");
    }
}

/// Seat sink that logs every notification instead of delivering it.
#[derive(Debug, Default)]
pub struct TracingSeat;

impl SeatSink for TracingSeat {
    fn notify_key(&mut self, time: u32, code: u32, state: KeyState) {
        debug!(time, code, ?state, "key");
    }

    fn notify_modifiers(&mut self, modifiers: Modifiers) {
        debug!(?modifiers, "modifiers");
    }

    fn notify_keyboard_enter(&mut self, surface: SurfaceId) {
        debug!(?surface, "keyboard enter");
    }

    fn notify_pointer_enter(&mut self, surface: SurfaceId, x: f64, y: f64) {
        debug!(?surface, x, y, "pointer enter");
    }

    fn notify_pointer_motion(&mut self, time: u32, x: f64, y: f64) {
        trace!(time, x, y, "pointer motion");
    }

    fn notify_pointer_button(&mut self, time: u32, button: u32, state: ButtonState) {
        debug!(time, button, ?state, "pointer button");
    }

    fn notify_pointer_axis(&mut self, time: u32, orientation: AxisOrientation, value: f64) {
        debug!(time, ?orientation, value, "pointer axis");
    }

    fn notify_pointer_frame(&mut self) {
        trace!("pointer frame");
    }

    fn notify_touch_down(&mut self, surface: SurfaceId, time: u32, id: i32, x: f64, y: f64) {
        debug!(?surface, time, id, x, y, "touch down");
    }

    fn notify_touch_up(&mut self, time: u32, id: i32) {
        debug!(time, id, "touch up");
    }

    fn notify_touch_motion(&mut self, time: u32, id: i32, x: f64, y: f64) {
        trace!(time, id, x, y, "touch motion");
    }
}
