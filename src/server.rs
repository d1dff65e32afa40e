//! The serialized dispatch loop.
//!
//! One dispatcher thread waits for readiness on the protocol transport and
//! drains it while holding the wayland lock; a renderer thread takes the same
//! lock for its own access to connection state. The lock is held for a whole
//! drain batch per wake, trading renderer latency for input batching, and is
//! never released without flushing outbound protocol traffic first.

use std::{
    io,
    ops::{Deref, DerefMut},
    os::unix::io::RawFd,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use nix::sys::epoll::{
    epoll_create1, epoll_ctl, epoll_wait, EpollCreateFlags, EpollEvent, EpollFlags, EpollOp,
};
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGUSR2};
use tracing::{error, info};

use crate::{seat::SeatSink, state::Wlnest};

pub(crate) fn nix_to_io(err: nix::errno::Errno) -> io::Error {
    io::Error::from_raw_os_error(err as i32)
}

/// Boundary to the protocol transport and the nested window-system bridge.
pub trait Display {
    /// Readiness fd the dispatch loop waits on.
    fn poll_fd(&self) -> RawFd;

    /// Flush outbound buffers toward clients.
    fn flush_clients(&mut self);

    /// Dispatch pending inbound protocol work. An error ends the dispatch
    /// loop and moves it to orderly shutdown.
    fn dispatch_pending(&mut self) -> io::Result<usize>;

    /// Tear down the nested window-system bridge. Must happen before
    /// `destroy_clients`, otherwise the bridge's supervision logic restarts
    /// it against a dying display.
    fn shutdown_bridge(&mut self);

    /// Disconnect all client connections.
    fn destroy_clients(&mut self);
}

/// Process-wide flags flipped from signal context. Nothing else may run in a
/// signal handler; the dispatch loop and the renderer observe these at their
/// own pace.
#[derive(Clone, Default)]
pub struct ControlFlags {
    shutdown: Arc<AtomicBool>,
    screenshot: Arc<AtomicBool>,
}

impl ControlFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// SIGTERM/SIGINT request shutdown, SIGUSR2 requests a screenshot.
    pub fn register_signals(&self) -> io::Result<()> {
        signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown))?;
        signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown))?;
        signal_hook::flag::register(SIGUSR2, Arc::clone(&self.screenshot))?;
        Ok(())
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn request_screenshot(&self) {
        self.screenshot.store(true, Ordering::SeqCst);
    }

    /// Consume a pending screenshot request. The renderer polls this at its
    /// next capture point; the dispatch loop never acts on it.
    pub fn take_screenshot_request(&self) -> bool {
        self.screenshot.swap(false, Ordering::SeqCst)
    }
}

/// Everything the wayland lock protects: router/focus state and the protocol
/// connection it feeds.
pub struct Shared<S: SeatSink, D: Display> {
    pub server: Wlnest<S>,
    pub display: D,
}

/// The cross-thread exclusion lock shared between the dispatcher and the
/// renderer. Dropping the guard flushes clients before the mutex is released.
pub struct WaylandLock<S: SeatSink, D: Display>(Arc<Mutex<Shared<S, D>>>);

impl<S: SeatSink, D: Display> Clone for WaylandLock<S, D> {
    fn clone(&self) -> Self {
        WaylandLock(Arc::clone(&self.0))
    }
}

impl<S: SeatSink, D: Display> WaylandLock<S, D> {
    pub fn new(server: Wlnest<S>, display: D) -> Self {
        WaylandLock(Arc::new(Mutex::new(Shared { server, display })))
    }

    pub fn lock(&self) -> LockedShared<'_, S, D> {
        LockedShared {
            guard: self.0.lock().unwrap(),
        }
    }
}

pub struct LockedShared<'a, S: SeatSink, D: Display> {
    guard: MutexGuard<'a, Shared<S, D>>,
}

impl<S: SeatSink, D: Display> Deref for LockedShared<'_, S, D> {
    type Target = Shared<S, D>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<S: SeatSink, D: Display> DerefMut for LockedShared<'_, S, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<S: SeatSink, D: Display> Drop for LockedShared<'_, S, D> {
    fn drop(&mut self) {
        self.guard.display.flush_clients();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("failed to set up the readiness poll: {0}")]
    PollSetup(#[source] io::Error),
}

/// Run the dispatch loop until shutdown is requested or the transport fails.
///
/// Each wake drains up to the batch size returned by the wait call under one
/// lock acquisition, flushing before every dispatch. Signal interruption of
/// the wait is transparent; any other wait error or a dispatch error moves to
/// orderly shutdown. On exit the nested bridge is torn down strictly before
/// client connections.
pub fn run_dispatch_loop<S, D>(shared: WaylandLock<S, D>, flags: ControlFlags) -> Result<(), LoopError>
where
    S: SeatSink,
    D: Display,
{
    let epoll_fd = epoll_create1(EpollCreateFlags::EPOLL_CLOEXEC)
        .map_err(nix_to_io)
        .map_err(LoopError::PollSetup)?;

    let poll_fd = shared.lock().display.poll_fd();
    let mut poll_event = EpollEvent::new(EpollFlags::EPOLLIN, 0);
    if let Err(err) = epoll_ctl(epoll_fd, EpollOp::EpollCtlAdd, poll_fd, &mut poll_event) {
        let _ = nix::unistd::close(epoll_fd);
        return Err(LoopError::PollSetup(nix_to_io(err)));
    }

    let mut events = [EpollEvent::empty(); 128];

    // The shutdown flag is checked once per iteration; an in-progress drain
    // batch always completes.
    'dispatch: while !flags.shutdown_requested() {
        let ready = match epoll_wait(epoll_fd, &mut events, -1) {
            Err(nix::errno::Errno::EINTR) => continue,
            Err(err) => {
                error!("readiness wait failed: {err}");
                break;
            }
            Ok(ready) => ready,
        };

        let mut locked = shared.lock();
        for _ in 0..ready {
            locked.display.flush_clients();
            if let Err(err) = locked.display.dispatch_pending() {
                error!("protocol dispatch failed: {err}");
                break 'dispatch;
            }
        }
    }

    info!("dispatch loop exiting");

    let mut locked = shared.lock();
    locked.display.shutdown_bridge();
    locked.display.destroy_clients();
    drop(locked);

    let _ = nix::unistd::close(epoll_fd);
    Ok(())
}
