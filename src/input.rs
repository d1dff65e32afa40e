use tracing::{debug, info, trace};

use crate::{
    backend::{
        DeviceId, DeviceKind, InputDevice, InputEvent, KeyboardKeyEvent, KeyboardModifiersEvent,
        PointerButtonEvent, PointerMotionEvent, TouchEvent, TouchUpEvent,
    },
    mapper,
    seat::{ButtonState, SeatSink},
    state::Wlnest,
    surface::SurfaceId,
    ClickMode, BUTTON_HELD_COUNT, TOUCH_SLOT_COUNT,
};

/// Per-device registration state, created when the backend announces a device
/// and dropped when it is removed. Events from device ids without a live
/// bundle are discarded, so a bundle never outlives its device.
#[derive(Debug)]
pub(crate) struct ListenerBundle {
    kind: DeviceKind,
    name: String,
}

fn touch_slot(id: i32) -> Option<usize> {
    usize::try_from(id).ok().filter(|slot| *slot < TOUCH_SLOT_COUNT)
}

impl<S: SeatSink> Wlnest<S> {
    /// Route one backend event. Runs synchronously inside the dispatch lock;
    /// everything here is non-blocking.
    pub fn process_input_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::DeviceAdded { device } => self.add_device(device),
            InputEvent::DeviceRemoved { device } => self.remove_device(device),
            InputEvent::KeyboardKey { device, event } => {
                if self.device_is(device, DeviceKind::Keyboard) {
                    self.on_keyboard_key(event);
                }
            }
            InputEvent::KeyboardModifiers { device, event } => {
                if self.device_is(device, DeviceKind::Keyboard) {
                    self.on_keyboard_modifiers(event);
                }
            }
            InputEvent::PointerMotion { device, event } => {
                if self.device_is(device, DeviceKind::Pointer) {
                    self.on_pointer_motion(event);
                }
            }
            InputEvent::PointerButton { device, event } => {
                if self.device_is(device, DeviceKind::Pointer) {
                    self.on_pointer_button(event);
                }
            }
            InputEvent::TouchDown { device, event } => {
                if self.device_is(device, DeviceKind::Touch) {
                    self.on_touch_down(event);
                }
            }
            InputEvent::TouchUp { device, event } => {
                if self.device_is(device, DeviceKind::Touch) {
                    self.on_touch_up(event);
                }
            }
            InputEvent::TouchMotion { device, event } => {
                if self.device_is(device, DeviceKind::Touch) {
                    self.on_touch_motion(event);
                }
            }
        }
    }

    fn add_device(&mut self, device: InputDevice) {
        info!(id = ?device.id, kind = ?device.kind, name = %device.name, "new input device");
        self.devices.insert(
            device.id,
            ListenerBundle {
                kind: device.kind,
                name: device.name,
            },
        );
    }

    fn remove_device(&mut self, id: DeviceId) {
        if let Some(bundle) = self.devices.shift_remove(&id) {
            info!(?id, name = %bundle.name, "input device removed");
        }
    }

    fn device_is(&self, id: DeviceId, kind: DeviceKind) -> bool {
        match self.devices.get(&id) {
            Some(bundle) if bundle.kind == kind => true,
            _ => {
                trace!(?id, ?kind, "dropping event from unannounced device");
                false
            }
        }
    }

    fn on_keyboard_key(&mut self, event: KeyboardKeyEvent) {
        self.seat.notify_key(event.time, event.code, event.state);
    }

    fn on_keyboard_modifiers(&mut self, event: KeyboardModifiersEvent) {
        self.seat.notify_modifiers(event.modifiers);
    }

    /// Relative pointer motion: accumulate into the cursor position, clamp to
    /// the focused surface, deliver motion + frame. Without a focused surface
    /// the delta is discarded, not queued.
    fn on_pointer_motion(&mut self, event: PointerMotionEvent) {
        let Some(focus) = self.router.pointer_focus else {
            return;
        };
        let Some((width, height)) = self.surfaces.size(focus) else {
            return;
        };

        // The cursor rests on the last addressable pixel, hence dim - 1.
        self.router.cursor_x =
            (self.router.cursor_x + event.dx).clamp(0.0, (width - 1).max(0) as f64);
        self.router.cursor_y =
            (self.router.cursor_y + event.dy).clamp(0.0, (height - 1).max(0) as f64);

        self.seat
            .notify_pointer_motion(event.time, self.router.cursor_x, self.router.cursor_y);
        self.seat.notify_pointer_frame();
    }

    fn on_pointer_button(&mut self, event: PointerButtonEvent) {
        if self.router.pointer_focus.is_none() {
            return;
        }
        self.seat
            .notify_pointer_button(event.time, event.button, event.state);
        self.seat.notify_pointer_frame();
    }

    /// Remap the contact into focused-surface coordinates and park the cursor
    /// there, shared by all three touch handlers. Returns the focused surface,
    /// or `None` when there is nothing to deliver to.
    fn map_touch_to_cursor(&mut self, event: &TouchEvent) -> Option<SurfaceId> {
        let focus = self.router.pointer_focus?;
        let (width, height) = self.surfaces.size(focus)?;
        let (x, y) = mapper::map_touch(
            event.x,
            event.y,
            &self.router.output,
            &self.router.focus_transform,
            width,
            height,
        );
        self.router.cursor_x = x;
        self.router.cursor_y = y;
        Some(focus)
    }

    fn on_touch_down(&mut self, event: TouchEvent) {
        let Some(focus) = self.map_touch_to_cursor(&event) else {
            return;
        };
        let (x, y) = (self.router.cursor_x, self.router.cursor_y);

        if self.router.click_mode == ClickMode::Passthrough {
            let Some(slot) = touch_slot(event.id) else {
                debug!(id = event.id, "ignoring touch-down with out-of-range id");
                return;
            };
            self.seat.notify_touch_down(focus, event.time, event.id, x, y);
            self.router.touch_down[slot] = true;
        } else {
            self.seat.notify_pointer_motion(event.time, x, y);
            self.seat.notify_pointer_frame();

            let mode = self.router.click_mode;
            if let (Some(button), Some(held)) = (mode.emulated_button(), mode.held_slot()) {
                self.seat
                    .notify_pointer_button(event.time, button, ButtonState::Pressed);
                self.seat.notify_pointer_frame();
                self.router.button_held[held] = true;
            }
        }
    }

    /// A contact lifting releases every outstanding emulated button, not just
    /// the active mode's: all fingers up means nothing stays pressed, even if
    /// the mode changed mid-gesture.
    fn on_touch_up(&mut self, event: TouchUpEvent) {
        if self.router.pointer_focus.is_none() {
            return;
        }

        let mut released_any = false;
        for slot in 0..BUTTON_HELD_COUNT {
            if !self.router.button_held[slot] {
                continue;
            }
            if let Some(button) =
                ClickMode::from_held_slot(slot).and_then(ClickMode::emulated_button)
            {
                self.seat
                    .notify_pointer_button(event.time, button, ButtonState::Released);
                released_any = true;
            }
            self.router.button_held[slot] = false;
        }
        if released_any {
            self.seat.notify_pointer_frame();
        }

        if let Some(slot) = touch_slot(event.id) {
            if self.router.touch_down[slot] {
                self.seat.notify_touch_up(event.time, event.id);
                self.router.touch_down[slot] = false;
            }
        }
    }

    fn on_touch_motion(&mut self, event: TouchEvent) {
        if self.map_touch_to_cursor(&event).is_none() {
            return;
        }
        let (x, y) = (self.router.cursor_x, self.router.cursor_y);

        if self.router.click_mode == ClickMode::Passthrough {
            if touch_slot(event.id).is_some() {
                self.seat.notify_touch_motion(event.time, event.id, x, y);
            }
        } else {
            self.seat.notify_pointer_motion(event.time, x, y);
            self.seat.notify_pointer_frame();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seat::test_support::{RecordingSeat, SeatEvent};
    use crate::surface::SurfaceId;
    use crate::{BTN_LEFT, BTN_RIGHT};

    const KEYBOARD: DeviceId = DeviceId(1);
    const POINTER: DeviceId = DeviceId(2);
    const TOUCH: DeviceId = DeviceId(3);

    fn server_with_devices() -> Wlnest<RecordingSeat> {
        let mut server = Wlnest::new(RecordingSeat::default());
        for (id, kind, name) in [
            (KEYBOARD, DeviceKind::Keyboard, "kbd"),
            (POINTER, DeviceKind::Pointer, "mouse"),
            (TOUCH, DeviceKind::Touch, "touchscreen"),
        ] {
            server.process_input_event(InputEvent::DeviceAdded {
                device: InputDevice {
                    id,
                    kind,
                    name: name.into(),
                },
            });
        }
        server
    }

    /// 640x480 focused surface on a 640x480 output, identity transform, so
    /// touch coordinates map 1:1 to surface pixels.
    fn focused_server() -> (Wlnest<RecordingSeat>, SurfaceId) {
        let mut server = server_with_devices();
        server.set_output_geometry(crate::mapper::OutputGeometry {
            width: 640,
            height: 480,
            rotated: false,
        });
        let id = server.surfaces.create();
        server.surfaces.commit(id, 640, 480).unwrap();
        server.register_surface_for_lifecycle(id).unwrap();
        server.set_pointer_focus(Some(id)).unwrap();
        server.seat.take();
        (server, id)
    }

    fn motion(dx: f64, dy: f64, time: u32) -> InputEvent {
        InputEvent::PointerMotion {
            device: POINTER,
            event: PointerMotionEvent { time, dx, dy },
        }
    }

    fn touch_down(id: i32, x: f64, y: f64, time: u32) -> InputEvent {
        InputEvent::TouchDown {
            device: TOUCH,
            event: TouchEvent { time, id, x, y },
        }
    }

    fn touch_motion(id: i32, x: f64, y: f64, time: u32) -> InputEvent {
        InputEvent::TouchMotion {
            device: TOUCH,
            event: TouchEvent { time, id, x, y },
        }
    }

    fn touch_up(id: i32, time: u32) -> InputEvent {
        InputEvent::TouchUp {
            device: TOUCH,
            event: TouchUpEvent { time, id },
        }
    }

    #[test]
    fn cursor_stays_within_surface_minus_one() {
        let (mut server, _) = focused_server();
        for (dx, dy) in [
            (10_000.0, 10_000.0),
            (-25_000.0, -3.5),
            (3.25, -9_999.0),
            (100.0, 100.0),
            (-1.0, 500_000.0),
        ] {
            server.process_input_event(motion(dx, dy, 1));
            assert!((0.0..=639.0).contains(&server.router.cursor_x));
            assert!((0.0..=479.0).contains(&server.router.cursor_y));
        }
        // Saturated at the last addressable pixel, not the surface extent.
        server.process_input_event(motion(1e9, 1e9, 2));
        assert_eq!(server.router.cursor_x, 639.0);
        assert_eq!(server.router.cursor_y, 479.0);
    }

    #[test]
    fn motion_delivers_clamped_position_and_frame() {
        let (mut server, _) = focused_server();
        server.process_input_event(motion(5.0, -10.0, 42));
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::PointerMotion { time: 42, x: 325.0, y: 230.0 },
                SeatEvent::PointerFrame,
            ]
        );
    }

    #[test]
    fn motion_without_focus_is_dropped() {
        let mut server = server_with_devices();
        server.process_input_event(motion(5.0, 5.0, 1));
        assert!(server.seat.take().is_empty());
        assert_eq!(server.router.cursor_x, 0.0);
    }

    #[test]
    fn button_without_focus_is_dropped() {
        let mut server = server_with_devices();
        server.process_input_event(InputEvent::PointerButton {
            device: POINTER,
            event: PointerButtonEvent {
                time: 1,
                button: BTN_LEFT,
                state: ButtonState::Pressed,
            },
        });
        assert!(server.seat.take().is_empty());
    }

    #[test]
    fn button_forwards_unchanged_with_frame() {
        let (mut server, _) = focused_server();
        server.process_input_event(InputEvent::PointerButton {
            device: POINTER,
            event: PointerButtonEvent {
                time: 9,
                button: BTN_RIGHT,
                state: ButtonState::Pressed,
            },
        });
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::PointerButton {
                    time: 9,
                    button: BTN_RIGHT,
                    state: ButtonState::Pressed
                },
                SeatEvent::PointerFrame,
            ]
        );
    }

    #[test]
    fn keyboard_events_forward_to_seat() {
        let mut server = server_with_devices();
        server.process_input_event(InputEvent::KeyboardKey {
            device: KEYBOARD,
            event: KeyboardKeyEvent {
                time: 3,
                code: 30,
                state: crate::seat::KeyState::Pressed,
            },
        });
        server.process_input_event(InputEvent::KeyboardModifiers {
            device: KEYBOARD,
            event: KeyboardModifiersEvent {
                modifiers: crate::seat::Modifiers::SHIFT,
            },
        });
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::Key {
                    time: 3,
                    code: 30,
                    state: crate::seat::KeyState::Pressed
                },
                SeatEvent::Modifiers(crate::seat::Modifiers::SHIFT),
            ]
        );
    }

    #[test]
    fn events_from_unannounced_devices_are_dropped() {
        let (mut server, _) = focused_server();
        server.process_input_event(InputEvent::PointerMotion {
            device: DeviceId(99),
            event: PointerMotionEvent { time: 1, dx: 5.0, dy: 5.0 },
        });
        assert!(server.seat.take().is_empty());
    }

    #[test]
    fn removal_stops_delivery_for_that_device() {
        let (mut server, _) = focused_server();
        server.process_input_event(InputEvent::DeviceRemoved { device: POINTER });
        server.process_input_event(motion(5.0, 5.0, 1));
        assert!(server.seat.take().is_empty());
    }

    #[test]
    fn left_mode_tap_presses_and_releases_btn_left() {
        let (mut server, _) = focused_server();
        server.set_click_mode(ClickMode::Left);

        server.process_input_event(touch_down(0, 0.5, 0.5, 10));
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::PointerMotion { time: 10, x: 320.0, y: 240.0 },
                SeatEvent::PointerFrame,
                SeatEvent::PointerButton {
                    time: 10,
                    button: BTN_LEFT,
                    state: ButtonState::Pressed
                },
                SeatEvent::PointerFrame,
            ]
        );

        server.process_input_event(touch_up(0, 11));
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::PointerButton {
                    time: 11,
                    button: BTN_LEFT,
                    state: ButtonState::Released
                },
                SeatEvent::PointerFrame,
            ]
        );
    }

    #[test]
    fn hover_mode_moves_without_pressing() {
        let (mut server, _) = focused_server();
        server.set_click_mode(ClickMode::Hover);

        server.process_input_event(touch_down(0, 0.25, 0.25, 20));
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::PointerMotion { time: 20, x: 160.0, y: 120.0 },
                SeatEvent::PointerFrame,
            ]
        );

        // Nothing held, nothing native: up is silent.
        server.process_input_event(touch_up(0, 21));
        assert!(server.seat.take().is_empty());
    }

    #[test]
    fn emulated_motion_never_represses() {
        let (mut server, _) = focused_server();
        server.set_click_mode(ClickMode::Left);
        server.process_input_event(touch_down(0, 0.5, 0.5, 30));
        server.seat.take();

        server.process_input_event(touch_motion(0, 0.6, 0.6, 31));
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::PointerMotion { time: 31, x: 384.0, y: 288.0 },
                SeatEvent::PointerFrame,
            ]
        );
    }

    #[test]
    fn mode_switch_mid_gesture_releases_the_held_button() {
        let (mut server, _) = focused_server();
        server.set_click_mode(ClickMode::Left);
        server.process_input_event(touch_down(0, 0.5, 0.5, 40));
        server.seat.take();

        // The up handler reads the held table, not a per-contact mode.
        server.set_click_mode(ClickMode::Right);
        server.process_input_event(touch_up(0, 41));
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::PointerButton {
                    time: 41,
                    button: BTN_LEFT,
                    state: ButtonState::Released
                },
                SeatEvent::PointerFrame,
            ]
        );
    }

    #[test]
    fn touch_up_releases_every_held_button_with_one_frame() {
        let (mut server, _) = focused_server();
        server.set_click_mode(ClickMode::Left);
        server.process_input_event(touch_down(0, 0.5, 0.5, 50));
        server.set_click_mode(ClickMode::Right);
        server.process_input_event(touch_down(1, 0.6, 0.6, 51));
        server.seat.take();

        server.process_input_event(touch_up(0, 52));
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::PointerButton {
                    time: 52,
                    button: BTN_LEFT,
                    state: ButtonState::Released
                },
                SeatEvent::PointerButton {
                    time: 52,
                    button: BTN_RIGHT,
                    state: ButtonState::Released
                },
                SeatEvent::PointerFrame,
            ]
        );

        // Second contact lifting has nothing left to release.
        server.process_input_event(touch_up(1, 53));
        assert!(server.seat.take().is_empty());
    }

    #[test]
    fn passthrough_tracks_slots_across_down_motion_up() {
        let (mut server, id) = focused_server();
        server.set_click_mode(ClickMode::Passthrough);

        server.process_input_event(touch_down(2, 0.5, 0.5, 60));
        server.process_input_event(touch_motion(2, 0.75, 0.25, 61));
        server.process_input_event(touch_up(2, 62));
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::TouchDown {
                    surface: id,
                    time: 60,
                    id: 2,
                    x: 320.0,
                    y: 240.0
                },
                SeatEvent::TouchMotion { time: 61, id: 2, x: 480.0, y: 120.0 },
                SeatEvent::TouchUp { time: 62, id: 2 },
            ]
        );

        // The slot is clear, a second up must not synthesize a release.
        server.process_input_event(touch_up(2, 63));
        assert!(server.seat.take().is_empty());
    }

    #[test]
    fn touch_up_without_prior_down_is_silent() {
        let (mut server, _) = focused_server();
        server.set_click_mode(ClickMode::Passthrough);
        server.process_input_event(touch_up(4, 70));
        assert!(server.seat.take().is_empty());
    }

    #[test]
    fn out_of_range_ids_never_reach_the_slot_table() {
        let (mut server, _) = focused_server();
        server.set_click_mode(ClickMode::Passthrough);

        for id in [-1, TOUCH_SLOT_COUNT as i32, i32::MAX, i32::MIN] {
            server.process_input_event(touch_down(id, 0.5, 0.5, 80));
            server.process_input_event(touch_motion(id, 0.5, 0.5, 81));
            server.process_input_event(touch_up(id, 82));
            assert!(server.seat.take().is_empty(), "id {id}");
        }
        assert!(server.router.touch_down.iter().all(|down| !down));
    }

    #[test]
    fn emulation_is_unaffected_by_contact_id_range() {
        let (mut server, _) = focused_server();
        server.set_click_mode(ClickMode::Left);
        server.process_input_event(touch_down(-1, 0.5, 0.5, 90));
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::PointerMotion { time: 90, x: 320.0, y: 240.0 },
                SeatEvent::PointerFrame,
                SeatEvent::PointerButton {
                    time: 90,
                    button: BTN_LEFT,
                    state: ButtonState::Pressed
                },
                SeatEvent::PointerFrame,
            ]
        );
    }

    #[test]
    fn touch_without_focus_is_dropped() {
        let mut server = server_with_devices();
        server.set_click_mode(ClickMode::Passthrough);
        server.process_input_event(touch_down(0, 0.5, 0.5, 100));
        server.process_input_event(touch_motion(0, 0.5, 0.5, 101));
        server.process_input_event(touch_up(0, 102));
        assert!(server.seat.take().is_empty());
    }

    #[test]
    fn touch_down_parks_the_cursor_at_mapped_coordinates() {
        let (mut server, _) = focused_server();
        server.set_click_mode(ClickMode::Hover);
        server.process_input_event(touch_down(0, 1.0, 1.0, 110));
        // Touch clamps to the inclusive surface extent.
        assert_eq!(server.router.cursor_x, 640.0);
        assert_eq!(server.router.cursor_y, 480.0);
    }

    #[test]
    fn routing_after_destroy_is_a_silent_noop() {
        let (mut server, id) = focused_server();
        server.surface_destroyed(id);
        assert_eq!(server.router.pointer_focus, None);

        server.process_input_event(motion(5.0, 5.0, 120));
        server.process_input_event(touch_down(0, 0.5, 0.5, 121));
        server.process_input_event(touch_up(0, 122));
        assert!(server.seat.take().is_empty());
    }

    #[test]
    fn rotated_output_permutes_touch_coordinates() {
        let (mut server, _) = focused_server();
        server.set_output_geometry(crate::mapper::OutputGeometry {
            width: 640,
            height: 480,
            rotated: true,
        });
        server.set_click_mode(ClickMode::Hover);
        server.process_input_event(touch_down(0, 0.25, 0.5, 130));
        assert_eq!(
            server.seat.take(),
            vec![
                SeatEvent::PointerMotion { time: 130, x: 320.0, y: 360.0 },
                SeatEvent::PointerFrame,
            ]
        );
    }
}
