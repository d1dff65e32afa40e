//! Touch coordinate mapping.
//!
//! Raw touch coordinates arrive normalized to `[0, 1]` over the physical
//! device. Delivery needs them in focused-surface-local pixels, which takes
//! the output geometry, the display rotation, and the focused window's
//! offset/scale into account.

/// Output dimensions and rotation, as configured by the compositor side.
#[derive(Debug, Clone, Copy)]
pub struct OutputGeometry {
    pub width: u32,
    pub height: u32,
    pub rotated: bool,
}

impl Default for OutputGeometry {
    fn default() -> Self {
        OutputGeometry {
            width: 1280,
            height: 720,
            rotated: false,
        }
    }
}

/// Placement of the focused window within the output, as maintained by the
/// compositor side whenever focus or window geometry changes.
#[derive(Debug, Clone, Copy)]
pub struct FocusedWindowTransform {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for FocusedWindowTransform {
    fn default() -> Self {
        FocusedWindowTransform {
            offset_x: 0.0,
            offset_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

/// Map a normalized touch coordinate to surface-local pixels and clamp to the
/// surface extents.
///
/// Rotation swaps the axes and mirrors the new vertical one, so a rotated
/// `(u, v)` maps exactly like an unrotated `(v, 1 - u)`. The clamp here is to
/// `[0, width]`/`[0, height]` inclusive, intentionally one wider than the
/// relative-motion clamp in the pointer router.
pub fn map_touch(
    u: f64,
    v: f64,
    output: &OutputGeometry,
    transform: &FocusedWindowTransform,
    surface_width: i32,
    surface_height: i32,
) -> (f64, f64) {
    let (mut x, mut y) = if output.rotated {
        (v * output.width as f64, (1.0 - u) * output.height as f64)
    } else {
        (u * output.width as f64, v * output.height as f64)
    };

    x += transform.offset_x;
    y += transform.offset_y;

    x *= transform.scale_x;
    y *= transform.scale_y;

    x = x.clamp(0.0, surface_width.max(0) as f64);
    y = y.clamp(0.0, surface_height.max(0) as f64);

    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> FocusedWindowTransform {
        FocusedWindowTransform::default()
    }

    #[test]
    fn unrotated_maps_to_output_pixels() {
        let output = OutputGeometry {
            width: 800,
            height: 600,
            rotated: false,
        };
        let (x, y) = map_touch(0.5, 0.25, &output, &identity(), 800, 600);
        assert_eq!((x, y), (400.0, 150.0));
    }

    #[test]
    fn rotation_is_a_coordinate_permutation() {
        let rotated = OutputGeometry {
            width: 800,
            height: 600,
            rotated: true,
        };
        let unrotated = OutputGeometry {
            rotated: false,
            ..rotated
        };
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (0.3, 0.7), (0.5, 0.5), (0.9, 0.1)] {
            let a = map_touch(u, v, &rotated, &identity(), 800, 600);
            let b = map_touch(v, 1.0 - u, &unrotated, &identity(), 800, 600);
            assert_eq!(a, b, "rotated ({u}, {v})");
        }
    }

    #[test]
    fn offset_applies_before_scale() {
        let output = OutputGeometry {
            width: 100,
            height: 100,
            rotated: false,
        };
        let transform = FocusedWindowTransform {
            offset_x: 10.0,
            offset_y: 20.0,
            scale_x: 2.0,
            scale_y: 0.5,
        };
        // (0.5, 0.5) -> (50, 50) -> (60, 70) -> (120, 35)
        let (x, y) = map_touch(0.5, 0.5, &output, &transform, 1000, 1000);
        assert_eq!((x, y), (120.0, 35.0));
    }

    #[test]
    fn clamp_upper_bound_is_inclusive() {
        // Unlike relative pointer motion, touch mapping clamps to the full
        // width/height, not width-1/height-1.
        let output = OutputGeometry {
            width: 1000,
            height: 1000,
            rotated: false,
        };
        let (x, y) = map_touch(1.0, 1.0, &output, &identity(), 640, 480);
        assert_eq!((x, y), (640.0, 480.0));
    }

    #[test]
    fn clamp_floors_at_zero() {
        let output = OutputGeometry {
            width: 100,
            height: 100,
            rotated: false,
        };
        let transform = FocusedWindowTransform {
            offset_x: -500.0,
            offset_y: -500.0,
            scale_x: 1.0,
            scale_y: 1.0,
        };
        let (x, y) = map_touch(0.0, 0.0, &output, &transform, 640, 480);
        assert_eq!((x, y), (0.0, 0.0));
    }

    #[test]
    fn uncommitted_surface_clamps_to_origin() {
        let output = OutputGeometry::default();
        let (x, y) = map_touch(0.8, 0.8, &output, &identity(), 0, 0);
        assert_eq!((x, y), (0.0, 0.0));
    }
}
