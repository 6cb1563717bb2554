//! Axis-aligned container the fluid lives in.
//!
//! The box is centered on the origin. Enforcement is a plain per-axis clamp:
//! velocity is left untouched, so a particle pushed into a wall stays pinned
//! there until its velocity turns around.

use crate::error::KernelError;

/// Origin-centered box with full extent `size` on each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Container {
    size: [f32; 3],
    half_extent: [f32; 3],
}

impl Container {
    /// Create a container, rejecting non-positive or non-finite extents.
    pub fn new(size: [f32; 3]) -> Result<Self, KernelError> {
        for (axis, &value) in ['x', 'y', 'z'].iter().zip(size.iter()) {
            if !(value.is_finite() && value > 0.0) {
                return Err(KernelError::InvalidContainer { axis: *axis, value });
            }
        }
        Ok(Self {
            size,
            half_extent: [0.5 * size[0], 0.5 * size[1], 0.5 * size[2]],
        })
    }

    /// Full extent per axis.
    pub fn size(&self) -> [f32; 3] {
        self.size
    }

    /// Half extent per axis.
    pub fn half_extent(&self) -> [f32; 3] {
        self.half_extent
    }

    /// Minimum corner.
    pub fn min(&self) -> [f32; 3] {
        [-self.half_extent[0], -self.half_extent[1], -self.half_extent[2]]
    }

    /// Maximum corner.
    pub fn max(&self) -> [f32; 3] {
        self.half_extent
    }

    /// `true` if `p` lies inside the closed box.
    pub fn contains(&self, p: [f32; 3]) -> bool {
        (0..3).all(|axis| p[axis].abs() <= self.half_extent[axis])
    }

    /// Clamp each coordinate of `p` independently into the box.
    ///
    /// Infinite coordinates land on the matching wall. A NaN coordinate has
    /// no nearest wall and goes to the center plane of its axis.
    #[inline]
    pub fn clamp(&self, p: [f32; 3]) -> [f32; 3] {
        [0, 1, 2].map(|axis| clamp_axis(p[axis], self.half_extent[axis]))
    }

    /// Clamp a freshly integrated position `next` into the box.
    ///
    /// An axis where `next` is NaN falls back to the (clamped) coordinate of
    /// `previous`, so a particle whose state blew up stays where it was.
    #[inline]
    pub fn clamp_step(&self, previous: [f32; 3], next: [f32; 3]) -> [f32; 3] {
        let fallback = self.clamp(previous);
        let clamped = self.clamp(next);
        [0, 1, 2].map(|axis| if next[axis].is_nan() { fallback[axis] } else { clamped[axis] })
    }
}

#[inline]
fn clamp_axis(v: f32, h: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(-h, h)
    }
}
