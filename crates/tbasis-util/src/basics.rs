//! Integer helpers and small extent types used by the planner and the
//! layout code on both sides of the host/device boundary.

/// Scalar type of every basis matrix and field value.
pub type Scalar = f64;

/// `base^exp` for small non-negative exponents (tensor sizes like `P^dim`).
pub const fn int_pow(base: usize, exp: usize) -> usize {
    let mut acc = 1;
    let mut i = 0;
    while i < exp {
        acc *= base;
        i += 1;
    }
    acc
}

/// Ceiling division; `div_ceil(0, d) == 0`.
pub const fn div_ceil(n: usize, d: usize) -> usize {
    if n == 0 {
        0
    } else {
        (n + d - 1) / d
    }
}

/// Thread-block or grid extents in the CUDA `(x, y, z)` order.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Extents3D {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Extents3D {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Total number of threads (or blocks) covered by these extents.
    pub const fn volume(self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }

    pub const fn as_tuple(self) -> (u32, u32, u32) {
        (self.x, self.y, self.z)
    }
}

impl core::fmt::Display for Extents3D {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
