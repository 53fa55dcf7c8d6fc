//! Voxel coordinates, offsets and boxes

/// Integer voxel coordinates within a volume.
///
/// The linear index of a position is `z * width * height + y * width + x`;
/// [`crate::volume::VolumeDims`] owns the bidirectional conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Translate by an offset. May leave the volume; callers clip afterwards.
    pub fn offset(&self, o: Offset3) -> Position {
        Position::new(self.x + o.dx, self.y + o.dy, self.z + o.dz)
    }

    /// Squared Euclidean distance to another position
    pub fn dist2(&self, other: &Position) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dy * dy + dz * dz
    }
}

/// Relative offset between voxels, as enumerated by structuring elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Offset3 {
    pub dx: i32,
    pub dy: i32,
    pub dz: i32,
}

impl Offset3 {
    pub const fn new(dx: i32, dy: i32, dz: i32) -> Self {
        Self { dx, dy, dz }
    }

    /// Squared length of the offset
    pub fn norm2(&self) -> i64 {
        let dx = self.dx as i64;
        let dy = self.dy as i64;
        let dz = self.dz as i64;
        dx * dx + dy * dy + dz * dz
    }
}

/// Axis-aligned box given by two inclusive corner positions.
///
/// Used only for overlap tests while fusing cluster centers; corners are not
/// clipped to the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: Position,
    pub max: Position,
}

impl BoundingBox {
    /// Cube of the given half-width centered on a position
    pub fn around(center: Position, half: i32) -> Self {
        Self {
            min: Position::new(center.x - half, center.y - half, center.z - half),
            max: Position::new(center.x + half, center.y + half, center.z + half),
        }
    }

    /// Whether two boxes share at least one voxel
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }
}
