// ============================================================================
// TILE GRID: pixel coordinate → grid cell mapping
// ============================================================================

/// A pixel position in image coordinates.  May lie outside the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Width × height of one grid cell in pixels.  Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileSize {
    width: u32,
    height: u32,
}

impl Default for TileSize {
    fn default() -> Self {
        Self { width: 16, height: 16 }
    }
}

impl TileSize {
    /// Zero dimensions are clamped to 1 so the grid is always well defined.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.clamp(1, i32::MAX as u32),
            height: height.clamp(1, i32::MAX as u32),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Parse `"16x16"` / `"8X12"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.trim().split_once(['x', 'X'])?;
        let w = w.trim().parse::<u32>().ok()?;
        let h = h.trim().parse::<u32>().ok()?;
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self::new(w, h))
    }
}

impl std::fmt::Display for TileSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned integer rectangle.  `x`/`y` is the top-left pixel, the right
/// and bottom edges are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanning `min` (inclusive) to `max` (exclusive).
    pub fn from_min_max(min: Point, max: Point) -> Self {
        Self {
            x: min.x,
            y: min.y,
            width: extent(min.x, max.x),
            height: extent(min.y, max.y),
        }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    /// Exclusive right edge, saturating at `i32::MAX`.
    pub fn right(&self) -> i32 {
        saturate(self.x as i64 + self.width as i64)
    }

    /// Exclusive bottom edge, saturating at `i32::MAX`.
    pub fn bottom(&self) -> i32 {
        saturate(self.y as i64 + self.height as i64)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.left() && p.x < self.right() && p.y >= self.top() && p.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &TileRect) -> bool {
        other.left() >= self.left()
            && other.top() >= self.top()
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &TileRect) -> TileRect {
        let min = Point::new(self.left().min(other.left()), self.top().min(other.top()));
        let max = Point::new(
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        );
        TileRect::from_min_max(min, max)
    }

    /// Overlap of two rectangles, `None` when they don't touch.
    pub fn intersect(&self, other: &TileRect) -> Option<TileRect> {
        let min = Point::new(self.left().max(other.left()), self.top().max(other.top()));
        let max = Point::new(
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        );
        let r = TileRect::from_min_max(min, max);
        (!r.is_empty()).then_some(r)
    }

    /// Every edge lies on a multiple of the tile size.
    pub fn is_aligned(&self, tile: TileSize) -> bool {
        let (tw, th) = (tile.width() as i32, tile.height() as i32);
        self.left().rem_euclid(tw) == 0
            && self.top().rem_euclid(th) == 0
            && self.right().rem_euclid(tw) == 0
            && self.bottom().rem_euclid(th) == 0
    }

    /// The rectangle shrunk by one pixel on every edge.  Only used for the
    /// overlay outline; selection geometry never goes through this.
    pub fn outline(&self) -> TileRect {
        TileRect {
            x: self.x.saturating_add(1),
            y: self.y.saturating_add(1),
            width: self.width.saturating_sub(2),
            height: self.height.saturating_sub(2),
        }
    }
}

/// The grid cell containing `point`.
///
/// Uses Euclidean division so points left of / above the origin land in the
/// negative cells instead of collapsing onto cell zero.  Near `i32::MIN` the
/// cell origin may not be representable; it then saturates to `i32::MIN`,
/// which still contains `point`.
pub fn cell_at(point: Point, tile: TileSize) -> TileRect {
    TileRect {
        x: cell_origin(point.x, tile.width()),
        y: cell_origin(point.y, tile.height()),
        width: tile.width(),
        height: tile.height(),
    }
}

fn cell_origin(coord: i32, size: u32) -> i32 {
    let size = size as i64;
    saturate((coord as i64).div_euclid(size) * size)
}

fn saturate(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn extent(min: i32, max: i32) -> u32 {
    (max as i64 - min as i64).clamp(0, u32::MAX as i64) as u32
}

/// Covering rectangle of two cells (drag span).
pub fn span(a: &TileRect, b: &TileRect) -> TileRect {
    a.union(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_at_snaps_to_multiples() {
        let tile = TileSize::new(8, 6);
        for &(x, y) in &[(0, 0), (5, 5), (7, 11), (8, 12), (31, 17), (-1, -1), (-9, -13)] {
            let cell = cell_at(Point::new(x, y), tile);
            assert_eq!(cell.x.rem_euclid(8), 0, "x origin for ({x},{y})");
            assert_eq!(cell.y.rem_euclid(6), 0, "y origin for ({x},{y})");
            assert_eq!((cell.width, cell.height), (8, 6));
            assert!(cell.contains_point(Point::new(x, y)));
        }
    }

    #[test]
    fn negative_points_floor_downwards() {
        let cell = cell_at(Point::new(-1, -8), TileSize::new(8, 8));
        assert_eq!(cell, TileRect::new(-8, -8, 8, 8));
    }

    #[test]
    fn union_of_aligned_cells_stays_aligned() {
        let tile = TileSize::new(8, 8);
        let a = cell_at(Point::new(5, 5), tile);
        let b = cell_at(Point::new(20, 20), tile);
        let u = span(&a, &b);
        assert_eq!(u, TileRect::new(0, 0, 24, 24));
        assert!(u.is_aligned(tile));
        assert!(u.contains_rect(&a));
        assert!(u.contains_rect(&b));
        // Order doesn't matter
        assert_eq!(b.union(&a), u);
    }

    #[test]
    fn union_with_self_is_identity() {
        let a = TileRect::new(16, 32, 16, 16);
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn intersect_clips_and_rejects_disjoint() {
        let a = TileRect::new(0, 0, 10, 10);
        assert_eq!(a.intersect(&TileRect::new(5, 5, 10, 10)), Some(TileRect::new(5, 5, 5, 5)));
        assert_eq!(a.intersect(&TileRect::new(10, 0, 4, 4)), None);
    }

    #[test]
    fn outline_deflates_every_edge() {
        assert_eq!(TileRect::new(8, 8, 16, 8).outline(), TileRect::new(9, 9, 14, 6));
        assert!(TileRect::new(0, 0, 1, 1).outline().is_empty());
    }

    #[test]
    fn extreme_points_do_not_overflow() {
        let odd = TileSize::new(3, 3);
        let low = cell_at(Point::new(i32::MIN, i32::MIN), odd);
        assert_eq!((low.x, low.y), (i32::MIN, i32::MIN));
        assert!(low.contains_point(Point::new(i32::MIN, i32::MIN)));

        let tile = TileSize::new(16, 16);
        let high = cell_at(Point::new(i32::MAX - 1, i32::MAX), tile);
        assert_eq!(high.right(), i32::MAX);
        assert!(high.contains_point(Point::new(i32::MAX - 1, i32::MAX - 1)));

        let origin = cell_at(Point::new(0, 0), tile);
        let wide = span(&high, &origin);
        assert_eq!((wide.x, wide.y), (0, 0));
        assert_eq!(wide.right(), i32::MAX);
        assert!(wide.contains_rect(&origin));
        assert!(!wide.is_aligned(tile));

        let everything = span(&low, &high);
        assert_eq!(everything.left(), i32::MIN);
        assert_eq!(everything.width, u32::MAX);
        assert!(everything.intersect(&origin).is_some());
        assert_eq!(TileRect::new(i32::MAX, 0, 4, 4).outline().x, i32::MAX);
    }

    #[test]
    fn tile_size_parse_and_clamp() {
        assert_eq!(TileSize::parse("16x8"), Some(TileSize::new(16, 8)));
        assert_eq!(TileSize::parse(" 4 X 4 "), Some(TileSize::new(4, 4)));
        assert_eq!(TileSize::parse("0x4"), None);
        assert_eq!(TileSize::parse("16"), None);
        assert_eq!(TileSize::new(0, 0), TileSize::new(1, 1));
        assert_eq!(TileSize::new(24, 12).to_string(), "24x12");
    }
}
