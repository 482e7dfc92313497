//! Wireframe display collaborator used by agent debug rendering.

use nucleosim_geom::Vec3;

/// Sink for wireframe debug primitives.
pub trait DisplayUnit {
    /// Draw one line primitive under the given composite debug id and style.
    fn draw_line(&mut self, id: u32, style: u8, from: Vec3, to: Vec3);
}

/// One recorded line primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub id: u32,
    pub style: u8,
    pub from: Vec3,
    pub to: Vec3,
}

/// In-memory display that records every primitive, for tests and capture.
#[derive(Debug, Default)]
pub struct VectorDisplay {
    pub lines: Vec<LineSegment>,
}

impl VectorDisplay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplayUnit for VectorDisplay {
    fn draw_line(&mut self, id: u32, style: u8, from: Vec3, to: Vec3) {
        self.lines.push(LineSegment {
            id,
            style,
            from,
            to,
        });
    }
}

/// Display that discards everything.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl DisplayUnit for NullDisplay {
    fn draw_line(&mut self, _id: u32, _style: u8, _from: Vec3, _to: Vec3) {}
}

/// Draw the 12 edges of the axis-aligned box spanned by `a` and `b`.
///
/// Each edge takes a successive id starting at `id`, and the number of
/// primitives drawn is returned so callers can compose composite debug ids
/// for whatever they draw next.
pub fn draw_box(display: &mut dyn DisplayUnit, id: u32, style: u8, a: Vec3, b: Vec3) -> u32 {
    let xs = [a.x, b.x];
    let ys = [a.y, b.y];
    let zs = [a.z, b.z];
    let mut drawn = 0u32;

    // Four edges along each axis, one per combination of the other two.
    for &y in &ys {
        for &z in &zs {
            display.draw_line(id + drawn, style, Vec3::new(xs[0], y, z), Vec3::new(xs[1], y, z));
            drawn += 1;
        }
    }
    for &x in &xs {
        for &z in &zs {
            display.draw_line(id + drawn, style, Vec3::new(x, ys[0], z), Vec3::new(x, ys[1], z));
            drawn += 1;
        }
    }
    for &x in &xs {
        for &y in &ys {
            display.draw_line(id + drawn, style, Vec3::new(x, y, zs[0]), Vec3::new(x, y, zs[1]));
            drawn += 1;
        }
    }
    drawn
}
