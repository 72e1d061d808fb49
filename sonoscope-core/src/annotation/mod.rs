//! Annotation values and the components that store, draw and drag them.

pub mod drag;
pub mod store;
pub mod vector;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity, assigned once when an annotation is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(u64);

impl AnnotationId {
    pub fn next() -> Self {
        AnnotationId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ann-{}", self.0)
    }
}

impl FromStr for AnnotationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches("ann-").parse().map(AnnotationId)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Font {
    pub family: String,
    pub size_px: f64,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            family: "sans-serif".into(),
            size_px: 14.0,
        }
    }
}

impl Font {
    /// CSS shorthand, e.g. `14px sans-serif`.
    pub fn css(&self) -> String {
        format!("{}px {}", self.size_px, self.family)
    }
}

/// Which end of an arrow a handle controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrowEnd {
    Start,
    End,
}

impl ArrowEnd {
    pub fn as_str(self) -> &'static str {
        match self {
            ArrowEnd::Start => "start",
            ArrowEnd::End => "end",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Text {
        text: String,
        color: String,
        font: Font,
    },
    Arrow {
        end: Point,
        color: String,
        width: f64,
    },
    Rectangle {
        width: f64,
        height: f64,
        color: String,
        fill_color: Option<String>,
        line_width: f64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationKind {
    Text,
    Arrow,
    Rectangle,
}

impl AnnotationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationKind::Text => "text",
            AnnotationKind::Arrow => "arrow",
            AnnotationKind::Rectangle => "rectangle",
        }
    }
}

/// One annotation. `position` is the text origin (top-left), the arrow tail,
/// or the rectangle's top-left corner.
///
/// Values are never edited in place: the `with_*`/`moved_to` helpers derive a
/// new value that keeps the same `id`.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    id: AnnotationId,
    position: Point,
    shape: Shape,
}

impl Annotation {
    pub fn new(position: Point, shape: Shape) -> Self {
        Self {
            id: AnnotationId::next(),
            position,
            shape,
        }
    }

    pub fn text(position: Point, text: impl Into<String>, color: impl Into<String>) -> Self {
        Self::new(
            position,
            Shape::Text {
                text: text.into(),
                color: color.into(),
                font: Font::default(),
            },
        )
    }

    pub fn arrow(from: Point, to: Point, color: impl Into<String>, width: f64) -> Self {
        Self::new(
            from,
            Shape::Arrow {
                end: to,
                color: color.into(),
                width,
            },
        )
    }

    pub fn rectangle(
        position: Point,
        width: f64,
        height: f64,
        color: impl Into<String>,
        fill_color: Option<String>,
    ) -> Self {
        Self::new(
            position,
            Shape::Rectangle {
                width,
                height,
                color: color.into(),
                fill_color,
                line_width: 2.0,
            },
        )
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn kind(&self) -> AnnotationKind {
        match self.shape {
            Shape::Text { .. } => AnnotationKind::Text,
            Shape::Arrow { .. } => AnnotationKind::Arrow,
            Shape::Rectangle { .. } => AnnotationKind::Rectangle,
        }
    }

    /// Same identity, new shape.
    pub fn with_shape(&self, shape: Shape) -> Self {
        Self {
            id: self.id,
            position: self.position,
            shape,
        }
    }

    /// Translate the whole annotation so its anchor lands on `anchor`.
    /// Arrows keep their length and direction.
    pub fn moved_to(&self, anchor: Point) -> Self {
        let (dx, dy) = (anchor.x - self.position.x, anchor.y - self.position.y);
        let shape = match &self.shape {
            Shape::Arrow { end, color, width } => Shape::Arrow {
                end: end.offset(dx, dy),
                color: color.clone(),
                width: *width,
            },
            other => other.clone(),
        };
        Self {
            id: self.id,
            position: anchor,
            shape,
        }
    }

    /// Move one end of an arrow. Other kinds are returned unchanged.
    pub fn with_arrow_end(&self, which: ArrowEnd, point: Point) -> Self {
        match (&self.shape, which) {
            (Shape::Arrow { .. }, ArrowEnd::Start) => Self {
                id: self.id,
                position: point,
                shape: self.shape.clone(),
            },
            (Shape::Arrow { color, width, .. }, ArrowEnd::End) => self.with_shape(Shape::Arrow {
                end: point,
                color: color.clone(),
                width: *width,
            }),
            _ => self.clone(),
        }
    }

    /// Point a given arrow end currently sits at.
    pub fn arrow_point(&self, which: ArrowEnd) -> Option<Point> {
        match (&self.shape, which) {
            (Shape::Arrow { .. }, ArrowEnd::Start) => Some(self.position),
            (Shape::Arrow { end, .. }, ArrowEnd::End) => Some(*end),
            _ => None,
        }
    }
}

/// Arrowhead half-angle.
pub const ARROW_HEAD_ANGLE: f64 = std::f64::consts::PI / 6.0;
pub const ARROW_HEAD_LENGTH: f64 = 10.0;

/// The two barb tips of an arrowhead pointing from `from` to `to`.
pub fn arrow_head(from: Point, to: Point) -> [Point; 2] {
    let angle = (to.y - from.y).atan2(to.x - from.x);
    let barb = |a: f64| {
        Point::new(
            to.x - ARROW_HEAD_LENGTH * a.cos(),
            to.y - ARROW_HEAD_LENGTH * a.sin(),
        )
    };
    [barb(angle - ARROW_HEAD_ANGLE), barb(angle + ARROW_HEAD_ANGLE)]
}

/// Rough text extent used where no font metrics exist.
pub fn estimate_text_size(text: &str, font: &Font) -> (f64, f64) {
    let chars = text.chars().count() as f64;
    (chars * font.size_px * 0.6, font.size_px * 1.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_round_trip_through_strings() {
        let a = AnnotationId::next();
        let b = AnnotationId::next();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<AnnotationId>().unwrap(), a);
        assert!("ann-x".parse::<AnnotationId>().is_err());
    }

    #[test]
    fn moving_keeps_identity() {
        let a = Annotation::text(Point::new(10.0, 20.0), "peak", "#ff0000");
        let moved = a.moved_to(Point::new(15.0, 5.0));
        assert_eq!(moved.id(), a.id());
        assert_eq!(moved.position(), Point::new(15.0, 5.0));
        assert_eq!(moved.shape(), a.shape());
    }

    #[test]
    fn reshaping_derives_a_new_value() {
        let a = Annotation::rectangle(Point::new(1.0, 2.0), 10.0, 5.0, "#00f", None);
        let wider = Shape::Rectangle {
            width: 20.0,
            height: 5.0,
            color: "#00f".into(),
            fill_color: None,
            line_width: 2.0,
        };
        let b = a.with_shape(wider.clone());
        assert_eq!(b.id(), a.id());
        assert_eq!(b.position(), a.position());
        assert_eq!(b.shape(), &wider);
        // The original is untouched.
        assert!(matches!(a.shape(), Shape::Rectangle { width, .. } if *width == 10.0));
    }

    #[test]
    fn moving_an_arrow_translates_both_ends() {
        let a = Annotation::arrow(Point::new(0.0, 0.0), Point::new(30.0, 40.0), "#000", 2.0);
        let moved = a.moved_to(Point::new(5.0, -5.0));
        assert_eq!(moved.arrow_point(ArrowEnd::Start), Some(Point::new(5.0, -5.0)));
        assert_eq!(moved.arrow_point(ArrowEnd::End), Some(Point::new(35.0, 35.0)));
    }

    #[test]
    fn arrow_end_edit_moves_one_end() {
        let a = Annotation::arrow(Point::new(0.0, 0.0), Point::new(30.0, 40.0), "#000", 2.0);
        let b = a.with_arrow_end(ArrowEnd::End, Point::new(1.0, 2.0));
        assert_eq!(b.position(), a.position());
        assert_eq!(b.arrow_point(ArrowEnd::End), Some(Point::new(1.0, 2.0)));
        let c = a.with_arrow_end(ArrowEnd::Start, Point::new(9.0, 9.0));
        assert_eq!(c.arrow_point(ArrowEnd::End), Some(Point::new(30.0, 40.0)));

        let text = Annotation::text(Point::new(0.0, 0.0), "t", "#000");
        assert_eq!(text.with_arrow_end(ArrowEnd::End, Point::new(1.0, 1.0)), text);
    }

    #[test]
    fn arrow_head_is_symmetric_and_ten_px() {
        let [a, b] = arrow_head(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        for p in [a, b] {
            let len = ((p.x - 100.0).powi(2) + p.y.powi(2)).sqrt();
            assert!((len - ARROW_HEAD_LENGTH).abs() < 1e-9);
        }
        assert!((a.y + b.y).abs() < 1e-9);
        assert!((a.x - (100.0 - 10.0 * (ARROW_HEAD_ANGLE).cos())).abs() < 1e-9);
    }
}
