//! Retained SVG overlay. Each annotation owns one `<g>` group tagged with its
//! identity; the browser mirrors [`VectorLayer::inner_markup`] into the
//! overlay `<svg>` and asks [`VectorLayer::hit_test`] what sits under the
//! pointer.

use super::{arrow_head, estimate_text_size, Annotation, AnnotationId, ArrowEnd, Point, Shape};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Padding around the invisible hit rectangle behind text.
pub const TEXT_HIT_PADDING: f64 = 4.0;
pub const HANDLE_RADIUS: f64 = 6.0;
const RECT_FILL_OPACITY: f64 = 0.2;
/// Minimum grab distance around strokes.
const STROKE_TOLERANCE: f64 = 4.0;

#[derive(Clone, Debug, PartialEq)]
pub struct VectorNode {
    pub tag: &'static str,
    pub attrs: Vec<(&'static str, String)>,
    pub text: Option<String>,
    pub children: Vec<VectorNode>,
}

impl VectorNode {
    fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    fn attr(mut self, name: &'static str, value: impl ToString) -> Self {
        self.attrs.push((name, value.to_string()));
        self
    }

    fn child(mut self, node: VectorNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag);
        for (name, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", name, escape(value));
        }
        if self.children.is_empty() && self.text.is_none() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape(text));
        }
        for child in &self.children {
            child.write_markup(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }
}

/// What the pointer landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitPart {
    Body,
    Handle(ArrowEnd),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hit {
    pub id: AnnotationId,
    pub part: HitPart,
}

/// Hit geometry kept alongside each group so hit-testing never has to parse
/// the markup back.
#[derive(Clone, Debug)]
enum HitShape {
    Rect { x: f64, y: f64, w: f64, h: f64 },
    Bounds { x: f64, y: f64, w: f64, h: f64, tolerance: f64 },
    Arrow { from: Point, to: Point, tolerance: f64 },
}

#[derive(Clone, Debug)]
struct Group {
    node: VectorNode,
    hit: HitShape,
}

#[derive(Clone, Debug, Default)]
pub struct VectorLayer {
    groups: BTreeMap<AnnotationId, Group>,
    width: f64,
    height: f64,
}

impl VectorLayer {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            groups: BTreeMap::new(),
            width,
            height,
        }
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// Add or rebuild the group for `annotation`. Re-adding an identity
    /// replaces its group instead of duplicating it.
    pub fn add_annotation(&mut self, annotation: &Annotation) {
        self.groups.insert(annotation.id(), build_group(annotation));
    }

    pub fn update_annotation(&mut self, annotation: &Annotation) {
        self.add_annotation(annotation);
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) -> bool {
        self.groups.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Drop every group and rebuild from `annotations`.
    pub fn sync<'a>(&mut self, annotations: impl IntoIterator<Item = &'a Annotation>) {
        self.clear();
        for annotation in annotations {
            self.add_annotation(annotation);
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, id: AnnotationId) -> Option<&VectorNode> {
        self.groups.get(&id).map(|g| &g.node)
    }

    /// Concatenated group markup, for the overlay's `innerHTML`.
    pub fn inner_markup(&self) -> String {
        let mut out = String::new();
        for group in self.groups.values() {
            group.node.write_markup(&mut out);
        }
        out
    }

    /// Standalone `<svg>` document holding every group.
    pub fn to_markup(&self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">{}</svg>",
            self.inner_markup(),
            w = self.width,
            h = self.height,
        )
    }

    /// Topmost annotation under `(x, y)`. Arrow handles win over bodies.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<Hit> {
        let p = Point::new(x, y);
        for (&id, group) in self.groups.iter().rev() {
            if let HitShape::Arrow { from, to, .. } = &group.hit {
                for (end, at) in [(ArrowEnd::Start, from), (ArrowEnd::End, to)] {
                    if distance(p, *at) <= HANDLE_RADIUS {
                        return Some(Hit {
                            id,
                            part: HitPart::Handle(end),
                        });
                    }
                }
            }
        }
        self.groups
            .iter()
            .rev()
            .find(|(_, group)| group.hit.contains(p))
            .map(|(&id, _)| Hit {
                id,
                part: HitPart::Body,
            })
    }
}

impl HitShape {
    fn contains(&self, p: Point) -> bool {
        match *self {
            HitShape::Rect { x, y, w, h } => p.x >= x && p.x <= x + w && p.y >= y && p.y <= y + h,
            HitShape::Bounds {
                x,
                y,
                w,
                h,
                tolerance,
            } => {
                let (x0, x1) = (x.min(x + w), x.max(x + w));
                let (y0, y1) = (y.min(y + h), y.max(y + h));
                p.x >= x0 - tolerance
                    && p.x <= x1 + tolerance
                    && p.y >= y0 - tolerance
                    && p.y <= y1 + tolerance
            }
            HitShape::Arrow {
                from,
                to,
                tolerance,
            } => distance_to_segment(p, from, to) <= tolerance,
        }
    }
}

fn build_group(annotation: &Annotation) -> Group {
    let pos = annotation.position();
    let group = VectorNode::new("g")
        .attr("class", format!("annotation annotation-{}", annotation.kind().as_str()))
        .attr("data-annotation-id", annotation.id())
        .attr("style", "cursor: move");

    match annotation.shape() {
        Shape::Text { text, color, font } => {
            let (w, h) = estimate_text_size(text, font);
            let (x, y) = (pos.x - TEXT_HIT_PADDING, pos.y - TEXT_HIT_PADDING);
            let (w, h) = (w + 2.0 * TEXT_HIT_PADDING, h + 2.0 * TEXT_HIT_PADDING);
            let hit_rect = VectorNode::new("rect")
                .attr("class", "annotation-hit-area")
                .attr("x", x)
                .attr("y", y)
                .attr("width", w)
                .attr("height", h)
                .attr("fill", "transparent")
                .attr("pointer-events", "all");
            let mut label = VectorNode::new("text")
                .attr("x", pos.x)
                .attr("y", pos.y)
                .attr("fill", color)
                .attr("font-family", &font.family)
                .attr("font-size", font.size_px)
                .attr("dominant-baseline", "hanging");
            label.text = Some(text.clone());
            Group {
                node: group.child(hit_rect).child(label),
                hit: HitShape::Rect { x, y, w, h },
            }
        }
        Shape::Arrow { end, color, width } => {
            let [a, b] = arrow_head(pos, *end);
            let line = VectorNode::new("line")
                .attr("x1", pos.x)
                .attr("y1", pos.y)
                .attr("x2", end.x)
                .attr("y2", end.y)
                .attr("stroke", color)
                .attr("stroke-width", width)
                .attr("stroke-linecap", "round");
            let head = VectorNode::new("path")
                .attr(
                    "d",
                    format!("M {} {} L {} {} L {} {}", a.x, a.y, end.x, end.y, b.x, b.y),
                )
                .attr("fill", "none")
                .attr("stroke", color)
                .attr("stroke-width", width);
            let handle = |which: ArrowEnd, at: Point| {
                VectorNode::new("circle")
                    .attr("class", "annotation-handle")
                    .attr("data-end", which.as_str())
                    .attr("cx", at.x)
                    .attr("cy", at.y)
                    .attr("r", HANDLE_RADIUS)
                    .attr("fill", "transparent")
                    .attr("stroke", color)
                    .attr("pointer-events", "all")
            };
            Group {
                node: group
                    .child(line)
                    .child(head)
                    .child(handle(ArrowEnd::Start, pos))
                    .child(handle(ArrowEnd::End, *end)),
                hit: HitShape::Arrow {
                    from: pos,
                    to: *end,
                    tolerance: (width / 2.0).max(STROKE_TOLERANCE),
                },
            }
        }
        Shape::Rectangle {
            width,
            height,
            color,
            fill_color,
            line_width,
        } => {
            let mut rect = VectorNode::new("rect")
                .attr("x", pos.x)
                .attr("y", pos.y)
                .attr("width", width)
                .attr("height", height)
                .attr("stroke", color)
                .attr("stroke-width", line_width);
            rect = match fill_color {
                Some(fill) => rect
                    .attr("fill", fill)
                    .attr("fill-opacity", RECT_FILL_OPACITY),
                None => rect.attr("fill", "none").attr("pointer-events", "all"),
            };
            Group {
                node: group.child(rect),
                hit: HitShape::Bounds {
                    x: pos.x,
                    y: pos.y,
                    w: *width,
                    h: *height,
                    tolerance: (line_width / 2.0).max(STROKE_TOLERANCE),
                },
            }
        }
    }
}

fn distance(a: Point, b: Point) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return distance(p, a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    distance(p, Point::new(a.x + t * dx, a.y + t * dy))
}

pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_twice_keeps_one_group() {
        let mut layer = VectorLayer::new(400.0, 300.0);
        let a = Annotation::text(Point::new(10.0, 10.0), "a", "#000");
        layer.add_annotation(&a);
        layer.add_annotation(&a.moved_to(Point::new(50.0, 50.0)));
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.group(a.id()).unwrap().children[1].get_attr("x"), Some("50"));
        assert_eq!(layer.inner_markup().matches("data-annotation-id").count(), 1);
    }

    #[test]
    fn groups_carry_identity_and_kind() {
        let mut layer = VectorLayer::new(400.0, 300.0);
        let a = Annotation::rectangle(Point::new(1.0, 2.0), 30.0, 40.0, "#f00", Some("#0f0".into()));
        layer.add_annotation(&a);
        let group = layer.group(a.id()).unwrap();
        assert_eq!(group.get_attr("data-annotation-id"), Some(a.id().to_string().as_str()));
        assert_eq!(group.get_attr("class"), Some("annotation annotation-rectangle"));
        assert_eq!(group.children[0].get_attr("fill-opacity"), Some("0.2"));
    }

    #[test]
    fn text_gets_padded_hit_area() {
        let mut layer = VectorLayer::new(400.0, 300.0);
        let a = Annotation::text(Point::new(100.0, 100.0), "label", "#000");
        layer.add_annotation(&a);
        let hit_rect = &layer.group(a.id()).unwrap().children[0];
        assert_eq!(hit_rect.get_attr("x"), Some("96"));
        assert_eq!(hit_rect.get_attr("fill"), Some("transparent"));

        let hit = layer.hit_test(97.0, 98.0).unwrap();
        assert_eq!(hit, Hit { id: a.id(), part: HitPart::Body });
        assert!(layer.hit_test(90.0, 90.0).is_none());
    }

    #[test]
    fn arrow_handles_are_tagged_and_hit_first() {
        let mut layer = VectorLayer::new(400.0, 300.0);
        let a = Annotation::arrow(Point::new(10.0, 10.0), Point::new(110.0, 10.0), "#00f", 2.0);
        layer.add_annotation(&a);
        let group = layer.group(a.id()).unwrap();
        let ends: Vec<_> = group
            .children
            .iter()
            .filter_map(|c| c.get_attr("data-end"))
            .collect();
        assert_eq!(ends, vec!["start", "end"]);

        assert_eq!(layer.hit_test(108.0, 11.0).unwrap().part, HitPart::Handle(ArrowEnd::End));
        assert_eq!(layer.hit_test(11.0, 9.0).unwrap().part, HitPart::Handle(ArrowEnd::Start));
        assert_eq!(layer.hit_test(60.0, 12.0).unwrap().part, HitPart::Body);
        assert!(layer.hit_test(60.0, 30.0).is_none());
    }

    #[test]
    fn later_annotations_are_on_top() {
        let mut layer = VectorLayer::new(400.0, 300.0);
        let below = Annotation::rectangle(Point::new(0.0, 0.0), 100.0, 100.0, "#000", None);
        let above = Annotation::rectangle(Point::new(50.0, 50.0), 100.0, 100.0, "#000", None);
        layer.add_annotation(&below);
        layer.add_annotation(&above);
        assert_eq!(layer.hit_test(75.0, 75.0).unwrap().id, above.id());
        assert_eq!(layer.hit_test(10.0, 10.0).unwrap().id, below.id());
    }

    #[test]
    fn remove_clear_and_sync() {
        let mut layer = VectorLayer::new(400.0, 300.0);
        let a = Annotation::text(Point::default(), "a", "#000");
        let b = Annotation::text(Point::default(), "b", "#000");
        layer.add_annotation(&a);
        assert!(layer.remove_annotation(a.id()));
        assert!(!layer.remove_annotation(a.id()));

        layer.sync([&a, &b]);
        assert_eq!(layer.len(), 2);
        layer.clear();
        assert!(layer.is_empty());
        assert_eq!(layer.inner_markup(), "");
    }

    #[test]
    fn markup_escapes_text() {
        let mut layer = VectorLayer::new(10.0, 10.0);
        layer.add_annotation(&Annotation::text(Point::default(), "a<b & \"c\"", "#000"));
        let markup = layer.to_markup();
        assert!(markup.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"10\""));
        assert!(markup.contains("a&lt;b &amp; &quot;c&quot;</text>"));
    }
}
