//! Pointer-driven repositioning of annotations.
//!
//! One drag at a time: the pointer that started it is captured and every other
//! pointer is ignored until it is released or cancelled. Positions are in the
//! overlay's coordinate space.

use super::store::AnnotationStore;
use super::vector::{HitPart, VectorLayer};
use super::{AnnotationId, Point};

#[derive(Clone, Copy, Debug, PartialEq)]
struct ActiveDrag {
    pointer_id: i32,
    id: AnnotationId,
    part: HitPart,
    /// Pointer position minus the grabbed anchor at pointer-down.
    grab_offset: (f64, f64),
}

#[derive(Debug, Default)]
pub struct DragController {
    active: Option<ActiveDrag>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn captured_pointer(&self) -> Option<i32> {
        self.active.map(|d| d.pointer_id)
    }

    pub fn dragged(&self) -> Option<(AnnotationId, HitPart)> {
        self.active.map(|d| (d.id, d.part))
    }

    /// Start a drag if the pointer lands on an annotation. Returns true when
    /// the pointer should be captured.
    pub fn pointer_down(
        &mut self,
        pointer_id: i32,
        x: f64,
        y: f64,
        layer: &VectorLayer,
        store: &AnnotationStore,
    ) -> bool {
        if self.active.is_some() {
            return false;
        }
        let Some(hit) = layer.hit_test(x, y) else {
            return false;
        };
        let Some(annotation) = store.get(hit.id) else {
            log::warn!("hit on {} which is not in the store", hit.id);
            return false;
        };
        let anchor = match hit.part {
            HitPart::Body => annotation.position(),
            HitPart::Handle(end) => match annotation.arrow_point(end) {
                Some(p) => p,
                None => return false,
            },
        };
        self.active = Some(ActiveDrag {
            pointer_id,
            id: hit.id,
            part: hit.part,
            grab_offset: (x - anchor.x, y - anchor.y),
        });
        log::debug!("drag start {} {:?}", hit.id, hit.part);
        true
    }

    /// Commit a new position for the dragged annotation. Returns true if the
    /// store was updated.
    pub fn pointer_move(
        &mut self,
        pointer_id: i32,
        x: f64,
        y: f64,
        store: &mut AnnotationStore,
    ) -> bool {
        let Some(drag) = self.active.filter(|d| d.pointer_id == pointer_id) else {
            return false;
        };
        let Some(current) = store.get(drag.id) else {
            // Removed mid-drag.
            self.active = None;
            return false;
        };
        let target = Point::new(x - drag.grab_offset.0, y - drag.grab_offset.1);
        let updated = match drag.part {
            HitPart::Body => current.moved_to(target),
            HitPart::Handle(end) => current.with_arrow_end(end, target),
        };
        store.replace(updated)
    }

    /// Release capture. Returns true if this pointer owned the drag.
    pub fn pointer_up(&mut self, pointer_id: i32) -> bool {
        match self.active {
            Some(drag) if drag.pointer_id == pointer_id => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    pub fn pointer_cancel(&mut self, pointer_id: i32) -> bool {
        self.pointer_up(pointer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, ArrowEnd};

    fn setup(annotation: &Annotation) -> (AnnotationStore, VectorLayer) {
        let mut store = AnnotationStore::new();
        store.add(annotation.clone());
        let mut layer = VectorLayer::new(500.0, 500.0);
        layer.add_annotation(annotation);
        (store, layer)
    }

    #[test]
    fn body_drag_follows_pointer_delta() {
        let a = Annotation::rectangle(Point::new(100.0, 100.0), 50.0, 40.0, "#000", None);
        let (mut store, layer) = setup(&a);
        let mut drag = DragController::new();

        assert!(drag.pointer_down(1, 120.0, 110.0, &layer, &store));
        assert!(drag.pointer_move(1, 150.0, 90.0, &mut store));
        assert_eq!(store.get(a.id()).unwrap().position(), Point::new(130.0, 80.0));
        assert!(drag.pointer_move(1, 120.0, 110.0, &mut store));
        assert_eq!(store.get(a.id()).unwrap().position(), Point::new(100.0, 100.0));
        assert!(drag.pointer_up(1));
        assert!(!drag.is_dragging());
    }

    #[test]
    fn other_pointers_are_ignored_while_captured() {
        let a = Annotation::text(Point::new(10.0, 10.0), "hi", "#000");
        let (mut store, layer) = setup(&a);
        let mut drag = DragController::new();

        assert!(drag.pointer_down(7, 12.0, 12.0, &layer, &store));
        assert!(!drag.pointer_down(8, 12.0, 12.0, &layer, &store));
        assert!(!drag.pointer_move(8, 300.0, 300.0, &mut store));
        assert_eq!(store.get(a.id()).unwrap().position(), Point::new(10.0, 10.0));
        assert!(!drag.pointer_up(8));
        assert_eq!(drag.captured_pointer(), Some(7));
        assert!(drag.pointer_cancel(7));
        assert!(!drag.pointer_move(7, 0.0, 0.0, &mut store));
    }

    #[test]
    fn handle_drag_moves_only_that_end() {
        let a = Annotation::arrow(Point::new(10.0, 10.0), Point::new(200.0, 10.0), "#000", 2.0);
        let (mut store, layer) = setup(&a);
        let mut drag = DragController::new();

        assert!(drag.pointer_down(1, 201.0, 11.0, &layer, &store));
        assert_eq!(drag.dragged(), Some((a.id(), HitPart::Handle(ArrowEnd::End))));
        drag.pointer_move(1, 251.0, 61.0, &mut store);
        let moved = store.get(a.id()).unwrap();
        assert_eq!(moved.arrow_point(ArrowEnd::Start), Some(Point::new(10.0, 10.0)));
        assert_eq!(moved.arrow_point(ArrowEnd::End), Some(Point::new(250.0, 60.0)));
    }

    #[test]
    fn miss_does_not_capture() {
        let a = Annotation::text(Point::new(10.0, 10.0), "hi", "#000");
        let (store, layer) = setup(&a);
        let mut drag = DragController::new();
        assert!(!drag.pointer_down(1, 400.0, 400.0, &layer, &store));
        assert!(!drag.is_dragging());
    }

    #[test]
    fn removal_mid_drag_ends_the_drag() {
        let a = Annotation::text(Point::new(10.0, 10.0), "hi", "#000");
        let (mut store, layer) = setup(&a);
        let mut drag = DragController::new();
        assert!(drag.pointer_down(1, 12.0, 12.0, &layer, &store));
        store.remove(a.id());
        assert!(!drag.pointer_move(1, 50.0, 50.0, &mut store));
        assert!(!drag.is_dragging());
    }
}
