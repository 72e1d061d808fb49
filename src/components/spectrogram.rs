use leptos::prelude::*;
use sonoscope_core::annotation::{Annotation, Point};
use web_sys::{HtmlCanvasElement, PointerEvent};
use crate::session::{self, DRAG, OVERLAY, RENDERER, STORE};
use crate::state::{AppState, Tool};

/// Drags shorter than this (CSS px) are treated as clicks.
const MIN_SHAPE_PX: f64 = 3.0;

/// Mirror the vector layer into the overlay element at the renderer's size.
fn refresh_overlay(overlay: &web_sys::HtmlDivElement) {
    let size = RENDERER.with(|r| r.borrow().as_ref().map(|r| r.logical_size()));
    let markup = OVERLAY.with(|layer| {
        let mut layer = layer.borrow_mut();
        if let Some((w, h)) = size {
            layer.set_size(w, h);
        }
        layer.to_markup()
    });
    overlay.set_inner_html(&markup);
}

fn shape_for(tool: Tool, from: Point, to: Point, color: String) -> Option<Annotation> {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    if dx.hypot(dy) < MIN_SHAPE_PX {
        return None;
    }
    match tool {
        Tool::Arrow => Some(Annotation::arrow(from, to, color, 2.0)),
        Tool::Rectangle => Some(Annotation::rectangle(
            Point::new(from.x.min(to.x), from.y.min(to.y)),
            dx.abs(),
            dy.abs(),
            color,
            None,
        )),
        Tool::Select | Tool::Text => None,
    }
}

#[component]
pub fn SpectrogramView() -> impl IntoView {
    let state = expect_context::<AppState>();
    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let overlay_ref = NodeRef::<leptos::html::Div>::new();

    // Start point of an arrow or rectangle being drawn
    let draft_start: RwSignal<Option<Point>> = RwSignal::new(None);

    // Redraw when the data or display options change
    Effect::new(move || {
        let spectrogram = state.spectrogram.get();
        let options = state.render_options.get();

        let Some(canvas_el) = canvas_ref.get() else { return };
        let canvas: &HtmlCanvasElement = canvas_el.as_ref();
        if !session::ensure_renderer(canvas) {
            state.status.set("Canvas 2D is not available".into());
            return;
        }
        RENDERER.with(|r| {
            if let Some(renderer) = r.borrow_mut().as_mut() {
                renderer.refresh_pixel_ratio();
                renderer.render(spectrogram, &options);
            }
        });
        if let Some(overlay) = overlay_ref.get_untracked() {
            refresh_overlay(&overlay);
        }
    });

    // Re-mirror the overlay whenever the annotation store changes
    Effect::new(move || {
        state.annotations_version.track();
        if let Some(overlay) = overlay_ref.get() {
            refresh_overlay(&overlay);
        }
    });

    let local_point = move |ev: &PointerEvent| -> Option<Point> {
        let overlay = overlay_ref.get_untracked()?;
        let rect = overlay.get_bounding_client_rect();
        Some(Point::new(
            ev.client_x() as f64 - rect.left(),
            ev.client_y() as f64 - rect.top(),
        ))
    };

    let capture = move |ev: &PointerEvent| {
        if let Some(overlay) = overlay_ref.get_untracked() {
            if let Err(e) = overlay.set_pointer_capture(ev.pointer_id()) {
                log::error!("setPointerCapture failed: {:?}", e);
            }
        }
    };

    let release = move |ev: &PointerEvent| {
        if let Some(overlay) = overlay_ref.get_untracked() {
            if overlay.has_pointer_capture(ev.pointer_id()) {
                let _ = overlay.release_pointer_capture(ev.pointer_id());
            }
        }
    };

    let on_pointerdown = move |ev: PointerEvent| {
        if ev.button() != 0 {
            return;
        }
        let Some(p) = local_point(&ev) else { return };
        match state.tool.get_untracked() {
            Tool::Select => {
                let grabbed = DRAG.with(|d| {
                    OVERLAY.with(|layer| {
                        STORE.with(|store| {
                            d.borrow_mut().pointer_down(
                                ev.pointer_id(),
                                p.x,
                                p.y,
                                &layer.borrow(),
                                &store.borrow(),
                            )
                        })
                    })
                });
                if grabbed {
                    ev.prevent_default();
                    capture(&ev);
                }
            }
            Tool::Text => {
                let text = state.annotation_text.get_untracked();
                if text.trim().is_empty() {
                    return;
                }
                let color = state.annotation_color.get_untracked();
                STORE.with(|s| s.borrow_mut().add(Annotation::text(p, text, color)));
            }
            Tool::Arrow | Tool::Rectangle => {
                ev.prevent_default();
                draft_start.set(Some(p));
                capture(&ev);
            }
        }
    };

    let on_pointermove = move |ev: PointerEvent| {
        if state.tool.get_untracked() != Tool::Select {
            return;
        }
        let dragging = DRAG.with(|d| d.borrow().captured_pointer() == Some(ev.pointer_id()));
        if !dragging {
            return;
        }
        let Some(p) = local_point(&ev) else { return };
        DRAG.with(|d| {
            STORE.with(|store| {
                d.borrow_mut()
                    .pointer_move(ev.pointer_id(), p.x, p.y, &mut store.borrow_mut())
            })
        });
    };

    let on_pointerup = move |ev: PointerEvent| {
        DRAG.with(|d| d.borrow_mut().pointer_up(ev.pointer_id()));
        if let Some(from) = draft_start.get_untracked() {
            draft_start.set(None);
            if let Some(to) = local_point(&ev) {
                let color = state.annotation_color.get_untracked();
                if let Some(annotation) = shape_for(state.tool.get_untracked(), from, to, color) {
                    STORE.with(|s| s.borrow_mut().add(annotation));
                }
            }
        }
        release(&ev);
    };

    let on_pointercancel = move |ev: PointerEvent| {
        DRAG.with(|d| d.borrow_mut().pointer_cancel(ev.pointer_id()));
        draft_start.set(None);
        release(&ev);
    };

    // Double-click in select mode deletes the annotation under the pointer
    let on_dblclick = move |ev: web_sys::MouseEvent| {
        if state.tool.get_untracked() != Tool::Select {
            return;
        }
        let Some(overlay) = overlay_ref.get_untracked() else { return };
        let rect = overlay.get_bounding_client_rect();
        let (x, y) = (ev.client_x() as f64 - rect.left(), ev.client_y() as f64 - rect.top());
        let Some(hit) = OVERLAY.with(|layer| layer.borrow().hit_test(x, y)) else { return };
        STORE.with(|s| s.borrow_mut().remove(hit.id));
    };

    view! {
        <div class="spectrogram-container" style="position: relative;">
            <canvas node_ref=canvas_ref style="display: block; width: 100%; height: 100%;" />
            <div
                node_ref=overlay_ref
                class=move || match state.tool.get() {
                    Tool::Select => "annotation-overlay",
                    _ => "annotation-overlay drawing",
                }
                style="position: absolute; inset: 0; touch-action: none;"
                on:pointerdown=on_pointerdown
                on:pointermove=on_pointermove
                on:pointerup=on_pointerup
                on:pointercancel=on_pointercancel
                on:dblclick=on_dblclick
            ></div>
        </div>
    }
}
