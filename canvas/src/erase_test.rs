#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use super::*;
use crate::doc::{DrawingElement, Style};

fn p(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn element(id: &str, timestamp: i64, shape: Shape) -> DrawingElement {
    DrawingElement {
        id: id.into(),
        shape,
        style: Style { color: "#fff".into(), stroke_width: 2.0, fill: false },
        timestamp,
        user_id: "u".into(),
    }
}

fn store(elements: Vec<DrawingElement>) -> ElementStore {
    let mut store = ElementStore::new();
    store.load_snapshot(elements);
    store
}

// =============================================================
// Geometry
// =============================================================

#[test]
fn segment_distance_perpendicular() {
    assert_eq!(point_segment_distance(p(5.0, 3.0), p(0.0, 0.0), p(10.0, 0.0)), 3.0);
}

#[test]
fn segment_distance_past_endpoint() {
    assert_eq!(point_segment_distance(p(13.0, 4.0), p(0.0, 0.0), p(10.0, 0.0)), 5.0);
}

#[test]
fn segment_distance_zero_length() {
    assert_eq!(point_segment_distance(p(3.0, 4.0), p(0.0, 0.0), p(0.0, 0.0)), 5.0);
}

#[test]
fn pen_hit_uses_vertices() {
    let pen = Shape::Pen { points: vec![p(0.0, 0.0), p(100.0, 0.0)] };
    assert!(shape_hit(&pen, p(2.0, 0.0), 2.0));
    // Midway between vertices is far from both.
    assert!(!shape_hit(&pen, p(50.0, 0.0), 2.0));
}

#[test]
fn line_hit_uses_segment() {
    let line = Shape::Line { from: p(0.0, 0.0), to: p(100.0, 0.0) };
    assert!(shape_hit(&line, p(50.0, 1.5), 2.0));
    assert!(!shape_hit(&line, p(50.0, 2.5), 2.0));
}

#[test]
fn rectangle_hit_uses_grown_bounds() {
    let rect = Shape::Rectangle { corner_a: p(10.0, 10.0), corner_b: p(20.0, 20.0) };
    assert!(shape_hit(&rect, p(15.0, 15.0), 1.0));
    assert!(shape_hit(&rect, p(8.0, 15.0), 2.0));
    assert!(!shape_hit(&rect, p(7.0, 15.0), 2.0));
}

#[test]
fn circle_hit_uses_true_radius() {
    let circle = Shape::Circle { center: p(100.0, 100.0), rim: p(110.0, 100.0) };
    assert!(shape_hit(&circle, p(89.0, 100.0), 2.0));
    assert!(!shape_hit(&circle, p(87.0, 100.0), 2.0));
}

#[test]
fn text_hit_uses_estimated_extent() {
    let text = Shape::Text { anchor: p(0.0, 0.0), text: "abcd".into(), font_size: 10.0 };
    assert!(shape_hit(&text, p(20.0, 5.0), 1.0));
    assert!(!shape_hit(&text, p(30.0, 5.0), 1.0));
}

// =============================================================
// EraseEngine
// =============================================================

#[test]
fn inactive_engine_marks_nothing() {
    let elements = store(vec![element("a", 1, Shape::Pen { points: vec![p(5.0, 5.0)] })]);
    let mut engine = EraseEngine::new();
    assert!(engine.extend(p(5.0, 5.0), &elements, 4.0).is_empty());
}

#[test]
fn each_element_reported_once_per_gesture() {
    let elements = store(vec![element("a", 1, Shape::Pen { points: vec![p(5.0, 5.0), p(6.0, 5.0)] })]);
    let mut engine = EraseEngine::new();
    engine.begin();
    assert_eq!(engine.extend(p(5.0, 5.0), &elements, 4.0), vec!["a".to_string()]);
    assert!(engine.extend(p(6.0, 5.0), &elements, 4.0).is_empty());
    assert_eq!(engine.finish(), 1);
    assert!(!engine.is_active());
}

#[test]
fn new_gesture_can_mark_again() {
    let elements = store(vec![element("a", 1, Shape::Pen { points: vec![p(5.0, 5.0)] })]);
    let mut engine = EraseEngine::new();
    engine.begin();
    engine.extend(p(5.0, 5.0), &elements, 4.0);
    engine.finish();
    engine.begin();
    assert_eq!(engine.extend(p(5.0, 5.0), &elements, 4.0), vec!["a".to_string()]);
}

#[test]
fn sweep_collects_multiple_elements_in_paint_order() {
    let elements = store(vec![
        element("far", 3, Shape::Pen { points: vec![p(500.0, 500.0)] }),
        element("second", 2, Shape::Line { from: p(0.0, 10.0), to: p(100.0, 10.0) }),
        element("first", 1, Shape::Pen { points: vec![p(10.0, 10.0)] }),
    ]);
    let mut engine = EraseEngine::new();
    engine.begin();
    let hit = engine.extend(p(10.0, 11.0), &elements, 3.0);
    assert_eq!(hit, vec!["first".to_string(), "second".to_string()]);
    assert_eq!(engine.finish(), 2);
}

#[test]
fn path_catches_elements_that_arrive_mid_gesture() {
    let mut engine = EraseEngine::new();
    engine.begin();
    assert!(engine.extend(p(10.0, 10.0), &ElementStore::new(), 3.0).is_empty());

    let elements = store(vec![element("late", 1, Shape::Pen { points: vec![p(11.0, 10.0)] })]);
    let hit = engine.extend(p(900.0, 900.0), &elements, 3.0);
    assert_eq!(hit, vec!["late".to_string()]);
    assert_eq!(engine.path(), &[p(10.0, 10.0), p(900.0, 900.0)]);
}

#[test]
fn one_touching_point_removes_whole_stroke() {
    let points: Vec<Point> = (0..50).map(|i| p(f64::from(i) * 10.0, 300.0)).collect();
    let elements = store(vec![element("long", 1, Shape::Pen { points })]);
    let mut engine = EraseEngine::new();
    engine.begin();
    assert_eq!(engine.extend(p(490.0, 302.0), &elements, 2.0), vec!["long".to_string()]);
}

#[test]
fn finish_clears_path() {
    let mut engine = EraseEngine::new();
    engine.begin();
    engine.extend(p(1.0, 1.0), &ElementStore::new(), 1.0);
    engine.finish();
    assert!(engine.path().is_empty());
}
