//! Evidence circle: threshold, clean up, pick the dominant blob, enclose it
//!
//! Pure-Rust counterparts of the OpenCV steps (`threshold`, Otsu,
//! `morphologyEx`, `findContours(RETR_EXTERNAL)`, `contourArea`,
//! `minEnclosingCircle`), built on `imageproc` where it has the primitive.

// Pixel coordinates and areas are small; float/int casts are intentional
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

use crate::colormap::heat_level;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use imageproc::point::Point;
use mri_insight_common::{AttributionMap, Circle};
use tracing::debug;

/// Binary evidence mask: above the fixed threshold AND above Otsu, then a
/// 3x3 open followed by a 3x3 close
#[must_use]
pub fn evidence_mask(map: &AttributionMap, threshold: f32) -> GrayImage {
    let (h, w) = (map.height() as u32, map.width() as u32);
    let view = map.view();
    let heat = GrayImage::from_fn(w, h, |x, y| Luma([heat_level(view[[y as usize, x as usize]])]));

    let fixed = (threshold * 255.0) as u8;
    let otsu = otsu_level(&heat);
    debug!("Evidence mask thresholds: fixed={}, otsu={}", fixed, otsu);

    let raw = GrayImage::from_fn(w, h, |x, y| {
        let v = heat.get_pixel(x, y)[0];
        Luma([if v > fixed && v > otsu { 255 } else { 0 }])
    });

    let opened = open(&raw, Norm::LInf, 1);
    close(&opened, Norm::LInf, 1)
}

/// Outermost contours of a binary mask (holes and nested blobs dropped)
#[must_use]
pub fn external_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c: &Contour<i32>| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points)
        .collect()
}

/// Polygon area of a closed contour (shoelace)
#[must_use]
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    (twice as f64).abs() / 2.0
}

/// Circle around the dominant evidence blob, in map coordinates
///
/// The largest contour with area >= `min_area` wins; if every contour is
/// smaller the largest one is used anyway. With no contour at all the result
/// is the map center with radius 0.
#[must_use]
pub fn heatmap_to_circle(map: &AttributionMap, threshold: f32, min_area: f64) -> Circle {
    let (h, w) = (map.height() as i32, map.width() as i32);
    let mask = evidence_mask(map, threshold);

    let mut contours: Vec<(f64, Vec<Point<i32>>)> = external_contours(&mask)
        .into_iter()
        .map(|c| (contour_area(&c), c))
        .collect();
    if contours.is_empty() {
        return Circle {
            x: w / 2,
            y: h / 2,
            radius: 0,
        };
    }

    // Stable: equal areas keep scan order
    contours.sort_by(|a, b| b.0.total_cmp(&a.0));
    let chosen = contours
        .iter()
        .find(|(area, _)| *area >= min_area)
        .unwrap_or(&contours[0]);

    let (cx, cy, r) = min_enclosing_circle(&chosen.1);
    debug!(
        "Evidence blob: area={:.1}, circle=({:.1}, {:.1}, r={:.1}) from {} contours",
        chosen.0,
        cx,
        cy,
        r,
        contours.len()
    );
    Circle {
        x: cx as i32,
        y: cy as i32,
        radius: r as i32,
    }
}

/// Scale a circle between resolutions; the radius uses the mean of the two
/// axis ratios
#[must_use]
pub fn scale_circle(circle: Circle, from: (u32, u32), to: (u32, u32)) -> Circle {
    let (fw, fh) = (f64::from(from.0), f64::from(from.1));
    let (tw, th) = (f64::from(to.0), f64::from(to.1));
    // Multiply before dividing so exact multiples do not truncate downward
    Circle {
        x: (f64::from(circle.x) * tw / fw) as i32,
        y: (f64::from(circle.y) * th / fh) as i32,
        radius: (f64::from(circle.radius) * (tw * fh + th * fw) / (2.0 * fw * fh)) as i32,
    }
}

/// Smallest circle containing every point, as `(cx, cy, radius)`
#[must_use]
pub fn min_enclosing_circle(points: &[Point<i32>]) -> (f64, f64, f64) {
    let hull = convex_hull(points);
    let pts: Vec<(f64, f64)> = hull
        .iter()
        .map(|p| (f64::from(p.x), f64::from(p.y)))
        .collect();

    let Some(&first) = pts.first() else {
        return (0.0, 0.0, 0.0);
    };

    // Incremental Welzl: every point outside the running circle must lie on
    // the boundary of the next one
    let mut c = (first.0, first.1, 0.0);
    for i in 1..pts.len() {
        if contains(c, pts[i]) {
            continue;
        }
        c = (pts[i].0, pts[i].1, 0.0);
        for j in 0..i {
            if contains(c, pts[j]) {
                continue;
            }
            c = circle_from_two(pts[i], pts[j]);
            for k in 0..j {
                if !contains(c, pts[k]) {
                    c = circle_from_three(pts[i], pts[j], pts[k]);
                }
            }
        }
    }
    c
}

fn contains(c: (f64, f64, f64), p: (f64, f64)) -> bool {
    (p.0 - c.0).hypot(p.1 - c.1) <= c.2 + 1e-7
}

fn circle_from_two(a: (f64, f64), b: (f64, f64)) -> (f64, f64, f64) {
    let cx = (a.0 + b.0) / 2.0;
    let cy = (a.1 + b.1) / 2.0;
    (cx, cy, (a.0 - b.0).hypot(a.1 - b.1) / 2.0)
}

fn circle_from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> (f64, f64, f64) {
    let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
    if d.abs() < 1e-12 {
        // Collinear: the widest pair spans the circle
        return [circle_from_two(a, b), circle_from_two(a, c), circle_from_two(b, c)]
            .into_iter()
            .fold((0.0, 0.0, f64::NEG_INFINITY), |best, cand| {
                if cand.2 > best.2 {
                    cand
                } else {
                    best
                }
            });
    }
    let a2 = a.0 * a.0 + a.1 * a.1;
    let b2 = b.0 * b.0 + b.1 * b.1;
    let c2 = c.0 * c.0 + c.1 * c.1;
    let ux = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
    let uy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
    (ux, uy, (a.0 - ux).hypot(a.1 - uy))
}

/// Monotone-chain convex hull, counter-clockwise, without repeated end point
#[must_use]
pub fn convex_hull(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut pts: Vec<Point<i32>> = points.to_vec();
    pts.sort_by_key(|p| (p.x, p.y));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: Point<i32>, a: Point<i32>, b: Point<i32>| -> i64 {
        i64::from(a.x - o.x) * i64::from(b.y - o.y) - i64::from(a.y - o.y) * i64::from(b.x - o.x)
    };

    let mut hull: Vec<Point<i32>> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}
