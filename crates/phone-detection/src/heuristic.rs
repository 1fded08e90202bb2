//! Contour-geometry phone heuristic
//!
//! Looks for compact, phone-shaped rectangles in the frame. Candidates come
//! from two masks (closed Canny edges and a closed Otsu binarization) and each
//! candidate collects one point per satisfied cue:
//! - polygon approximation with 4 to 8 corners
//! - bounding-box aspect ratio in the phone band
//! - rotated-rectangle aspect ratio in the phone band
//! - rectangularity (contour area over rotated-rect area)
//! - edge density inside the box
//! - planar-surface intensity spread inside the box
//! - plausible size relative to the frame
//!
//! Boxes touching the frame border are disqualified.

use frame::VideoFrame;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length, min_area_rect};
use imageproc::morphology::close;
use imageproc::point::Point;

/// Equivalent of a 5x5 kernel with automatic sigma
const BLUR_SIGMA: f32 = 1.1;
const CANNY_LOW: f32 = 55.0;
const CANNY_HIGH: f32 = 145.0;

const MIN_CONTOUR_AREA_FRACTION: f64 = 0.015;
const POLY_EPSILON_FRACTION: f64 = 0.03;
const MIN_CORNERS: usize = 4;
const MAX_CORNERS: usize = 8;
const RATIO_BAND: (f64, f64) = (0.35, 0.72);
const MIN_EXTENT: f64 = 0.45;
const BORDER_MARGIN: i64 = 2;
const MIN_EDGE_DENSITY: f64 = 0.025;
const STD_BAND: (f64, f64) = (8.0, 48.0);
const BBOX_AREA_BAND: (f64, f64) = (0.02, 0.22);
const SCORE_THRESHOLD: u32 = 4;

/// Axis-aligned box in pixels, end-exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelBox {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

/// True when any contour in the frame scores as phone-like
pub fn detect_phone_like_object(frame: &VideoFrame) -> bool {
    let gray = frame.to_grayscale();
    let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);

    let edges = close(&canny(&blurred, CANNY_LOW, CANNY_HIGH), Norm::LInf, 1);
    let binary = close(&binarize(&blurred, otsu_level(&blurred)), Norm::LInf, 2);

    let frame_w = frame.width as i64;
    let frame_h = frame.height as i64;
    let frame_area = (frame_w * frame_h) as f64;

    external_contours(&edges)
        .chain(external_contours(&binary))
        .any(|points| {
            score_contour(&points, &gray, &edges, frame_w, frame_h, frame_area) >= SCORE_THRESHOLD
        })
}

fn binarize(image: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

fn external_contours(mask: &GrayImage) -> impl Iterator<Item = Vec<Point<i32>>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points)
}

fn score_contour(
    points: &[Point<i32>],
    gray: &GrayImage,
    edges: &GrayImage,
    frame_w: i64,
    frame_h: i64,
    frame_area: f64,
) -> u32 {
    if points.len() < 3 {
        return 0;
    }
    let area = polygon_area(points);
    if area < frame_area * MIN_CONTOUR_AREA_FRACTION {
        return 0;
    }

    let perimeter = arc_length(points, true);
    if perimeter <= 0.0 {
        return 0;
    }

    let mut score = 0;

    let corners = approximate_polygon_dp(points, POLY_EPSILON_FRACTION * perimeter, true).len();
    if (MIN_CORNERS..=MAX_CORNERS).contains(&corners) {
        score += 1;
    }

    let bbox = bounding_box(points);
    if bbox.w <= 0 || bbox.h <= 0 {
        return 0;
    }
    if in_band(normalized_ratio(bbox.w as f64, bbox.h as f64), RATIO_BAND) {
        score += 1;
    }

    let (rect_w, rect_h) = rotated_rect_sides(points);
    if rect_w > 0.0 && rect_h > 0.0 {
        let rect_ratio = rect_w.min(rect_h) / (rect_w.max(rect_h) + 1e-8);
        if in_band(rect_ratio, RATIO_BAND) {
            score += 1;
        }
        if area / (rect_w * rect_h + 1e-8) >= MIN_EXTENT {
            score += 1;
        }
    }

    let x2 = frame_w.min(bbox.x + bbox.w);
    let y2 = frame_h.min(bbox.y + bbox.h);
    let touches_border = bbox.x <= BORDER_MARGIN
        || bbox.y <= BORDER_MARGIN
        || x2 >= frame_w - BORDER_MARGIN
        || y2 >= frame_h - BORDER_MARGIN;
    if touches_border {
        return 0;
    }
    let roi = PixelBox {
        x: bbox.x,
        y: bbox.y,
        w: x2 - bbox.x,
        h: y2 - bbox.y,
    };

    if edge_density(edges, roi) >= MIN_EDGE_DENSITY {
        score += 1;
    }
    if in_band(intensity_std(gray, roi), STD_BAND) {
        score += 1;
    }

    let bbox_area = (bbox.w * bbox.h) as f64;
    if bbox_area >= frame_area * BBOX_AREA_BAND.0 && bbox_area <= frame_area * BBOX_AREA_BAND.1 {
        score += 1;
    }

    score
}

fn in_band(value: f64, (low, high): (f64, f64)) -> bool {
    value >= low && value <= high
}

fn normalized_ratio(w: f64, h: f64) -> f64 {
    let ratio = w / h;
    if ratio <= 1.0 {
        ratio
    } else {
        1.0 / ratio
    }
}

/// Shoelace area of a closed contour
fn polygon_area(points: &[Point<i32>]) -> f64 {
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

/// Inclusive pixel bounds, reported as origin plus size
fn bounding_box(points: &[Point<i32>]) -> PixelBox {
    let (mut min_x, mut min_y) = (i64::MAX, i64::MAX);
    let (mut max_x, mut max_y) = (i64::MIN, i64::MIN);
    for p in points {
        min_x = min_x.min(p.x as i64);
        min_y = min_y.min(p.y as i64);
        max_x = max_x.max(p.x as i64);
        max_y = max_y.max(p.y as i64);
    }
    PixelBox {
        x: min_x,
        y: min_y,
        w: max_x - min_x + 1,
        h: max_y - min_y + 1,
    }
}

fn rotated_rect_sides(points: &[Point<i32>]) -> (f64, f64) {
    let corners = min_area_rect(points);
    let side = |a: Point<i32>, b: Point<i32>| {
        let dx = (a.x - b.x) as f64;
        let dy = (a.y - b.y) as f64;
        (dx * dx + dy * dy).sqrt()
    };
    (side(corners[0], corners[1]), side(corners[1], corners[2]))
}

fn roi_pixels<'a>(image: &'a GrayImage, roi: PixelBox) -> impl Iterator<Item = u8> + 'a {
    (roi.y..roi.y + roi.h).flat_map(move |y| {
        (roi.x..roi.x + roi.w).map(move |x| image.get_pixel(x as u32, y as u32)[0])
    })
}

fn edge_density(edges: &GrayImage, roi: PixelBox) -> f64 {
    let size = (roi.w * roi.h) as f64;
    if size <= 0.0 {
        return 0.0;
    }
    roi_pixels(edges, roi).filter(|&p| p != 0).count() as f64 / size
}

fn intensity_std(gray: &GrayImage, roi: PixelBox) -> f64 {
    let size = (roi.w * roi.h) as f64;
    if size <= 0.0 {
        return 0.0;
    }
    let mean = roi_pixels(gray, roi).map(f64::from).sum::<f64>() / size;
    let var = roi_pixels(gray, roi)
        .map(|p| {
            let d = p as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / size;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKGROUND: [u8; 3] = [170, 170, 170];
    const DEVICE: [u8; 3] = [35, 35, 40];

    fn scene(width: u32, height: u32, rect: Option<(u32, u32, u32, u32)>) -> VideoFrame {
        VideoFrame::from_fn(width, height, |x, y| match rect {
            Some((rx, ry, rw, rh)) if x >= rx && x < rx + rw && y >= ry && y < ry + rh => DEVICE,
            _ => BACKGROUND,
        })
    }

    #[test]
    fn test_upright_phone_detected() {
        // 50x90 dark slab in the middle of a 320x240 frame
        let frame = scene(320, 240, Some((135, 75, 50, 90)));
        assert!(detect_phone_like_object(&frame));
    }

    #[test]
    fn test_landscape_phone_detected() {
        let frame = scene(320, 240, Some((110, 95, 100, 50)));
        assert!(detect_phone_like_object(&frame));
    }

    #[test]
    fn test_empty_scene_not_detected() {
        assert!(!detect_phone_like_object(&scene(320, 240, None)));
    }

    #[test]
    fn test_tiny_object_ignored() {
        let frame = scene(320, 240, Some((150, 110, 10, 18)));
        assert!(!detect_phone_like_object(&frame));
    }

    #[test]
    fn test_border_touching_object_disqualified() {
        let frame = scene(320, 240, Some((0, 75, 50, 90)));
        assert!(!detect_phone_like_object(&frame));
    }

    #[test]
    fn test_polygon_area_and_bbox() {
        let square = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(polygon_area(&square), 100.0);
        assert_eq!(
            bounding_box(&square),
            PixelBox {
                x: 0,
                y: 0,
                w: 11,
                h: 11
            }
        );
    }

    #[test]
    fn test_normalized_ratio() {
        assert!((normalized_ratio(50.0, 100.0) - 0.5).abs() < 1e-9);
        assert!((normalized_ratio(100.0, 50.0) - 0.5).abs() < 1e-9);
    }
}
