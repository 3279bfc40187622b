use image::{Rgb, RgbImage};

use crate::color::{generate_palette, lighten};

pub const FIGURE_WIDTH: u32 = 800;
pub const FIGURE_HEIGHT: u32 = 600;
const MARGIN: i64 = 60;
const MARKER_RADIUS: i64 = 3;
const TICKS: i64 = 5;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);

// ---------------------------------------------------------------------------
// Figure
// ---------------------------------------------------------------------------

/// Render signal (with error bars) against the x-axis.
///
/// In alternating mode signal values `2k` and `2k + 1` share `x[k]` and are
/// drawn as two series in different colours. Non-finite values are skipped.
pub fn draw_figure(x: &[f64], signal: &[f64], error: &[f64], alternating: bool) -> RgbImage {
    let mut img = RgbImage::from_pixel(FIGURE_WIDTH, FIGURE_HEIGHT, BACKGROUND);

    let series = split_series(x, signal, error, alternating);
    let frame = Frame::fit(series.iter().flatten());

    frame.draw_axes(&mut img);

    let colors = generate_palette(series.len());
    for (points, &color) in series.iter().zip(colors.iter()) {
        let bar_color = lighten(color, 0.5);
        for &(px, py, pe) in points {
            if pe.is_finite() && pe > 0.0 {
                let (cx, top) = frame.to_pixel(px, py + pe);
                let (_, bottom) = frame.to_pixel(px, py - pe);
                draw_line(&mut img, (cx, top), (cx, bottom), bar_color);
                draw_line(&mut img, (cx - 2, top), (cx + 2, top), bar_color);
                draw_line(&mut img, (cx - 2, bottom), (cx + 2, bottom), bar_color);
            }
        }
        for pair in points.windows(2) {
            let a = frame.to_pixel(pair[0].0, pair[0].1);
            let b = frame.to_pixel(pair[1].0, pair[1].1);
            draw_line(&mut img, a, b, color);
        }
        for &(px, py, _) in points {
            let (cx, cy) = frame.to_pixel(px, py);
            fill_square(&mut img, cx, cy, MARKER_RADIUS, color);
        }
    }

    img
}

type Point = (f64, f64, f64);

fn split_series(x: &[f64], signal: &[f64], error: &[f64], alternating: bool) -> Vec<Vec<Point>> {
    let finite = |p: &Point| p.0.is_finite() && p.1.is_finite();
    let err_at = |i: usize| error.get(i).copied().unwrap_or(0.0);

    if alternating {
        let mut first = Vec::new();
        let mut second = Vec::new();
        for (k, &xk) in x.iter().enumerate() {
            if let Some(&s) = signal.get(2 * k) {
                first.push((xk, s, err_at(2 * k)));
            }
            if let Some(&s) = signal.get(2 * k + 1) {
                second.push((xk, s, err_at(2 * k + 1)));
            }
        }
        first.retain(finite);
        second.retain(finite);
        vec![first, second]
    } else {
        let mut points: Vec<Point> = x
            .iter()
            .zip(signal.iter())
            .enumerate()
            .map(|(i, (&xi, &si))| (xi, si, err_at(i)))
            .collect();
        points.retain(finite);
        vec![points]
    }
}

// ---------------------------------------------------------------------------
// Data → pixel mapping
// ---------------------------------------------------------------------------

struct Frame {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Frame {
    fn fit<'a>(points: impl Iterator<Item = &'a Point>) -> Self {
        let mut x_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for &(x, y, e) in points {
            let e = if e.is_finite() { e.abs() } else { 0.0 };
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y - e);
            y_max = y_max.max(y + e);
        }
        let (x_min, x_max) = padded(x_min, x_max);
        let (y_min, y_max) = padded(y_min, y_max);
        Frame {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    fn to_pixel(&self, x: f64, y: f64) -> (i64, i64) {
        let w = (FIGURE_WIDTH as i64 - 2 * MARGIN) as f64;
        let h = (FIGURE_HEIGHT as i64 - 2 * MARGIN) as f64;
        let px = MARGIN as f64 + (x - self.x_min) / (self.x_max - self.x_min) * w;
        let py = (FIGURE_HEIGHT as i64 - MARGIN) as f64 - (y - self.y_min) / (self.y_max - self.y_min) * h;
        (px.round() as i64, py.round() as i64)
    }

    fn draw_axes(&self, img: &mut RgbImage) {
        let left = MARGIN;
        let right = FIGURE_WIDTH as i64 - MARGIN;
        let top = MARGIN;
        let bottom = FIGURE_HEIGHT as i64 - MARGIN;

        for t in 1..TICKS {
            let gx = left + (right - left) * t / TICKS;
            let gy = top + (bottom - top) * t / TICKS;
            draw_line(img, (gx, top), (gx, bottom), GRID);
            draw_line(img, (left, gy), (right, gy), GRID);
            draw_line(img, (gx, bottom), (gx, bottom + 5), AXIS);
            draw_line(img, (left - 5, gy), (left, gy), AXIS);
        }

        draw_line(img, (left, top), (right, top), AXIS);
        draw_line(img, (left, bottom), (right, bottom), AXIS);
        draw_line(img, (left, top), (left, bottom), AXIS);
        draw_line(img, (right, top), (right, bottom), AXIS);
    }
}

/// Widen a degenerate or empty range and add 5% headroom.
fn padded(min: f64, max: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        let half = if min == 0.0 { 1.0 } else { min.abs() * 0.5 };
        return (min - half, max + half);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

// ---------------------------------------------------------------------------
// Raster primitives
// ---------------------------------------------------------------------------

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham line, clipped to the image.
fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(img, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn fill_square(img: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    for y in cy - radius..=cy + radius {
        for x in cx - radius..=cx + radius {
            put(img, x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figure_has_expected_size_and_marks() {
        let x = [0.0, 1.0, 2.0];
        let signal = [1.0, 2.0, 1.5];
        let error = [0.1, 0.1, 0.1];
        let img = draw_figure(&x, &signal, &error, false);
        assert_eq!(img.dimensions(), (FIGURE_WIDTH, FIGURE_HEIGHT));

        let marker = generate_palette(1)[0];
        let frame = Frame::fit(split_series(&x, &signal, &error, false).iter().flatten());
        let (cx, cy) = frame.to_pixel(1.0, 2.0);
        assert_eq!(*img.get_pixel(cx as u32, cy as u32), marker);
    }

    #[test]
    fn alternating_splits_into_two_series() {
        let series = split_series(&[0.0, 1.0], &[1.0, 2.0, 3.0, 4.0, 5.0], &[], true);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0], vec![(0.0, 1.0, 0.0), (1.0, 3.0, 0.0)]);
        assert_eq!(series[1], vec![(0.0, 2.0, 0.0), (1.0, 4.0, 0.0)]);
    }

    #[test]
    fn empty_and_nan_inputs_still_render() {
        let img = draw_figure(&[], &[], &[], false);
        assert_eq!(img.dimensions(), (FIGURE_WIDTH, FIGURE_HEIGHT));
        let img = draw_figure(&[0.0], &[f64::NAN], &[f64::NAN], true);
        assert_eq!(img.dimensions(), (FIGURE_WIDTH, FIGURE_HEIGHT));
    }
}
