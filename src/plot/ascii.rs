//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - simulated trial curves / mean curve: `-` line
//! - central band of a saved fit: `.` lines
//! - experimental amplitudes: `x` at their probe times

use crate::domain::{CohortPoints, FitFile};
use crate::sim::{TimeGrid, TrialBatch};

/// A polyline drawn with a single character.
struct Series {
    points: Vec<(f64, f64)>,
    ch: char,
}

/// Render the first `n_curves` simulated trials plus the experimental points.
pub fn render_trials_plot(
    batch: &TrialBatch,
    grid: &TimeGrid,
    data: &[CohortPoints],
    n_curves: usize,
    width: usize,
    height: usize,
) -> String {
    let series: Vec<Series> = (0..n_curves.min(batch.n_trials()))
        .map(|i| Series {
            points: zip_curve(grid.times(), &batch.trial(i)),
            ch: '-',
        })
        .collect();
    let points = data_points(data);

    let mut out = render_plot(&series, &points, width, height);
    out.push_str(&format!(
        "Legend: '-' simulated trials ({} of {}), 'x' data\n",
        series.len(),
        batch.n_trials()
    ));
    out
}

/// Render a plot from a saved fit JSON file: mean curve, band and data.
pub fn render_fit_file_plot(fit: &FitFile, width: usize, height: usize) -> String {
    let series = vec![
        Series {
            points: zip_curve(&fit.grid.time, &fit.grid.mean),
            ch: '-',
        },
        Series {
            points: zip_curve(&fit.grid.time, &fit.grid.lower),
            ch: '.',
        },
        Series {
            points: zip_curve(&fit.grid.time, &fit.grid.upper),
            ch: '.',
        },
    ];
    let points = data_points(&fit.data);

    let mut out = format!("Fit: {}\n", fit.params);
    out.push_str(&render_plot(&series, &points, width, height));
    out.push_str("Legend: '-' mean curve, '.' 5-95% band, 'x' data\n");
    out
}

fn zip_curve(times: &[f64], values: &[f64]) -> Vec<(f64, f64)> {
    times
        .iter()
        .zip(values)
        .filter(|(_, y)| y.is_finite())
        .map(|(&t, &y)| (t, y))
        .collect()
}

fn data_points(data: &[CohortPoints]) -> Vec<(f64, f64)> {
    data.iter()
        .flat_map(|c| c.values.iter().map(move |&v| (c.probe_time, v)))
        .filter(|(_, v)| v.is_finite())
        .collect()
}

fn render_plot(series: &[Series], points: &[(f64, f64)], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let all = || series.iter().flat_map(|s| s.points.iter()).chain(points.iter());
    let (t_min, t_max) = range(all().map(|p| p.0)).unwrap_or((-0.4, 0.2));
    let (y_min, y_max) = range(all().map(|p| p.1)).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw curves first (so points can overlay).
    for s in series {
        draw_curve(&mut grid, &s.points, t_min, t_max, y_min, y_max, s.ch);
    }

    for &(t, y) in points {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        grid[yy][x] = 'x';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: t=[{t_min:.3}, {t_max:.3}] s | y=[{y_min:.3}, {y_max:.3}]\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(
    grid: &mut [Vec<char>],
    curve: &[(f64, f64)],
    t_min: f64,
    t_max: f64,
    y_min: f64,
    y_max: f64,
    ch: char,
) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        match prev {
            Some((x0, y0)) if (x0, y0) == (x, yy) => continue,
            Some((x0, y0)) => draw_line(grid, x0, y0, x, yy, ch),
            None => {
                if grid[yy][x] == ' ' {
                    grid[yy][x] = ch;
                }
            }
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish). Only fills empty cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

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
