//! Chart descriptions and a minimal SVG renderer.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

const WIDTH: f64 = 1200.0;
const HEIGHT: f64 = 600.0;
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LineX {
    Number(f64),
    Date(NaiveDate),
}

impl LineX {
    pub fn position(&self) -> f64 {
        match self {
            LineX::Number(v) => *v,
            LineX::Date(d) => d.num_days_from_ce() as f64,
        }
    }

    pub fn label(&self) -> String {
        match self {
            LineX::Number(v) => format_number(*v),
            LineX::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub x: LineX,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chart {
    /// `edges.len() == counts.len() + 1`
    Histogram { edges: Vec<f64>, counts: Vec<usize> },
    Line { points: Vec<LinePoint>, markers: bool },
    Bar { bars: Vec<(String, f64)> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub chart: Chart,
}

/// Linear map from a data range onto a pixel range.
struct Scale {
    lo: f64,
    hi: f64,
    px_lo: f64,
    px_hi: f64,
}

impl Scale {
    fn new(lo: f64, hi: f64, px_lo: f64, px_hi: f64) -> Self {
        let (lo, hi) = if (hi - lo).abs() < f64::EPSILON {
            (lo - 0.5, hi + 0.5)
        } else {
            (lo, hi)
        };
        Self { lo, hi, px_lo, px_hi }
    }

    fn map(&self, v: f64) -> f64 {
        self.px_lo + (v - self.lo) / (self.hi - self.lo) * (self.px_hi - self.px_lo)
    }
}

pub fn render_svg(figure: &Figure) -> String {
    let plot_left = MARGIN_LEFT;
    let plot_right = WIDTH - MARGIN_RIGHT;
    let plot_top = MARGIN_TOP;
    let plot_bottom = HEIGHT - MARGIN_BOTTOM;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">
<rect width="100%" height="100%" fill="#ffffff"/>
<rect x="{l}" y="{t}" width="{pw}" height="{ph}" fill="#ebebeb"/>
<text x="{cx}" y="35" font-size="20" text-anchor="middle">{title}</text>
"##,
        w = WIDTH,
        h = HEIGHT,
        l = plot_left,
        t = plot_top,
        pw = plot_right - plot_left,
        ph = plot_bottom - plot_top,
        cx = WIDTH / 2.0,
        title = escape(&figure.title),
    );

    let (x_lo_label, x_hi_label, y_lo, y_hi) = match &figure.chart {
        Chart::Histogram { edges, counts } => {
            let x_lo = edges.first().copied().unwrap_or(0.0);
            let x_hi = edges.last().copied().unwrap_or(1.0);
            let y_hi = counts.iter().copied().max().unwrap_or(0) as f64;
            let xs = Scale::new(x_lo, x_hi, plot_left, plot_right);
            let ys = Scale::new(0.0, y_hi.max(1.0), plot_bottom, plot_top);
            for (i, count) in counts.iter().enumerate() {
                let x0 = xs.map(edges[i]);
                let x1 = xs.map(edges[i + 1]);
                let y = ys.map(*count as f64);
                let _ = writeln!(
                    svg,
                    r##"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="#1f3fbf" fill-opacity="0.7"/>"##,
                    x0,
                    y,
                    (x1 - x0).max(0.0),
                    plot_bottom - y
                );
            }
            (format_number(x_lo), format_number(x_hi), 0.0, y_hi.max(1.0))
        }
        Chart::Line { points, markers } => {
            let xs_raw: Vec<f64> = points.iter().map(|p| p.x.position()).collect();
            let x_lo = xs_raw.iter().copied().fold(f64::INFINITY, f64::min);
            let x_hi = xs_raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let (y_lo, y_hi) = value_range(points.iter().map(|p| p.y));
            if points.is_empty() {
                (String::new(), String::new(), 0.0, 1.0)
            } else {
                let xs = Scale::new(x_lo, x_hi, plot_left, plot_right);
                let ys = Scale::new(y_lo, y_hi, plot_bottom, plot_top);
                let path: Vec<String> = points
                    .iter()
                    .map(|p| format!("{:.2},{:.2}", xs.map(p.x.position()), ys.map(p.y)))
                    .collect();
                let _ = writeln!(
                    svg,
                    r##"<polyline points="{}" fill="none" stroke="#e24a33" stroke-width="2"/>"##,
                    path.join(" ")
                );
                if *markers {
                    for p in points {
                        let _ = writeln!(
                            svg,
                            r##"<circle cx="{:.2}" cy="{:.2}" r="4" fill="#e24a33"/>"##,
                            xs.map(p.x.position()),
                            ys.map(p.y)
                        );
                    }
                }
                let first = points.iter().min_by(|a, b| a.x.position().total_cmp(&b.x.position()));
                let last = points.iter().max_by(|a, b| a.x.position().total_cmp(&b.x.position()));
                (
                    first.map(|p| p.x.label()).unwrap_or_default(),
                    last.map(|p| p.x.label()).unwrap_or_default(),
                    y_lo,
                    y_hi,
                )
            }
        }
        Chart::Bar { bars } => {
            let (lo, hi) = value_range(bars.iter().map(|(_, v)| *v));
            let (y_lo, y_hi) = (lo.min(0.0), hi.max(0.0));
            let ys = Scale::new(y_lo, y_hi, plot_bottom, plot_top);
            let slot = (plot_right - plot_left) / bars.len().max(1) as f64;
            let zero = ys.map(0.0);
            for (i, (label, value)) in bars.iter().enumerate() {
                let x = plot_left + slot * i as f64 + slot * 0.1;
                let y = ys.map(*value);
                let _ = writeln!(
                    svg,
                    r##"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="#348abd"/>"##,
                    x,
                    y.min(zero),
                    slot * 0.8,
                    (zero - y).abs()
                );
                let _ = writeln!(
                    svg,
                    r##"<text x="{:.2}" y="{:.2}" font-size="11" text-anchor="middle">{}</text>"##,
                    x + slot * 0.4,
                    plot_bottom + 16.0,
                    escape(label)
                );
            }
            (String::new(), String::new(), y_lo, y_hi)
        }
    };

    let _ = write!(
        svg,
        r##"<text x="{l}" y="{b}" font-size="12" text-anchor="start">{xlo}</text>
<text x="{r}" y="{b}" font-size="12" text-anchor="end">{xhi}</text>
<text x="{ylx}" y="{bot}" font-size="12" text-anchor="end">{ylo}</text>
<text x="{ylx}" y="{top}" font-size="12" text-anchor="end">{yhi}</text>
<text x="{cx}" y="{xl}" font-size="14" text-anchor="middle">{xlabel}</text>
<text x="20" y="{cy}" font-size="14" text-anchor="middle" transform="rotate(-90 20 {cy})">{ylabel}</text>
</svg>
"##,
        l = plot_left,
        r = plot_right,
        b = plot_bottom + 32.0,
        xlo = escape(&x_lo_label),
        xhi = escape(&x_hi_label),
        ylx = plot_left - 8.0,
        bot = plot_bottom,
        top = plot_top + 12.0,
        ylo = format_number(y_lo),
        yhi = format_number(y_hi),
        cx = (plot_left + plot_right) / 2.0,
        xl = HEIGHT - 15.0,
        xlabel = escape(&figure.x_label),
        cy = (plot_top + plot_bottom) / 2.0,
        ylabel = escape(&figure.y_label),
    );

    svg
}

fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo.is_finite() && hi.is_finite() {
        (lo, hi)
    } else {
        (0.0, 1.0)
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{:.2}", v)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
