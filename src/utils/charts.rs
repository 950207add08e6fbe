//! SVG training curves
//!
//! Renders the accuracy and loss history of both training phases as two
//! side-by-side panels, with a dashed marker where fine-tuning starts.

use std::fs;
use std::path::Path;

const PANEL_WIDTH: f64 = 480.0;
const PANEL_HEIGHT: f64 = 400.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 60.0;
const MARGIN_LEFT: f64 = 70.0;

const COLOR_TRAIN: &str = "#3498db";
const COLOR_VAL: &str = "#e67e22";
const COLOR_MARKER: &str = "#7f8c8d";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";

/// One named line in a panel
#[derive(Debug, Clone)]
pub struct DataSeries {
    pub name: String,
    pub values: Vec<f64>,
    pub color: String,
}

impl DataSeries {
    pub fn new(name: &str, values: Vec<f64>, color: &str) -> Self {
        Self {
            name: name.to_string(),
            values,
            color: color.to_string(),
        }
    }
}

/// A single chart panel
#[derive(Debug, Clone)]
pub struct Panel {
    pub title: String,
    pub y_label: String,
    pub series: Vec<DataSeries>,
    /// Fixed y range; computed from the data when `None`
    pub y_range: Option<(f64, f64)>,
}

/// Accuracy and loss panels for a two-phase run.
///
/// `fine_tune_start` is the index of the first fine-tuning epoch in the
/// concatenated history.
pub fn render_training_curves(
    accuracy: &[f64],
    val_accuracy: &[f64],
    loss: &[f64],
    fine_tune_start: Option<usize>,
) -> String {
    let mut acc_series = vec![DataSeries::new("Training Accuracy", accuracy.to_vec(), COLOR_TRAIN)];
    if !val_accuracy.is_empty() {
        acc_series.push(DataSeries::new("Validation Accuracy", val_accuracy.to_vec(), COLOR_VAL));
    }

    let panels = [
        Panel {
            title: "Training Accuracy".to_string(),
            y_label: "Accuracy".to_string(),
            series: acc_series,
            y_range: Some((0.0, 1.0)),
        },
        Panel {
            title: "Training Loss".to_string(),
            y_label: "Cross Entropy".to_string(),
            series: vec![DataSeries::new("Training Loss", loss.to_vec(), COLOR_TRAIN)],
            y_range: None,
        },
    ];

    let width = PANEL_WIDTH * panels.len() as f64;
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}"><rect width="{w}" height="{h}" fill="white"/>"#,
        w = width,
        h = PANEL_HEIGHT
    );

    for (i, panel) in panels.iter().enumerate() {
        svg.push_str(&render_panel(panel, i as f64 * PANEL_WIDTH, fine_tune_start));
    }

    svg.push_str("</svg>");
    svg
}

/// Write [`render_training_curves`] output to `path`
pub fn save_training_curves(
    path: &Path,
    accuracy: &[f64],
    val_accuracy: &[f64],
    loss: &[f64],
    fine_tune_start: Option<usize>,
) -> std::io::Result<()> {
    fs::write(path, render_training_curves(accuracy, val_accuracy, loss, fine_tune_start))
}

fn render_panel(panel: &Panel, offset_x: f64, marker: Option<usize>) -> String {
    let plot_width = PANEL_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = PANEL_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let left = offset_x + MARGIN_LEFT;
    let bottom = MARGIN_TOP + plot_height;

    let n_points = panel.series.iter().map(|s| s.values.len()).max().unwrap_or(0);
    let x_span = (n_points.max(2) - 1) as f64;
    let (y_min, y_max) = panel.y_range.unwrap_or_else(|| value_range(&panel.series));

    let to_x = |i: usize| left + (i as f64 / x_span) * plot_width;
    let to_y = |v: f64| bottom - ((v - y_min) / (y_max - y_min)) * plot_height;

    let mut svg = String::new();

    svg.push_str(&format!(
        r#"<text x="{}" y="30" text-anchor="middle" font-family="Arial, sans-serif" font-size="16" font-weight="bold" fill="{}">{}</text>"#,
        left + plot_width / 2.0,
        COLOR_AXIS,
        escape_xml(&panel.title)
    ));

    for i in 0..=5 {
        let value = y_min + (i as f64 / 5.0) * (y_max - y_min);
        let y = to_y(value);
        svg.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            left,
            y,
            left + plot_width,
            y,
            COLOR_GRID
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="11" fill="{}">{:.2}</text>"#,
            left - 8.0,
            y + 4.0,
            COLOR_AXIS,
            value
        ));
    }

    svg.push_str(&format!(
        r#"<line x1="{l}" y1="{b}" x2="{r}" y2="{b}" stroke="{c}" stroke-width="2"/><line x1="{l}" y1="{t}" x2="{l}" y2="{b}" stroke="{c}" stroke-width="2"/>"#,
        l = left,
        r = left + plot_width,
        t = MARGIN_TOP,
        b = bottom,
        c = COLOR_AXIS
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="13" fill="{}">epoch</text>"#,
        left + plot_width / 2.0,
        PANEL_HEIGHT - 20.0,
        COLOR_AXIS
    ));
    svg.push_str(&format!(
        r#"<text x="{x}" y="{y}" text-anchor="middle" font-family="Arial, sans-serif" font-size="13" fill="{c}" transform="rotate(-90 {x} {y})">{label}</text>"#,
        x = offset_x + 18.0,
        y = PANEL_HEIGHT / 2.0,
        c = COLOR_AXIS,
        label = escape_xml(&panel.y_label)
    ));

    if let Some(start) = marker.filter(|&m| m > 0 && m < n_points) {
        // The marker sits on the last feature-extraction epoch.
        let x = to_x(start - 1);
        svg.push_str(&format!(
            r#"<line x1="{x}" y1="{t}" x2="{x}" y2="{b}" stroke="{c}" stroke-width="1.5" stroke-dasharray="6 4"/><text x="{tx}" y="{ty}" font-family="Arial, sans-serif" font-size="11" fill="{c}">Start Fine Tuning</text>"#,
            x = x,
            t = MARGIN_TOP,
            b = bottom,
            c = COLOR_MARKER,
            tx = x + 4.0,
            ty = MARGIN_TOP + 12.0
        ));
    }

    for series in &panel.series {
        if series.values.is_empty() {
            continue;
        }
        let path: Vec<String> = series
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| format!("{} {:.2} {:.2}", if i == 0 { "M" } else { "L" }, to_x(i), to_y(v)))
            .collect();
        svg.push_str(&format!(
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="2.5"/>"#,
            path.join(" "),
            series.color
        ));
    }

    let mut legend_y = MARGIN_TOP + 10.0;
    for series in &panel.series {
        svg.push_str(&format!(
            r#"<rect x="{}" y="{}" width="12" height="12" fill="{}"/><text x="{}" y="{}" font-family="Arial, sans-serif" font-size="11" fill="{}">{}</text>"#,
            left + plot_width - 140.0,
            legend_y,
            series.color,
            left + plot_width - 122.0,
            legend_y + 10.0,
            COLOR_AXIS,
            escape_xml(&series.name)
        ));
        legend_y += 18.0;
    }

    svg
}

fn value_range(series: &[DataSeries]) -> (f64, f64) {
    let values = series.iter().flat_map(|s| s.values.iter().copied());
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let lo = min.min(0.0);
    if (max - lo).abs() < f64::EPSILON {
        (lo, lo + 1.0)
    } else {
        (lo, max * 1.05)
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_has_both_panels() {
        let svg = render_training_curves(&[0.5, 0.7, 0.8], &[], &[1.2, 0.8, 0.6], None);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Training Accuracy"));
        assert!(svg.contains("Training Loss"));
        assert!(!svg.contains("Validation Accuracy"));
    }

    #[test]
    fn test_fine_tune_marker() {
        let acc = [0.4, 0.5, 0.6, 0.7];
        let loss = [1.0, 0.9, 0.8, 0.7];
        assert!(render_training_curves(&acc, &[], &loss, Some(2)).contains("Start Fine Tuning"));
        assert!(!render_training_curves(&acc, &[], &loss, Some(0)).contains("Start Fine Tuning"));
    }

    #[test]
    fn test_value_range_flat_series() {
        let series = [DataSeries::new("loss", vec![0.0, 0.0], COLOR_TRAIN)];
        assert_eq!(value_range(&series), (0.0, 1.0));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & c>"), "a&lt;b &amp; c&gt;");
    }
}
