//! Rendering of training curves.
//!
//! [`PlotGenerator`] draws two side-by-side charts, loss on the left and
//! accuracy on the right, into an SVG file. Each curve can be extended by a
//! polynomial regression hinting where it is heading.
use crate::error::{CallbackError, Result};
use derive_builder::Builder;
use ndarray::{Array1, Array2, s};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Receives the accumulated per-epoch series after every epoch.
pub trait PlotRenderer {
    /// Redraws the curves. Series that are not tracked are passed empty.
    fn update(
        &mut self,
        epoch: usize,
        train_loss: &[f64],
        train_acc: &[f64],
        val_loss: &[f64],
        val_acc: &[f64],
    ) -> Result<()>;
}

/// Settings for [`PlotGenerator`].
///
/// # Example
///
/// ```
/// use callbacks::PlotConfigBuilder;
///
/// let config = PlotConfigBuilder::default()
///     .poly_degree(2)
///     .show_regressions(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.poly_degree, 2);
/// assert_eq!(config.poly_n_backward_min, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct PlotConfig {
    /// Whether to draw regression lines
    pub show_regressions: bool,
    /// How far ahead to predict, as a fraction of the epochs run so far
    pub poly_forward_perc: f64,
    /// How much history to fit, as a fraction of the epochs run so far
    pub poly_backward_perc: f64,
    /// Minimum number of epochs to predict
    pub poly_n_forward_min: usize,
    /// Minimum number of epochs to fit
    pub poly_n_backward_min: usize,
    /// Degree of the fitted polynomial
    pub poly_degree: usize,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            show_regressions: true,
            poly_forward_perc: 0.1,
            poly_backward_perc: 0.2,
            poly_n_forward_min: 5,
            poly_n_backward_min: 10,
            poly_degree: 1,
            width: 1600,
            height: 600,
        }
    }
}

impl PlotConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in [
            ("poly_forward_perc", self.poly_forward_perc),
            ("poly_backward_perc", self.poly_backward_perc),
        ] {
            match value {
                Some(value) if !value.is_finite() || value < 0.0 => {
                    return Err(format!("{name} must be a non-negative number, got {value}"));
                }
                _ => {}
            }
        }
        if self.width == Some(0) || self.height == Some(0) {
            return Err("image dimensions must be positive".to_string());
        }
        Ok(())
    }
}

impl From<PlotConfigBuilderError> for CallbackError {
    fn from(e: PlotConfigBuilderError) -> Self {
        CallbackError::InvalidPlotConfig(e.to_string())
    }
}

impl PlotConfig {
    /// Number of future epochs to predict after `epoch`.
    fn n_forward(&self, epoch: usize) -> usize {
        let relative = ((epoch + 1) as f64 * self.poly_forward_perc) as usize;
        relative.max(self.poly_n_forward_min)
    }

    /// Number of trailing epochs the regression is fitted on.
    fn n_backward(&self, epoch: usize) -> usize {
        let relative = ((epoch + 1) as f64 * self.poly_backward_perc) as usize;
        relative.max(self.poly_n_backward_min)
    }
}

/// Least-squares polynomial fit; coefficients are ordered lowest degree first.
///
/// The degree is capped at one less than the number of points. Returns `None`
/// when there are no points or the system is singular.
pub(crate) fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Option<Vec<f64>> {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return None;
    }
    let terms = degree.min(n - 1) + 1;

    // Vandermonde matrix: one row per point, one column per power of x.
    let vandermonde = Array2::from_shape_fn((n, terms), |(row, power)| {
        xs.get(row).map_or(0.0, |x| x.powi(power as i32))
    });
    let targets: Array1<f64> = ys.iter().take(n).copied().collect();

    // Normal equations (AᵀA)c = Aᵀy.
    let gram = vandermonde.t().dot(&vandermonde);
    let moments = vandermonde.t().dot(&targets);
    solve(gram, moments).map(|coefficients| coefficients.to_vec())
}

/// Solves `a · x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let size = b.len();
    for pivot in 0..size {
        let magnitude = |row: usize| a.get((row, pivot)).map_or(0.0, |v| v.abs());
        let best = (pivot..size).max_by(|&r1, &r2| magnitude(r1).total_cmp(&magnitude(r2)))?;
        if magnitude(best) < 1e-12 {
            return None;
        }
        if best != pivot {
            for col in 0..size {
                a.swap((pivot, col), (best, col));
            }
            b.swap(pivot, best);
        }

        let pivot_row = a.row(pivot).to_owned();
        let pivot_value = *pivot_row.get(pivot)?;
        let pivot_rhs = *b.get(pivot)?;
        for row in pivot + 1..size {
            let factor = a.get((row, pivot))? / pivot_value;
            a.row_mut(row).scaled_add(-factor, &pivot_row);
            *b.get_mut(row)? -= factor * pivot_rhs;
        }
    }

    let mut solution = Array1::zeros(size);
    for row in (0..size).rev() {
        let tail = a
            .row(row)
            .slice(s![row + 1..])
            .dot(&solution.slice(s![row + 1..]));
        let value = (b.get(row)? - tail) / a.get((row, row))?;
        *solution.get_mut(row)? = value;
    }
    Some(solution)
}

/// Evaluates a polynomial with coefficients ordered lowest degree first.
pub(crate) fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// One curve of a chart.
struct Curve {
    label: String,
    points: Vec<(f64, f64)>,
    style: ShapeStyle,
}

/// Writes loss and accuracy charts to an SVG file on every update.
#[derive(Debug, Clone)]
pub struct PlotGenerator {
    filepath: PathBuf,
    config: PlotConfig,
}

impl PlotGenerator {
    pub fn new(filepath: impl Into<PathBuf>, config: PlotConfig) -> Self {
        Self {
            filepath: filepath.into(),
            config,
        }
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    /// The measured curve followed by its regression, if one applies.
    fn curves(&self, epoch: usize, label: &str, data: &[f64], color: RGBColor) -> Vec<Curve> {
        if data.is_empty() {
            return Vec::new();
        }
        let points: Vec<(f64, f64)> = data
            .iter()
            .enumerate()
            .map(|(i, &y)| (i as f64, y))
            .collect();
        let mut curves = vec![Curve {
            label: label.to_string(),
            points,
            style: color.stroke_width(2),
        }];

        if self.config.show_regressions && data.len() > 1 {
            let n_backward = self.config.n_backward(epoch);
            let start = data.len().saturating_sub(n_backward);
            let xs: Vec<f64> = (start..data.len()).map(|i| i as f64).collect();
            let ys = data.get(start..).unwrap_or_default();

            if let Some(coefficients) = polyfit(&xs, ys, self.config.poly_degree) {
                let last = data.len() - 1;
                let future = last..last + self.config.n_forward(epoch);
                curves.push(Curve {
                    label: format!("{label} regression"),
                    points: future
                        .map(|x| (x as f64, polyval(&coefficients, x as f64)))
                        .collect(),
                    style: color.mix(0.5).stroke_width(1),
                });
            }
        }
        curves
    }

    fn draw_panel(
        &self,
        area: &DrawingArea<SVGBackend<'_>, Shift>,
        title: &str,
        curves: &[Curve],
    ) -> Result<()> {
        let (x_range, y_range) = chart_ranges(curves);
        let mut chart = ChartBuilder::on(area)
            .caption(title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .x_desc("epoch")
            .y_desc(title)
            .draw()
            .map_err(plot_error)?;

        for curve in curves {
            let legend_style = curve.style;
            let annotation = if curve.points.len() == 1 {
                chart
                    .draw_series(
                        curve
                            .points
                            .iter()
                            .map(|&point| Circle::new(point, 4, curve.style.filled())),
                    )
                    .map_err(plot_error)?
            } else {
                chart
                    .draw_series(LineSeries::new(curve.points.iter().copied(), curve.style))
                    .map_err(plot_error)?
            };
            annotation
                .label(curve.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], legend_style));
        }

        if !curves.is_empty() {
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(plot_error)?;
        }
        Ok(())
    }
}

impl PlotRenderer for PlotGenerator {
    fn update(
        &mut self,
        epoch: usize,
        train_loss: &[f64],
        train_acc: &[f64],
        val_loss: &[f64],
        val_acc: &[f64],
    ) -> Result<()> {
        let loss_curves: Vec<Curve> = [
            self.curves(epoch, "train loss", train_loss, RED),
            self.curves(epoch, "val loss", val_loss, BLUE),
        ]
        .into_iter()
        .flatten()
        .collect();
        let accuracy_curves: Vec<Curve> = [
            self.curves(epoch, "train acc", train_acc, RED),
            self.curves(epoch, "val acc", val_acc, BLUE),
        ]
        .into_iter()
        .flatten()
        .collect();

        let root = SVGBackend::new(&self.filepath, (self.config.width, self.config.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let panels = root.split_evenly((1, 2));
        let contents = [("loss", loss_curves), ("accuracy", accuracy_curves)];
        for (area, (title, curves)) in panels.iter().zip(contents.iter()) {
            self.draw_panel(area, title, curves)?;
        }

        root.present().map_err(plot_error)?;
        tracing::debug!(epoch, path = %self.filepath.display(), "Plot updated");
        Ok(())
    }
}

/// Axis ranges covering every point, padded so flat curves stay visible.
fn chart_ranges(curves: &[Curve]) -> (Range<f64>, Range<f64>) {
    let points = curves.iter().flat_map(|curve| curve.points.iter());
    let (x_max, y_min, y_max) = points.fold(
        (1.0_f64, f64::INFINITY, f64::NEG_INFINITY),
        |(x_max, y_min, y_max), &(x, y)| {
            if y.is_finite() {
                (x_max.max(x), y_min.min(y), y_max.max(y))
            } else {
                (x_max.max(x), y_min, y_max)
            }
        },
    );

    if y_min > y_max {
        return (0.0..x_max, 0.0..1.0);
    }
    let padding = if (y_max - y_min).abs() < f64::EPSILON {
        0.5
    } else {
        (y_max - y_min) * 0.05
    };
    (0.0..x_max, (y_min - padding)..(y_max + padding))
}

fn plot_error<E: std::fmt::Display>(e: E) -> CallbackError {
    CallbackError::Plot(e.to_string())
}
