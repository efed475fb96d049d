//! Predicted-vs-actual plotting behind a [`Reporter`] seam.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::{debug, info, instrument};

use crate::IoError;

/// Renders predicted and actual time-to-failure series.
pub trait Reporter {
    /// Render `predicted` and `actual` against their row position.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::LengthMismatch`] | The two series differ in length |
    /// | [`IoError::Plot`] | The backend fails to draw or save |
    fn plot_predictions(&self, predicted: &[f64], actual: &[f64]) -> Result<(), IoError>;
}

/// Draws the series as lines into a PNG file.
///
/// Predicted values are red, actual values blue at 30% opacity, over a grid.
/// A colour key in the top-right corner repeats the two line styles. No text
/// is drawn, so the chart renders without a font backend. The default canvas
/// is 1600×1600 pixels. An existing file is overwritten.
#[derive(Debug, Clone)]
pub struct PngReporter {
    path: PathBuf,
    size: (u32, u32),
}

impl PngReporter {
    /// Create a reporter writing to `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            size: (1600, 1600),
        }
    }

    /// Set the canvas size in pixels.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Return the target image path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Two swatches in the top-right corner: predicted above actual.
    fn draw_color_key(
        &self,
        root: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
        actual_color: RGBAColor,
    ) -> Result<(), IoError> {
        let (width, _) = root.dim_in_pixel();
        let right = i32::try_from(width).unwrap_or(i32::MAX).saturating_sub(40);
        let left = right.saturating_sub(60);
        let swatches = [(30, RED.stroke_width(4)), (50, actual_color.stroke_width(4))];
        for (y, style) in swatches {
            root.draw(&PathElement::new(vec![(left, y), (right, y)], style))
                .map_err(|e| self.plot_error(e))?;
        }
        Ok(())
    }

    fn plot_error(&self, e: impl Display) -> IoError {
        IoError::Plot {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}

impl Reporter for PngReporter {
    #[instrument(skip_all, fields(path = %self.path.display(), n = predicted.len()))]
    fn plot_predictions(&self, predicted: &[f64], actual: &[f64]) -> Result<(), IoError> {
        check_lengths(predicted, actual)?;
        let (y_min, y_max) = value_range(predicted.iter().chain(actual));
        let x_max = predicted.len().max(1) as f64;
        debug!(y_min, y_max, "plot ranges");

        let root = BitMapBackend::new(&self.path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(|e| self.plot_error(e))?;

        // No label areas and no series labels: the bitmap build has no
        // font backend, so any text would fail to render.
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .build_cartesian_2d(0f64..x_max, y_min..y_max)
            .map_err(|e| self.plot_error(e))?;

        chart
            .configure_mesh()
            .light_line_style(BLACK.mix(0.05))
            .bold_line_style(BLACK.mix(0.15))
            .draw()
            .map_err(|e| self.plot_error(e))?;

        chart
            .draw_series(LineSeries::new(
                predicted.iter().enumerate().map(|(i, &y)| (i as f64, y)),
                &RED,
            ))
            .map_err(|e| self.plot_error(e))?;

        let actual_color = BLUE.mix(0.3);
        chart
            .draw_series(LineSeries::new(
                actual.iter().enumerate().map(|(i, &y)| (i as f64, y)),
                actual_color,
            ))
            .map_err(|e| self.plot_error(e))?;

        self.draw_color_key(&root, actual_color)?;

        root.present().map_err(|e| self.plot_error(e))?;
        info!("prediction plot written");
        Ok(())
    }
}

/// Discards every plot. Used for headless runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn plot_predictions(&self, predicted: &[f64], actual: &[f64]) -> Result<(), IoError> {
        check_lengths(predicted, actual)
    }
}

fn check_lengths(predicted: &[f64], actual: &[f64]) -> Result<(), IoError> {
    if predicted.len() != actual.len() {
        return Err(IoError::LengthMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }
    Ok(())
}

/// Padded `(min, max)` of the values; never an empty range.
fn value_range<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(0.5);
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn png_reporter_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.png");
        let reporter = PngReporter::new(&path).with_size(200, 150);
        let actual: Vec<f64> = (0..50).map(|i| (50 - i) as f64 * 0.2).collect();
        let predicted: Vec<f64> = actual.iter().map(|v| v + 0.1).collect();
        reporter.plot_predictions(&predicted, &actual).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.len() > 0);
    }

    #[test]
    fn png_reporter_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.png");
        let reporter = PngReporter::new(&path).with_size(100, 100);
        reporter.plot_predictions(&[1.0, 2.0], &[2.0, 1.0]).unwrap();
        reporter.plot_predictions(&[3.0], &[3.0]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn default_canvas_renders_grid_and_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.png");
        let reporter = PngReporter::new(&path);
        let actual: Vec<f64> = (0..400).map(|i| f64::from(400 - i) * 0.03).collect();
        let predicted: Vec<f64> = actual.iter().map(|v| v * 0.9 + 0.4).collect();
        reporter.plot_predictions(&predicted, &actual).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn length_mismatch_rejected_by_both() {
        let dir = TempDir::new().unwrap();
        let png = PngReporter::new(&dir.path().join("p.png"));
        assert!(matches!(
            png.plot_predictions(&[1.0], &[1.0, 2.0]),
            Err(IoError::LengthMismatch { expected: 2, got: 1 })
        ));
        assert!(NullReporter.plot_predictions(&[1.0], &[]).is_err());
        assert!(NullReporter.plot_predictions(&[1.0], &[2.0]).is_ok());
    }

    #[test]
    fn range_is_padded() {
        let (lo, hi) = value_range([2.0, 2.0].iter());
        assert!(lo < 2.0 && hi > 2.0);
        assert_eq!(value_range(std::iter::empty()), (0.0, 1.0));
    }
}
