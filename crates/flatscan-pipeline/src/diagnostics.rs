//! Detection diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for tuning
//! the detector's thresholds against real photos. Time is read through
//! the injected [`Clock`], so the core never touches a platform timer.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::backend::VisionBackend;
use crate::detect::{QuadSearch, check_dimensions, find_best_quad};
use crate::edge::count_edge_pixels;
use crate::filter::FilterKind;
use crate::types::{Dimensions, PipelineConfig, PipelineError, Polyline, Quad};

/// Monotonic time source supplied by the host.
pub trait Clock {
    type Instant;

    fn now(&self) -> Self::Instant;

    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectDiagnostics {
    /// Stage 1: luma conversion.
    pub grayscale: StageDiagnostics,
    /// Stage 2: Gaussian blur.
    pub blur: StageDiagnostics,
    /// Stage 3: Canny edge detection.
    pub edge_detection: StageDiagnostics,
    /// Stage 4: contour tracing.
    pub contour_tracing: StageDiagnostics,
    /// Stage 5: polygon approximation and largest-quad selection.
    pub quad_selection: StageDiagnostics,
    /// Total wall-clock duration of detection (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    pub summary: DetectSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

impl StageDiagnostics {
    /// One aligned report row: name, milliseconds, share of
    /// `total_ms`, and the stage's details.
    #[must_use]
    pub fn report_line(&self, name: &str, total_ms: f64) -> String {
        let ms = duration_ms(self.duration);
        let pct = if total_ms > 0.0 {
            ms / total_ms * 100.0
        } else {
            0.0
        };
        let details = format_metrics(&self.metrics);
        format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}")
    }
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Luma conversion.
    Grayscale {
        width: u32,
        height: u32,
    },
    /// Gaussian blur.
    Blur {
        /// Sigma the backend blurred with, when it reports one.
        sigma: Option<f32>,
    },
    /// Canny edge detection.
    EdgeDetection {
        low_threshold: Option<f32>,
        high_threshold: Option<f32>,
        /// Number of edge pixels (value == 255) in the output.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Contour tracing.
    ContourTracing {
        contour_count: usize,
        /// Total number of points across all contours.
        total_point_count: usize,
        min_contour_points: usize,
        max_contour_points: usize,
        mean_contour_points: f64,
    },
    /// Polygon approximation and selection.
    QuadSelection {
        /// Tolerance as a fraction of each contour's perimeter.
        epsilon_ratio: f64,
        /// Contours that approximated to exactly four vertices.
        candidate_count: usize,
        /// Area of the winning quadrilateral (0 when none).
        best_area: f64,
    },
    /// Perspective rectification.
    Rectify {
        out_width: u32,
        out_height: u32,
    },
    /// Page filter.
    Filter {
        filter: FilterKind,
    },
}

/// High-level summary of a detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectSummary {
    pub image_width: u32,
    pub image_height: u32,
    pub pixel_count: u64,
    pub contour_count: usize,
    pub candidate_count: usize,
    /// The detected corners, if any.
    pub quad: Option<Quad>,
}

impl DetectDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Detection Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            lines.push(diag.report_line(name, total_ms));
        }

        lines.push(String::new());
        let outcome = self.summary.quad.map_or_else(
            || "not found".to_string(),
            |q| {
                q.points()
                    .iter()
                    .map(|p| format!("({:.0}, {:.0})", p.x, p.y))
                    .collect::<Vec<_>>()
                    .join(" ")
            },
        );
        lines.push(format!(
            "Contours: {}  |  Quad candidates: {}  |  Corners: {outcome}",
            self.summary.contour_count, self.summary.candidate_count,
        ));

        lines.join("\n")
    }

    /// Stages in execution order with their display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 5] {
        [
            ("Grayscale", &self.grayscale),
            ("Blur", &self.blur),
            ("Edge Detection", &self.edge_detection),
            ("Contour Tracing", &self.contour_tracing),
            ("Quad Selection", &self.quad_selection),
        ]
    }
}

/// Run detection stage by stage, timing each with `clock`.
///
/// Produces the same result as [`detect_with`](crate::detect::detect_with).
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] for a zero-sized image.
pub fn detect_with_diagnostics<B, C>(
    backend: &B,
    image: &RgbaImage,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(Option<Quad>, DetectDiagnostics), PipelineError>
where
    B: VisionBackend + ?Sized,
    C: Clock,
{
    check_dimensions(image)?;
    let dims = Dimensions::of(image);
    let settings = backend.edge_settings();
    let total_start = clock.now();

    let start = clock.now();
    let gray = backend.grayscale(image);
    let grayscale = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Grayscale {
            width: dims.width,
            height: dims.height,
        },
    };

    let start = clock.now();
    let blurred = backend.blur(&gray);
    let blur = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Blur {
            sigma: settings.map(|s| s.blur_sigma),
        },
    };
    drop(gray);

    let start = clock.now();
    let edges = backend.edges(&blurred);
    let edge_detection = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::EdgeDetection {
            low_threshold: settings.map(|s| s.canny_low),
            high_threshold: settings.map(|s| s.canny_high),
            edge_pixel_count: count_edge_pixels(&edges),
            total_pixel_count: dims.pixel_count(),
        },
    };
    drop(blurred);

    let start = clock.now();
    let contours = backend.contours(&edges);
    let stats = contour_stats(&contours);
    let contour_tracing = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::ContourTracing {
            contour_count: contours.len(),
            total_point_count: stats.total,
            min_contour_points: stats.min,
            max_contour_points: stats.max,
            mean_contour_points: stats.mean,
        },
    };
    drop(edges);

    let start = clock.now();
    let QuadSearch {
        contours: contour_count,
        candidates,
        best,
        best_area,
    } = find_best_quad(&contours, config.approx_epsilon_ratio);
    let quad_selection = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::QuadSelection {
            epsilon_ratio: config.approx_epsilon_ratio,
            candidate_count: candidates,
            best_area,
        },
    };

    let diagnostics = DetectDiagnostics {
        grayscale,
        blur,
        edge_detection,
        contour_tracing,
        quad_selection,
        total_duration: clock.elapsed(&total_start),
        summary: DetectSummary {
            image_width: dims.width,
            image_height: dims.height,
            pixel_count: dims.pixel_count(),
            contour_count,
            candidate_count: candidates,
            quad: best,
        },
    };
    Ok((best, diagnostics))
}

/// Convert a `Duration` to milliseconds as `f64`.
#[must_use]
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::Blur { sigma } => format!("sigma={}", format_setting(*sigma, 2)),
        StageMetrics::EdgeDetection {
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "low={} high={} edges={edge_pixel_count} ({density:.1}%)",
                format_setting(*low_threshold, 1),
                format_setting(*high_threshold, 1),
            )
        }
        StageMetrics::ContourTracing {
            contour_count,
            total_point_count,
            min_contour_points,
            max_contour_points,
            mean_contour_points,
        } => {
            format!(
                "{contour_count} contours, {total_point_count} pts (min={min_contour_points} max={max_contour_points} mean={mean_contour_points:.1})",
            )
        }
        StageMetrics::QuadSelection {
            epsilon_ratio,
            candidate_count,
            best_area,
        } => {
            format!("eps={epsilon_ratio:.3}*perimeter {candidate_count} quads, best area={best_area:.0}")
        }
        StageMetrics::Rectify {
            out_width,
            out_height,
        } => format!("-> {out_width}x{out_height}"),
        StageMetrics::Filter { filter } => format!("{filter}"),
    }
}

fn format_setting(value: Option<f32>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}

/// Statistics for a set of contour polylines.
struct ContourStats {
    total: usize,
    min: usize,
    max: usize,
    mean: f64,
}

fn contour_stats(contours: &[Polyline]) -> ContourStats {
    let total: usize = contours.iter().map(Polyline::len).sum();
    let min = contours.iter().map(Polyline::len).min().unwrap_or(0);
    let max = contours.iter().map(Polyline::len).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let mean = if contours.is_empty() {
        0.0
    } else {
        total as f64 / contours.len() as f64
    };
    ContourStats {
        total,
        min,
        max,
        mean,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use image::Rgba;

    use super::*;
    use crate::backend::{EdgeSettings, ImageprocBackend};
    use crate::types::Point;

    /// Deterministic clock: every reading advances one millisecond.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl TickClock {
        fn new() -> Self {
            Self {
                ticks: Cell::new(0),
            }
        }
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get() + 1;
            self.ticks.set(t);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now().saturating_sub(*since))
        }
    }

    fn page_image() -> RgbaImage {
        let mut img = RgbaImage::from_pixel(200, 160, Rgba([30, 30, 30, 255]));
        for y in 30..130 {
            for x in 40..160 {
                img.put_pixel(x, y, Rgba([220, 220, 220, 255]));
            }
        }
        img
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn contour_stats_empty() {
        let stats = contour_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.min, 0);
        assert_eq!(stats.max, 0);
        assert!((stats.mean - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn contour_stats_computes() {
        let contours = vec![
            Polyline::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]),
            Polyline::new(vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(2.0, 0.0),
                Point::new(3.0, 0.0),
            ]),
        ];
        let stats = contour_stats(&contours);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.min, 2);
        assert_eq!(stats.max, 4);
        assert!((stats.mean - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn diagnostics_agree_with_plain_detection() {
        let img = page_image();
        let backend = ImageprocBackend::default();
        let config = PipelineConfig::default();
        let plain = crate::detect::detect_with(&backend, &img, &config).unwrap();
        let (quad, diag) =
            detect_with_diagnostics(&backend, &img, &config, &TickClock::new()).unwrap();
        assert_eq!(quad, plain);
        assert_eq!(diag.summary.quad, plain);
        assert_eq!(diag.summary.image_width, 200);
        assert!(diag.summary.candidate_count >= 1);
    }

    #[test]
    fn every_stage_is_timed() {
        let (_, diag) = detect_with_diagnostics(
            &ImageprocBackend::default(),
            &page_image(),
            &PipelineConfig::default(),
            &TickClock::new(),
        )
        .unwrap();
        for (name, stage) in diag.stages() {
            assert_eq!(stage.duration, Duration::from_millis(1), "{name}");
        }
        assert!(diag.total_duration >= Duration::from_millis(5));
    }

    #[test]
    fn edge_metrics_come_from_the_backend() {
        let backend = ImageprocBackend::with_settings(EdgeSettings {
            blur_sigma: 2.0,
            canny_low: 40.0,
            canny_high: 120.0,
        });
        let config = PipelineConfig::default();
        let (_, diag) =
            detect_with_diagnostics(&backend, &page_image(), &config, &TickClock::new()).unwrap();
        assert!(matches!(
            diag.blur.metrics,
            StageMetrics::Blur { sigma: Some(s) } if (s - 2.0).abs() < f32::EPSILON
        ));
        assert!(matches!(
            diag.edge_detection.metrics,
            StageMetrics::EdgeDetection {
                low_threshold: Some(low),
                high_threshold: Some(high),
                ..
            } if (low - 40.0).abs() < f32::EPSILON && (high - 120.0).abs() < f32::EPSILON
        ));
        assert!(diag.report().contains("sigma=2.00"));
    }

    #[test]
    fn zero_sized_image_is_invalid() {
        let result = detect_with_diagnostics(
            &ImageprocBackend::default(),
            &RgbaImage::new(0, 0),
            &PipelineConfig::default(),
            &TickClock::new(),
        );
        assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
    }

    #[test]
    fn report_names_every_stage() {
        let (_, diag) = detect_with_diagnostics(
            &ImageprocBackend::default(),
            &page_image(),
            &PipelineConfig::default(),
            &TickClock::new(),
        )
        .unwrap();
        let report = diag.report();
        assert!(report.contains("Detection Diagnostics Report"));
        for (name, _) in diag.stages() {
            assert!(report.contains(name), "missing {name}");
        }
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let stage = StageDiagnostics {
            duration: Duration::from_millis(1500),
            metrics: StageMetrics::Filter {
                filter: FilterKind::Scan,
            },
        };
        let json = serde_json::to_value(&stage).unwrap();
        assert!((json["duration"].as_f64().unwrap() - 1.5).abs() < 1e-12);
        let back: StageDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration, Duration::from_millis(1500));
    }
}
