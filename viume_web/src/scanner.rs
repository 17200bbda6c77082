use crate::telemetry::Metrics;
use axum::{body::Bytes, http::StatusCode};
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tracing::instrument;
use viume_annotator::{
    decode_image, encode_png, Annotator, AnnotatorError, BarChart, ClassRegistry, PercentageTable,
};
use viume_detector::{Detector, DetectorError};

const CHART_TITLE: &str = "Detection percentage per class";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("The uploaded file is not a readable image: {0}")]
    InvalidImage(AnnotatorError),
    #[error("Detection failed: {0}")]
    Detector(#[from] DetectorError),
    #[error("Annotation failed: {0}")]
    Annotate(AnnotatorError),
    #[error("Scan task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ScanError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScanError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            ScanError::Detector(_) | ScanError::Annotate(_) | ScanError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Outcome of one scan, ready for rendering.
///
/// Without detections `image_png` is the unannotated image and there is no
/// chart.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub image_png: Vec<u8>,
    pub chart_png: Option<Vec<u8>>,
    pub percentages: Option<PercentageTable>,
    pub detection_count: usize,
}

impl ScanReport {
    pub fn has_detections(&self) -> bool {
        self.percentages.is_some()
    }
}

#[derive(Clone)]
pub struct ScanService {
    detector: Arc<dyn Detector>,
    registry: Arc<ClassRegistry>,
    annotator: Annotator,
    chart: BarChart,
    metrics: Arc<Metrics>,
}

impl ScanService {
    pub fn new(
        detector: Arc<dyn Detector>,
        registry: ClassRegistry,
        metrics: Arc<Metrics>,
    ) -> Result<Self, AnnotatorError> {
        Ok(Self {
            detector,
            registry: Arc::new(registry),
            annotator: Annotator::new()?,
            chart: BarChart::new()?.with_title(CHART_TITLE),
            metrics,
        })
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn scan(&self, bytes: Bytes) -> Result<ScanReport, ScanError> {
        let service = self.clone();
        let started = Instant::now();

        let report = tokio::task::spawn_blocking(move || service.run_pipeline(&bytes)).await??;

        let elapsed = started.elapsed();
        self.metrics.record_scan_duration(elapsed.as_secs_f64());
        tracing::info!(
            "Scan finished in {}ms with {} detections",
            elapsed.as_millis(),
            report.detection_count
        );

        Ok(report)
    }

    fn run_pipeline(&self, bytes: &[u8]) -> Result<ScanReport, ScanError> {
        let image = decode_image(bytes).map_err(ScanError::InvalidImage)?;
        let detections = self.detector.detect(&image)?;

        let annotation = match self.annotator.annotate(&image, &detections, &self.registry) {
            Ok(annotation) => annotation,
            Err(AnnotatorError::NoDetections { unannotated }) => {
                self.metrics.record_empty_scan();
                return Ok(ScanReport {
                    image_png: encode_png(&unannotated).map_err(ScanError::Annotate)?,
                    chart_png: None,
                    percentages: None,
                    detection_count: 0,
                });
            }
            Err(e) => return Err(ScanError::Annotate(e)),
        };

        for row in annotation.percentages.rows() {
            if row.count > 0 {
                self.metrics.record_detections(&row.display_name, row.count);
            }
        }

        let chart = self.chart.render(&annotation.percentages);

        Ok(ScanReport {
            image_png: encode_png(&annotation.image).map_err(ScanError::Annotate)?,
            chart_png: Some(encode_png(&chart).map_err(ScanError::Annotate)?),
            percentages: Some(annotation.percentages),
            detection_count: detections.len(),
        })
    }
}
