use crate::{
    config::{ModelConfig, Validatable},
    error::DetectorError,
    model_service::Detector,
};
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, ArrayD, Axis, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use viume_annotator::{BoundingBox, Detection};

// YOLOv5 rows are [xc, yc, w, h, objectness, class scores...]
const BOX_FIELDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
    class_id: u32,
}

fn intersection(box1: &Candidate, box2: &Candidate) -> f32 {
    let width = (box1.x2.min(box2.x2) - box1.x1.max(box2.x1)).max(0.0);
    let height = (box1.y2.min(box2.y2) - box1.y1.max(box2.y1)).max(0.0);
    width * height
}

fn union(box1: &Candidate, box2: &Candidate) -> f32 {
    ((box1.x2 - box1.x1) * (box1.y2 - box1.y1)) + ((box2.x2 - box2.x1) * (box2.y2 - box2.y1))
        - intersection(box1, box2)
}

fn iou(box1: &Candidate, box2: &Candidate) -> f32 {
    let union = union(box1, box2);
    if union <= 0.0 {
        return 0.0;
    }
    intersection(box1, box2) / union
}

/// Greedy per-class suppression, highest confidence first.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Thresholds applied to the raw model output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessing {
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl From<&ModelConfig> for PostProcessing {
    fn from(config: &ModelConfig) -> Self {
        Self {
            input_size: config.input_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
        }
    }
}

/// Resizes to a square `input_size` input and lays it out as NCHW in `[0, 1]`.
pub fn transform_image(image: &RgbImage, input_size: u32) -> Array<f32, Ix4> {
    let size = input_size as usize;
    let resized = image::imageops::resize(image, input_size, input_size, FilterType::CatmullRom);

    let mut input = Array::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

/// Turns a `[1, N, 5 + C]` YOLOv5 output into detections in the pixel space
/// of an `image_width` x `image_height` image.
///
/// Score is objectness times the best class score. Rows holding a non-finite
/// value are dropped. Coordinates are clipped to the image and truncated
/// toward zero.
pub fn decode_yolov5_output(
    output: &ArrayD<f32>,
    params: &PostProcessing,
    image_width: u32,
    image_height: u32,
) -> Result<Vec<Detection>, DetectorError> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[2] <= BOX_FIELDS {
        return Err(DetectorError::UnexpectedShape(shape.to_vec()));
    }

    let scale_x = image_width as f32 / params.input_size as f32;
    let scale_y = image_height as f32 / params.input_size as f32;

    let mut candidates = Vec::new();
    for row in output.index_axis(Axis(0), 0).axis_iter(Axis(0)) {
        if row.iter().any(|value| !value.is_finite()) {
            continue;
        }

        let objectness = row[4];
        if objectness <= params.confidence_threshold {
            continue;
        }

        let Some((class_id, class_score)) = row
            .iter()
            .skip(BOX_FIELDS)
            .copied()
            .enumerate()
            .reduce(|accum, item| if item.1 > accum.1 { item } else { accum })
        else {
            continue;
        };

        let confidence = objectness * class_score;
        if confidence <= params.confidence_threshold {
            continue;
        }

        let xc = row[0] * scale_x;
        let yc = row[1] * scale_y;
        let w = row[2] * scale_x;
        let h = row[3] * scale_y;

        candidates.push(Candidate {
            x1: xc - w / 2.,
            y1: yc - h / 2.,
            x2: xc + w / 2.,
            y2: yc + h / 2.,
            confidence,
            class_id: class_id as u32,
        });
    }

    let mut kept = non_max_suppression(candidates, params.iou_threshold);
    kept.truncate(params.max_detections);

    let max_x = image_width as f32;
    let max_y = image_height as f32;
    Ok(kept
        .into_iter()
        .map(|c| {
            Detection::new(
                BoundingBox::new(
                    c.x1.clamp(0., max_x) as i32,
                    c.y1.clamp(0., max_y) as i32,
                    c.x2.clamp(0., max_x) as i32,
                    c.y2.clamp(0., max_y) as i32,
                ),
                c.confidence,
                c.class_id,
            )
        })
        .collect())
}

/// YOLOv5 ONNX model served from a small pool of sessions.
#[derive(Clone)]
pub struct OrtDetector {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    params: PostProcessing,
}

impl OrtDetector {
    pub fn new(model_config: &ModelConfig) -> Result<Self, DetectorError> {
        model_config
            .validate()
            .map_err(DetectorError::InvalidConfig)?;

        ort::init()
            .with_name("viume")
            .commit()
            .map_err(DetectorError::ModelLoad)?;

        let num_instances = model_config.num_instances;
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(DetectorError::ModelLoad)?;

        tracing::info!(
            "Created {} ONNX sessions for {:?}",
            num_instances,
            model_config.get_path()
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            params: PostProcessing::from(model_config),
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<ArrayD<f32>, DetectorError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|_| DetectorError::SessionPoisoned)?;

        tracing::debug!("Handling request with session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())?;
        let outputs = session.run(ort::inputs![tensor_ref])?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let array = ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec()).map_err(|_| {
            DetectorError::UnexpectedShape(shape.iter().map(|d| *d as usize).collect())
        })?;

        Ok(array)
    }
}

impl Detector for OrtDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        let (width, height) = image.dimensions();
        let input = transform_image(image, self.params.input_size);
        let output = self.run_inference(&input)?;
        let detections = decode_yolov5_output(&output, &self.params, width, height)?;

        tracing::debug!("Model returned {} detections", detections.len());
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    const PARAMS: PostProcessing = PostProcessing {
        input_size: 640,
        confidence_threshold: 0.25,
        iou_threshold: 0.45,
        max_detections: 1000,
    };

    // one row per box: [xc, yc, w, h, objectness, class scores...]
    fn output(rows: &[[f32; 8]]) -> ArrayD<f32> {
        let data: Vec<f32> = rows.iter().flatten().copied().collect();
        ArrayD::from_shape_vec(vec![1, rows.len(), 8], data).unwrap()
    }

    #[test]
    fn test_transform_image() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 50, Rgb([255, 0, 0]));

        let input = transform_image(&img, 640);

        assert_eq!(input.shape(), &[1, 3, 640, 640]);
        assert!((input[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
        assert_eq!(input[[0, 1, 10, 10]], 0.0);
        assert_eq!(input[[0, 2, 320, 320]], 0.0);
    }

    #[test]
    fn test_decode_scales_and_truncates_to_image_space() {
        let raw = output(&[[320.0, 320.0, 100.0, 50.0, 0.9, 0.1, 0.8, 0.05]]);

        let detections = decode_yolov5_output(&raw, &PARAMS, 1280, 320).unwrap();

        assert_eq!(detections.len(), 1);
        let detection = detections[0];
        assert_eq!(detection.class_id, 1);
        assert!((detection.confidence - 0.72).abs() < 1e-6);
        // x scale 2.0, y scale 0.5
        assert_eq!(detection.bbox, BoundingBox::new(540, 147, 740, 172));
    }

    #[test]
    fn test_decode_applies_confidence_threshold_to_combined_score() {
        let raw = output(&[
            // objectness passes but 0.5 * 0.4 does not
            [100.0, 100.0, 20.0, 20.0, 0.5, 0.4, 0.0, 0.0],
            // objectness alone is below the threshold
            [200.0, 200.0, 20.0, 20.0, 0.2, 1.0, 0.0, 0.0],
            [300.0, 300.0, 20.0, 20.0, 0.9, 0.0, 0.0, 0.9],
        ]);

        let detections = decode_yolov5_output(&raw, &PARAMS, 640, 640).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 2);
        assert_eq!(detections[0].bbox, BoundingBox::new(290, 290, 310, 310));
    }

    #[test]
    fn test_nms_is_per_class() {
        let raw = output(&[
            [100.0, 100.0, 40.0, 40.0, 0.9, 0.9, 0.0, 0.0],
            [102.0, 102.0, 40.0, 40.0, 0.9, 0.8, 0.0, 0.0],
            [101.0, 101.0, 40.0, 40.0, 0.9, 0.0, 0.7, 0.0],
            [400.0, 400.0, 40.0, 40.0, 0.9, 0.6, 0.0, 0.0],
        ]);

        let detections = decode_yolov5_output(&raw, &PARAMS, 640, 640).unwrap();
        let classes: Vec<u32> = detections.iter().map(|d| d.class_id).collect();

        assert_eq!(classes, vec![0, 1, 0]);
        assert_eq!(detections[0].bbox, BoundingBox::new(80, 80, 120, 120));
        assert_eq!(detections[2].bbox, BoundingBox::new(380, 380, 420, 420));
    }

    #[test]
    fn test_decode_clips_boxes_to_the_image() {
        let raw = output(&[
            [10.0, 10.0, 100.0, 100.0, 0.9, 0.9, 0.0, 0.0],
            [630.0, 600.0, 40.0, 100.0, 0.9, 0.0, 0.9, 0.0],
        ]);

        let detections = decode_yolov5_output(&raw, &PARAMS, 640, 640).unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].bbox, BoundingBox::new(0, 0, 60, 60));
        assert_eq!(detections[1].bbox, BoundingBox::new(610, 550, 640, 640));
    }

    #[test]
    fn test_decode_drops_non_finite_rows() {
        let raw = output(&[
            [100.0, 100.0, 20.0, 20.0, f32::NAN, 0.9, 0.0, 0.0],
            [200.0, 200.0, f32::INFINITY, 20.0, 0.9, 0.9, 0.0, 0.0],
            [300.0, 300.0, 20.0, 20.0, 0.9, f32::NAN, 0.9, 0.0],
            [400.0, 400.0, 20.0, 20.0, 0.9, 0.0, 0.0, 0.9],
        ]);

        let detections = decode_yolov5_output(&raw, &PARAMS, 640, 640).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 2);
        assert_eq!(detections[0].bbox, BoundingBox::new(390, 390, 410, 410));
    }

    #[test]
    fn test_decode_caps_detections() {
        let rows: Vec<[f32; 8]> = (0..10)
            .map(|i| {
                let c = 30.0 + 60.0 * i as f32;
                [c, c, 20.0, 20.0, 0.9, 0.9 - i as f32 * 0.01, 0.0, 0.0]
            })
            .collect();
        let params = PostProcessing {
            max_detections: 3,
            ..PARAMS
        };

        let detections = decode_yolov5_output(&output(&rows), &params, 640, 640).unwrap();

        assert_eq!(detections.len(), 3);
        assert!(detections[0].confidence >= detections[2].confidence);
    }

    #[test]
    fn test_decode_rejects_unexpected_shape() {
        let flat = ArrayD::from_shape_vec(vec![2, 3], vec![0.0; 6]).unwrap();
        assert!(matches!(
            decode_yolov5_output(&flat, &PARAMS, 640, 640),
            Err(DetectorError::UnexpectedShape(_))
        ));

        // boxes without any class score
        let no_classes = ArrayD::from_shape_vec(vec![1, 3, 5], vec![0.0; 15]).unwrap();
        assert!(matches!(
            decode_yolov5_output(&no_classes, &PARAMS, 640, 640),
            Err(DetectorError::UnexpectedShape(shape)) if shape == vec![1, 3, 5]
        ));
    }

    #[test]
    fn test_iou() {
        let a = Candidate {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
            confidence: 1.0,
            class_id: 0,
        };
        let b = Candidate {
            x1: 5.0,
            x2: 15.0,
            ..a
        };
        let far = Candidate {
            x1: 50.0,
            y1: 50.0,
            x2: 60.0,
            y2: 60.0,
            ..a
        };

        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(iou(&a, &far), 0.0);
    }
}
