use crate::{
    detection::{BoundingBox, Detection},
    error::AnnotatorError,
    fonts::embedded_font,
    registry::ClassRegistry,
    tally::{DetectionCounts, PercentageTable},
};
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut, text_size};

const LABEL_FONT_SIZE: f32 = 12.0;
const LABEL_OFFSET_Y: i32 = 10;
const BOX_LINE_WIDTH: i32 = 2;

/// Result of one annotation pass.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub image: RgbImage,
    pub counts: DetectionCounts,
    pub percentages: PercentageTable,
}

/// Draws detections onto a copy of an image and aggregates them per class.
#[derive(Clone)]
pub struct Annotator {
    font: FontArc,
    label_scale: PxScale,
    line_width: i32,
    label_offset: i32,
}

impl Annotator {
    pub fn new() -> Result<Self, AnnotatorError> {
        Ok(Self::with_font(embedded_font()?))
    }

    pub fn with_font(font: FontArc) -> Self {
        Self {
            font,
            label_scale: PxScale::from(LABEL_FONT_SIZE),
            line_width: BOX_LINE_WIDTH,
            label_offset: LABEL_OFFSET_Y,
        }
    }

    /// Annotates `image` with `detections` resolved through `registry`.
    ///
    /// The input image is never modified. With no detections the percentages
    /// are undefined, so `AnnotatorError::NoDetections` is returned carrying
    /// the untouched copy.
    pub fn annotate(
        &self,
        image: &RgbImage,
        detections: &[Detection],
        registry: &ClassRegistry,
    ) -> Result<Annotation, AnnotatorError> {
        let mut canvas = image.clone();
        let mut counts = DetectionCounts::new(registry);

        for detection in detections {
            let info = registry.resolve(detection.class_id);
            let color = info.color.to_rgb();

            self.draw_box(&mut canvas, &detection.bbox, color);
            self.draw_label(
                &mut canvas,
                &detection.bbox,
                &format!("Class: {}", info.display_name),
                color,
            );

            counts.record(detection.class_id);
        }

        let Some(percentages) = counts.percentages(registry, detections.len()) else {
            tracing::debug!("No detections to annotate");
            return Err(AnnotatorError::NoDetections {
                unannotated: canvas,
            });
        };

        tracing::debug!(
            "Annotated {} detections ({} unregistered)",
            detections.len(),
            counts.unregistered_total()
        );

        Ok(Annotation {
            image: canvas,
            counts,
            percentages,
        })
    }

    // Outline grows inward from the given edges, one pixel per line. Endpoints
    // are clamped to just outside the canvas so off-canvas edges stay hidden
    // without walking far-away line segments.
    fn draw_box(&self, canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
        let (width, height) = canvas.dimensions();
        let clamp_x = |x: i32| clamp_to_canvas(x, width, self.line_width);
        let clamp_y = |y: i32| clamp_to_canvas(y, height, self.line_width);

        for inset in 0..self.line_width {
            let left = clamp_x(bbox.x_min.saturating_add(inset));
            let top = clamp_y(bbox.y_min.saturating_add(inset));
            let right = clamp_x(bbox.x_max.saturating_sub(inset));
            let bottom = clamp_y(bbox.y_max.saturating_sub(inset));

            draw_line_segment_mut(canvas, (left, top), (right, top), color);
            draw_line_segment_mut(canvas, (left, bottom), (right, bottom), color);
            draw_line_segment_mut(canvas, (left, top), (left, bottom), color);
            draw_line_segment_mut(canvas, (right, top), (right, bottom), color);
        }
    }

    fn draw_label(&self, canvas: &mut RgbImage, bbox: &BoundingBox, label: &str, color: Rgb<u8>) {
        let x = bbox.x_min;
        let y = bbox.y_min.saturating_sub(self.label_offset);

        let (text_width, _) = text_size(self.label_scale, &self.font, label);
        // glyphs sit below the origin, within about two font heights
        let text_height = (self.label_scale.y * 2.0).ceil() as i64;
        let (width, height) = canvas.dimensions();
        let visible = i64::from(x) < i64::from(width)
            && i64::from(y) < i64::from(height)
            && i64::from(x) + i64::from(text_width) >= 0
            && i64::from(y) + text_height >= 0;
        if !visible {
            return;
        }

        draw_text_mut(canvas, color, x, y, self.label_scale, &self.font, label);
    }
}

fn clamp_to_canvas(value: i32, limit: u32, margin: i32) -> f32 {
    let margin = i64::from(margin);
    i64::from(value).clamp(-margin, i64::from(limit) + margin) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{color::DrawColor, registry::ClassInfo};
    use image::ImageBuffer;

    const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);

    fn blank_image() -> RgbImage {
        ImageBuffer::from_pixel(128, 128, BACKGROUND)
    }

    fn detection(x_min: i32, y_min: i32, x_max: i32, y_max: i32, class_id: u32) -> Detection {
        Detection::new(BoundingBox::new(x_min, y_min, x_max, y_max), 0.9, class_id)
    }

    fn two_class_registry() -> ClassRegistry {
        [
            (0, ClassInfo::new("Normal", DrawColor::Blue)),
            (1, ClassInfo::new("HSIL", DrawColor::Purple)),
        ]
        .into_iter()
        .collect()
    }

    fn scenario_a_detections() -> Vec<Detection> {
        vec![
            detection(10, 10, 50, 50, 0),
            detection(60, 60, 90, 90, 1),
            detection(5, 5, 20, 20, 0),
        ]
    }

    #[test]
    fn test_two_normal_one_hsil() {
        let annotator = Annotator::new().unwrap();
        let image = blank_image();

        let annotation = annotator
            .annotate(&image, &scenario_a_detections(), &two_class_registry())
            .unwrap();

        assert_eq!(annotation.counts.get(0), 2);
        assert_eq!(annotation.counts.get(1), 1);

        let normal = annotation.percentages.get(0).unwrap();
        let hsil = annotation.percentages.get(1).unwrap();
        assert!((normal.percentage - 200.0 / 3.0).abs() < 1e-9);
        assert!((hsil.percentage - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(format!("{:.2}", normal.percentage), "66.67");
        assert_eq!(format!("{:.2}", hsil.percentage), "33.33");
        assert_eq!(normal.display_name, "Normal");

        let blue = DrawColor::Blue.to_rgb();
        let purple = DrawColor::Purple.to_rgb();
        let out = &annotation.image;
        // left edges, two pixels wide
        assert_eq!(*out.get_pixel(10, 30), blue);
        assert_eq!(*out.get_pixel(11, 30), blue);
        assert_eq!(*out.get_pixel(12, 30), BACKGROUND);
        // bottom and right edges of the first box
        assert_eq!(*out.get_pixel(30, 50), blue);
        assert_eq!(*out.get_pixel(49, 30), blue);
        // small overlapping box
        assert_eq!(*out.get_pixel(5, 15), blue);
        assert_eq!(*out.get_pixel(20, 15), blue);
        // purple box and its interior
        assert_eq!(*out.get_pixel(60, 75), purple);
        assert_eq!(*out.get_pixel(90, 75), purple);
        assert_eq!(*out.get_pixel(75, 90), purple);
        assert_eq!(*out.get_pixel(75, 75), BACKGROUND);
        assert_eq!(*out.get_pixel(30, 30), BACKGROUND);
    }

    #[test]
    fn test_label_is_drawn_above_the_box() {
        let annotator = Annotator::new().unwrap();
        let image = blank_image();

        let annotation = annotator
            .annotate(&image, &[detection(20, 40, 100, 100, 0)], &two_class_registry())
            .unwrap();

        let label_band_changed = (30..40)
            .flat_map(|y| (20..100).map(move |x| (x, y)))
            .any(|(x, y)| *annotation.image.get_pixel(x, y) != BACKGROUND);
        assert!(label_band_changed);

        let far_above_unchanged = (0..25)
            .flat_map(|y| (0..128).map(move |x| (x, y)))
            .all(|(x, y)| *annotation.image.get_pixel(x, y) == BACKGROUND);
        assert!(far_above_unchanged);
    }

    #[test]
    fn test_annotate_is_deterministic() {
        let annotator = Annotator::new().unwrap();
        let image = blank_image();
        let registry = two_class_registry();
        let detections = scenario_a_detections();

        let first = annotator.annotate(&image, &detections, &registry).unwrap();
        let second = annotator.annotate(&image, &detections, &registry).unwrap();

        assert_eq!(first.image.as_raw(), second.image.as_raw());
        assert_eq!(first.percentages, second.percentages);
        assert_eq!(first.counts, second.counts);
    }

    #[test]
    fn test_input_image_is_not_mutated() {
        let annotator = Annotator::new().unwrap();
        let image = blank_image();
        let before = image.clone();

        let annotation = annotator
            .annotate(&image, &scenario_a_detections(), &two_class_registry())
            .unwrap();

        assert_eq!(image, before);
        assert_ne!(annotation.image, before);
    }

    #[test]
    fn test_percentages_sum_to_one_hundred() {
        let annotator = Annotator::new().unwrap();
        let image = blank_image();
        let registry = ClassRegistry::cervical_cells();

        let detections: Vec<Detection> = (0..17)
            .map(|i| detection(i, i, i + 10, i + 10, (i as u32 * 7) % 9))
            .collect();

        let annotation = annotator.annotate(&image, &detections, &registry).unwrap();

        assert!((annotation.percentages.sum() - 100.0).abs() < 1e-6);
        assert_eq!(annotation.percentages.total_detections(), 17);
    }

    #[test]
    fn test_tally_accounts_for_every_detection() {
        let annotator = Annotator::new().unwrap();
        let image = blank_image();
        let registry = ClassRegistry::cervical_cells();
        let detections = vec![
            detection(1, 1, 10, 10, 4),
            detection(1, 1, 10, 10, 12),
            detection(1, 1, 10, 10, 0),
            detection(1, 1, 10, 10, 12),
            detection(1, 1, 10, 10, 99),
        ];

        let annotation = annotator.annotate(&image, &detections, &registry).unwrap();
        let counts = &annotation.counts;

        assert_eq!(counts.registered_total(), 2);
        assert_eq!(counts.unregistered_total(), 3);
        assert_eq!(
            counts.registered_total() + counts.unregistered_total(),
            detections.len()
        );
    }

    #[test]
    fn test_empty_detections_return_unannotated_copy() {
        let annotator = Annotator::new().unwrap();
        let image = blank_image();

        let result = annotator.annotate(&image, &[], &two_class_registry());

        match result {
            Err(AnnotatorError::NoDetections { unannotated }) => assert_eq!(unannotated, image),
            other => panic!("expected NoDetections, got {:?}", other.map(|a| a.counts)),
        }
    }

    #[test]
    fn test_unregistered_class_is_drawn_white_and_tallied_separately() {
        let annotator = Annotator::new().unwrap();
        let image = blank_image();
        let registry = two_class_registry();
        let detections = vec![detection(30, 40, 70, 80, 99), detection(10, 100, 20, 110, 0)];

        let annotation = annotator.annotate(&image, &detections, &registry).unwrap();

        let white = DrawColor::White.to_rgb();
        assert_eq!(*annotation.image.get_pixel(30, 60), white);
        assert_eq!(*annotation.image.get_pixel(69, 60), white);

        // same pixels as drawing the fallback entry explicitly
        let mut explicit = registry.clone();
        explicit.insert(99, ClassInfo::new("Unknown Class 99", DrawColor::White));
        let expected = annotator.annotate(&image, &detections, &explicit).unwrap();
        assert_eq!(annotation.image, expected.image);

        assert_eq!(annotation.counts.get(0), 1);
        assert_eq!(annotation.counts.get(1), 0);
        assert_eq!(annotation.counts.unregistered().get(&99), Some(&1));

        let unknown = annotation.percentages.get(99).unwrap();
        assert_eq!(unknown.display_name, "Unknown Class 99");
        assert_eq!(unknown.color, DrawColor::White);
        assert!((unknown.percentage - 50.0).abs() < 1e-9);
        assert!((annotation.percentages.get(0).unwrap().percentage - 50.0).abs() < 1e-9);
        assert!((annotation.percentages.sum() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_malformed_and_off_canvas_boxes_do_not_panic() {
        let annotator = Annotator::new().unwrap();
        let image = blank_image();
        let detections = vec![
            detection(90, 90, 10, 10, 0),
            detection(-50, -50, 500, 500, 1),
            detection(0, 0, 0, 0, 0),
        ];

        let annotation = annotator
            .annotate(&image, &detections, &two_class_registry())
            .unwrap();

        assert_eq!(annotation.percentages.total_detections(), 3);
        assert_eq!(*annotation.image.get_pixel(10, 50), DrawColor::Blue.to_rgb());
    }

    #[test]
    fn test_extreme_coordinates_are_clamped_to_the_canvas() {
        let annotator = Annotator::new().unwrap();
        let image = ImageBuffer::from_pixel(32, 32, BACKGROUND);
        let detections = vec![
            detection(0, i32::MIN, 10, i32::MIN + 5, 0),
            detection(i32::MAX, 0, i32::MAX, 5, 0),
            detection(i32::MIN, i32::MIN, i32::MAX, i32::MAX, 1),
            detection(4, 8, 100_000_000, 100_000_000, 0),
        ];

        let annotation = annotator
            .annotate(&image, &detections, &two_class_registry())
            .unwrap();

        assert_eq!(annotation.percentages.total_detections(), 4);
        let blue = DrawColor::Blue.to_rgb();
        // left edge of the huge box is still on the canvas, below its label
        assert_eq!(*annotation.image.get_pixel(4, 28), blue);
        assert_eq!(*annotation.image.get_pixel(5, 28), blue);
        assert_eq!(*annotation.image.get_pixel(20, 28), BACKGROUND);
    }

    #[test]
    fn test_clamp_to_canvas() {
        assert_eq!(clamp_to_canvas(i32::MIN, 32, 2), -2.0);
        assert_eq!(clamp_to_canvas(i32::MAX, 32, 2), 34.0);
        assert_eq!(clamp_to_canvas(17, 32, 2), 17.0);
    }
}
