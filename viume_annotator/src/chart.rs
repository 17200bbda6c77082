use crate::{error::AnnotatorError, fonts::embedded_font, tally::PercentageTable};
use ab_glyph::{FontArc, PxScale};
use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size},
    rect::Rect,
};

const CHART_WIDTH: u32 = 640;
const CHART_HEIGHT: u32 = 420;
const MARGIN_LEFT: u32 = 56;
const MARGIN_RIGHT: u32 = 16;
const MARGIN_TOP: u32 = 40;
const MARGIN_BOTTOM: u32 = 48;
const BAR_FILL_RATIO: f32 = 0.8;
const Y_TICKS: u32 = 5;
const TEXT_SIZE: f32 = 13.0;
const TITLE_SIZE: f32 = 16.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const GRID_COLOR: Rgb<u8> = Rgb([225, 225, 225]);
const BAR_COLOR: Rgb<u8> = Rgb([31, 119, 180]);

/// Renders a percentage table as a bar chart with a value label over each bar.
#[derive(Clone)]
pub struct BarChart {
    font: FontArc,
    title: Option<String>,
    width: u32,
    height: u32,
}

impl BarChart {
    pub fn new() -> Result<Self, AnnotatorError> {
        Ok(Self::with_font(embedded_font()?))
    }

    pub fn with_font(font: FontArc) -> Self {
        Self {
            font,
            title: None,
            width: CHART_WIDTH,
            height: CHART_HEIGHT,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn render(&self, table: &PercentageTable) -> RgbImage {
        let mut canvas = ImageBuffer::from_pixel(self.width, self.height, BACKGROUND);
        let max_percentage = table
            .rows()
            .iter()
            .map(|row| row.percentage)
            .fold(0.0_f64, f64::max);
        let layout = Layout::new(self.width, self.height, table.rows().len(), max_percentage);

        self.draw_y_axis(&mut canvas, &layout);

        for (index, row) in table.rows().iter().enumerate() {
            if let Some(bar) = layout.bar_rect(index, row.percentage) {
                draw_filled_rect_mut(&mut canvas, bar, BAR_COLOR);
            }

            let center_x = layout.slot_center(index);
            let bar_top = layout.value_to_y(row.percentage);
            self.draw_centered_text(
                &mut canvas,
                &format!("{:.2}%", row.percentage),
                center_x,
                bar_top - TEXT_SIZE as i32 - 4,
                TEXT_SIZE,
            );
            self.draw_centered_text(
                &mut canvas,
                &row.display_name,
                center_x,
                layout.plot_bottom() + 8,
                TEXT_SIZE,
            );
        }

        let left = layout.plot_left() as f32;
        let bottom = layout.plot_bottom() as f32;
        draw_line_segment_mut(
            &mut canvas,
            (left, bottom),
            (layout.plot_right() as f32, bottom),
            AXIS_COLOR,
        );
        draw_line_segment_mut(
            &mut canvas,
            (left, layout.plot_top() as f32),
            (left, bottom),
            AXIS_COLOR,
        );

        if let Some(title) = &self.title {
            self.draw_centered_text(
                &mut canvas,
                title,
                (self.width / 2) as i32,
                (MARGIN_TOP as i32 - TITLE_SIZE as i32) / 2,
                TITLE_SIZE,
            );
        }

        canvas
    }

    fn draw_y_axis(&self, canvas: &mut RgbImage, layout: &Layout) {
        for tick in 0..=Y_TICKS {
            let value = layout.y_max * tick as f64 / Y_TICKS as f64;
            let y = layout.value_to_y(value);
            if tick > 0 {
                draw_line_segment_mut(
                    canvas,
                    (layout.plot_left() as f32 + 1.0, y as f32),
                    (layout.plot_right() as f32, y as f32),
                    GRID_COLOR,
                );
            }

            let label = format!("{:.0}", value);
            let scale = PxScale::from(TEXT_SIZE);
            let (text_width, text_height) = text_size(scale, &self.font, &label);
            draw_text_mut(
                canvas,
                AXIS_COLOR,
                layout.plot_left() - text_width as i32 - 6,
                y - text_height as i32,
                scale,
                &self.font,
                &label,
            );
        }
    }

    fn draw_centered_text(&self, canvas: &mut RgbImage, text: &str, center_x: i32, y: i32, size: f32) {
        let scale = PxScale::from(size);
        let (text_width, _) = text_size(scale, &self.font, text);
        draw_text_mut(
            canvas,
            AXIS_COLOR,
            center_x - text_width as i32 / 2,
            y,
            scale,
            &self.font,
            text,
        );
    }
}

/// Plot area geometry for a given number of bars.
struct Layout {
    width: u32,
    height: u32,
    bars: usize,
    y_max: f64,
}

impl Layout {
    fn new(width: u32, height: u32, bars: usize, max_percentage: f64) -> Self {
        // one extra step of headroom for the value labels
        let y_max = (max_percentage / 10.0).ceil() * 10.0 + 10.0;
        Self {
            width,
            height,
            bars: bars.max(1),
            y_max,
        }
    }

    fn plot_left(&self) -> i32 {
        MARGIN_LEFT as i32
    }

    fn plot_right(&self) -> i32 {
        (self.width - MARGIN_RIGHT) as i32
    }

    fn plot_top(&self) -> i32 {
        MARGIN_TOP as i32
    }

    fn plot_bottom(&self) -> i32 {
        (self.height - MARGIN_BOTTOM) as i32
    }

    fn slot_width(&self) -> f32 {
        (self.plot_right() - self.plot_left()) as f32 / self.bars as f32
    }

    fn slot_center(&self, index: usize) -> i32 {
        (self.plot_left() as f32 + self.slot_width() * (index as f32 + 0.5)).round() as i32
    }

    fn value_to_y(&self, value: f64) -> i32 {
        let plot_height = (self.plot_bottom() - self.plot_top()) as f64;
        let ratio = (value / self.y_max).clamp(0.0, 1.0);
        self.plot_bottom() - (ratio * plot_height).round() as i32
    }

    fn bar_rect(&self, index: usize, value: f64) -> Option<Rect> {
        let top = self.value_to_y(value);
        let height = self.plot_bottom() - top;
        let bar_width = (self.slot_width() * BAR_FILL_RATIO).round() as i32;
        if height <= 0 || bar_width <= 0 {
            return None;
        }

        let left = self.slot_center(index) - bar_width / 2;
        Some(Rect::at(left, top).of_size(bar_width as u32, height as u32))
    }
}
