use lopdf::content::Operation;
use lopdf::Object::{Integer, Real};
use nalgebra_glm as glm;

use crate::annotation::LineAnnotation;
use crate::notebook::{BrushColor, BrushSize, BrushType, Layer, Line};
use crate::transform::{normalize, PageScale};

/// Thickness of a highlighter band, in device units before scaling.
const HIGHLIGHTER_WIDTH: f64 = 30.0;
const HIGHLIGHTER_COLOR: [f32; 3] = [1.0, 1.0, 0.0];
const HIGHLIGHTER_OPACITY: f32 = 0.5;

/// The stroke color a line is drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrokeColor {
    Rgb([f32; 3]),
    /// No color is set: the stroke keeps whatever color the graphics state already holds.
    Inherit,
}

/// The colors used for the strokes. Annotations drawn over a background document are
/// tinted so that they stand out from the printed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Template,
    Background,
}

impl Palette {
    pub fn for_background(has_background: bool) -> Self {
        if has_background {
            Palette::Background
        } else {
            Palette::Template
        }
    }

    pub fn stroke_color(self, brush_color: BrushColor) -> StrokeColor {
        match (self, brush_color) {
            (Palette::Background, BrushColor::Black) => StrokeColor::Rgb([0.7, 0.0, 0.0]),
            (Palette::Background, BrushColor::Grey) => StrokeColor::Rgb([0.0, 0.7, 0.0]),
            (Palette::Background, BrushColor::White) => StrokeColor::Inherit,
            (Palette::Template, BrushColor::Black) => StrokeColor::Rgb([0.0, 0.0, 0.0]),
            (Palette::Template, BrushColor::Grey) => StrokeColor::Rgb([0.7, 0.7, 0.7]),
            (Palette::Template, BrushColor::White) => StrokeColor::Rgb([1.0, 1.0, 1.0]),
        }
    }
}

/// The width of the stroke in page units, independent of the page scale.
pub fn line_width(brush_size: BrushSize) -> f32 {
    match brush_size {
        BrushSize::Small => 0.5,
        BrushSize::Medium => 0.5,
        BrushSize::Large => 0.9,
    }
}

/// Builds the path construction operators connecting the points of a stroke, already in page space.
pub trait PathStrategy {
    fn path_operations(&self, points: &[glm::DVec2]) -> Vec<Operation>;
}

/// Connects the points with straight segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Polyline;

impl PathStrategy for Polyline {
    fn path_operations(&self, points: &[glm::DVec2]) -> Vec<Operation> {
        points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let operator = if index == 0 { "m" } else { "l" };
                Operation::new(operator, vec![Real(point.x as f32), Real(point.y as f32)])
            })
            .collect()
    }
}

/// What the strokes of a page turn into: the drawing operators and the highlighter bands.
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub operations: Vec<lopdf::content::Operation>,
    pub highlights: Vec<LineAnnotation>,
}

/// Renders the layers of a notebook page into drawing operators for one output page.
pub struct Renderer<P: PathStrategy = Polyline> {
    page_scale: PageScale,
    /// The height used to flip the Y axis, device Y growing downwards.
    page_height: f64,
    palette: Palette,
    path_strategy: P,
}

impl Renderer<Polyline> {
    pub fn new(page_scale: PageScale, page_height: f64, palette: Palette) -> Self {
        Renderer {
            page_scale,
            page_height,
            palette,
            path_strategy: Polyline,
        }
    }
}

impl<P: PathStrategy> Renderer<P> {
    /// Replace the way the points of a stroke are connected.
    pub fn with_path_strategy<Q: PathStrategy>(self, path_strategy: Q) -> Renderer<Q> {
        Renderer {
            page_scale: self.page_scale,
            page_height: self.page_height,
            palette: self.palette,
            path_strategy,
        }
    }

    /// Walks the layers in order and renders every visible line.
    pub fn render(&self, layers: &[Layer]) -> RenderedPage {
        let mut rendered_page = RenderedPage::default();
        rendered_page.operations.extend([
            Operation::new("q", vec![]),
            // Round joins and caps, as the pen tip is round
            Operation::new("j", vec![Integer(1)]),
            Operation::new("J", vec![Integer(1)]),
        ]);

        for line in layers.iter().flat_map(|layer| layer.lines.iter()) {
            if line.points.is_empty() || line.brush_type.is_eraser() {
                continue;
            }

            if line.brush_type == BrushType::Highlighter {
                rendered_page.highlights.push(self.highlight(line));
            } else {
                rendered_page.operations.extend(self.stroke(line));
            }
        }

        rendered_page.operations.push(Operation::new("Q", vec![]));
        log::trace!(
            "Rendered {} operations and {} highlights",
            rendered_page.operations.len(),
            rendered_page.highlights.len()
        );

        rendered_page
    }

    /// A highlighter line becomes a horizontal band between its first and last points.
    fn highlight(&self, line: &Line) -> LineAnnotation {
        let first = normalize(&line.points[0], &self.page_scale);
        let last = normalize(&line.points[line.points.len() - 1], &self.page_scale);

        let width = self.page_scale.scale_x * HIGHLIGHTER_WIDTH;
        let y = self.page_height - (first.y + width / 2.0);

        LineAnnotation {
            x1: first.x - 1.0,
            y1: y,
            x2: last.x,
            y2: y,
            color: HIGHLIGHTER_COLOR,
            opacity: HIGHLIGHTER_OPACITY,
            width,
        }
    }

    /// Any other line is stroked as a path, in a graphics state of its own.
    fn stroke(&self, line: &Line) -> Vec<Operation> {
        let points: Vec<glm::DVec2> = line
            .points
            .iter()
            .map(|point| {
                let point = normalize(point, &self.page_scale);
                glm::vec2(point.x, self.page_height - point.y)
            })
            .collect();

        let mut operations = vec![
            Operation::new("q", vec![]),
            Operation::new("w", vec![Real(line_width(line.brush_size))]),
        ];
        if let StrokeColor::Rgb([r, g, b]) = self.palette.stroke_color(line.brush_color) {
            operations.push(Operation::new("RG", vec![Real(r), Real(g), Real(b)]));
        }
        operations.extend(self.path_strategy.path_operations(&points));
        operations.push(Operation::new("S", vec![]));
        operations.push(Operation::new("Q", vec![]));

        operations
    }
}
