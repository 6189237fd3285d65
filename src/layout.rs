// Layout engine: places parsed rows into equal horizontal bands, left to right,
// truncating a row once the next element would eat into the overflow margin.
use crate::parser::{BarOrientation, ChartElement, ParseResult, Row};
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_SPACING: f64 = 4.0;
pub const DEFAULT_OVERFLOW_MARGIN: f64 = 20.0;
pub const DEFAULT_BAR_WIDTH: f64 = 16.0;
pub const MAX_CIRCLE_RADIUS: f64 = 10.0;
const ESTIMATED_CHAR_WIDTH: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontSpec {
    pub family: String,
    pub size: f64,
    pub bold: bool,
}

impl FontSpec {
    pub fn new(family: &str, size: f64) -> Self {
        Self {
            family: family.to_string(),
            size,
            bold: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtents {
    pub width: f64,
    pub height: f64,
}

/// Text measurement offered by the drawing backend. `None` means "unavailable",
/// in which case the layout falls back to [`estimate_text`].
pub trait TextMeasure {
    fn measure(&self, text: &str, font: &FontSpec) -> Option<TextExtents>;
}

/// A measurer that never knows, forcing the estimate everywhere.
pub struct EstimatedText;

impl TextMeasure for EstimatedText {
    fn measure(&self, _text: &str, _font: &FontSpec) -> Option<TextExtents> {
        None
    }
}

pub fn estimate_text(text: &str, font_size: f64) -> TextExtents {
    TextExtents {
        width: text.chars().count() as f64 * font_size * ESTIMATED_CHAR_WIDTH,
        height: font_size,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub spacing: f64,
    pub overflow_margin: f64,
    pub bar_width: f64,
    pub font: FontSpec,
}

impl LayoutParams {
    pub fn new(canvas_width: f64, canvas_height: f64, font: FontSpec) -> Self {
        Self {
            canvas_width,
            canvas_height,
            spacing: DEFAULT_SPACING,
            overflow_margin: DEFAULT_OVERFLOW_MARGIN,
            bar_width: DEFAULT_BAR_WIDTH,
            font,
        }
    }

    pub fn with_bar_width(mut self, bar_width: f64) -> Self {
        self.bar_width = bar_width;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementGeometry {
    Circle {
        cx: f64,
        cy: f64,
        radius: f64,
        color: String,
    },
    Bar {
        orientation: BarOrientation,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        ratio: f64,
        bg: String,
        fg: String,
    },
    Text {
        x: f64,
        baseline: f64,
        width: f64,
        height: f64,
        content: String,
        color: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowGeometry {
    pub top: f64,
    pub height: f64,
    pub elements: Vec<ElementGeometry>,
    /// Leading edge for the next element, or the truncation point when `overflow` is set.
    pub end_x: f64,
    pub overflow: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutOutput {
    pub rows: Vec<RowGeometry>,
    /// Where to draw the single overflow indicator, if any row was truncated.
    pub overflow_at: Option<f64>,
}

/// Lay out every row. The result replaces any previous layout wholesale.
pub fn layout(rows: &ParseResult, params: &LayoutParams, measure: &dyn TextMeasure) -> LayoutOutput {
    if rows.is_empty() {
        return LayoutOutput {
            rows: Vec::new(),
            overflow_at: None,
        };
    }

    let band_height = params.canvas_height / rows.len() as f64;
    let geometries: Vec<RowGeometry> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| layout_row(idx, row, idx as f64 * band_height, band_height, params, measure))
        .collect();

    let any_overflow = geometries.iter().any(|r| r.overflow);
    let furthest = geometries.iter().map(|r| r.end_x).fold(0.0, f64::max);
    let overflow_at = (any_overflow && furthest < params.canvas_width).then_some(furthest);

    let total: usize = rows.iter().map(Vec::len).sum();
    let placed: usize = geometries.iter().map(|r| r.elements.len()).sum();
    if placed < total {
        debug!(
            "WARNING - Not all elements fit ({}/{}). Increase chart width in settings.",
            placed, total
        );
    }

    LayoutOutput {
        rows: geometries,
        overflow_at,
    }
}

fn layout_row(
    idx: usize,
    row: &Row,
    top: f64,
    band_height: f64,
    params: &LayoutParams,
    measure: &dyn TextMeasure,
) -> RowGeometry {
    let mut current_x = params.spacing;
    let mut elements = Vec::with_capacity(row.len());
    let mut overflow = false;

    for (i, element) in row.iter().enumerate() {
        let (width, geometry) = place(element, current_x, top, band_height, params, measure);
        if current_x + width + params.overflow_margin > params.canvas_width {
            debug!("Out of space in row {} at element {}/{}", idx, i, row.len());
            overflow = true;
            break;
        }
        elements.push(geometry);
        current_x += width + params.spacing;
    }

    RowGeometry {
        top,
        height: band_height,
        elements,
        end_x: current_x,
        overflow,
    }
}

/// Size and position one element with its leading edge at `x`. Returns the occupied width.
fn place(
    element: &ChartElement,
    x: f64,
    top: f64,
    band_height: f64,
    params: &LayoutParams,
    measure: &dyn TextMeasure,
) -> (f64, ElementGeometry) {
    match element {
        ChartElement::Circle { color } => {
            let radius = (band_height / 2.0 - 2.0).min(MAX_CIRCLE_RADIUS).max(0.0);
            let geometry = ElementGeometry::Circle {
                cx: x + radius,
                cy: top + band_height / 2.0,
                radius,
                color: color.clone(),
            };
            (radius * 2.0, geometry)
        }
        ChartElement::Bar {
            orientation,
            min,
            max,
            value,
            bg,
            fg,
        } => {
            let ratio = ChartElement::fill_ratio(*min, *max, *value);
            let (width, height, y) = match orientation {
                BarOrientation::Vertical => {
                    (params.bar_width, (band_height - 2.0).max(0.0), top + 2.0)
                }
                BarOrientation::Horizontal => {
                    let height = params.bar_width.min(band_height - 2.0).max(0.0);
                    ((height * 2.0).round(), height, top + (band_height - height) / 2.0)
                }
            };
            let geometry = ElementGeometry::Bar {
                orientation: *orientation,
                x,
                y,
                width,
                height,
                ratio,
                bg: bg.clone(),
                fg: fg.clone(),
            };
            (width, geometry)
        }
        ChartElement::Text { content, color } => {
            let extents = measure
                .measure(content, &params.font)
                .unwrap_or_else(|| estimate_text(content, params.font.size));
            let geometry = ElementGeometry::Text {
                x,
                baseline: top + band_height / 2.0 + extents.height / 2.0,
                width: extents.width,
                height: extents.height,
                content: content.clone(),
                color: color.clone(),
            };
            (extents.width, geometry)
        }
    }
}
