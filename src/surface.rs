// PNG surface - paints draw commands with plotters' bitmap backend
use crate::color::Rgba;
use crate::error::{ChartError, ChartResult};
use crate::layout::{FontSpec, TextExtents, TextMeasure};
use crate::render::Surface;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

pub struct PngSurface<'a> {
    area: DrawingArea<BitMapBackend<'a>, Shift>,
}

fn px(v: f64) -> i32 {
    v.round() as i32
}

fn to_plotters(color: Rgba) -> RGBAColor {
    let (r, g, b, a) = color.to_u8_channels();
    RGBAColor(r, g, b, a)
}

fn draw_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Draw(e.to_string())
}

fn font_desc(font: &FontSpec) -> FontDesc<'_> {
    let style = if font.bold {
        FontStyle::Bold
    } else {
        FontStyle::Normal
    };
    FontDesc::new(FontFamily::Name(&font.family), font.size, style)
}

impl<'a> PngSurface<'a> {
    pub fn new(path: &'a Path, width: u32, height: u32) -> Self {
        let area = BitMapBackend::new(path, (width.max(1), height.max(1))).into_drawing_area();
        Self { area }
    }

    /// Flush the frame to disk.
    pub fn finish(self) -> ChartResult<()> {
        self.area.present().map_err(draw_err)
    }
}

impl TextMeasure for PngSurface<'_> {
    fn measure(&self, text: &str, font: &FontSpec) -> Option<TextExtents> {
        let style = TextStyle::from(font_desc(font));
        self.area
            .estimate_text_size(text, &style)
            .ok()
            .map(|(w, h)| TextExtents {
                width: w as f64,
                height: h as f64,
            })
    }
}

impl Surface for PngSurface<'_> {
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Rgba) -> ChartResult<()> {
        if width <= 0.0 || height <= 0.0 {
            return Ok(());
        }
        let style = to_plotters(color).filled();
        self.area
            .draw(&Rectangle::new(
                [(px(x), px(y)), (px(x + width), px(y + height))],
                style,
            ))
            .map_err(draw_err)
    }

    fn stroke_rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba,
        line_width: f64,
    ) -> ChartResult<()> {
        let style = to_plotters(color).stroke_width(line_width.round().max(1.0) as u32);
        self.area
            .draw(&Rectangle::new(
                [(px(x), px(y)), (px(x + width), px(y + height))],
                style,
            ))
            .map_err(draw_err)
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, color: Rgba) -> ChartResult<()> {
        let style = to_plotters(color).filled();
        self.area
            .draw(&Circle::new((px(cx), px(cy)), radius.round().max(0.0) as u32, style))
            .map_err(draw_err)
    }

    fn polyline(&mut self, points: &[(f64, f64)], color: Rgba, line_width: f64) -> ChartResult<()> {
        let path: Vec<(i32, i32)> = points.iter().map(|(x, y)| (px(*x), px(*y))).collect();
        let style = to_plotters(color).stroke_width(line_width.round().max(1.0) as u32);
        self.area
            .draw(&PathElement::new(path, style))
            .map_err(draw_err)
    }

    fn text(&mut self, x: f64, y: f64, text: &str, font: &FontSpec, color: Rgba) -> ChartResult<()> {
        let color = to_plotters(color);
        // plotters anchors the bottom of the glyph box, not the baseline, so text with
        // descenders sits up to one descent above the layout baseline
        let style = TextStyle::from(font_desc(font))
            .color(&color)
            .pos(Pos::new(HPos::Left, VPos::Bottom));
        self.area
            .draw_text(text, &style, (px(x), px(y)))
            .map_err(draw_err)
    }
}
