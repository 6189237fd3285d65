// Renderer: turns a layout and the trend history into an ordered list of draw commands.
// Painting is a separate step (`replay`) against any `Surface`.
use crate::color::{resolve, Rgba};
use crate::error::ChartResult;
use crate::history::HistorySnapshot;
use crate::layout::{ElementGeometry, FontSpec, LayoutOutput};
use crate::parser::BarOrientation;
use serde::Serialize;
use tracing::warn;

/// Opacity applied to circles and bar fills, on top of the color's own alpha.
pub const ELEMENT_OPACITY: f64 = 0.5;
pub const TREND_LINE_WIDTH: f64 = 2.0;
pub const OUTLINE_WIDTH: f64 = 1.0;
pub const OVERFLOW_GLYPH: &str = "\u{bb}";
const OVERFLOW_OPACITY: f64 = 0.6;
const OVERFLOW_FONT_FAMILY: &str = "Sans";
const OVERFLOW_RIGHT_CLEARANCE: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba,
    },
    StrokeRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba,
        line_width: f64,
    },
    FillCircle {
        cx: f64,
        cy: f64,
        radius: f64,
        color: Rgba,
    },
    Polyline {
        points: Vec<(f64, f64)>,
        color: Rgba,
        line_width: f64,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        font: FontSpec,
        color: Rgba,
    },
}

/// Everything about a frame's look that is not geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    pub width: f64,
    pub height: f64,
    pub background: Rgba,
    pub font: FontSpec,
    pub font_color: Rgba,
    pub shadow_color: Option<Rgba>,
}

/// The drawing collaborator: anything that can fill, stroke and print.
pub trait Surface {
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Rgba) -> ChartResult<()>;
    fn stroke_rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba,
        line_width: f64,
    ) -> ChartResult<()>;
    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, color: Rgba) -> ChartResult<()>;
    fn polyline(&mut self, points: &[(f64, f64)], color: Rgba, line_width: f64) -> ChartResult<()>;
    fn text(&mut self, x: f64, y: f64, text: &str, font: &FontSpec, color: Rgba) -> ChartResult<()>;
}

/// Build the full frame: background, trend line, row elements, overflow glyph.
pub fn render_frame(
    layout: &LayoutOutput,
    history: &HistorySnapshot,
    style: &RenderStyle,
) -> Vec<DrawCommand> {
    let mut commands = vec![DrawCommand::FillRect {
        x: 0.0,
        y: 0.0,
        width: style.width,
        height: style.height,
        color: style.background,
    }];

    if let Some(trend) = trend_line(history, style.width, style.height) {
        commands.push(trend);
    }

    for row in &layout.rows {
        for element in &row.elements {
            draw_element(element, style, &mut commands);
        }
    }

    if let Some(x) = layout.overflow_at {
        commands.push(DrawCommand::Text {
            x: (x + 4.0).min(style.width - OVERFLOW_RIGHT_CLEARANCE),
            y: style.height / 2.0 + style.font.size / 2.0,
            text: OVERFLOW_GLYPH.to_string(),
            font: FontSpec::new(OVERFLOW_FONT_FAMILY, style.font.size + 2.0).bold(),
            color: style.font_color.with_alpha(OVERFLOW_OPACITY),
        });
    }

    commands
}

fn trend_line(history: &HistorySnapshot, width: f64, height: f64) -> Option<DrawCommand> {
    let samples = &history.samples;
    if samples.len() < 2 {
        return None;
    }
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = if max - min == 0.0 { 1.0 } else { max - min };
    let step = width / (samples.len() - 1) as f64;

    let points = samples
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64 * step, height * (1.0 - (s - min) / range)))
        .collect();

    Some(DrawCommand::Polyline {
        points,
        color: resolve(&history.trend_color),
        line_width: TREND_LINE_WIDTH,
    })
}

fn faded(token: &str) -> Rgba {
    let color = resolve(token);
    color.with_alpha(color.a * ELEMENT_OPACITY)
}

fn draw_element(element: &ElementGeometry, style: &RenderStyle, out: &mut Vec<DrawCommand>) {
    match element {
        ElementGeometry::Circle {
            cx,
            cy,
            radius,
            color,
        } => out.push(DrawCommand::FillCircle {
            cx: *cx,
            cy: *cy,
            radius: *radius,
            color: faded(color),
        }),
        ElementGeometry::Bar {
            orientation,
            x,
            y,
            width,
            height,
            ratio,
            bg,
            fg,
        } => {
            out.push(DrawCommand::FillRect {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
                color: faded(bg),
            });
            // Foreground grows from the empty end: bottom for vertical, left for horizontal.
            let fill = match orientation {
                BarOrientation::Vertical => {
                    let fill_height = ratio * height;
                    DrawCommand::FillRect {
                        x: *x,
                        y: y + height - fill_height,
                        width: *width,
                        height: fill_height,
                        color: faded(fg),
                    }
                }
                BarOrientation::Horizontal => DrawCommand::FillRect {
                    x: *x,
                    y: *y,
                    width: ratio * width,
                    height: *height,
                    color: faded(fg),
                },
            };
            out.push(fill);
            out.push(DrawCommand::StrokeRect {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
                color: Rgba::OUTLINE_GRAY,
                line_width: OUTLINE_WIDTH,
            });
        }
        ElementGeometry::Text {
            x,
            baseline,
            content,
            color,
            ..
        } => {
            if let Some(shadow) = style.shadow_color {
                out.push(DrawCommand::Text {
                    x: x + 1.0,
                    y: baseline + 1.0,
                    text: content.clone(),
                    font: style.font.clone(),
                    color: shadow,
                });
            }
            let color = color.as_deref().map(resolve).unwrap_or(style.font_color);
            out.push(DrawCommand::Text {
                x: *x,
                y: *baseline,
                text: content.clone(),
                font: style.font.clone(),
                color,
            });
        }
    }
}

/// Paint commands in order. A failing command is logged and skipped; the rest still draw.
pub fn replay(commands: &[DrawCommand], surface: &mut dyn Surface) -> usize {
    let mut failures = 0;
    for command in commands {
        let result = match command {
            DrawCommand::FillRect {
                x,
                y,
                width,
                height,
                color,
            } => surface.fill_rect(*x, *y, *width, *height, *color),
            DrawCommand::StrokeRect {
                x,
                y,
                width,
                height,
                color,
                line_width,
            } => surface.stroke_rect(*x, *y, *width, *height, *color, *line_width),
            DrawCommand::FillCircle {
                cx,
                cy,
                radius,
                color,
            } => surface.fill_circle(*cx, *cy, *radius, *color),
            DrawCommand::Polyline {
                points,
                color,
                line_width,
            } => surface.polyline(points, *color, *line_width),
            DrawCommand::Text {
                x,
                y,
                text,
                font,
                color,
            } => surface.text(*x, *y, text, font, *color),
        };
        if let Err(e) = result {
            warn!("Draw command failed: {}", e);
            failures += 1;
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChartError;
    use crate::history::{HistoryBuffer, MemoryHistoryStore};
    use crate::layout::{layout, EstimatedText, LayoutParams};
    use crate::parser::parse_output;

    fn style(shadow: bool) -> RenderStyle {
        RenderStyle {
            width: 200.0,
            height: 32.0,
            background: Rgba::BLACK.with_alpha(0.3),
            font: FontSpec::new("Sans", 10.0),
            font_color: Rgba::WHITE,
            shadow_color: shadow.then_some(Rgba::BLACK.with_alpha(0.8)),
        }
    }

    fn frame(text: &str, width: f64, shadow: bool) -> (Vec<DrawCommand>, HistoryBuffer) {
        let mut history = HistoryBuffer::new(Box::new(MemoryHistoryStore::default()));
        let rows = parse_output(text, &mut history);
        let params = LayoutParams::new(width, 32.0, FontSpec::new("Sans", 10.0));
        let out = layout(&rows, &params, &EstimatedText);
        let mut style = style(shadow);
        style.width = width;
        (render_frame(&out, &history.snapshot(), &style), history)
    }

    #[test]
    fn test_draw_order() {
        let (commands, _) = frame("CR:r|BAR:0-100=50:b:r|TXT:Hi", 200.0, false);
        assert_eq!(commands.len(), 6);
        assert!(matches!(
            commands[0],
            DrawCommand::FillRect { x, y, width, height, color }
                if x == 0.0 && y == 0.0 && width == 200.0 && height == 32.0
                    && color == Rgba::BLACK.with_alpha(0.3)
        ));
        assert!(matches!(
            commands[1],
            DrawCommand::FillCircle { color, .. } if color == Rgba::opaque(1.0, 0.0, 0.0).with_alpha(0.5)
        ));
        match (&commands[2], &commands[3], &commands[4]) {
            (
                DrawCommand::FillRect { height: bg_h, color: bg, .. },
                DrawCommand::FillRect { y, height, color: fg, .. },
                DrawCommand::StrokeRect { color: outline, line_width, .. },
            ) => {
                assert_eq!(*bg_h, 30.0);
                assert_eq!(*height, 15.0);
                assert_eq!(*y, 17.0);
                assert_eq!(*bg, Rgba::opaque(0.0, 0.0, 1.0).with_alpha(0.5));
                assert_eq!(*fg, Rgba::opaque(1.0, 0.0, 0.0).with_alpha(0.5));
                assert_eq!(*outline, Rgba::OUTLINE_GRAY);
                assert_eq!(*line_width, 1.0);
            }
            other => panic!("unexpected bar commands {:?}", other),
        }
        assert!(matches!(
            &commands[5],
            DrawCommand::Text { text, color, .. } if text == "Hi" && *color == Rgba::WHITE
        ));
    }

    #[test]
    fn test_horizontal_fill_grows_right() {
        let (commands, _) = frame("HBAR:0-4=1:k:g", 200.0, false);
        match (&commands[1], &commands[2]) {
            (
                DrawCommand::FillRect { x: bx, width: bw, .. },
                DrawCommand::FillRect { x, width, .. },
            ) => {
                assert_eq!(bx, x);
                assert_eq!(*width, bw / 4.0);
            }
            other => panic!("unexpected bar commands {:?}", other),
        }
    }

    #[test]
    fn test_shadow_pass() {
        let (commands, _) = frame("TXTC:g:ok", 200.0, true);
        match (&commands[1], &commands[2]) {
            (
                DrawCommand::Text { x: sx, y: sy, color: shadow, .. },
                DrawCommand::Text { x, y, color, .. },
            ) => {
                assert_eq!(*sx, x + 1.0);
                assert_eq!(*sy, y + 1.0);
                assert_eq!(*shadow, Rgba::BLACK.with_alpha(0.8));
                assert_eq!(*color, Rgba::opaque(0.0, 0.8, 0.0));
            }
            other => panic!("unexpected text commands {:?}", other),
        }
    }

    #[test]
    fn test_trend_line() {
        let (commands, _) = frame("GR:b:42|GR:b:58", 200.0, false);
        assert_eq!(commands.len(), 2);
        match &commands[1] {
            DrawCommand::Polyline {
                points,
                color,
                line_width,
            } => {
                assert_eq!(points, &vec![(0.0, 32.0), (200.0, 0.0)]);
                assert_eq!(*color, Rgba::opaque(0.0, 0.0, 1.0));
                assert_eq!(*line_width, 2.0);
            }
            other => panic!("expected polyline, got {:?}", other),
        }
    }

    #[test]
    fn test_flat_trend_and_single_sample() {
        let (commands, _) = frame("GR:r:5", 200.0, false);
        assert_eq!(commands.len(), 1);

        let (commands, _) = frame("GR:r:5|GR:r:5|GR:r:5", 200.0, false);
        match &commands[1] {
            DrawCommand::Polyline { points, .. } => {
                assert_eq!(points, &vec![(0.0, 32.0), (100.0, 32.0), (200.0, 32.0)]);
            }
            other => panic!("expected polyline, got {:?}", other),
        }
    }

    #[test]
    fn test_overflow_indicator_once() {
        let row = vec!["CR:r"; 8].join("|");
        let (commands, _) = frame(&format!("{}||{}", row, row), 100.0, false);
        let glyphs: Vec<_> = commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Text { text, .. } if text == OVERFLOW_GLYPH))
            .collect();
        assert_eq!(glyphs.len(), 1);
        match glyphs[0] {
            DrawCommand::Text { x, color, font, .. } => {
                assert!(*x <= 100.0 - 15.0);
                assert_eq!(color.a, 0.6);
                assert!(font.bold);
                assert_eq!(font.size, 12.0);
            }
            _ => unreachable!(),
        }
    }

    struct FlakySurface {
        calls: usize,
    }

    impl Surface for FlakySurface {
        fn fill_rect(&mut self, _: f64, _: f64, _: f64, _: f64, _: Rgba) -> ChartResult<()> {
            self.calls += 1;
            Ok(())
        }
        fn stroke_rect(&mut self, _: f64, _: f64, _: f64, _: f64, _: Rgba, _: f64) -> ChartResult<()> {
            self.calls += 1;
            Ok(())
        }
        fn fill_circle(&mut self, _: f64, _: f64, _: f64, _: Rgba) -> ChartResult<()> {
            self.calls += 1;
            Err(ChartError::Draw("no arcs".to_string()))
        }
        fn polyline(&mut self, _: &[(f64, f64)], _: Rgba, _: f64) -> ChartResult<()> {
            self.calls += 1;
            Ok(())
        }
        fn text(&mut self, _: f64, _: f64, _: &str, _: &FontSpec, _: Rgba) -> ChartResult<()> {
            self.calls += 1;
            Ok(())
        }
    }

    #[test]
    fn test_replay_continues_after_failure() {
        let (commands, _) = frame("CR:r|TXT:after", 200.0, false);
        let mut surface = FlakySurface { calls: 0 };
        assert_eq!(replay(&commands, &mut surface), 1);
        assert_eq!(surface.calls, commands.len());
    }
}
