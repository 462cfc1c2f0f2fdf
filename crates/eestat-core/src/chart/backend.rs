//! A plotters backend that records vector shapes instead of rasterizing.
//!
//! Coordinates are pixels with the origin at the top-left corner. The PDF
//! writer maps them onto the page.

use std::convert::Infallible;

use plotters_backend::text_anchor::{HPos, VPos};
use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend, DrawingErrorKind,
    FontTransform,
};

/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH: f64 = 0.55;
/// Baseline offset from the top of a line of text.
const ASCENT: f64 = 0.8;
const CIRCLE_SEGMENTS: usize = 24;

pub type Rgb = (u8, u8, u8);

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Polyline {
        points: Vec<(f64, f64)>,
        color: Rgb,
        width: f64,
    },
    Polygon {
        points: Vec<(f64, f64)>,
        color: Rgb,
    },
    Text {
        text: String,
        /// Start of the baseline.
        position: (f64, f64),
        size: f64,
        /// Clockwise, in degrees.
        rotation: f64,
        color: Rgb,
    },
}

pub fn text_extent(text: &str, size: f64) -> (u32, u32) {
    let width = GLYPH_WIDTH * size * text.chars().count() as f64;
    (width.ceil() as u32, size.ceil() as u32)
}

/// Colors are flattened onto a white page; fully transparent ones draw nothing.
fn flatten(color: BackendColor) -> Option<Rgb> {
    if color.alpha <= 0.0 {
        return None;
    }
    let alpha = color.alpha.min(1.0);
    let blend = |channel: u8| (channel as f64 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
    Some((
        blend(color.rgb.0),
        blend(color.rgb.1),
        blend(color.rgb.2),
    ))
}

fn point(coord: BackendCoord) -> (f64, f64) {
    (coord.0 as f64, coord.1 as f64)
}

pub struct PageRecorder<'a> {
    shapes: &'a mut Vec<Shape>,
    size: (u32, u32),
}

impl<'a> PageRecorder<'a> {
    pub fn new(shapes: &'a mut Vec<Shape>, size: (u32, u32)) -> Self {
        Self { shapes, size }
    }

    fn stroke(&mut self, points: Vec<(f64, f64)>, color: BackendColor, width: u32) {
        if let Some(color) = flatten(color) {
            if points.len() >= 2 {
                self.shapes.push(Shape::Polyline {
                    points,
                    color,
                    width: width.max(1) as f64,
                });
            }
        }
    }

    fn fill(&mut self, points: Vec<(f64, f64)>, color: BackendColor) {
        if let Some(color) = flatten(color) {
            if points.len() >= 3 {
                self.shapes.push(Shape::Polygon { points, color });
            }
        }
    }
}

impl DrawingBackend for PageRecorder<'_> {
    type ErrorType = Infallible;

    fn get_size(&self) -> (u32, u32) {
        self.size
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    fn draw_pixel(
        &mut self,
        coord: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let (x, y) = point(coord);
        self.fill(
            vec![(x, y), (x + 1.0, y), (x + 1.0, y + 1.0), (x, y + 1.0)],
            color,
        );
        Ok(())
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        self.stroke(vec![point(from), point(to)], style.color(), style.stroke_width());
        Ok(())
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let (left, top) = point(upper_left);
        let (right, bottom) = point(bottom_right);
        let corners = vec![(left, top), (right, top), (right, bottom), (left, bottom)];
        if fill {
            self.fill(corners, style.color());
        } else {
            let mut outline = corners;
            outline.push((left, top));
            self.stroke(outline, style.color(), style.stroke_width());
        }
        Ok(())
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let points = path.into_iter().map(point).collect();
        self.stroke(points, style.color(), style.stroke_width());
        Ok(())
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let (cx, cy) = point(center);
        let radius = radius as f64;
        let mut ring: Vec<(f64, f64)> = (0..CIRCLE_SEGMENTS)
            .map(|step| {
                let angle = step as f64 / CIRCLE_SEGMENTS as f64 * std::f64::consts::TAU;
                (cx + radius * angle.cos(), cy + radius * angle.sin())
            })
            .collect();
        if fill {
            self.fill(ring, style.color());
        } else {
            ring.push(ring[0]);
            self.stroke(ring, style.color(), style.stroke_width());
        }
        Ok(())
    }

    fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vertices: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let points = vertices.into_iter().map(point).collect();
        self.fill(points, style.color());
        Ok(())
    }

    fn draw_text<T: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &T,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let Some(color) = flatten(style.color()) else {
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }

        let size = style.size();
        let (width, height) = text_extent(text, size);
        let anchor = style.anchor();
        let dx = match anchor.h_pos {
            HPos::Left => 0,
            HPos::Center => -(width as i32) / 2,
            HPos::Right => -(width as i32),
        };
        let dy = match anchor.v_pos {
            VPos::Top => 0,
            VPos::Center => -(height as i32) / 2,
            VPos::Bottom => -(height as i32),
        };

        // Anchor offsets are applied in text space and then rotated about `pos`.
        let transform = style.transform();
        let baseline = dy + (ASCENT * size).round() as i32;
        let (ox, oy) = transform.transform(dx, baseline);
        let rotation = match transform {
            FontTransform::None => 0.0,
            FontTransform::Rotate90 => 90.0,
            FontTransform::Rotate180 => 180.0,
            FontTransform::Rotate270 => 270.0,
        };

        self.shapes.push(Shape::Text {
            text: text.to_string(),
            position: ((pos.0 + ox) as f64, (pos.1 + oy) as f64),
            size,
            rotation,
            color,
        });
        Ok(())
    }

    fn estimate_text_size<T: BackendTextStyle>(
        &self,
        text: &str,
        style: &T,
    ) -> Result<(u32, u32), DrawingErrorKind<Infallible>> {
        Ok(text_extent(text, style.size()))
    }
}
