//! Multi-page report documents. Pages accumulate in memory and the PDF is
//! produced once, by an explicit `finalize`.

use bytes::Bytes;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Polygon,
    Pt, Rgb, TextMatrix,
};

use crate::chart::{ChartPage, Shape, PAGE_SIZE};
use crate::error::{EtlError, Result};

/// Points per pixel: a 1200x800 px chart becomes a 12x8 inch page.
const PT_PER_PX: f32 = 0.72;

#[derive(Debug)]
pub struct ReportDocument {
    name: String,
    pages: Vec<ChartPage>,
    pdf: Option<Bytes>,
}

impl ReportDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pages: Vec::new(),
            pdf: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.pdf.is_some()
    }

    pub fn push_page(&mut self, page: ChartPage) -> Result<()> {
        if self.is_finalized() {
            return Err(EtlError::Pdf(format!(
                "cannot add a page to '{}' after it was finalized",
                self.name
            )));
        }
        self.pages.push(page);
        Ok(())
    }

    /// Renders the PDF. Calling it again is a no-op.
    pub fn finalize(&mut self) -> Result<()> {
        if self.pdf.is_none() {
            self.pdf = Some(Bytes::from(render_pdf(&self.name, &self.pages)?));
        }
        Ok(())
    }

    pub fn pdf_bytes(&self) -> Option<&Bytes> {
        self.pdf.as_ref()
    }
}

fn pdf_error(err: printpdf::Error) -> EtlError {
    EtlError::Pdf(err.to_string())
}

fn page_dimensions(size: (u32, u32)) -> (Mm, Mm) {
    (
        Mm::from(Pt(size.0 as f32 * PT_PER_PX)),
        Mm::from(Pt(size.1 as f32 * PT_PER_PX)),
    )
}

/// A document without pages still gets one blank page; PDFs cannot be empty.
fn render_pdf(title: &str, pages: &[ChartPage]) -> Result<Vec<u8>> {
    let first_size = pages.first().map(|page| page.size).unwrap_or(PAGE_SIZE);
    let (width, height) = page_dimensions(first_size);
    let (doc, first_page, first_layer) = PdfDocument::new(title, width, height, "chart");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;

    for (idx, page) in pages.iter().enumerate() {
        let layer = if idx == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (width, height) = page_dimensions(page.size);
            let (page_idx, layer_idx) = doc.add_page(width, height, "chart");
            doc.get_page(page_idx).get_layer(layer_idx)
        };
        draw_page(&layer, &font, page);
    }

    doc.save_to_bytes().map_err(pdf_error)
}

fn pdf_color((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    ))
}

fn draw_page(layer: &PdfLayerReference, font: &IndirectFontRef, page: &ChartPage) {
    let page_height = page.size.1 as f32 * PT_PER_PX;
    let to_point = |(x, y): (f64, f64)| Point {
        x: Pt(x as f32 * PT_PER_PX),
        y: Pt(page_height - y as f32 * PT_PER_PX),
    };

    for shape in &page.shapes {
        match shape {
            Shape::Polyline {
                points,
                color,
                width,
            } => {
                layer.set_outline_color(pdf_color(*color));
                layer.set_outline_thickness(*width as f32 * PT_PER_PX);
                layer.add_line(Line {
                    points: points.iter().map(|p| (to_point(*p), false)).collect(),
                    is_closed: false,
                });
            }
            Shape::Polygon { points, color } => {
                layer.set_fill_color(pdf_color(*color));
                layer.add_polygon(Polygon {
                    rings: vec![points.iter().map(|p| (to_point(*p), false)).collect()],
                    mode: PaintMode::Fill,
                    winding_order: WindingOrder::NonZero,
                });
            }
            Shape::Text {
                text,
                position,
                size,
                rotation,
                color,
            } => {
                let origin = to_point(*position);
                layer.set_fill_color(pdf_color(*color));
                layer.begin_text_section();
                layer.set_font(font, *size as f32 * PT_PER_PX);
                // PDF angles run counter-clockwise with the y axis pointing up.
                layer.set_text_matrix(TextMatrix::TranslateRotate(
                    origin.x,
                    origin.y,
                    ((360.0 - rotation) % 360.0) as f32,
                ));
                layer.write_text(text.as_str(), font);
                layer.end_text_section();
            }
        }
    }
}
