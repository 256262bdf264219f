//! Printable label documents.
//!
//! Both documents are A4 and use the built-in Helvetica faces, so no font
//! files are needed. QR codes are drawn as filled vector squares.

use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, Greyscale, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Polygon,
};

use crate::config::MAX_QR_MARGIN;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::render::qr::QrMatrix;
use crate::view::SheetLayout;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const PT_TO_MM: f32 = 0.352_778;

/// 50 pt page margin.
const MARGIN: f32 = 50.0 * PT_TO_MM;

/// Rough Helvetica advance width as a fraction of the font size.
const REGULAR_ADVANCE: f32 = 0.52;
const BOLD_ADVANCE: f32 = 0.58;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference) -> Result<Self> {
        Ok(Self {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
            bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?,
        })
    }
}

#[allow(clippy::needless_pass_by_value)]
fn pdf_error(err: printpdf::Error) -> Error {
    Error::render("pdf", err.to_string())
}

#[allow(clippy::cast_precision_loss)]
fn text_width(text: &str, size_pt: f32, advance: f32) -> f32 {
    text.chars().count() as f32 * size_pt * advance * PT_TO_MM
}

/// Write `text` horizontally centered on `center_x` with its baseline at `y`.
fn centered_text(
    layer: &PdfLayerReference,
    text: &str,
    size_pt: f32,
    center_x: f32,
    y: f32,
    font: &IndirectFontRef,
    advance: f32,
) {
    let x = center_x - text_width(text, size_pt, advance) / 2.0;
    layer.use_text(text, size_pt, Mm(x), Mm(y), font);
}

/// Draw `matrix` as a square `side` mm wide with its top-left at (`left`, `top`).
#[allow(clippy::cast_precision_loss)]
fn draw_qr(layer: &PdfLayerReference, matrix: &QrMatrix, left: f32, top: f32, side: f32, margin: usize) {
    let total = (matrix.width() + 2 * margin) as f32;
    let module = side / total;

    layer.set_fill_color(Color::Greyscale(Greyscale::new(0.0, None)));
    for (x, y) in matrix.dark_modules() {
        let x0 = left + (x + margin) as f32 * module;
        let y0 = top - (y + margin) as f32 * module;
        let ring = vec![
            (Point::new(Mm(x0), Mm(y0)), false),
            (Point::new(Mm(x0 + module), Mm(y0)), false),
            (Point::new(Mm(x0 + module), Mm(y0 - module)), false),
            (Point::new(Mm(x0), Mm(y0 - module)), false),
        ];
        layer.add_polygon(Polygon {
            rings: vec![ring],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
    }
}

/// Render the single-label document for `entry`.
///
/// Layout, top to bottom: title (name, or egg id), the QR code of the link,
/// `Cage: ...`, `Egg ID: ...`, then the link in small print.
///
/// # Errors
///
/// Returns a render error if the QR code or the document cannot be produced.
pub fn label_pdf(entry: &Entry, qr_margin: u32) -> Result<Vec<u8>> {
    let matrix = QrMatrix::encode(&entry.link)?;
    let (doc, page, layer) = PdfDocument::new(
        format!("{} label", entry.egg_id),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "label".to_string(),
    );
    let fonts = Fonts::load(&doc)?;
    let layer = doc.get_page(page).get_layer(layer);
    let center = PAGE_WIDTH / 2.0;

    let mut y = PAGE_HEIGHT - MARGIN - 24.0 * PT_TO_MM;
    centered_text(&layer, entry.title(), 24.0, center, y, &fonts.bold, BOLD_ADVANCE);

    let qr_side = 200.0 * PT_TO_MM;
    let qr_top = y - 12.0 * PT_TO_MM;
    draw_qr(&layer, &matrix, center - qr_side / 2.0, qr_top, qr_side, qr_margin.min(MAX_QR_MARGIN) as usize);
    y = qr_top - qr_side - 12.0 * PT_TO_MM - 16.0 * PT_TO_MM;

    centered_text(&layer, &format!("Cage: {}", entry.cage), 16.0, center, y, &fonts.regular, REGULAR_ADVANCE);
    y -= 22.0 * PT_TO_MM;
    centered_text(&layer, &format!("Egg ID: {}", entry.egg_id), 14.0, center, y, &fonts.regular, REGULAR_ADVANCE);
    y -= 20.0 * PT_TO_MM;
    centered_text(&layer, &entry.link, 10.0, center, y, &fonts.regular, REGULAR_ADVANCE);

    doc.save_to_bytes().map_err(pdf_error)
}

/// Render every placement of `layout` onto as many pages as it needs.
///
/// Each cell carries a QR code with the title and egg id beneath it. An
/// empty layout still produces a single blank page.
///
/// # Errors
///
/// Returns a render error if a QR code or the document cannot be produced.
#[allow(clippy::cast_precision_loss)]
pub fn sheet_pdf(layout: &SheetLayout, qr_margin: u32) -> Result<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new("Label sheet", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "sheet");
    let fonts = Fonts::load(&doc)?;

    let cell_w = (PAGE_WIDTH - 2.0 * MARGIN) / layout.columns() as f32;
    let cell_h = (PAGE_HEIGHT - 2.0 * MARGIN) / layout.rows() as f32;
    let caption = 9.0 * PT_TO_MM;
    let qr_side = cell_w.min(cell_h - 3.0 * caption) * 0.9;

    for (index, placements) in layout.pages().iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "sheet");
            doc.get_page(page).get_layer(layer)
        };

        for placement in placements {
            let left = MARGIN + placement.position.column as f32 * cell_w;
            let top = PAGE_HEIGHT - MARGIN - placement.position.row as f32 * cell_h;
            let center = left + cell_w / 2.0;

            let matrix = QrMatrix::encode(&placement.entry.link)?;
            draw_qr(&layer, &matrix, center - qr_side / 2.0, top, qr_side, qr_margin.min(MAX_QR_MARGIN) as usize);

            let mut y = top - qr_side - caption;
            centered_text(&layer, placement.entry.title(), 9.0, center, y, &fonts.bold, BOLD_ADVANCE);
            y -= caption * 1.2;
            let detail = format!("{} / {}", placement.entry.egg_id, placement.entry.cage);
            centered_text(&layer, &detail, 8.0, center, y, &fonts.regular, REGULAR_ADVANCE);
        }
    }

    doc.save_to_bytes().map_err(pdf_error)
}
