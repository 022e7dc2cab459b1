//! Serializes recorded canvas pages and imported source pages into one PDF.

use crate::canvas::{Command, Document, Page};
use crate::embed::{LoadedSource, SourceCatalog, inherited_attr, page_box};
use crate::error::ReportError;
use crate::font::{FontProgram, FontRegistry, FontStyle, RegisteredFont, encode_winansi};
use crate::types::{Color, Pt, Size};
use chrono::NaiveDateTime;
use lopdf::{
    Dictionary as LoDictionary, Document as LoDocument, Object as LoObject,
    ObjectId as LoObjectId, Stream as LoStream, StringFormat, dictionary,
};
use std::collections::BTreeMap;

const PRODUCER: &str = concat!("ledgerdoc ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct PdfMetadata {
    pub title: String,
    pub created: NaiveDateTime,
}

/// Form XObject made from one imported source page.
#[derive(Debug, Clone, Copy)]
struct FormRef {
    id: LoObjectId,
    bbox: [f32; 4],
}

fn lopdf_err(err: lopdf::Error) -> ReportError {
    ReportError::Output(format!("pdf write error: {err}"))
}

/// Writes `document` with every page in `catalog` that it references.
pub fn write_pdf(
    document: &Document,
    catalog: SourceCatalog,
    fonts: &FontRegistry,
    meta: &PdfMetadata,
) -> Result<Vec<u8>, ReportError> {
    let mut out = LoDocument::with_version("1.7");

    let mut forms: BTreeMap<String, FormRef> = BTreeMap::new();
    for source in catalog.into_used_sources() {
        import_source(&mut out, source, &mut forms)?;
    }

    let mut font_dict = LoDictionary::new();
    for style in FontStyle::ALL {
        let font_id = add_font(&mut out, fonts.font(style));
        font_dict.set(style.resource_name(), font_id);
    }
    let font_dict_id = out.add_object(font_dict);

    let pages_id = out.new_object_id();
    let mut kids: Vec<LoObject> = Vec::with_capacity(document.pages.len());
    let mut bookmarks: Vec<(String, LoObjectId)> = Vec::new();
    for page in &document.pages {
        let content = render_page(page, document.page_size, &forms);
        let content_id = out.add_object(LoStream::new(dictionary! {}, content.into_bytes()));

        let mut xobjects = LoDictionary::new();
        for resource_id in page.form_resources() {
            let form = forms.get(resource_id).ok_or_else(|| {
                ReportError::Output(format!("page references unknown source page {resource_id}"))
            })?;
            xobjects.set(resource_id, form.id);
        }
        let mut resources = dictionary! { "Font" => font_dict_id };
        if !xobjects.is_empty() {
            resources.set("XObject", xobjects);
        }

        let page_id = out.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                pt_object(document.page_size.width),
                pt_object(document.page_size.height),
            ],
            "Contents" => content_id,
            "Resources" => resources,
        });
        bookmarks.extend(page.bookmarks().map(|title| (title.to_string(), page_id)));
        kids.push(LoObject::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    out.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );

    let mut catalog_dict = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(outlines_id) = add_outline(&mut out, &bookmarks) {
        catalog_dict.set("Outlines", outlines_id);
        catalog_dict.set("PageMode", "UseOutlines");
    }
    let catalog_id = out.add_object(catalog_dict);
    out.trailer.set("Root", catalog_id);

    let info_id = out.add_object(dictionary! {
        "Title" => text_string(&meta.title),
        "Producer" => text_string(PRODUCER),
        "CreationDate" => LoObject::string_literal(
            meta.created.format("D:%Y%m%d%H%M%S").to_string(),
        ),
    });
    out.trailer.set("Info", info_id);

    out.prune_objects();
    out.renumber_objects();
    out.compress();

    let mut bytes = Vec::new();
    out.save_to(&mut bytes)
        .map_err(|err| ReportError::Output(format!("pdf write error: {err}")))?;
    Ok(bytes)
}

/// Moves the objects of `source` into `dst` and wraps each used page into a
/// form XObject.
fn import_source(
    dst: &mut LoDocument,
    mut source: LoadedSource,
    forms: &mut BTreeMap<String, FormRef>,
) -> Result<(), ReportError> {
    tracing::debug!(path = %source.path.display(), pages = source.used.len(), "importing source pages");
    let start_id = dst.max_id + 1;
    source.doc.renumber_objects_with(start_id);
    let page_ids: Vec<LoObjectId> = source.doc.get_pages().into_values().collect();
    if source.doc.max_id > dst.max_id {
        dst.max_id = source.doc.max_id;
    }
    dst.objects.extend(std::mem::take(&mut source.doc.objects));

    for used in &source.used {
        let Some(page_id) = page_ids.get(used.page_number.wrapping_sub(1)).copied() else {
            return Err(ReportError::Output(format!(
                "{}: page {} vanished during import",
                source.path.display(),
                used.page_number
            )));
        };
        let page = dst
            .get_object(page_id)
            .and_then(LoObject::as_dict)
            .map_err(lopdf_err)?
            .clone();
        let content = dst.get_page_content(page_id).map_err(lopdf_err)?;
        let bbox = page_box(dst, &page).unwrap_or_else(|| {
            let a4 = Size::a4();
            [0.0, 0.0, a4.width.to_f32(), a4.height.to_f32()]
        });
        let resources = inherited_attr(dst, &page, b"Resources")
            .unwrap_or_else(|| LoObject::Dictionary(LoDictionary::new()));

        let form_id = dst.add_object(LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "FormType" => 1,
                "BBox" => bbox.iter().map(|v| LoObject::Real((*v).into())).collect::<Vec<_>>(),
                "Resources" => resources,
            },
            content,
        ));
        forms.insert(used.resource_id.clone(), FormRef { id: form_id, bbox });
    }
    Ok(())
}

fn add_font(out: &mut LoDocument, font: &RegisteredFont) -> LoObjectId {
    match &font.program {
        FontProgram::Base14(name) => out.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => *name,
            "Encoding" => "WinAnsiEncoding",
        }),
        FontProgram::TrueType(data) => {
            let metrics = &font.metrics;
            let file_id = out.add_object(LoStream::new(
                dictionary! { "Length1" => data.len() as i64 },
                data.clone(),
            ));

            let mut flags: i64 = 32;
            if metrics.is_fixed_pitch {
                flags |= 1;
            }
            let descriptor_id = out.add_object(dictionary! {
                "Type" => "FontDescriptor",
                "FontName" => font.name.as_str(),
                "Flags" => flags,
                "FontBBox" => vec![
                    (metrics.bbox.0 as i64).into(),
                    (metrics.bbox.1 as i64).into(),
                    (metrics.bbox.2 as i64).into(),
                    (metrics.bbox.3 as i64).into(),
                ],
                "ItalicAngle" => metrics.italic_angle as i64,
                "Ascent" => metrics.ascent as i64,
                "Descent" => metrics.descent as i64,
                "CapHeight" => metrics.cap_height as i64,
                "StemV" => metrics.stem_v as i64,
                "MissingWidth" => metrics.missing_width as i64,
                "FontFile2" => file_id,
            });
            let widths: Vec<LoObject> = metrics
                .widths
                .iter()
                .map(|width| LoObject::Integer(*width as i64))
                .collect();
            out.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => font.name.as_str(),
                "FirstChar" => 32,
                "LastChar" => 255,
                "Widths" => widths,
                "FontDescriptor" => descriptor_id,
                "Encoding" => "WinAnsiEncoding",
            })
        }
    }
}

/// Flat outline, one entry per bookmark, in page order.
fn add_outline(out: &mut LoDocument, bookmarks: &[(String, LoObjectId)]) -> Option<LoObjectId> {
    if bookmarks.is_empty() {
        return None;
    }
    let outlines_id = out.new_object_id();
    let item_ids: Vec<LoObjectId> = bookmarks.iter().map(|_| out.new_object_id()).collect();
    for (index, ((title, page_id), item_id)) in bookmarks.iter().zip(&item_ids).enumerate() {
        let mut item = dictionary! {
            "Title" => text_string(title),
            "Parent" => outlines_id,
            "Dest" => vec![LoObject::Reference(*page_id), "Fit".into()],
        };
        if index > 0 {
            item.set("Prev", item_ids[index - 1]);
        }
        if let Some(next) = item_ids.get(index + 1) {
            item.set("Next", *next);
        }
        out.objects.insert(*item_id, LoObject::Dictionary(item));
    }
    out.objects.insert(
        outlines_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => item_ids[0],
            "Last" => item_ids[item_ids.len() - 1],
            "Count" => item_ids.len() as i64,
        }),
    );
    Some(outlines_id)
}

/// PDF text string: literal for ASCII, UTF-16BE with byte order mark otherwise.
fn text_string(text: &str) -> LoObject {
    if text.is_ascii() {
        return LoObject::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    LoObject::String(bytes, StringFormat::Hexadecimal)
}

fn pt_object(value: Pt) -> LoObject {
    LoObject::Real(value.to_f32().into())
}

/// Content stream of one page. Canvas coordinates grow downwards from the
/// top-left corner; PDF user space grows upwards from the bottom-left.
fn render_page(page: &Page, page_size: Size, forms: &BTreeMap<String, FormRef>) -> String {
    let height = page_size.height;
    let flip = |y: Pt| height - y;
    let mut out = String::new();
    let mut font = (FontStyle::Regular, Pt::from_f32(12.0));

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => out.push_str("q\n"),
            Command::RestoreState => out.push_str("Q\n"),
            Command::SetFillColor(color) => {
                out.push_str(&format!("{} rg\n", fmt_color(*color)));
            }
            Command::SetStrokeColor(color) => {
                out.push_str(&format!("{} RG\n", fmt_color(*color)));
            }
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetDash { pattern, phase } => {
                let items = pattern.iter().map(|v| fmt_pt(*v)).collect::<Vec<_>>().join(" ");
                out.push_str(&format!("[{}] {} d\n", items, fmt_pt(*phase)));
            }
            Command::SetFont { style, size } => font = (*style, *size),
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(flip(*y))));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(flip(*y))));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} {} {} c\n",
                    fmt_pt(*x1),
                    fmt_pt(flip(*y1)),
                    fmt_pt(*x2),
                    fmt_pt(flip(*y2)),
                    fmt_pt(*x),
                    fmt_pt(flip(*y))
                ));
            }
            Command::ClosePath => out.push_str("h\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::FillStroke => out.push_str("B\n"),
            Command::DrawString { x, y, text } => {
                out.push_str(&format!(
                    "BT /{} {} Tf {} {} Td ({}) Tj ET\n",
                    font.0.resource_name(),
                    fmt_pt(font.1),
                    fmt_pt(*x),
                    fmt_pt(flip(*y)),
                    escape_winansi(text)
                ));
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re f\n",
                    fmt_pt(*x),
                    fmt_pt(flip(*y + *height)),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::StrokeRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re S\n",
                    fmt_pt(*x),
                    fmt_pt(flip(*y + *height)),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawForm {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let Some(form) = forms.get(resource_id) else {
                    continue;
                };
                let box_w = form.bbox[2] - form.bbox[0];
                let box_h = form.bbox[3] - form.bbox[1];
                if box_w <= 0.0 || box_h <= 0.0 {
                    continue;
                }
                let sx = width.to_f32() / box_w;
                let sy = height.to_f32() / box_h;
                let tx = x.to_f32() - form.bbox[0] * sx;
                let ty = flip(*y + *height).to_f32() - form.bbox[1] * sy;
                out.push_str(&format!(
                    "q {} 0 0 {} {} {} cm /{} Do Q\n",
                    fmt_scale(sx),
                    fmt_scale(sy),
                    fmt_scale(tx),
                    fmt_scale(ty),
                    resource_id
                ));
            }
            Command::Bookmark { .. } => {}
        }
    }
    out
}

/// WinAnsi bytes as the body of a literal string.
fn escape_winansi(text: &str) -> String {
    let mut out = String::new();
    for byte in encode_winansi(text) {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(byte as char),
            _ => out.push_str(&format!("\\{byte:03o}")),
        }
    }
    out
}

fn fmt_color(color: Color) -> String {
    [color.r, color.g, color.b]
        .iter()
        .map(|v| format_milli((v.clamp(0.0, 1.0) * 1000.0).round() as i64))
        .collect::<Vec<_>>()
        .join(" ")
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn fmt_scale(value: f32) -> String {
    let mut s = format!("{value:.6}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" { "0".to_string() } else { s }
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{sign}{int_part}")
    } else {
        let mut s = format!("{sign}{int_part}.{frac_part:03}");
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::pdfinspect::tests::make_pdf_bytes;
    use crate::types::Rect;
    use chrono::NaiveDate;

    fn meta() -> PdfMetadata {
        PdfMetadata {
            title: "Belege 2023 – Übersicht".to_string(),
            created: NaiveDate::from_ymd_opt(2024, 2, 29)
                .and_then(|d| d.and_hms_opt(13, 5, 9))
                .expect("timestamp"),
        }
    }

    #[test]
    fn numbers_are_trimmed() {
        assert_eq!(format_milli(0), "0");
        assert_eq!(format_milli(12_500), "12.5");
        assert_eq!(format_milli(-1_005), "-1.005");
        assert_eq!(fmt_scale(0.5), "0.5");
        assert_eq!(fmt_scale(2.0), "2");
        assert_eq!(fmt_color(Color::gray(0.92)), "0.92 0.92 0.92");
    }

    #[test]
    fn strings_are_escaped_as_winansi() {
        assert_eq!(escape_winansi("a(b)\\"), "a\\(b\\)\\\\");
        assert_eq!(escape_winansi("Gebühr – 5 €"), "Geb\\374hr \\226 5 \\200");
        assert_eq!(escape_winansi("\u{4E2D}"), "?");
    }

    #[test]
    fn content_is_flipped_to_bottom_left_origin() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_font(FontStyle::Bold, Pt::from_f32(7.0));
        canvas.draw_string(Pt::from_f32(10.0), Pt::from_f32(20.0), "Hi");
        canvas.draw_rect(Rect::new(
            Pt::ZERO,
            Pt::ZERO,
            Pt::from_f32(5.0),
            Pt::from_f32(2.0),
        ));
        let doc = canvas.finish();
        let content = render_page(&doc.pages[0], doc.page_size, &BTreeMap::new());
        let height = Size::a4().height;
        assert!(content.contains(&format!(
            "BT /F3 7 Tf 10 {} Td (Hi) Tj ET",
            fmt_pt(height - Pt::from_f32(20.0))
        )));
        assert!(content.contains(&format!("0 {} 5 2 re f", fmt_pt(height - Pt::from_f32(2.0)))));
    }

    #[test]
    fn writes_pages_outline_and_info() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.bookmark("first");
        canvas.draw_string(Pt::from_f32(10.0), Pt::from_f32(20.0), "one");
        canvas.show_page();
        canvas.draw_string(Pt::from_f32(10.0), Pt::from_f32(20.0), "two");
        canvas.show_page();
        let doc = canvas.finish();

        let bytes = write_pdf(&doc, SourceCatalog::new(), &FontRegistry::helvetica(), &meta())
            .expect("write");
        let pdf = LoDocument::load_mem(&bytes).expect("parse output");
        assert_eq!(pdf.get_pages().len(), 2);

        let catalog = pdf
            .trailer
            .get(b"Root")
            .and_then(LoObject::as_reference)
            .and_then(|id| pdf.get_dictionary(id))
            .expect("catalog");
        let outlines = catalog
            .get(b"Outlines")
            .and_then(LoObject::as_reference)
            .and_then(|id| pdf.get_dictionary(id))
            .expect("outlines");
        assert_eq!(outlines.get(b"Count").and_then(LoObject::as_i64).expect("count"), 1);

        let info = pdf
            .trailer
            .get(b"Info")
            .and_then(LoObject::as_reference)
            .and_then(|id| pdf.get_dictionary(id))
            .expect("info");
        let created = info.get(b"CreationDate").and_then(LoObject::as_str).expect("date");
        assert_eq!(created, b"D:20240229130509");
    }

    #[test]
    fn imported_pages_become_form_xobjects() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("src.pdf");
        std::fs::write(&path, make_pdf_bytes(2, 612, 792)).expect("write source");
        let mut sources = SourceCatalog::new();
        let imported = sources.import_page(&path, 2).expect("import");

        let mut canvas = Canvas::new(Size::a4());
        canvas.draw_form(
            Rect::new(
                Pt::from_f32(20.0),
                Pt::from_f32(100.0),
                Pt::from_f32(306.0),
                Pt::from_f32(396.0),
            ),
            imported.resource_id.clone(),
        );
        let doc = canvas.finish();
        let bytes = write_pdf(&doc, sources, &FontRegistry::helvetica(), &meta()).expect("write");

        let pdf = LoDocument::load_mem(&bytes).expect("parse output");
        let pages = pdf.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = *pages.get(&1).expect("page 1");
        let content = String::from_utf8(pdf.get_page_content(page_id).expect("content"))
            .expect("ascii content");
        assert!(content.contains(&format!("/{} Do", imported.resource_id)));
        assert!(content.contains("q 0.5 0 0 0.5 20"));

        let xobjects = pdf
            .get_dictionary(page_id)
            .and_then(|page| page.get(b"Resources"))
            .and_then(LoObject::as_dict)
            .expect("page resources")
            .get(b"XObject")
            .and_then(LoObject::as_dict)
            .expect("xobjects");
        let form_id = xobjects
            .get(imported.resource_id.as_bytes())
            .and_then(LoObject::as_reference)
            .expect("form ref");
        let form = pdf
            .get_object(form_id)
            .and_then(LoObject::as_stream)
            .expect("form stream");
        assert_eq!(
            form.dict.get(b"Subtype").and_then(LoObject::as_name).expect("subtype"),
            b"Form"
        );
        let mut form = form.clone();
        let _ = form.decompress();
        assert!(String::from_utf8_lossy(&form.content).contains("PAGE 2"));
    }
}
