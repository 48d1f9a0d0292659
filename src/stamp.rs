//! Signature stamping: key the canvas background out of the drawn signature
//! and overlay it, a label and the signing time onto page one of the payslip.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDateTime;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{Rgba, RgbaImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::io::Write;

use crate::error::{Error, Result};

/// Channel value above which a pixel counts as canvas background
pub const BACKGROUND_THRESHOLD: u8 = 200;

/// Fixed positions of the signature block, in PDF points from the bottom-left
#[derive(Debug, Clone, PartialEq)]
pub struct StampLayout {
    pub label: String,
    pub label_at: (f64, f64),
    pub image_at: (f64, f64),
    pub image_size: (f64, f64),
    pub date_prefix: String,
    pub date_at: (f64, f64),
    pub font_size: f64,
}

impl Default for StampLayout {
    fn default() -> Self {
        StampLayout {
            label: "Assinatura do colaborador:".to_string(),
            label_at: (100.0, 250.0),
            image_at: (100.0, 180.0),
            image_size: (200.0, 50.0),
            date_prefix: "Data e hora:".to_string(),
            date_at: (100.0, 140.0),
            font_size: 12.0,
        }
    }
}

/// Name of the signed copy uploaded for `employee`
pub fn signed_file_name(employee: &str) -> String {
    format!("{}_holerite_assinado.pdf", employee)
}

/// Decode a canvas export such as `data:image/png;base64,iVBOR...`
///
/// A bare base64 payload without the `data:` prefix is accepted as well.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let payload = match data_url.split_once(',') {
        Some((meta, payload)) => {
            if !meta.starts_with("data:image/") || !meta.ends_with(";base64") {
                return Err(Error::InvalidSignature(format!(
                    "unsupported data url header {:?}",
                    meta
                )));
            }
            payload
        }
        None => data_url,
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    if bytes.is_empty() {
        return Err(Error::EmptySignature);
    }
    Ok(bytes)
}

/// Make the white canvas background of a signature transparent
///
/// Every pixel whose R, G and B are all above [`BACKGROUND_THRESHOLD`] becomes
/// `(255, 255, 255, 0)`; all other pixels are kept as drawn.
pub fn remove_background(signature: &[u8]) -> Result<RgbaImage> {
    let mut img = image::load_from_memory(signature)?.to_rgba8();

    for pixel in img.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        if r > BACKGROUND_THRESHOLD && g > BACKGROUND_THRESHOLD && b > BACKGROUND_THRESHOLD {
            *pixel = Rgba([255, 255, 255, 0]);
        }
    }

    Ok(img)
}

/// True when at least one pixel is still visible
pub fn has_ink(img: &RgbaImage) -> bool {
    img.pixels().any(|p| p.0[3] > 0)
}

/// Stamp the signature block onto page one and return the new PDF bytes
///
/// Pages other than the first are left untouched.
///
/// # Errors
/// * `Error::Pdf` / `Error::InvalidDocument` when the PDF cannot be read or has no page
/// * `Error::Image` when the signature is not a decodable image
/// * `Error::EmptySignature` when nothing remains after background removal
pub fn sign_pdf(
    pdf: &[u8],
    signature: &[u8],
    signed_at: NaiveDateTime,
    layout: &StampLayout,
) -> Result<Vec<u8>> {
    let img = remove_background(signature)?;
    if !has_ink(&img) {
        return Err(Error::EmptySignature);
    }

    let mut doc = Document::load_mem(pdf)?;
    let page_id = *doc
        .get_pages()
        .get(&1)
        .ok_or_else(|| Error::InvalidDocument("document has no pages".to_string()))?;

    let image_id = add_image_xobject(&mut doc, &img)?;
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut resources = effective_resources(&doc, page_id)?;
    let font_name = register_resource(&doc, &mut resources, "Font", "FSig", font_id)?;
    let image_name = register_resource(&doc, &mut resources, "XObject", "ImSig", image_id)?;

    let date_line = format!(
        "{} {}",
        layout.date_prefix,
        signed_at.format("%d/%m/%Y %H:%M:%S")
    );
    let overlay = overlay_operations(layout, &font_name, &image_name, &date_line);

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    let existing = page.remove(b"Contents");

    let contents = match existing {
        Some(existing) => {
            // Isolate the original drawing so its graphics state ends before the overlay
            let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let mut close = b"Q\n".to_vec();
            close.extend_from_slice(overlay.as_bytes());
            let close_id = doc.add_object(Stream::new(Dictionary::new(), close));

            let mut parts = vec![Object::Reference(open_id)];
            match existing {
                Object::Array(items) => parts.extend(items),
                Object::Reference(id) => match doc.get_object(id)? {
                    // An indirect array is a list of streams, not a stream itself
                    Object::Array(items) => parts.extend(items.iter().cloned()),
                    _ => parts.push(Object::Reference(id)),
                },
                other => parts.push(other),
            }
            parts.push(Object::Reference(close_id));
            Object::Array(parts)
        }
        None => {
            let overlay_id =
                doc.add_object(Stream::new(Dictionary::new(), overlay.into_bytes()));
            Object::Reference(overlay_id)
        }
    };

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", contents);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn overlay_operations(
    layout: &StampLayout,
    font_name: &str,
    image_name: &str,
    date_line: &str,
) -> String {
    let (lx, ly) = layout.label_at;
    let (ix, iy) = layout.image_at;
    let (iw, ih) = layout.image_size;
    let (dx, dy) = layout.date_at;
    let size = layout.font_size;

    format!(
        "q\n0 g\n\
         BT /{font} {size} Tf {lx} {ly} Td ({label}) Tj ET\n\
         q {iw} 0 0 {ih} {ix} {iy} cm /{image} Do Q\n\
         BT /{font} {size} Tf {dx} {dy} Td ({date}) Tj ET\n\
         Q\n",
        font = font_name,
        image = image_name,
        label = pdf_literal(&layout.label),
        date = pdf_literal(date_line),
    )
}

/// Escape text for a PDF literal string in WinAnsi encoding
///
/// Characters outside Latin-1 are replaced by `?`.
pub fn pdf_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => {
                let code = c as u32;
                if (0xA0..=0xFF).contains(&code) {
                    out.push_str(&format!("\\{:03o}", code));
                } else {
                    out.push('?');
                }
            }
        }
    }
    out
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Embed an RGBA image as an RGB XObject with a DeviceGray soft mask
fn add_image_xobject(doc: &mut Document, img: &RgbaImage) -> Result<ObjectId> {
    let (width, height) = img.dimensions();

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in img.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        deflate(&alpha)?,
    ));

    Ok(doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
            "SMask" => Object::Reference(smask_id),
        },
        deflate(&rgb)?,
    )))
}

fn resolve_dict(doc: &Document, object: &Object) -> Result<Dictionary> {
    match object {
        Object::Dictionary(dict) => Ok(dict.clone()),
        Object::Reference(id) => Ok(doc.get_object(*id)?.as_dict()?.clone()),
        _ => Err(Error::InvalidDocument(
            "resource entry is not a dictionary".to_string(),
        )),
    }
}

/// Resources of a page as an owned dictionary, following `Parent` inheritance
///
/// Shared or inherited resource dictionaries are copied so that stamping page
/// one never changes what other pages see.
fn effective_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut current = page_id;
    // Bounded walk up the page tree in case of a Parent cycle
    for _ in 0..64 {
        let node = doc.get_object(current)?.as_dict()?;
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        match node.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => break,
        }
    }
    Ok(Dictionary::new())
}

/// Add `id` under a fresh name in the `category` sub-dictionary and return the name
fn register_resource(
    doc: &Document,
    resources: &mut Dictionary,
    category: &str,
    base_name: &str,
    id: ObjectId,
) -> Result<String> {
    let mut entries = match resources.get(category.as_bytes()) {
        Ok(object) => resolve_dict(doc, object)?,
        Err(_) => Dictionary::new(),
    };

    let mut name = base_name.to_string();
    let mut suffix = 1;
    while entries.has(name.as_bytes()) {
        name = format!("{}{}", base_name, suffix);
        suffix += 1;
    }

    entries.set(name.as_bytes().to_vec(), Object::Reference(id));
    resources.set(category.as_bytes().to_vec(), Object::Dictionary(entries));
    Ok(name)
}
