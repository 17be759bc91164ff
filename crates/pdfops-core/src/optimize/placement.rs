//! Effective resolution of placed images
//!
//! Walks every page content stream, tracking the current transformation
//! matrix, and records for each image XObject the highest pixel density at
//! which it is drawn. Form XObjects are followed with their own matrix and
//! resources.

use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Nesting limit for form XObjects drawing other forms
const MAX_FORM_DEPTH: usize = 8;

/// Nesting limit when walking up the page tree for inherited resources
const MAX_TREE_DEPTH: usize = 32;

/// Affine transform `[a b c d e f]` in PDF row-vector convention
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix([f64; 6]);

impl Matrix {
    pub(crate) const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() != 6 {
            return None;
        }
        let mut values = [0.0; 6];
        for (slot, operand) in values.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        Some(Matrix(values))
    }

    /// `self` applied first, then `other`
    pub(crate) fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [oa, ob, oc, od, oe, of] = other.0;
        Matrix([
            a * oa + b * oc,
            a * ob + b * od,
            c * oa + d * oc,
            c * ob + d * od,
            e * oa + f * oc + oe,
            e * ob + f * od + of,
        ])
    }

    /// Size in points of the unit square after transformation
    fn unit_square_size(&self) -> (f64, f64) {
        let [a, b, c, d, _, _] = self.0;
        (a.hypot(b), c.hypot(d))
    }
}

pub(crate) fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

/// Follow a reference chain to the object it names
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    let mut current = object;
    for _ in 0..MAX_TREE_DEPTH {
        match current {
            Object::Reference(id) => current = doc.objects.get(id)?,
            other => return Some(other),
        }
    }
    None
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Resources of a page, inherited from its ancestors when absent
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut node = doc.objects.get(&page_id).and_then(|o| resolve_dict(doc, o))?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources).cloned();
        }
        node = resolve_dict(doc, node.get(b"Parent").ok()?)?;
    }
    None
}

/// Highest effective pixels-per-inch of every image drawn by some page
pub(crate) fn scan_image_ppi(doc: &Document) -> BTreeMap<ObjectId, f64> {
    let mut placements = BTreeMap::new();

    for (page_number, page_id) in doc.get_pages() {
        let content = match doc.get_page_content(page_id) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(page = page_number, "skipping unreadable page content: {}", e);
                continue;
            }
        };
        let resources = page_resources(doc, page_id).unwrap_or_default();
        scan_content(doc, &content, &resources, Matrix::IDENTITY, 0, &mut placements);
    }

    placements
}

fn scan_content(
    doc: &Document,
    content: &[u8],
    resources: &Dictionary,
    base: Matrix,
    depth: usize,
    placements: &mut BTreeMap<ObjectId, f64>,
) {
    let operations = match Content::decode(content) {
        Ok(content) => content.operations,
        Err(e) => {
            tracing::warn!("skipping undecodable content stream: {}", e);
            return;
        }
    };

    let mut ctm = base;
    let mut saved = Vec::new();

    for operation in &operations {
        match operation.operator.as_str() {
            "q" => saved.push(ctm),
            "Q" => {
                if let Some(previous) = saved.pop() {
                    ctm = previous;
                }
            }
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(&operation.operands) {
                    ctm = matrix.then(&ctm);
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = operation.operands.first() {
                    draw_xobject(doc, resources, name, ctm, depth, placements);
                }
            }
            _ => {}
        }
    }
}

fn draw_xobject(
    doc: &Document,
    resources: &Dictionary,
    name: &[u8],
    ctm: Matrix,
    depth: usize,
    placements: &mut BTreeMap<ObjectId, f64>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
    else {
        return;
    };
    let Ok(Object::Reference(id)) = xobjects.get(name) else {
        return;
    };
    let Some(Object::Stream(stream)) = doc.objects.get(id) else {
        return;
    };

    match stream.dict.get(b"Subtype") {
        Ok(Object::Name(subtype)) if subtype == b"Image" => {
            let width = stream.dict.get(b"Width").ok().and_then(number).unwrap_or(0.0);
            let height = stream.dict.get(b"Height").ok().and_then(number).unwrap_or(0.0);
            if let Some(ppi) = effective_ppi(width, height, &ctm) {
                let entry = placements.entry(*id).or_insert(0.0);
                *entry = entry.max(ppi);
            }
        }
        Ok(Object::Name(subtype)) if subtype == b"Form" => {
            if depth >= MAX_FORM_DEPTH {
                tracing::debug!(?id, "form nesting too deep, not descending");
                return;
            }
            let Some(content) = decoded_content(stream) else {
                return;
            };
            let form_matrix = stream
                .dict
                .get(b"Matrix")
                .ok()
                .and_then(|m| m.as_array().ok())
                .and_then(|m| Matrix::from_operands(m.as_slice()))
                .unwrap_or(Matrix::IDENTITY);
            let form_resources = stream
                .dict
                .get(b"Resources")
                .ok()
                .and_then(|r| resolve_dict(doc, r))
                .unwrap_or(resources);
            scan_content(
                doc,
                &content,
                form_resources,
                form_matrix.then(&ctm),
                depth + 1,
                placements,
            );
        }
        _ => {}
    }
}

/// Decoded stream data; unfiltered streams are returned as stored
fn decoded_content(stream: &lopdf::Stream) -> Option<Vec<u8>> {
    if stream.dict.get(b"Filter").is_err() {
        return Some(stream.content.clone());
    }
    stream.decompressed_content().ok()
}

/// Pixel density of a `width`x`height` image drawn through `ctm`
fn effective_ppi(width: f64, height: f64, ctm: &Matrix) -> Option<f64> {
    let (width_points, height_points) = ctm.unit_square_size();
    if width <= 0.0 || height <= 0.0 || width_points < 1e-6 || height_points < 1e-6 {
        return None;
    }
    let ppi_x = width * 72.0 / width_points;
    let ppi_y = height * 72.0 / height_points;
    Some(ppi_x.max(ppi_y))
}
