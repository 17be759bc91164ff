//! PDF serializer with object-stream support
//!
//! lopdf writes every object as a top-level indirect object. To pack small
//! objects into object streams we serialize the object graph ourselves:
//!
//! ```text
//! %PDF-1.5
//! 1 0 obj << /Type /ObjStm /N 3 /First 14 ... >> stream ... endstream endobj
//! 4 0 obj << /Length 120 /Filter /FlateDecode >> stream ... endstream endobj
//! 9 0 obj << /Type /XRef /W [1 2 2] /Size 10 /Root 2 0 R ... >> stream ... endstream endobj
//! startxref
//! OFFSET
//! %%EOF
//! ```
//!
//! Without object streams a classic `xref` table and `trailer` are written.

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::error::PdfOpsError;

/// Largest index an object can have inside one object stream (field 3 is two bytes)
const MAX_OBJECTS_PER_STREAM: usize = 0xFFFF;

/// Serialization settings
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Pack non-stream objects into `/ObjStm` containers and write an xref stream
    pub use_object_streams: bool,
    /// Upper bound of objects per object stream
    pub objects_per_stream: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            use_object_streams: true,
            objects_per_stream: 100,
        }
    }
}

/// Where an object ended up in the output file
#[derive(Debug, Clone, Copy)]
enum XrefEntry {
    Free,
    /// Byte offset of a top-level object
    Offset(usize),
    /// (object stream number, index within the stream)
    Compressed(u32, usize),
}

/// Serialize `doc` into a complete PDF file.
///
/// Objects are renumbered compactly from 1 with generation 0; references to
/// objects missing from the document are written as `null`. Existing object
/// streams and xref streams are dropped since lopdf has already expanded them.
/// The output is never encrypted.
pub fn serialize_document(doc: &Document, options: &WriteOptions) -> Result<Vec<u8>, PdfOpsError> {
    if options.objects_per_stream == 0 || options.objects_per_stream > MAX_OBJECTS_PER_STREAM {
        return Err(PdfOpsError::InvalidOption(format!(
            "objects per stream must be between 1 and {}",
            MAX_OBJECTS_PER_STREAM
        )));
    }

    let id_map = renumber(doc);
    let trailer = build_trailer(doc, &id_map)?;

    // Renumbered objects in output order
    let mut objects: Vec<(u32, Object)> = Vec::with_capacity(id_map.len());
    for (old_id, object) in &doc.objects {
        if let Some(&new_id) = id_map.get(old_id) {
            objects.push((new_id.0, remap_refs(object, &id_map)));
        }
    }
    objects.sort_by_key(|(id, _)| *id);

    let version = if options.use_object_streams {
        output_version(&doc.version, (1, 5))
    } else {
        output_version(&doc.version, (1, 4))
    };

    let mut out = Vec::new();
    out.extend_from_slice(format!("%PDF-{}\n", version).as_bytes());
    out.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n"); // Binary marker

    if options.use_object_streams {
        write_with_object_streams(&mut out, objects, trailer, options.objects_per_stream)?;
    } else {
        write_with_xref_table(&mut out, objects, trailer);
    }

    Ok(out)
}

/// Assign compact ids to every object that is written out
fn renumber(doc: &Document) -> BTreeMap<ObjectId, ObjectId> {
    let mut id_map = BTreeMap::new();
    let mut next_id = 1u32;
    for (id, object) in &doc.objects {
        if is_xref_container(object) {
            continue;
        }
        id_map.insert(*id, (next_id, 0));
        next_id += 1;
    }
    id_map
}

/// Object streams and xref streams from the input are rebuilt, never copied
fn is_xref_container(object: &Object) -> bool {
    match object {
        Object::Stream(stream) => matches!(
            stream.dict.get(b"Type"),
            Ok(Object::Name(name)) if name == b"ObjStm" || name == b"XRef"
        ),
        _ => false,
    }
}

fn build_trailer(
    doc: &Document,
    id_map: &BTreeMap<ObjectId, ObjectId>,
) -> Result<Dictionary, PdfOpsError> {
    let mut trailer = Dictionary::new();

    let root = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfOpsError::OperationError("No Root in trailer".into()))?;
    let root = id_map
        .get(&root)
        .ok_or_else(|| PdfOpsError::OperationError("Catalog not found".into()))?;
    trailer.set("Root", Object::Reference(*root));

    if let Ok(Object::Reference(info)) = doc.trailer.get(b"Info") {
        if let Some(new_info) = id_map.get(info) {
            trailer.set("Info", Object::Reference(*new_info));
        }
    }
    if let Ok(id @ Object::Array(_)) = doc.trailer.get(b"ID") {
        trailer.set("ID", id.clone());
    }

    Ok(trailer)
}

/// Clone `object` with every reference rewritten through `id_map`
pub(crate) fn remap_refs(object: &Object, id_map: &BTreeMap<ObjectId, ObjectId>) -> Object {
    match object {
        Object::Reference(id) => match id_map.get(id) {
            Some(new_id) => Object::Reference(*new_id),
            None => Object::Null,
        },
        Object::Array(items) => Object::Array(items.iter().map(|o| remap_refs(o, id_map)).collect()),
        Object::Dictionary(dict) => Object::Dictionary(remap_dict(dict, id_map)),
        Object::Stream(stream) => {
            let mut stream = stream.clone();
            stream.dict = remap_dict(&stream.dict, id_map);
            Object::Stream(stream)
        }
        other => other.clone(),
    }
}

fn remap_dict(dict: &Dictionary, id_map: &BTreeMap<ObjectId, ObjectId>) -> Dictionary {
    let mut remapped = Dictionary::new();
    for (key, value) in dict.iter() {
        remapped.set(key.clone(), remap_refs(value, id_map));
    }
    remapped
}

/// Header version, raised to `minimum` when the document declares less
fn output_version(declared: &str, minimum: (u32, u32)) -> String {
    let parsed = declared.trim().split_once('.').and_then(|(major, minor)| {
        Some((major.parse::<u32>().ok()?, minor.parse::<u32>().ok()?))
    });
    match parsed {
        Some(version) if version >= minimum => format!("{}.{}", version.0, version.1),
        _ => format!("{}.{}", minimum.0, minimum.1),
    }
}

fn write_with_object_streams(
    out: &mut Vec<u8>,
    objects: Vec<(u32, Object)>,
    mut trailer: Dictionary,
    objects_per_stream: usize,
) -> Result<(), PdfOpsError> {
    let max_id = objects.last().map(|(id, _)| *id).unwrap_or(0);
    let (streams, packable): (Vec<_>, Vec<_>) = objects
        .into_iter()
        .partition(|(_, object)| matches!(object, Object::Stream(_)));

    let chunk_count = packable.len().div_ceil(objects_per_stream);
    let xref_stream_id = max_id + chunk_count as u32 + 1;
    let size = xref_stream_id as usize + 1;
    let mut entries = vec![XrefEntry::Free; size];

    for (id, object) in &streams {
        entries[*id as usize] = XrefEntry::Offset(out.len());
        write_indirect(out, *id, object);
    }

    for (chunk_index, chunk) in packable.chunks(objects_per_stream).enumerate() {
        let container_id = max_id + chunk_index as u32 + 1;

        let mut header = Vec::new();
        let mut body = Vec::new();
        for (index, (id, object)) in chunk.iter().enumerate() {
            if index > 0 {
                header.push(b' ');
            }
            header.extend_from_slice(format!("{} {}", id, body.len()).as_bytes());
            write_object(&mut body, object);
            body.push(b'\n');
            entries[*id as usize] = XrefEntry::Compressed(container_id, index);
        }
        header.push(b'\n');

        let first = header.len();
        header.extend_from_slice(&body);
        let content = deflate(&header)?;

        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"ObjStm".to_vec()));
        dict.set("N", Object::Integer(chunk.len() as i64));
        dict.set("First", Object::Integer(first as i64));
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));

        entries[container_id as usize] = XrefEntry::Offset(out.len());
        write_indirect(out, container_id, &Object::Stream(lopdf::Stream::new(dict, content)));
    }

    // The xref stream describes itself
    let xref_offset = out.len();
    entries[xref_stream_id as usize] = XrefEntry::Offset(xref_offset);

    let max_field2 = entries
        .iter()
        .map(|entry| match entry {
            XrefEntry::Free => 0,
            XrefEntry::Offset(offset) => *offset as u64,
            XrefEntry::Compressed(stream_id, _) => *stream_id as u64,
        })
        .max()
        .unwrap_or(0);
    let w2 = bytes_needed(max_field2);
    let w3 = 2;

    let mut rows = Vec::with_capacity(size * (1 + w2 + w3));
    for entry in &entries {
        let (kind, field2, field3) = match entry {
            XrefEntry::Free => (0u8, 0u64, 0xFFFFu64),
            XrefEntry::Offset(offset) => (1, *offset as u64, 0),
            XrefEntry::Compressed(stream_id, index) => (2, *stream_id as u64, *index as u64),
        };
        rows.push(kind);
        push_be(&mut rows, field2, w2);
        push_be(&mut rows, field3, w3);
    }

    trailer.set("Type", Object::Name(b"XRef".to_vec()));
    trailer.set("Size", Object::Integer(size as i64));
    trailer.set(
        "W",
        Object::Array(vec![
            Object::Integer(1),
            Object::Integer(w2 as i64),
            Object::Integer(w3 as i64),
        ]),
    );
    trailer.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    let xref_stream = lopdf::Stream::new(trailer, deflate(&rows)?);
    write_indirect(out, xref_stream_id, &Object::Stream(xref_stream));

    out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    Ok(())
}

fn write_with_xref_table(out: &mut Vec<u8>, objects: Vec<(u32, Object)>, mut trailer: Dictionary) {
    let size = objects.last().map(|(id, _)| *id as usize + 1).unwrap_or(1);
    let mut offsets = vec![None; size];

    for (id, object) in &objects {
        offsets[*id as usize] = Some(out.len());
        write_indirect(out, *id, object);
    }

    let xref_offset = out.len();
    out.extend_from_slice(b"xref\n");
    out.extend_from_slice(format!("0 {}\n", size).as_bytes());
    for (id, offset) in offsets.iter().enumerate() {
        match offset {
            Some(offset) => out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes()),
            None if id == 0 => out.extend_from_slice(b"0000000000 65535 f \n"),
            None => out.extend_from_slice(b"0000000000 00000 f \n"),
        }
    }

    trailer.set("Size", Object::Integer(size as i64));
    out.extend_from_slice(b"trailer\n");
    write_dictionary(out, &trailer, None);
    out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
}

fn write_indirect(out: &mut Vec<u8>, id: u32, object: &Object) {
    out.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
    write_object(out, object);
    out.extend_from_slice(b"\nendobj\n");
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfOpsError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| PdfOpsError::OperationError(format!("Compression failed: {}", e)))
}

fn bytes_needed(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

fn push_be(out: &mut Vec<u8>, value: u64, width: usize) {
    let bytes = value.to_be_bytes();
    out.extend_from_slice(&bytes[bytes.len() - width..]);
}

/// Append the PDF syntax for `object` to `out`
pub fn write_object(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(value) => out.extend_from_slice(if *value { b"true" } else { b"false" }),
        Object::Integer(value) => out.extend_from_slice(value.to_string().as_bytes()),
        Object::Real(value) => out.extend_from_slice(format_real(f64::from(*value)).as_bytes()),
        Object::Name(name) => write_name(out, name),
        Object::String(bytes, StringFormat::Literal) => write_literal_string(out, bytes),
        Object::String(bytes, StringFormat::Hexadecimal) => {
            out.push(b'<');
            for byte in bytes {
                out.extend_from_slice(format!("{:02X}", byte).as_bytes());
            }
            out.push(b'>');
        }
        Object::Array(items) => {
            out.push(b'[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict, None),
        Object::Stream(stream) => {
            write_dictionary(out, &stream.dict, Some(stream.content.len()));
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference((id, generation)) => {
            out.extend_from_slice(format!("{} {} R", id, generation).as_bytes())
        }
    }
}

/// Append the PDF syntax for a bare dictionary to `out`
pub(crate) fn write_dict(out: &mut Vec<u8>, dict: &Dictionary) {
    write_dictionary(out, dict, None);
}

/// Stream dictionaries get their `/Length` from the actual content
fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary, stream_length: Option<usize>) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        if stream_length.is_some() && key.as_slice() == b"Length" {
            continue;
        }
        write_name(out, key);
        out.push(b' ');
        write_object(out, value);
    }
    if let Some(length) = stream_length {
        out.extend_from_slice(format!("/Length {}", length).as_bytes());
    }
    out.extend_from_slice(b">>");
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &byte in name {
        let regular = (0x21..=0x7E).contains(&byte) && !b"()<>[]{}/%#".contains(&byte);
        if regular {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        }
    }
}

fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &byte in bytes {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(byte),
        }
    }
    out.push(b')');
}

/// PDF has no exponent notation for reals
fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let formatted = format!("{:.6}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}
