//! Fixture documents shared by the unit tests

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Build the page tree, catalog and trailer around already created pages
fn finish_document(mut doc: Document, pages_id: ObjectId, page_ids: Vec<ObjectId>) -> Vec<u8> {
    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(page_ids.len() as i64));
    pages_dict.set(
        "Kids",
        Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
    );
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog_dict = Dictionary::new();
    catalog_dict.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog_dict.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog_dict));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn media_box() -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(612),
        Object::Integer(792),
    ])
}

/// A simple PDF with N pages containing identifiable text
pub(crate) fn create_test_pdf(num_pages: u32, content_prefix: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut page_ids = Vec::new();

    for page_num in 0..num_pages {
        let content = format!(
            "BT /F1 12 Tf 50 700 Td ({}-Page-{}) Tj ET",
            content_prefix,
            page_num + 1
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_id));
        page_dict.set("Contents", Object::Reference(content_id));
        page_dict.set("MediaBox", media_box());
        page_ids.push(doc.add_object(Object::Dictionary(page_dict)));
    }

    finish_document(doc, pages_id, page_ids)
}

/// Pages that each carry their own copy of the same font, content stream and
/// (direct) resource dictionary
pub(crate) fn create_duplicate_resources_pdf(num_pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let mut page_ids = Vec::new();

    for _ in 0..num_pages {
        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
        let font_id = doc.add_object(Object::Dictionary(font));

        let content = b"BT /F1 24 Tf 72 720 Td (Same on every page) Tj ET".to_vec();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));
        resources.set(
            "ProcSet",
            Object::Array(vec![
                Object::Name(b"PDF".to_vec()),
                Object::Name(b"Text".to_vec()),
            ]),
        );

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_id));
        page_dict.set("Contents", Object::Reference(content_id));
        page_dict.set("MediaBox", media_box());
        page_dict.set("Resources", Object::Dictionary(resources));
        page_ids.push(doc.add_object(Object::Dictionary(page_dict)));
    }

    finish_document(doc, pages_id, page_ids)
}

/// Uncompressed RGB gradient samples
pub(crate) fn gradient_rgb(width: u32, height: u32) -> Vec<u8> {
    let mut samples = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            samples.push((x * 255 / width.max(1)) as u8);
            samples.push((y * 255 / height.max(1)) as u8);
            samples.push(((x + y) % 256) as u8);
        }
    }
    samples
}

/// One page showing a raw RGB image of `width`x`height` pixels drawn into a
/// square of `display_points` points
pub(crate) fn create_image_pdf(width: u32, height: u32, display_points: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let mut image_dict = Dictionary::new();
    image_dict.set("Type", Object::Name(b"XObject".to_vec()));
    image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
    image_dict.set("Width", Object::Integer(width as i64));
    image_dict.set("Height", Object::Integer(height as i64));
    image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    image_dict.set("BitsPerComponent", Object::Integer(8));
    let image = Stream::new(image_dict, gradient_rgb(width, height));
    let image_id = doc.add_object(Object::Stream(image));

    let content = format!(
        "q {d} 0 0 {d} 72 72 cm /Im1 Do Q",
        d = display_points
    );
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut xobjects = Dictionary::new();
    xobjects.set("Im1", Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page_dict = Dictionary::new();
    page_dict.set("Type", Object::Name(b"Page".to_vec()));
    page_dict.set("Parent", Object::Reference(pages_id));
    page_dict.set("Contents", Object::Reference(content_id));
    page_dict.set("MediaBox", media_box());
    page_dict.set("Resources", Object::Dictionary(resources));
    let page_id = doc.add_object(Object::Dictionary(page_dict));

    finish_document(doc, pages_id, vec![page_id])
}

/// Find the single image XObject of a document
pub(crate) fn find_image(doc: &Document) -> Option<&Stream> {
    doc.objects.values().find_map(|object| match object {
        Object::Stream(stream)
            if matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image") =>
        {
            Some(stream)
        }
        _ => None,
    })
}
