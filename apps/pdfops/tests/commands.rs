//! End-to-end runs of both commands against files on disk

use std::path::Path;

use clap::Parser;
use lopdf::{dictionary, Document, Object, Stream};
use pdfops::{exit, execute, Cli, Config, Outcome};

/// A simple PDF with N pages containing identifiable text
fn create_test_pdf(num_pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for page_num in 0..num_pages {
        let content = format!("BT /F1 12 Tf 50 700 Td (Page-{}) Tj ET", page_num + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => Object::Integer(num_pages as i64),
            "Kids" => Object::Array(kids),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn run(args: &[&str]) -> Result<Outcome, pdfops_core::PdfOpsError> {
    let mut argv = vec!["pdfops"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    execute(&cli.command, &Config::default())
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_passwd_then_optimize_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.pdf");
    std::fs::write(&input, create_test_pdf(3)).unwrap();

    let outcome = run(&["passwd", path_str(&input), "owner", "user"]).unwrap();
    assert_eq!(outcome.message(), "Password successfully changed");
    assert!(Document::load(&input).unwrap().is_encrypted());

    let outcome = run(&["optimize", "-p", "user", path_str(&input)]).unwrap();
    assert!(matches!(outcome, Outcome::Optimized(_)));

    let doc = Document::load(&input).unwrap();
    assert!(!doc.is_encrypted());
    assert_eq!(doc.get_pages().len(), 3);
}

#[test]
fn test_passwd_to_separate_output_keeps_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.pdf");
    let output = dir.path().join("locked.pdf");
    let original = create_test_pdf(2);
    std::fs::write(&input, &original).unwrap();

    run(&["passwd", "-o", path_str(&output), path_str(&input), "o", "u"]).unwrap();

    assert_eq!(std::fs::read(&input).unwrap(), original);
    assert!(Document::load(&output).unwrap().is_encrypted());
}

#[test]
fn test_wrong_password_leaves_file_and_maps_to_open_code() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.pdf");
    std::fs::write(&input, create_test_pdf(1)).unwrap();
    run(&["passwd", path_str(&input), "owner", "user"]).unwrap();
    let locked = std::fs::read(&input).unwrap();

    let err = run(&["passwd", "-p", "wrong", path_str(&input), "a", "b"]).unwrap_err();

    assert_eq!(exit::exit_code(err.class()), exit::OPEN);
    assert_eq!(std::fs::read(&input).unwrap(), locked);
}

#[test]
fn test_corrupt_input_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.pdf");
    let garbage = b"%PDF-1.4\nthis is not really a pdf".to_vec();
    std::fs::write(&input, &garbage).unwrap();

    let err = run(&["optimize", path_str(&input)]).unwrap_err();

    assert_eq!(exit::exit_code(err.class()), exit::OPEN);
    assert_eq!(std::fs::read(&input).unwrap(), garbage);
}

#[test]
fn test_unwritable_output_maps_to_write_code() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.pdf");
    let output = dir.path().join("missing").join("out.pdf");
    std::fs::write(&input, create_test_pdf(1)).unwrap();

    let err = run(&["optimize", "-o", path_str(&output), path_str(&input)]).unwrap_err();

    assert_eq!(exit::exit_code(err.class()), exit::WRITE);
    assert!(!output.exists());
}
