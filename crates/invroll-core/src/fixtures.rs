//! Documents and archives generated in memory for tests.

use std::io::{Cursor, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::invoice::{NormalizedInvoice, Normalizer};

/// A string drawn at a baseline position in 10pt Courier.
pub struct Placed {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

impl Placed {
    pub fn new(x: f32, y: f32, text: &str) -> Self {
        Self {
            x,
            y,
            text: text.to_string(),
        }
    }
}

/// Build an A4 PDF with one content stream per page.
pub fn sample_pdf(pages: &[Vec<Placed>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for placed in pages {
        let mut operations = Vec::new();
        for p in placed {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
            operations.push(Operation::new("Td", vec![p.x.into(), p.y.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(p.text.as_str())]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Build a ZIP archive; names ending in `/` become directory entries.
pub fn sample_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
    }

    writer.finish().unwrap().into_inner()
}

/// Replays canned replies in order and records the excerpts it was given.
pub struct ScriptedNormalizer {
    replies: Mutex<Vec<NormalizedInvoice>>,
    pub seen: Mutex<Vec<String>>,
}

impl ScriptedNormalizer {
    pub fn new(replies: Vec<NormalizedInvoice>) -> Self {
        Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Normalizer for ScriptedNormalizer {
    async fn normalize(&self, excerpt: &str, _file_name: &str) -> NormalizedInvoice {
        self.seen.lock().unwrap().push(excerpt.to_string());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            NormalizedInvoice::failed("no scripted reply")
        } else {
            replies.remove(0)
        }
    }
}
