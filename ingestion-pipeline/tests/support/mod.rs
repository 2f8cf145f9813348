#![allow(dead_code)]

use std::{
    io::{Cursor, Write},
    sync::Arc,
};

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{db::SurrealDbClient, store::StorageManager},
};
use ingestion_pipeline::{CompletionProvider, IngestionConfig, IngestionPipeline};
use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, Stream,
};
use tokio::sync::Mutex;
use uuid::Uuid;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// An image XObject placed on a fixture PDF page.
#[derive(Clone, Copy)]
pub enum FixtureImage {
    /// `DCTDecode` stream with placeholder bytes.
    Jpeg { width: i64, height: i64 },
    /// Uncompressed 8-bit `DeviceRGB` samples.
    Rgb { width: i64, height: i64 },
}

pub const FAKE_JPEG: &[u8] = b"\xFF\xD8\xFF\xE0fixture-jpeg\xFF\xD9";

#[derive(Default)]
pub struct PdfFixture {
    pages: Vec<(String, Vec<FixtureImage>)>,
    inherited_images: Vec<FixtureImage>,
}

impl PdfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, text: &str) -> Self {
        self.pages.push((text.to_string(), Vec::new()));
        self
    }

    pub fn page_with_images(mut self, text: &str, images: &[FixtureImage]) -> Self {
        self.pages.push((text.to_string(), images.to_vec()));
        self
    }

    /// Images declared on the page tree root, visible to every page through inheritance.
    pub fn inherited_image(mut self, image: FixtureImage) -> Self {
        self.inherited_images.push(image);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut shared_xobjects = lopdf::Dictionary::new();
        for (idx, image) in self.inherited_images.iter().enumerate() {
            let image_id = doc.add_object(image_stream(*image));
            shared_xobjects.set(format!("Shared{idx}"), image_id);
        }
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => shared_xobjects,
        });

        let mut kids = Vec::new();
        for (text, images) in &self.pages {
            let mut operations = Vec::new();
            if !text.is_empty() {
                operations.extend([
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(text.as_str())]),
                    Operation::new("ET", vec![]),
                ]);
            }

            let mut page_xobjects = lopdf::Dictionary::new();
            for (idx, image) in images.iter().enumerate() {
                let name = format!("Im{idx}");
                let image_id = doc.add_object(image_stream(*image));
                page_xobjects.set(name.as_str(), image_id);
                operations.extend([
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![200.into(), 0.into(), 0.into(), 200.into(), 72.into(), 72.into()],
                    ),
                    Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                    Operation::new("Q", vec![]),
                ]);
            }

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode page content"),
            ));

            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if !images.is_empty() {
                page.set(
                    "Resources",
                    dictionary! {
                        "Font" => dictionary! { "F1" => font_id },
                        "XObject" => page_xobjects,
                    },
                );
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let count = i64::try_from(kids.len()).expect("page count");
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save fixture pdf");
        bytes
    }
}

fn image_stream(image: FixtureImage) -> Stream {
    match image {
        FixtureImage::Jpeg { width, height } => Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            FAKE_JPEG.to_vec(),
        ),
        FixtureImage::Rgb { width, height } => {
            let len = usize::try_from(width * height * 3).expect("sample count");
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                vec![180; len],
            )
        }
    }
}

/// Three pages of prose, roughly 500 characters in total.
pub fn book_pages() -> [&'static str; 3] {
    [
        "Call me Ishmael. Some years ago, never mind how long precisely, having little or no money in my purse, and nothing particular to interest me on shore, I thought I would sail about.",
        "It is a way I have of driving off the spleen and regulating the circulation. Whenever I find myself growing grim about the mouth, I account it high time to get to sea as soon as I can.",
        "This is my substitute for pistol and ball. With a philosophical flourish Cato throws himself upon his sword; I quietly take to the ship. There is nothing surprising in this.",
    ]
}

pub const FAKE_COVER_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfixture-cover";

/// Minimal EPUB 2 package with one XHTML item per chapter.
pub fn epub_fixture(chapters: &[&str], cover: Option<&[u8]>) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("mimetype", stored).expect("mimetype entry");
    zip.write_all(b"application/epub+zip").expect("write mimetype");

    zip.start_file("META-INF/container.xml", deflated)
        .expect("container entry");
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
    )
    .expect("write container");

    let mut manifest = String::from(
        r#"    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
"#,
    );
    let mut spine = String::new();
    let mut nav_points = String::new();
    for (idx, _) in chapters.iter().enumerate() {
        let order = idx + 1;
        manifest.push_str(&format!(
            "    <item id=\"chap{order}\" href=\"chap{order}.xhtml\" media-type=\"application/xhtml+xml\"/>\n"
        ));
        spine.push_str(&format!("    <itemref idref=\"chap{order}\"/>\n"));
        nav_points.push_str(&format!(
            "    <navPoint id=\"np{order}\" playOrder=\"{order}\"><navLabel><text>Chapter {order}</text></navLabel><content src=\"chap{order}.xhtml\"/></navPoint>\n"
        ));
    }
    let cover_meta = if cover.is_some() {
        manifest.push_str(
            "    <item id=\"cover-image\" href=\"images/cover.png\" media-type=\"image/png\" properties=\"cover-image\"/>\n",
        );
        "    <meta name=\"cover\" content=\"cover-image\"/>\n"
    } else {
        ""
    };

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>Fixture Book</dc:title>
    <dc:creator opf:role="aut">Fixture Author</dc:creator>
    <dc:identifier id="bookid">urn:uuid:fixture-book</dc:identifier>
    <dc:language>en</dc:language>
{cover_meta}  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>"#
    );
    zip.start_file("OEBPS/content.opf", deflated)
        .expect("opf entry");
    zip.write_all(opf.as_bytes()).expect("write opf");

    let ncx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="urn:uuid:fixture-book"/></head>
  <docTitle><text>Fixture Book</text></docTitle>
  <navMap>
{nav_points}  </navMap>
</ncx>"#
    );
    zip.start_file("OEBPS/toc.ncx", deflated).expect("ncx entry");
    zip.write_all(ncx.as_bytes()).expect("write ncx");

    for (idx, body) in chapters.iter().enumerate() {
        let order = idx + 1;
        let xhtml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
  <head><title>Chapter {order}</title></head>
  <body><h1>Chapter {order}</h1><p>{body}</p></body>
</html>"#
        );
        zip.start_file(format!("OEBPS/chap{order}.xhtml"), deflated)
            .expect("chapter entry");
        zip.write_all(xhtml.as_bytes()).expect("write chapter");
    }

    if let Some(cover) = cover {
        zip.start_file("OEBPS/images/cover.png", stored)
            .expect("cover entry");
        zip.write_all(cover).expect("write cover");
    }

    zip.finish().expect("finish epub").into_inner()
}

/// Completion provider returning a fixed reply and recording every prompt.
pub struct FakeProvider {
    reply: Result<String, String>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: Err("model unavailable".to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        self.prompts.lock().await.push(prompt.to_string());
        self.reply.clone().map_err(AppError::Processing)
    }
}

pub const MOBY_DICK_REPLY: &str =
    "```json\n{\"title\": \"Moby-Dick\", \"author\": \"Herman Melville\", \"category\": \"Adventure\"}\n```";

pub struct TestLibrary {
    pub db: Arc<SurrealDbClient>,
    pub storage: StorageManager,
    pub pipeline: Arc<IngestionPipeline>,
}

pub async fn library(provider: Arc<FakeProvider>) -> TestLibrary {
    let db = SurrealDbClient::memory("ingest_test", &Uuid::new_v4().to_string())
        .await
        .expect("in-memory surrealdb");
    db.ensure_initialized().await.expect("indexes");
    let db = Arc::new(db);
    let storage = StorageManager::memory();

    let pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&db),
        storage.clone(),
        provider,
        IngestionConfig::default(),
    ));

    TestLibrary {
        db,
        storage,
        pipeline,
    }
}
