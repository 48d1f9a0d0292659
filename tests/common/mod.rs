#![allow(dead_code)]

use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use lopdf::{Document, Object, Stream, dictionary};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use payslip_signer::backend::{DocumentStore, RosterStore};
use payslip_signer::config::RosterLayout;
use payslip_signer::google::UploadedFile;
use payslip_signer::roster::{Roster, row_for_name};
use payslip_signer::{Error, Result};

/// A PDF with `pages` pages; resources are inherited from the page tree root
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for i in 0..pages {
        let content = format!("BT /F1 24 Tf 72 700 Td (Holerite pagina {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// A 30x10 white canvas, with a black stroke when `ink` is set
pub fn signature_png(ink: bool) -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(30, 10, Rgba([255, 255, 255, 255]));
    if ink {
        for x in 5..25 {
            img.put_pixel(x, 5, Rgba([0, 0, 0, 255]));
        }
    }

    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

/// Roster grid as the Sheets API would return `A1:H`
pub fn roster_values() -> Vec<Vec<String>> {
    vec![
        row(&["NOME", "CPF", "CARGO", "MES", "HOLERITE", "OBS", "ASSINADO", "SENHA", "EMAIL"]),
        row(&[
            "Ana Souza",
            "111",
            "Analista",
            "10/2026",
            "https://drive.google.com/file/d/file-ana/view?usp=sharing",
            "",
            "",
            "1234",
            "ana@example.com",
        ]),
        row(&[
            "Bruno Lima",
            "222",
            "Auxiliar",
            "10/2026",
            "https://drive.google.com/open?id=file-bruno",
            "",
            "",
            "abcd",
        ]),
        row(&["Carla Dias", "333"]),
        row(&["Duda Reis", "444", "", "", "sem link", "", "", "pw"]),
    ]
}

/// In-memory roster and document store
pub struct FakeBackend {
    pub values: Vec<Vec<String>>,
    pub layout: RosterLayout,
    pub files: HashMap<String, Vec<u8>>,
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
    pub shares: Mutex<Vec<(String, String)>>,
    pub recorded: Mutex<Vec<(usize, String)>>,
    pub fail_roster: bool,
    pub fail_upload: bool,
    pub fail_share: bool,
    pub fail_record: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        files.insert("file-ana".to_string(), sample_pdf(1));
        files.insert("file-bruno".to_string(), sample_pdf(2));

        FakeBackend {
            values: roster_values(),
            layout: RosterLayout {
                email_column: Some(8),
                ..RosterLayout::default()
            },
            files,
            uploads: Mutex::new(Vec::new()),
            shares: Mutex::new(Vec::new()),
            recorded: Mutex::new(Vec::new()),
            fail_roster: false,
            fail_upload: false,
            fail_share: false,
            fail_record: false,
        }
    }

    pub fn empty() -> Self {
        FakeBackend {
            values: vec![row(&["NOME"])],
            ..FakeBackend::new()
        }
    }

    fn unavailable() -> Error {
        Error::Api {
            status: 503,
            body: "backend unavailable".to_string(),
        }
    }
}

impl RosterStore for FakeBackend {
    async fn load_roster(&self) -> Result<Roster> {
        if self.fail_roster {
            return Err(Self::unavailable());
        }
        Ok(Roster::from_values(&self.values, &self.layout))
    }

    async fn record_signed_link(&self, employee: &str, link: &str) -> Result<usize> {
        if self.fail_record {
            return Err(Self::unavailable());
        }
        let names: Vec<Vec<String>> = self
            .values
            .iter()
            .map(|r| r.get(self.layout.name_column).cloned().into_iter().collect())
            .collect();
        let row = row_for_name(&names, employee)
            .ok_or_else(|| Error::EmployeeNotFound(employee.to_string()))?;
        self.recorded.lock().unwrap().push((row, link.to_string()));
        Ok(row)
    }
}

impl DocumentStore for FakeBackend {
    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        self.files.get(file_id).cloned().ok_or(Error::Api {
            status: 404,
            body: format!("File not found: {}", file_id),
        })
    }

    async fn upload_signed(&self, name: &str, pdf: Vec<u8>) -> Result<UploadedFile> {
        if self.fail_upload {
            return Err(Self::unavailable());
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((name.to_string(), pdf));
        let id = format!("signed-{}", uploads.len());
        Ok(UploadedFile {
            web_view_link: Some(format!("https://drive.google.com/file/d/{}/view", id)),
            id,
        })
    }

    async fn share_with_reader(&self, file_id: &str, email: &str) -> Result<()> {
        if self.fail_share {
            return Err(Self::unavailable());
        }
        self.shares
            .lock()
            .unwrap()
            .push((file_id.to_string(), email.to_string()));
        Ok(())
    }
}
