//! Uploaded ZIP archives and the PDF documents inside them.

use std::io::{Cursor, Read};

use tracing::debug;
use zip::ZipArchive;

use crate::error::ArchiveError;

/// An uploaded archive: display name and raw bytes.
#[derive(Debug, Clone)]
pub struct ArchiveInput {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveInput {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// A PDF entry read from an archive.
#[derive(Debug, Clone)]
pub struct PdfEntry {
    /// Entry path inside the archive.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Whether an entry name denotes a PDF file.
pub fn is_pdf_name(name: &str) -> bool {
    !name.ends_with('/') && name.to_ascii_lowercase().ends_with(".pdf")
}

/// Read the PDF entries of an archive in archive order.
///
/// Directory entries and non-PDF files are skipped. An entry that cannot be
/// decompressed is returned as an error in place, so the remaining entries
/// are still processed.
pub fn read_pdf_entries(
    bytes: &[u8],
) -> Result<Vec<std::result::Result<PdfEntry, ArchiveError>>, ArchiveError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ArchiveError::Open(e.to_string()))?;

    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut file = match archive.by_index(index) {
            Ok(file) => file,
            Err(e) => {
                entries.push(Err(ArchiveError::Entry {
                    name: format!("#{index}"),
                    reason: e.to_string(),
                }));
                continue;
            }
        };

        let name = file.name().to_string();
        if file.is_dir() || !is_pdf_name(&name) {
            debug!("Skipping archive entry {}", name);
            continue;
        }

        let mut data = Vec::with_capacity(file.size() as usize);
        match file.read_to_end(&mut data) {
            Ok(_) => entries.push(Ok(PdfEntry { name, bytes: data })),
            Err(e) => entries.push(Err(ArchiveError::Entry {
                name,
                reason: e.to_string(),
            })),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_zip;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_is_pdf_name() {
        assert!(is_pdf_name("a.pdf"));
        assert!(is_pdf_name("dir/B.PDF"));
        assert!(!is_pdf_name("notes.txt"));
        assert!(!is_pdf_name("folder.pdf/"));
    }

    #[test]
    fn test_reads_only_pdf_entries() {
        let zip = sample_zip(&[
            ("invoices/", &b""[..]),
            ("invoices/one.pdf", &b"%PDF-1"[..]),
            ("readme.txt", &b"hello"[..]),
            ("TWO.PDF", &b"%PDF-2"[..]),
        ]);

        let entries: Vec<PdfEntry> = read_pdf_entries(&zip)
            .unwrap()
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["invoices/one.pdf", "TWO.PDF"]);
        assert_eq!(entries[1].bytes, b"%PDF-2".to_vec());
    }

    #[test]
    fn test_not_a_zip() {
        let err = read_pdf_entries(b"plain bytes").unwrap_err();
        assert!(err.to_string().starts_with("zip read failed"));
    }

    #[test]
    fn test_empty_archive() {
        let zip = sample_zip(&[]);
        assert!(read_pdf_entries(&zip).unwrap().is_empty());
    }
}
