use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::AppError;

/// Where letter text comes from. `Ok(None)` means the file was readable but
/// yielded no usable text.
pub trait TextSource: Send {
    fn extract_text(&self, path: &Path) -> Result<Option<String>, AppError>;
}

/// Rasterises the first pages of a PDF with `pdftoppm` and reads them with
/// the `tesseract` CLI.
pub struct TesseractOcr {
    max_pages: u32,
    dpi: u32,
    language: String,
}

impl TesseractOcr {
    pub fn new(max_pages: u32, dpi: u32) -> Self {
        Self {
            max_pages: max_pages.max(1),
            dpi,
            language: "eng".to_string(),
        }
    }

    fn rasterise(&self, pdf_path: &Path, output_dir: &Path) -> Result<(), AppError> {
        let last_page = self.max_pages.to_string();
        let dpi = self.dpi.to_string();
        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi, "-f", "1", "-l", &last_page])
            .arg(pdf_path)
            .arg(output_dir.join("page"))
            .status();

        match status {
            Ok(s) if s.success() => Ok(()),
            Ok(s) => Err(AppError::Ocr(format!(
                "pdftoppm failed on {} ({s})",
                pdf_path.display()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::Ocr(
                "pdftoppm not found (install poppler-utils)".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn read_image(&self, image_path: &Path) -> Result<String, AppError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language, "--psm", "6"])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            }
            Ok(output) => Err(AppError::Ocr(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::Ocr(
                "tesseract not found (install tesseract-ocr)".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

impl TextSource for TesseractOcr {
    fn extract_text(&self, path: &Path) -> Result<Option<String>, AppError> {
        let work_dir = TempDir::new()?;
        self.rasterise(path, work_dir.path())?;

        let mut text = String::new();
        for page in 1..=self.max_pages {
            let Some(image) = find_page_image(work_dir.path(), page) else {
                break;
            };
            match self.read_image(&image) {
                Ok(page_text) if !page_text.trim().is_empty() => {
                    debug!(page, chars = page_text.len(), "ocr page read");
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Ok(_) => debug!(page, "ocr page empty"),
                Err(AppError::Ocr(msg)) if msg.contains("not found") => {
                    return Err(AppError::Ocr(msg));
                }
                Err(e) => warn!(page, error = %e, "ocr page skipped"),
            }
        }

        Ok(non_empty(text))
    }
}

/// pdftoppm pads page numbers to the width of the document's page count.
fn find_page_image(dir: &Path, page: u32) -> Option<PathBuf> {
    (1..=4)
        .map(|width| dir.join(format!("page-{page:0width$}.png")))
        .find(|p| p.exists())
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_page_image_handles_padding() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("page-1.png"), b"").unwrap();
        fs::write(dir.path().join("page-02.png"), b"").unwrap();

        assert_eq!(
            find_page_image(dir.path(), 1),
            Some(dir.path().join("page-1.png"))
        );
        assert_eq!(
            find_page_image(dir.path(), 2),
            Some(dir.path().join("page-02.png"))
        );
        assert_eq!(find_page_image(dir.path(), 3), None);
    }

    #[test]
    fn test_blank_text_is_none() {
        assert_eq!(non_empty(" \n\n".to_string()), None);
        assert_eq!(non_empty("Case ID".to_string()).as_deref(), Some("Case ID"));
    }

    #[test]
    fn test_page_limit_is_at_least_one() {
        let ocr = TesseractOcr::new(0, 300);
        assert_eq!(ocr.max_pages, 1);
        assert_eq!(ocr.language, "eng");
    }
}
