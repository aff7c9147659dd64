use image::{DynamicImage, GenericImageView};
use printpdf::{Image, ImageTransform, Mm, PdfDocument};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::utils::constants::{PAGE_HEIGHT_MM, PAGE_IMAGE_HEIGHT_MM, PAGE_MARGIN_MM, PAGE_WIDTH_MM};

const MM_PER_INCH: f32 = 25.4;

/// Paginated PDF with one chart image per A3 landscape page
#[derive(Debug, Clone)]
pub struct ReportDocument {
    title: String,
    pages: Vec<PathBuf>,
}

/// Where and how large an image lands on a page, in millimetres
#[derive(Debug, Clone, Copy, PartialEq)]
struct Placement {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Placement {
    /// Images are 240 mm tall, narrowed only when they would not fit the
    /// page width. Centred horizontally, top-aligned below the margin.
    fn for_image(pixel_width: u32, pixel_height: u32) -> Self {
        let aspect = pixel_width as f32 / pixel_height.max(1) as f32;
        let max_width = PAGE_WIDTH_MM - 2.0 * PAGE_MARGIN_MM;

        let mut height = PAGE_IMAGE_HEIGHT_MM;
        let mut width = height * aspect;
        if width > max_width {
            width = max_width;
            height = width / aspect;
        }

        Self {
            x: (PAGE_WIDTH_MM - width) / 2.0,
            y: PAGE_HEIGHT_MM - PAGE_MARGIN_MM - height,
            width,
            height,
        }
    }
}

impl ReportDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            pages: Vec::new(),
        }
    }

    pub fn add_image_page(&mut self, image_path: impl Into<PathBuf>) {
        self.pages.push(image_path.into());
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if self.page_count() == 0 {
            return Err(PipelineError::Report("Report has no pages".to_string()));
        }

        let doc = PdfDocument::empty(&self.title);

        for (i, image_path) in self.pages.iter().enumerate() {
            let picture = image::open(image_path)?;
            let (pixel_width, pixel_height) = picture.dimensions();
            let placement = Placement::for_image(pixel_width, pixel_height);

            let (page, layer) = doc.add_page(
                Mm(PAGE_WIDTH_MM),
                Mm(PAGE_HEIGHT_MM),
                format!("Page {}", i + 1),
            );
            let layer = doc.get_page(page).get_layer(layer);

            let rgb = DynamicImage::ImageRgb8(picture.to_rgb8());
            Image::from_dynamic_image(&rgb).add_to_layer(
                layer,
                ImageTransform {
                    translate_x: Some(Mm(placement.x)),
                    translate_y: Some(Mm(placement.y)),
                    dpi: Some(pixel_height as f32 * MM_PER_INCH / placement.height),
                    ..Default::default()
                },
            );
        }

        let mut writer = BufWriter::new(File::create(path)?);
        doc.save(&mut writer)
            .map_err(|e| PipelineError::Report(e.to_string()))?;

        tracing::info!(path = %path.display(), pages = self.page_count(), "wrote report document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use tempfile::TempDir;

    #[test]
    fn test_placement_uses_full_image_height() {
        let placement = Placement::for_image(1600, 960);
        assert!((placement.height - 240.0).abs() < 1e-3);
        assert!((placement.width - 400.0).abs() < 1e-3);
        assert!((placement.x - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_placement_shrinks_wide_images() {
        let placement = Placement::for_image(2000, 500);
        assert!((placement.width - 400.0).abs() < 1e-3);
        assert!((placement.height - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = ReportDocument::new("empty").save(&dir.path().join("out.pdf"));
        assert!(matches!(result, Err(PipelineError::Report(_))));
    }

    #[test]
    fn test_save_pdf() {
        let dir = TempDir::new().unwrap();
        let mut document = ReportDocument::new("Validation");
        for i in 0..2 {
            let path = dir.path().join(format!("{}.png", i));
            RgbImage::from_pixel(160, 96, image::Rgb([200, 30, 30])).save(&path).unwrap();
            document.add_image_page(path);
        }

        let out = dir.path().join("validation.pdf");
        document.save(&out).unwrap();

        assert_eq!(document.page_count(), 2);
        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
