use std::path::{Path, PathBuf};

use image::GenericImageView;
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::PackagingError;

/// Assembles pages into a PDF, one full-bleed page per image.
///
/// Jpeg data passes straight through as a DCTDecode stream; every other
/// format is decoded and embedded as raw RGB.
pub fn write(pages: &[PathBuf], target: &Path) -> Result<(), PackagingError> {
    let pdf_err = |reason: String| PackagingError::Pdf {
        path: target.to_path_buf(),
        reason,
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut page_ids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let bytes = std::fs::read(page).map_err(|e| PackagingError::Io {
            path: page.clone(),
            source: e,
        })?;

        let img = image::load_from_memory(&bytes)
            .map_err(|e| pdf_err(format!("cannot decode {}: {}", page.display(), e)))?;
        let (width, height) = img.dimensions();

        let is_jpeg = bytes.starts_with(&[0xFF, 0xD8, 0xFF]);
        let image_stream = if is_jpeg {
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                bytes,
            )
        } else {
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                img.to_rgb8().into_raw(),
            )
        };
        let image_id = doc.add_object(Object::Stream(image_stream));

        let resources_id = doc.add_object(dictionary! {
            "XObject" => dictionary! {
                "Im1" => image_id,
            },
        });

        // Page size equals image size in points; the image fills the page.
        let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im1 Do\nQ\n", width, height);
        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            content.into_bytes(),
        )));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                (width as i64).into(),
                (height as i64).into(),
            ],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.clone(),
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(target).map_err(|e| pdf_err(e.to_string()))?;
    Ok(())
}
