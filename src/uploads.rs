use std::collections::HashMap;
use std::path::Path;

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::error::{AppError, AppResult};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Text fields plus at most one image part of a multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    image: Option<(String, Bytes)>,
}

impl MultipartForm {
    /// Drains the form. The part named `image_field` is taken as the image
    /// when it carries a filename and data; browsers send an empty part when
    /// no file was picked, which is ignored.
    pub async fn read(multipart: &mut Multipart, image_field: &str) -> AppResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if name == image_field {
                if let Some(file_name) = field.file_name().map(str::to_string) {
                    let data = field.bytes().await?;
                    if !file_name.is_empty() && !data.is_empty() {
                        form.image = Some((file_name, data));
                    }
                    continue;
                }
            }

            let value = field.text().await?;
            form.fields.insert(name, value);
        }

        Ok(form)
    }

    /// Trimmed value of a text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn take_image(&mut self) -> Option<(String, Bytes)> {
        self.image.take()
    }
}

/// Reduces a client-supplied filename to a safe final component with an
/// image extension.
pub fn sanitize_file_name(raw: &str) -> AppResult<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::BadRequest("Invalid file name".into()));
    }

    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Ok(name.to_string()),
        _ => Err(AppError::BadRequest(
            "Only png, jpg, jpeg, gif and webp images are allowed".into(),
        )),
    }
}

/// Writes an uploaded image and returns the stored filename (the path
/// clients use under `/assets/`). An existing file of the same name is
/// overwritten.
pub async fn save_image(uploads_dir: &Path, raw_name: &str, data: &[u8]) -> AppResult<String> {
    let file_name = sanitize_file_name(raw_name)?;
    tokio::fs::create_dir_all(uploads_dir).await?;
    tokio::fs::write(uploads_dir.join(&file_name), data).await?;
    tracing::info!("Stored upload {} ({} bytes)", file_name, data.len());
    Ok(file_name)
}
