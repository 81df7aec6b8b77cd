use crate::config::UploadConfig;
use crate::error::{MultipartError, UploadError};
use actix_multipart::{Field, Multipart};
use actix_web::{dev, http::header, web, FromRequest, HttpRequest};
use bytes::{Bytes, BytesMut};
use futures::{future::Future, stream::TryStreamExt};
use mime::Mime;
use tempfile::NamedTempFile;

use std::io::Write;
use std::path::Path;
use std::pin::Pin;

/// Form field carrying the uploaded files
pub const FILE_FIELD: &str = "file";

/// Form field or query parameter naming the destination directory
pub const UPLOAD_DIR_FIELD: &str = "uploadDir";

/// The parts of a multipart/form-data request, in submission order
#[derive(Debug, Default)]
pub struct Parts {
    pub texts: TextParts,
    pub files: FileParts,
}

/// The text parts of a multipart/form-data request
#[derive(Debug, Default)]
pub struct TextParts(pub Vec<(String, Bytes)>);

/// The file parts of a multipart/form-data request
#[derive(Debug, Default)]
pub struct FileParts(pub Vec<(String, FilePart)>);

/// An uploaded file spooled to a tempfile, with the name the client sent
#[derive(Debug)]
pub struct FilePart {
    inner: NamedTempFile,
    file_name: String,
    content_type: Option<Mime>,
    len: u64,
}

impl FilePart {
    pub fn new(
        inner: NamedTempFile,
        file_name: String,
        content_type: Option<Mime>,
        len: u64,
    ) -> Self {
        FilePart { inner, file_name, content_type, len }
    }

    /// Spool `bytes` into a fresh tempfile under `temp_dir` (or the system default).
    pub fn from_bytes(
        file_name: impl Into<String>,
        bytes: &[u8],
        temp_dir: Option<&Path>,
    ) -> std::io::Result<Self> {
        let mut inner = match temp_dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };
        inner.write_all(bytes)?;
        Ok(FilePart::new(inner, file_name.into(), None, bytes.len() as u64))
    }

    /// The filename provided in the multipart/form-data request, untouched
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Location of the spooled content
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Opens an independent read handle on the spooled content, from the start.
    pub fn open(&self) -> std::io::Result<std::fs::File> {
        self.inner.reopen()
    }
}

impl TextParts {
    /// First value recorded under `key`; `Err` when that value is not valid UTF-8
    pub fn get(&self, key: &str) -> Result<Option<&str>, std::str::Utf8Error> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| std::str::from_utf8(v)).transpose()
    }
}

impl FileParts {
    /// Returns any files for the given names and removes them from the container
    pub fn remove(&mut self, key: &str) -> Vec<FilePart> {
        let mut taken = Vec::with_capacity(self.0.len());
        let mut untaken = Vec::with_capacity(self.0.len());

        for (k, v) in self.0.drain(..) {
            if k == key {
                taken.push(v);
            } else {
                untaken.push((k, v));
            }
        }

        self.0 = untaken;

        taken
    }
}

#[derive(Debug)]
enum Part {
    Text(Bytes),
    File(FilePart),
}

enum Buffer {
    Bytes(BytesMut),
    File(NamedTempFile, String),
}

impl FromRequest for Parts {
    type Error = UploadError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, payload: &mut dev::Payload) -> Self::Future {
        let cfg = req
            .app_data::<web::Data<UploadConfig>>()
            .cloned()
            .unwrap_or_else(|| web::Data::new(UploadConfig::default()));

        if !req.headers().contains_key(header::CONTENT_TYPE) {
            return Box::pin(futures::future::err(UploadError::MalformedRequest));
        }

        let multipart = Multipart::new(req.headers(), payload.take());

        Box::pin(async move {
            let mut multipart = multipart;
            let mut parts = Parts::default();
            let mut total = 0u64;

            while let Some(field) =
                multipart.try_next().await.map_err(|e| UploadError::Multipart(e.into()))?
            {
                let (name, part) =
                    handle_field(&cfg, field, &mut total).await.map_err(UploadError::Multipart)?;
                match part {
                    Part::Text(s) => parts.texts.0.push((name, s)),
                    Part::File(f) => parts.files.0.push((name, f)),
                }
            }

            Ok(parts)
        })
    }
}

async fn new_temp_file(cfg: &web::Data<UploadConfig>) -> Result<NamedTempFile, MultipartError> {
    let cfg = cfg.clone();
    web::block(move || match cfg.temp_dir.as_ref() {
        Some(temp_dir) => NamedTempFile::new_in(temp_dir),
        _ => NamedTempFile::new(),
    })
    .await
    .map_err(|_| MultipartError::Cancelled)?
    .map_err(MultipartError::Spool)
}

/// Drains one field into memory (text) or a tempfile (file), counting its bytes
/// against the form-wide limit.
async fn handle_field(
    cfg: &web::Data<UploadConfig>,
    mut field: Field,
    total: &mut u64,
) -> Result<(String, Part), MultipartError> {
    let disposition = field.content_disposition();
    let name = disposition.get_name().unwrap_or_default().to_owned();
    let file_name_opt = disposition.get_filename().map(str::to_owned);
    let content_type = field.content_type().cloned();

    let mut buffer = match file_name_opt {
        Some(file_name) => Buffer::File(new_temp_file(cfg).await?, file_name),
        None => Buffer::Bytes(BytesMut::new()),
    };

    let mut len = 0u64;

    while let Some(bytes) = field.try_next().await? {
        len += bytes.len() as u64;
        *total += bytes.len() as u64;
        if *total > cfg.max_form_size {
            return Err(MultipartError::TooLarge { limit: cfg.max_form_size });
        }

        buffer = match buffer {
            Buffer::Bytes(mut buf) => {
                buf.extend_from_slice(&bytes);
                Buffer::Bytes(buf)
            }
            Buffer::File(mut file, file_name) => web::block(move || {
                file.write_all(bytes.as_ref()).map(|_| Buffer::File(file, file_name))
            })
            .await
            .map_err(|_| MultipartError::Cancelled)?
            .map_err(MultipartError::Spool)?,
        };
    }

    match buffer {
        Buffer::Bytes(buf) => Ok((name, Part::Text(buf.freeze()))),
        Buffer::File(file, file_name) => {
            Ok((name, Part::File(FilePart::new(file, file_name, content_type, len))))
        }
    }
}
