//! Fans a request's file parts out to one blocking task each and joins them back
//! into an index-aligned report.

use crate::error::{StoreError, UploadError};
use crate::parts::FilePart;
use actix_web::web;
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// The files of one request and where they should go
#[derive(Debug)]
pub struct UploadRequest {
    pub files: Vec<FilePart>,
    pub upload_dir: Option<String>,
}

/// A file that made it to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    pub file_name: String,
    pub path: PathBuf,
    pub bytes: u64,
}

impl Stored {
    /// The line reported to the client for this file
    pub fn message(&self) -> String {
        format!("File uploaded successfully: {}", self.file_name)
    }
}

/// One outcome per submitted file; `outcomes[i]` belongs to the i-th file part.
#[derive(Debug)]
pub struct UploadReport {
    pub dir: PathBuf,
    pub outcomes: Vec<Result<Stored, StoreError>>,
}

impl UploadReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &StoreError)> {
        self.outcomes.iter().enumerate().filter_map(|(i, o)| o.as_ref().err().map(|e| (i, e)))
    }

    /// Collapses the report: every success in submission order, or the aggregate failure
    /// as soon as one file failed. Files already written stay on disk either way.
    pub fn into_result(self) -> Result<Vec<Stored>, UploadError> {
        let total = self.outcomes.len();
        let failed = self.outcomes.iter().filter(|o| o.is_err()).count();
        if failed > 0 {
            return Err(UploadError::PartialFailure { failed, total });
        }
        Ok(self.outcomes.into_iter().flatten().collect())
    }
}

/// Cleans `raw` of `.`/`..` and redundant separators and makes it absolute against the
/// working directory. An empty value selects `default`.
pub fn resolve_upload_dir(raw: &str, default: &Path) -> Result<PathBuf, UploadError> {
    let dir = if raw.is_empty() { default } else { Path::new(raw) };
    dir.absolutize()
        .map(|p| p.into_owned())
        .map_err(|source| UploadError::ResolveDir { dir: dir.display().to_string(), source })
}

/// Final segment of a client-supplied file name. Both `/` and `\` count as separators
/// and trailing ones are ignored; names that end up empty, `.` or `..` have no usable base.
pub fn base_name(file_name: &str) -> Option<&str> {
    match file_name.trim_end_matches(['/', '\\']).rsplit(['/', '\\']).next() {
        Some("") | Some(".") | Some("..") | None => None,
        Some(base) => Some(base),
    }
}

/// Runs the whole upload: resolves and creates the destination, then stores every file.
/// A request without files is rejected before anything touches the filesystem.
pub async fn upload(req: UploadRequest, default_dir: &Path) -> Result<UploadReport, UploadError> {
    if req.files.is_empty() {
        return Err(UploadError::NoFiles);
    }

    let dir = resolve_upload_dir(req.upload_dir.as_deref().unwrap_or_default(), default_dir)?;
    tracing::info!(dir = %dir.display(), "Saving files");

    let create = dir.clone();
    web::block(move || std::fs::create_dir_all(&create))
        .await
        .map_err(|e| UploadError::CreateDir {
            dir: dir.clone(),
            source: std::io::Error::other(e),
        })?
        .map_err(|source| UploadError::CreateDir { dir: dir.clone(), source })?;

    Ok(store_all(dir, req.files).await)
}

/// Copies each part into `dir` on its own blocking task and waits for all of them.
///
/// The join preserves input order, so the report is index-aligned with `files` no matter
/// which copy finishes first.
pub async fn store_all(dir: PathBuf, files: Vec<FilePart>) -> UploadReport {
    let tasks = files.into_iter().map(|part| {
        let dir = dir.clone();
        async move {
            let file_name = part.file_name().to_owned();
            web::block(move || store_one(&dir, &part))
                .await
                .unwrap_or(Err(StoreError::Cancelled { file_name }))
        }
    });

    let outcomes = futures::future::join_all(tasks).await;
    let report = UploadReport { dir, outcomes };

    for (index, err) in report.failures() {
        tracing::warn!(
            index,
            error = %err,
            cause = ?std::error::Error::source(err),
            "File upload failed"
        );
    }
    tracing::info!(
        stored = report.len() - report.failures().count(),
        total = report.len(),
        "Upload finished"
    );

    report
}

fn store_one(dir: &Path, part: &FilePart) -> Result<Stored, StoreError> {
    let file_name = part.file_name();
    let mut src = part
        .open()
        .map_err(|source| StoreError::Open { file_name: file_name.to_owned(), source })?;

    let base = base_name(file_name)
        .ok_or_else(|| StoreError::InvalidFileName { file_name: file_name.to_owned() })?;
    let path = dir.join(base);
    tracing::info!(
        path = %path.display(),
        spool = %part.path().display(),
        len = part.len(),
        content_type = ?part.content_type(),
        "Saving file"
    );

    let mut dst = std::fs::File::create(&path)
        .map_err(|source| StoreError::Create { path: path.clone(), source })?;

    let bytes = std::io::copy(&mut src, &mut dst)
        .map_err(|source| StoreError::Copy { path: path.clone(), source })?;

    Ok(Stored { file_name: file_name.to_owned(), path, bytes })
}
