use crate::config::UploadConfig;
use crate::coordinator::{self, UploadRequest};
use crate::error::UploadError;
use crate::parts::{Parts, FILE_FIELD, UPLOAD_DIR_FIELD};
use actix_web::{
    http::{header, Method},
    middleware::DefaultHeaders,
    web, HttpRequest, HttpResponse,
};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "POST, GET, OPTIONS, PUT, DELETE";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// CORS headers stamped on every response the app produces, errors included
pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN))
        .add((header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS))
        .add((header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS))
}

/// Registers `/upload`: `POST` stores files, `OPTIONS` answers preflights
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/upload")
            .route(web::post().to(upload))
            .route(web::method(Method::OPTIONS).to(preflight)),
    );
}

pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

#[tracing::instrument(name = "upload", skip_all, fields(files = tracing::field::Empty))]
pub async fn upload(
    req: HttpRequest,
    parts: Result<Parts, UploadError>,
    cfg: web::Data<UploadConfig>,
) -> Result<HttpResponse, UploadError> {
    let result = async move {
        let request = into_upload_request(&req, parts?)?;
        tracing::Span::current().record("files", request.files.len());

        coordinator::upload(request, &cfg.default_upload_dir).await?.into_result()
    }
    .await;

    match result {
        Ok(stored) => {
            let body: String = stored.iter().map(|s| s.message() + "\n").collect();
            Ok(HttpResponse::Ok().content_type(mime::TEXT_PLAIN_UTF_8).body(body))
        }
        Err(e) => {
            log_error(&e);
            Err(e)
        }
    }
}

/// Takes the `file` parts in submission order; `uploadDir` comes from the query string
/// first, then from the form. A form value that is not UTF-8 is rejected.
fn into_upload_request(req: &HttpRequest, mut parts: Parts) -> Result<UploadRequest, UploadError> {
    let from_query = url::form_urlencoded::parse(req.query_string().as_bytes())
        .find(|(k, _)| k == UPLOAD_DIR_FIELD)
        .map(|(_, v)| v.into_owned());

    let upload_dir = match from_query {
        Some(dir) => Some(dir),
        None => parts
            .texts
            .get(UPLOAD_DIR_FIELD)
            .map_err(|e| {
                tracing::warn!(error = %e, "`uploadDir` form value is not valid UTF-8");
                UploadError::MalformedRequest
            })?
            .map(str::to_owned),
    };

    Ok(UploadRequest { files: parts.files.remove(FILE_FIELD), upload_dir })
}

fn log_error(e: &UploadError) {
    use std::error::Error as _;
    use std::fmt::Write as _;

    let mut chain = String::new();
    let mut source = e.source();
    while let Some(s) = source {
        let _ = write!(chain, "{}; ", s);
        source = s.source();
    }

    match e {
        UploadError::MalformedRequest | UploadError::NoFiles => {
            tracing::warn!(error.msg = %e, "Rejected upload request")
        }
        _ => tracing::error!(
            error.msg = %e,
            error.details = ?e,
            error.source_chain = %chain,
            "Upload request failed"
        ),
    }
}
