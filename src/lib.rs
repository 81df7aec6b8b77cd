//! Accepts multipart/form-data uploads on `/upload` and writes every file part to disk
//! concurrently, answering only once all of them are done.

use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    middleware, web, App, HttpServer,
};

pub mod config;
pub mod coordinator;
pub mod error;
pub mod parts;
pub mod routes;
pub mod telemetry;

pub use config::{Config, ServerConfig, UploadConfig};
pub use coordinator::{Stored, UploadReport, UploadRequest};
pub use error::{MultipartError, StoreError, UploadError};
pub use parts::{FilePart, FileParts, Parts, TextParts};

/// The application with its CORS headers, access log, and upload routes
pub fn app(
    upload: web::Data<UploadConfig>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(upload)
        .wrap(routes::cors_headers())
        .wrap(middleware::Logger::default())
        .configure(routes::configure)
}

/// Serves the app until shutdown.
pub async fn run(config: Config) -> std::io::Result<()> {
    let addr = config.server.addr();
    let upload = web::Data::new(config.upload);

    let server = HttpServer::new(move || app(upload.clone())).bind(addr)?;
    tracing::info!("Server started at {}", addr);
    server.run().await
}
