// src/dispatcher.rs
// Per-request routing: matched file, precompressed variant, or SPA fallback

use actix_web::http::header::{self, CacheControl, CacheDirective, Expires, HttpDate};
use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use bytes::Bytes;
use log::{debug, warn};
use mime::Mime;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::compression::CompressionCache;
use crate::config::ServeConfig;
use crate::resolver::resolve;

/// 30 days, for both `Cache-Control: max-age` and `Expires`.
pub const CACHE_MAX_AGE_SECS: u32 = 2_592_000;

pub const ROOT_DOCUMENT: &str = "index.html";

/// What to send back for one request.
#[derive(Debug)]
pub enum ResponseDecision {
    /// A regular file inside the served directory. `compressed` holds the
    /// cached gzip bytes when the raw URL is in the compression cache.
    ServeFile {
        path: PathBuf,
        content_type: Mime,
        compressed: Option<Bytes>,
    },
    /// The precompressed root document, so the client-side router can take over.
    ServeFallback,
    /// Bare CORS answer to an `OPTIONS` request.
    ServeCorsPreflight,
}

/// Stateless request handler over an immutable config and cache.
pub struct Dispatcher {
    config: ServeConfig,
    cache: CompressionCache,
}

impl Dispatcher {
    pub fn new(config: ServeConfig, cache: CompressionCache) -> Self {
        Self { config, cache }
    }

    pub fn config(&self) -> &ServeConfig {
        &self.config
    }

    /// Decide how to answer `url` without producing the body yet.
    pub async fn decide(&self, method: &Method, url: &str) -> ResponseDecision {
        if self.config.cors_enabled && method == Method::OPTIONS {
            return ResponseDecision::ServeCorsPreflight;
        }

        let resolved = resolve(url, &self.config.base_directory, &self.config.base_href);
        let Some(path) = resolved.into_path() else {
            debug!("Route {} has no file, replacing with {}", url, ROOT_DOCUMENT);
            return ResponseDecision::ServeFallback;
        };

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => {
                debug!(
                    "Route {} ({}), replacing with {}",
                    url,
                    path.display(),
                    ROOT_DOCUMENT
                );
                return ResponseDecision::ServeFallback;
            }
        }

        let content_type = content_type_for(&path);
        let compressed = self.cache.get(url).map(|asset| asset.bytes.clone());

        ResponseDecision::ServeFile {
            path,
            content_type,
            compressed,
        }
    }

    /// Turn a decision into a response. Read failures degrade to the fallback.
    pub async fn respond(&self, decision: ResponseDecision) -> HttpResponse {
        match decision {
            ResponseDecision::ServeCorsPreflight => {
                let mut builder = HttpResponse::Ok();
                self.apply_cors_headers(&mut builder);
                builder.finish()
            }
            ResponseDecision::ServeFile {
                path,
                content_type,
                compressed: Some(bytes),
            } => {
                debug!(
                    "Sending {} with Content-Type {} (gzip)",
                    path.display(),
                    content_type
                );
                self.base_response()
                    .content_type(content_type)
                    .insert_header((header::CONTENT_ENCODING, "gzip"))
                    .body(bytes)
            }
            ResponseDecision::ServeFile {
                path,
                content_type,
                compressed: None,
            } => match tokio::fs::read(&path).await {
                Ok(content) => {
                    debug!("Sending {} with Content-Type {}", path.display(), content_type);
                    self.base_response().content_type(content_type).body(content)
                }
                Err(e) => {
                    warn!("Failed to read {}: {}, serving {}", path.display(), e, ROOT_DOCUMENT);
                    self.fallback_response()
                }
            },
            ResponseDecision::ServeFallback => self.fallback_response(),
        }
    }

    fn fallback_response(&self) -> HttpResponse {
        self.base_response()
            .content_type(mime::TEXT_HTML)
            .insert_header((header::CONTENT_ENCODING, "gzip"))
            .body(self.cache.fallback_document())
    }

    /// 200 with the CORS and cache headers every non-preflight response carries.
    fn base_response(&self) -> HttpResponseBuilder {
        let mut builder = HttpResponse::Ok();
        self.apply_cors_headers(&mut builder);

        if self.config.cache_headers_enabled {
            let expires = SystemTime::now() + Duration::from_secs(u64::from(CACHE_MAX_AGE_SECS));
            builder
                .insert_header(CacheControl(vec![
                    CacheDirective::Public,
                    CacheDirective::MaxAge(CACHE_MAX_AGE_SECS),
                ]))
                .insert_header(Expires(HttpDate::from(expires)));
        }

        builder
    }

    fn apply_cors_headers(&self, builder: &mut HttpResponseBuilder) {
        if !self.config.cors_enabled {
            return;
        }

        builder
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "*"))
            .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "OPTIONS, GET"))
            .insert_header((
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                "authorization, content-type",
            ));
    }
}

/// Default service: every method at every path lands here.
pub async fn handle(req: HttpRequest, dispatcher: web::Data<Dispatcher>) -> HttpResponse {
    let url = request_target(&req);
    let decision = dispatcher.decide(req.method(), url).await;
    dispatcher.respond(decision).await
}

/// The raw path and query as the client sent them.
fn request_target(req: &HttpRequest) -> &str {
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
}

/// MIME type from the file extension; unknown types fall back to octet-stream.
pub fn content_type_for(path: &Path) -> Mime {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("js") || ext.eq_ignore_ascii_case("mjs") => {
            mime::APPLICATION_JAVASCRIPT
        }
        Some(ext) => actix_files::file_extension_to_mime(ext),
        None => mime::APPLICATION_OCTET_STREAM,
    }
}

#[derive(Debug)]
pub struct RootDocumentError {
    pub searched: PathBuf,
    pub source: io::Error,
}

impl fmt::Display for RootDocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} could not be found in the specified path {}: {}",
            ROOT_DOCUMENT,
            self.searched
                .parent()
                .map(Path::display)
                .map(|d| d.to_string())
                .unwrap_or_default(),
            self.source
        )
    }
}

impl std::error::Error for RootDocumentError {}

/// Startup precondition: the root document must exist and be readable.
pub fn verify_root_document(base_directory: &Path) -> Result<PathBuf, RootDocumentError> {
    let searched = base_directory.join(ROOT_DOCUMENT);
    match std::fs::File::open(&searched).and_then(|file| {
        if file.metadata()?.is_file() {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"))
        }
    }) {
        Ok(()) => Ok(searched),
        Err(source) => Err(RootDocumentError { searched, source }),
    }
}
