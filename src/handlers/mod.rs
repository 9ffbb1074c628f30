mod block;
mod reads;
mod service_info;
mod variants;

pub use block::get_block;
pub use reads::get_reads;
pub use service_info::service_info;
pub use variants::get_variants;

use axum::http::{HeaderMap, header};
use axum::routing::get;
use axum::Router;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::bgzf::Chunk;
use crate::storage::{ByteStream, ObjectStore};
use crate::types::{Format, HtsgetResponse, HtsgetResponseBody, UrlEntry};
use crate::{Error, Result};

// A ticket always ends with the BGZF EOF marker so that sequentially
// concatenated URL bodies form a complete stream.
const EOF_MARKER_DATA_URL: &str = "data:;base64,H4sIBAAAAAAA/wYAQkMCABsAAwAAAAAAAAAAAA==";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub base_url: String,
    pub block_size: u64,
    pub whitelist: Option<HashSet<String>>,
    pub secure: bool,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/reads/{bucket}/{*object}", get(get_reads))
        .route("/variants/{bucket}/{*object}", get(get_variants))
        .route("/block/{bucket}/{*object}", get(get_block))
        .route("/service-info", get(service_info))
        .with_state(state)
}

pub(crate) fn check_format(format: Option<&str>, want: &'static str) -> Result<()> {
    match format {
        None | Some("") => Ok(()),
        Some(format) if format == want => Ok(()),
        Some(format) => Err(Error::UnsupportedFormat(format!(
            "unsupported format {format:?}"
        ))),
    }
}

pub(crate) fn check_whitelist(state: &AppState, bucket: &str) -> Result<()> {
    match &state.whitelist {
        Some(allowed) if !allowed.contains(bucket) => Err(Error::PermissionDenied(format!(
            "access to bucket {bucket} is not allowed"
        ))),
        _ => Ok(()),
    }
}

/// In secure mode, requires a bearer token and returns the Authorization
/// header value to echo into ticket URLs.
pub(crate) fn authorization(state: &AppState, headers: &HeaderMap) -> Result<Option<String>> {
    if !state.secure {
        return Ok(None);
    }
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(Error::InvalidAuthentication)?;
    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() => Ok(Some(value.to_string())),
        _ => Err(Error::InvalidAuthentication),
    }
}

pub(crate) fn parse_coordinate(value: Option<&str>, what: &str) -> Result<u32> {
    match value {
        None => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::InvalidInput(format!("parsing {what}: {e}"))),
    }
}

/// Opens the first index object that exists, trying each candidate name in
/// order.
pub(crate) async fn open_index(
    state: &AppState,
    bucket: &str,
    candidates: &[String],
) -> Result<ByteStream> {
    let mut last_error = Error::NotFound(candidates.join(", "));
    for object in candidates {
        match state.store.open_range(bucket, object, 0, None).await {
            Ok(index) => return Ok(index),
            Err(err) => last_error = err,
        }
    }
    Err(last_error)
}

/// Reads the first `block_size` bytes of the data object; the headers the
/// resolvers need always sit inside this prefix.
pub(crate) async fn open_data_prefix(
    state: &AppState,
    bucket: &str,
    object: &str,
) -> Result<ByteStream> {
    state
        .store
        .open_range(bucket, object, 0, Some(state.block_size))
        .await
}

/// Runs a blocking parser over an object stream on the blocking pool.
pub(crate) async fn parse_stream<T, F>(stream: ByteStream, parse: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(tokio_util::io::SyncIoBridge<ByteStream>) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || parse(tokio_util::io::SyncIoBridge::new(stream)))
        .await
        .map_err(|e| {
            if e.is_cancelled() {
                Error::Cancelled
            } else {
                Error::Internal(format!("parser task failed: {e}"))
            }
        })?
}

pub(crate) fn build_ticket(
    state: &AppState,
    bucket: &str,
    object: &str,
    format: Format,
    chunks: &[Chunk],
    auth: Option<String>,
) -> HtsgetResponse {
    let headers =
        auth.map(|value| HashMap::from([(String::from("Authorization"), value)]));

    let mut urls: Vec<UrlEntry> = chunks
        .iter()
        .map(|chunk| UrlEntry {
            url: format!(
                "{}/block/{}/{}?start={}&end={}",
                state.base_url, bucket, object, chunk.start, chunk.end
            ),
            headers: headers.clone(),
        })
        .collect();
    urls.push(UrlEntry {
        url: EOF_MARKER_DATA_URL.to_string(),
        headers: None,
    });

    HtsgetResponse {
        htsget: HtsgetResponseBody { format, urls },
    }
}
