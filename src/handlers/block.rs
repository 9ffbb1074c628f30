use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

use super::{AppState, authorization, check_whitelist};
use crate::bgzf::Chunk;
use crate::block;
use crate::types::BlockQuery;
use crate::{Error, Result};

/// Serves one reassembled BGZF chunk - this is what ticket URLs point to.
pub async fn get_block(
    State(state): State<AppState>,
    Path((bucket, object)): Path<(String, String)>,
    Query(query): Query<BlockQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    check_whitelist(&state, &bucket)?;
    authorization(&state, &headers)?;

    let (Some(start), Some(end)) = (query.start.as_deref(), query.end.as_deref()) else {
        return Err(Error::InvalidInput("missing chunk range".to_string()));
    };
    let chunk = Chunk {
        start: start.parse()?,
        end: end.parse()?,
    };
    if chunk.end < chunk.start {
        return Err(Error::InvalidRange(format!("{chunk}: start > end")));
    }

    let reader = block::read_block(state.store.as_ref(), &bucket, &object, chunk).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from_stream(ReaderStream::new(reader)))
        .unwrap())
}
