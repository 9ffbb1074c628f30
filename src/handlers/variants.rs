use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};

use super::{
    AppState, authorization, build_ticket, check_format, check_whitelist, open_data_prefix,
    open_index, parse_coordinate, parse_stream,
};
use crate::formats::bcf;
use crate::region::Region;
use crate::storage::ByteStream;
use crate::types::{Format, HtsgetResponse, TicketQuery};
use crate::{Error, Result, bgzf};

pub async fn get_variants(
    State(state): State<AppState>,
    Path((bucket, object)): Path<(String, String)>,
    Query(query): Query<TicketQuery>,
    headers: HeaderMap,
) -> Result<Json<HtsgetResponse>> {
    check_format(query.format.as_deref(), Format::Bcf.name())?;
    check_whitelist(&state, &bucket)?;
    let auth = authorization(&state, &headers)?;

    let data = open_data_prefix(&state, &bucket, &object).await?;
    let region = parse_region(&query, data).await?;
    if region.end > 0 && region.start > region.end {
        return Err(Error::InvalidRange(format!("{region}: start > end")));
    }

    let index = open_index(
        &state,
        &bucket,
        &[
            format!("{object}.csi"),
            format!("{}.csi", object.strip_suffix(".bcf").unwrap_or(&object)),
        ],
    )
    .await?;
    let chunks = parse_stream(index, move |index| bcf::read_index(index, &region)).await?;
    let chunks = bgzf::merge(chunks, state.block_size);
    tracing::debug!(chunks = chunks.len(), "variants ticket for {}/{}", bucket, object);

    Ok(Json(build_ticket(
        &state,
        &bucket,
        &object,
        Format::Bcf,
        &chunks,
        auth,
    )))
}

async fn parse_region(query: &TicketQuery, data: ByteStream) -> Result<Region> {
    if query.reference_name.is_none() && query.start.is_none() && query.end.is_none() {
        return Ok(Region::ALL_MAPPED_READS);
    }
    let Some(name) = query.reference_name.clone() else {
        return Err(Error::InvalidInput("no reference name specified".to_string()));
    };

    let reference_id = parse_stream(data, move |bcf| bcf::reference_id(bcf, &name)).await?;
    Ok(Region {
        reference_id,
        start: parse_coordinate(query.start.as_deref(), "start")?,
        end: parse_coordinate(query.end.as_deref(), "end")?,
    })
}
