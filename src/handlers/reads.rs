use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};

use super::{
    AppState, authorization, build_ticket, check_format, check_whitelist, open_data_prefix,
    open_index, parse_coordinate, parse_stream,
};
use crate::formats::bam;
use crate::region::Region;
use crate::storage::ByteStream;
use crate::types::{Format, HtsgetResponse, TicketQuery};
use crate::{Error, Result, bgzf};

pub async fn get_reads(
    State(state): State<AppState>,
    Path((bucket, object)): Path<(String, String)>,
    Query(query): Query<TicketQuery>,
    headers: HeaderMap,
) -> Result<Json<HtsgetResponse>> {
    check_format(query.format.as_deref(), Format::Bam.name())?;
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
            format!("{object}.bai"),
            format!("{}.bai", object.strip_suffix(".bam").unwrap_or(&object)),
        ],
    )
    .await?;
    let chunks = parse_stream(index, move |index| bam::read_index(index, &region)).await?;
    let chunks = bgzf::merge(chunks, state.block_size);
    tracing::debug!(chunks = chunks.len(), "reads ticket for {}/{}", bucket, object);

    Ok(Json(build_ticket(
        &state,
        &bucket,
        &object,
        Format::Bam,
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

    let reference_id = parse_stream(data, move |bam| bam::reference_id(bam, &name)).await?;
    Ok(Region {
        reference_id,
        start: parse_coordinate(query.start.as_deref(), "start")?,
        end: parse_coordinate(query.end.as_deref(), "end")?,
    })
}
