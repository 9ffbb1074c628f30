//! End-to-end tests driving the HTTP surface against generated data files.
//!
//! The fixtures are small but real: BGZF-compressed BAM and BCF files with
//! matching BAI and CSI indexes, written into a temporary bucket directory.

use axum_test::TestServer;
use serde_json::Value;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use htsgetd::bgzf::{self, Address};
use htsgetd::handlers::{AppState, create_router};
use htsgetd::storage::LocalStore;

const BASE_URL: &str = "http://localhost:8080";
const EOF_DATA_URL: &str = "data:;base64,H4sIBAAAAAAA/wYAQkMCABsAAwAAAAAAAAAAAA==";

struct Fixture {
    dir: TempDir,
    bam_header: Vec<u8>,
    records: Vec<Vec<u8>>,
    // Compressed offsets of the BAM's header block, two record blocks, and
    // EOF marker.
    offsets: [u64; 4],
}

fn push_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_address(buf: &mut Vec<u8>, address: Address) {
    buf.extend_from_slice(&u64::from(address).to_le_bytes());
}

fn write_bam(bucket: &Path) -> (Vec<u8>, Vec<Vec<u8>>, [u64; 4]) {
    let mut header = b"BAM\x01".to_vec();
    let text = b"@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:ref1\tLN:100000\n";
    push_i32(&mut header, text.len() as i32);
    header.extend_from_slice(text);
    push_i32(&mut header, 1);
    push_i32(&mut header, 5);
    header.extend_from_slice(b"ref1\0");
    push_i32(&mut header, 100_000);

    let records: Vec<Vec<u8>> = vec![
        (0..3000u32).map(|i| (i * 13 + 7) as u8).collect(),
        (0..1500u32).map(|i| (i * 31 + 1) as u8).collect(),
    ];

    let mut file = Vec::new();
    let mut offsets = [0u64; 4];
    for (i, payload) in std::iter::once(&header).chain(records.iter()).enumerate() {
        offsets[i] = file.len() as u64;
        file.extend_from_slice(&bgzf::encode_block(payload).unwrap());
    }
    offsets[3] = file.len() as u64;
    file.extend_from_slice(&bgzf::EOF_MARKER);
    std::fs::write(bucket.join("sample.bam"), file).unwrap();

    (header, records, offsets)
}

fn write_bai(bucket: &Path, offsets: &[u64; 4]) {
    let mut bai = b"BAI\x01".to_vec();
    push_i32(&mut bai, 1);
    // One bin covering the first 16kb window, one chunk spanning both record
    // blocks.
    push_i32(&mut bai, 1);
    bai.extend_from_slice(&4681u32.to_le_bytes());
    push_i32(&mut bai, 1);
    push_address(&mut bai, Address::new(offsets[1], 0));
    push_address(&mut bai, Address::new(offsets[3], 0));
    // Linear index with a single window.
    push_i32(&mut bai, 1);
    push_address(&mut bai, Address::new(offsets[1], 0));
    std::fs::write(bucket.join("sample.bam.bai"), bai).unwrap();
}

fn write_bcf(bucket: &Path) -> [u64; 3] {
    let text = concat!(
        "##fileformat=VCFv4.2\n",
        "##contig=<ID=19,length=58617616>\n",
        "##contig=<ID=X,length=156040895>\n",
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n",
    );
    let mut header = b"BCF\x02\x02".to_vec();
    header.extend_from_slice(&(text.len() as u32).to_le_bytes());
    header.extend_from_slice(text.as_bytes());

    let records: Vec<u8> = (0..800u32).map(|i| (i * 11 + 3) as u8).collect();

    let mut file = Vec::new();
    let mut offsets = [0u64; 3];
    offsets[0] = 0;
    file.extend_from_slice(&bgzf::encode_block(&header).unwrap());
    offsets[1] = file.len() as u64;
    file.extend_from_slice(&bgzf::encode_block(&records).unwrap());
    offsets[2] = file.len() as u64;
    file.extend_from_slice(&bgzf::EOF_MARKER);
    std::fs::write(bucket.join("sample.bcf"), file).unwrap();
    offsets
}

fn write_csi(bucket: &Path, offsets: &[u64; 3]) {
    let mut csi = b"CSI\x01".to_vec();
    push_i32(&mut csi, 14);
    push_i32(&mut csi, 5);
    push_i32(&mut csi, 0);
    push_i32(&mut csi, 1);
    push_i32(&mut csi, 1);
    csi.extend_from_slice(&4681u32.to_le_bytes());
    push_address(&mut csi, Address::new(offsets[1], 0));
    push_i32(&mut csi, 1);
    push_address(&mut csi, Address::new(offsets[1], 0));
    push_address(&mut csi, Address::new(offsets[2], 0));
    std::fs::write(
        bucket.join("sample.bcf.csi"),
        bgzf::encode_block(&csi).unwrap(),
    )
    .unwrap();
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let bucket = dir.path().join("genomics");
    std::fs::create_dir(&bucket).unwrap();

    let (bam_header, records, offsets) = write_bam(&bucket);
    write_bai(&bucket, &offsets);
    let bcf_offsets = write_bcf(&bucket);
    write_csi(&bucket, &bcf_offsets);

    Fixture {
        dir,
        bam_header,
        records,
        offsets,
    }
}

fn state(fixture: &Fixture) -> AppState {
    AppState {
        store: Arc::new(LocalStore::new(fixture.dir.path().to_path_buf())),
        base_url: BASE_URL.to_string(),
        // Small enough that the header and data chunks stay separate.
        block_size: 65536,
        whitelist: None,
        secure: false,
    }
}

fn server(state: AppState) -> TestServer {
    TestServer::new(create_router(state)).unwrap()
}

fn decode_stream(bytes: &[u8]) -> Vec<u8> {
    let mut r = Cursor::new(bytes);
    let mut data = Vec::new();
    while (r.position() as usize) < bytes.len() {
        let (block, _) = bgzf::decode_block(&mut r).unwrap();
        data.extend_from_slice(&block);
    }
    data
}

/// Fetches every URL of a ticket in order and concatenates the bodies the
/// way an htsget client would.
async fn materialize(server: &TestServer, ticket: &Value) -> Vec<u8> {
    let mut stream = Vec::new();
    for url in ticket["htsget"]["urls"].as_array().unwrap() {
        let url = url["url"].as_str().unwrap();
        if url == EOF_DATA_URL {
            stream.extend_from_slice(&bgzf::EOF_MARKER);
            continue;
        }
        let path = url.strip_prefix(BASE_URL).unwrap();
        let response = server.get(path).await;
        response.assert_status_ok();
        stream.extend_from_slice(response.as_bytes());
    }
    stream
}

#[tokio::test]
async fn test_reads_ticket_covers_whole_file() {
    let f = fixture();
    let server = server(state(&f));

    let response = server.get("/reads/genomics/sample.bam").await;
    response.assert_status_ok();

    let ticket: Value = response.json();
    assert_eq!(ticket["htsget"]["format"], "BAM");

    let urls = ticket["htsget"]["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 3);
    assert!(
        urls[0]["url"]
            .as_str()
            .unwrap()
            .contains("/block/genomics/sample.bam?start=")
    );
    assert_eq!(urls[2]["url"], EOF_DATA_URL);
}

#[tokio::test]
async fn test_concatenated_ticket_urls_rebuild_the_file() {
    let f = fixture();
    let server = server(state(&f));

    let response = server.get("/reads/genomics/sample.bam").await;
    response.assert_status_ok();
    let ticket: Value = response.json();

    let stream = materialize(&server, &ticket).await;
    let mut want = f.bam_header.clone();
    want.extend_from_slice(&f.records[0]);
    want.extend_from_slice(&f.records[1]);
    assert_eq!(decode_stream(&stream), want);
}

#[tokio::test]
async fn test_reads_ticket_with_region_resolves_reference() {
    let f = fixture();
    let server = server(state(&f));

    let response = server
        .get("/reads/genomics/sample.bam?referenceName=ref1&start=100&end=16000")
        .await;
    response.assert_status_ok();

    let ticket: Value = response.json();
    let urls = ticket["htsget"]["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 3);

    let stream = materialize(&server, &ticket).await;
    let mut want = f.bam_header.clone();
    want.extend_from_slice(&f.records[0]);
    want.extend_from_slice(&f.records[1]);
    assert_eq!(decode_stream(&stream), want);
}

#[tokio::test]
async fn test_block_endpoint_reassembles_partial_blocks() {
    let f = fixture();
    let server = server(state(&f));

    let start = Address::new(f.offsets[1], 100);
    let end = Address::new(f.offsets[2], 200);
    let response = server
        .get(&format!(
            "/block/genomics/sample.bam?start={start}&end={end}"
        ))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/octet-stream"
    );

    let mut want = f.records[0][100..].to_vec();
    want.extend_from_slice(&f.records[1][..200]);
    assert_eq!(decode_stream(response.as_bytes()), want);
}

#[tokio::test]
async fn test_variants_ticket_round_trips() {
    let f = fixture();
    let server = server(state(&f));

    let response = server
        .get("/variants/genomics/sample.bcf?referenceName=19&start=0&end=1000")
        .await;
    response.assert_status_ok();

    let ticket: Value = response.json();
    assert_eq!(ticket["htsget"]["format"], "BCF");
    let urls = ticket["htsget"]["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 3);
    assert_eq!(urls[2]["url"], EOF_DATA_URL);
}

#[tokio::test]
async fn test_format_is_case_sensitive() {
    let f = fixture();
    let server = server(state(&f));

    for query in ["format=bam", "format=CRAM", "format=BCF"] {
        let response = server
            .get(&format!("/reads/genomics/sample.bam?{query}"))
            .await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["htsget"]["error"], "UnsupportedFormat", "{query}");
    }
}

#[tokio::test]
async fn test_missing_object_is_not_found() {
    let f = fixture();
    let server = server(state(&f));

    let response = server.get("/reads/genomics/missing.bam").await;
    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "NotFound");
}

#[tokio::test]
async fn test_unknown_reference_is_not_found() {
    let f = fixture();
    let server = server(state(&f));

    let response = server
        .get("/reads/genomics/sample.bam?referenceName=nope")
        .await;
    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "NotFound");
}

#[tokio::test]
async fn test_inverted_range_is_rejected() {
    let f = fixture();
    let server = server(state(&f));

    let response = server
        .get("/reads/genomics/sample.bam?referenceName=ref1&start=5&end=2")
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "InvalidRange");
}

#[tokio::test]
async fn test_range_without_reference_name_is_rejected() {
    let f = fixture();
    let server = server(state(&f));

    let response = server.get("/reads/genomics/sample.bam?start=100").await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "InvalidInput");
}

#[tokio::test]
async fn test_whitelist_restricts_buckets() {
    let f = fixture();
    let mut app_state = state(&f);
    app_state.whitelist = Some(HashSet::from(["elsewhere".to_string()]));
    let server = server(app_state);

    let response = server.get("/reads/genomics/sample.bam").await;
    response.assert_status(axum::http::StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "PermissionDenied");
}

#[tokio::test]
async fn test_secure_mode_requires_and_echoes_bearer_tokens() {
    let f = fixture();
    let mut app_state = state(&f);
    app_state.secure = true;
    let server = server(app_state);

    let response = server.get("/reads/genomics/sample.bam").await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);

    let response = server
        .get("/reads/genomics/sample.bam")
        .add_header(
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderValue::from_static("Bearer test-token"),
        )
        .await;
    response.assert_status_ok();

    let ticket: Value = response.json();
    let urls = ticket["htsget"]["urls"].as_array().unwrap();
    assert_eq!(urls[0]["headers"]["Authorization"], "Bearer test-token");
    // The EOF marker entry carries no headers.
    assert!(urls.last().unwrap()["headers"].is_null());
}

#[tokio::test]
async fn test_service_info_reports_htsget_artifact() {
    let f = fixture();
    let server = server(state(&f));

    let response = server.get("/service-info").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["type"]["artifact"], "htsget");
    assert_eq!(body["htsget"]["formats"][0], "BAM");
}
