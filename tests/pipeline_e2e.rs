use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use etf_holdings::catalog::{EtfCatalog, StoredSeries};
use etf_holdings::fetch::client::ClientSettings;
use etf_holdings::fetch::{FakeClock, FetchClient};
use etf_holdings::filings::Index;
use etf_holdings::pipeline::{CikOutcome, Pipeline, SkipReason};
use etf_holdings::store::DataStore;
use etf_holdings::tracker::{DateSpan, FetchedDates};
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CIK: u64 = 36405;
const PRIMARY_DOC: &str = include_str!("fixtures/primary_doc.xml");

fn catalog() -> EtfCatalog {
    let mut by_cik = BTreeMap::new();
    by_cik.insert(
        CIK,
        vec![StoredSeries {
            series_id: "S000002848".into(),
            name: "VTI".into(),
        }],
    );
    EtfCatalog::from_map(by_cik)
}

/// `(accession suffix, filing date)` pairs, newest first.
fn submissions(filings: &[(u32, &str)]) -> serde_json::Value {
    let accession: Vec<String> = filings
        .iter()
        .map(|(n, _)| format!("0000036405-25-{n:06}"))
        .collect();
    let dates: Vec<&str> = filings.iter().map(|(_, d)| *d).collect();
    let forms: Vec<&str> = filings.iter().map(|_| "NPORT-P").collect();
    json!({
        "cik": "36405",
        "name": "VANGUARD INDEX FUNDS",
        "filings": {
            "recent": {
                "accessionNumber": accession,
                "filingDate": dates,
                "form": forms
            },
            "files": []
        }
    })
}

async fn mount_submissions(server: &MockServer, filings: &[(u32, &str)]) {
    Mock::given(method("GET"))
        .and(path("/submissions/CIK0000036405.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(submissions(filings)))
        .mount(server)
        .await;
}

async fn mount_primary_docs(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/Archives/edgar/data/36405/\d{18}/primary_doc\.xml$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRIMARY_DOC))
        .mount(server)
        .await;
}

const UA: &str = "Acme ops@acme.test";

fn pipeline(server: &MockServer, root: &std::path::Path) -> Pipeline {
    pipeline_with(server, root, catalog(), ClientSettings::new(UA), Arc::new(FakeClock::new()))
}

fn pipeline_with(
    server: &MockServer,
    root: &std::path::Path,
    catalog: EtfCatalog,
    settings: ClientSettings,
    clock: Arc<FakeClock>,
) -> Pipeline {
    let client = FetchClient::with_clock(clock, settings).expect("client");
    Pipeline::new(client, catalog, DataStore::new(root), server.uri(), server.uri())
}

/// Volume window of `capacity` requests per minute. The submission index
/// request takes one slot, so a batch gets `capacity - 1`.
fn small_window(capacity: usize) -> ClientSettings {
    ClientSettings::new(UA).with_volume(capacity, WINDOW)
}

const WINDOW: Duration = Duration::from_secs(60);

fn stored_dates(store: &DataStore) -> Vec<String> {
    let raw = std::fs::read_to_string(store.all_path("VTI")).expect("all/VTI.json");
    let list: Vec<Index> = serde_json::from_str(&raw).expect("snapshot list");
    list.into_iter().map(|i| i.filing_date).collect()
}

async fn requested_doc_accessions(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|r| {
            let p = r.url.path();
            p.strip_suffix("/primary_doc.xml")
                .and_then(|rest| rest.rsplit('/').next())
                .map(str::to_string)
        })
        .collect()
}

#[tokio::test]
async fn second_run_fetches_only_new_filings() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::new(dir.path());

    // Run 1: three filings, nothing recorded yet.
    mount_submissions(&server, &[(3, "2025-09-03"), (2, "2025-09-02"), (1, "2025-09-01")]).await;
    mount_primary_docs(&server).await;

    let mut fetched = FetchedDates::load(&store.fetched_map_path()).unwrap();
    let summary = pipeline(&server, dir.path()).run(&mut fetched).await.unwrap();
    assert_eq!(
        summary.outcome(CIK),
        Some(&CikOutcome::Fetched {
            fetched: 3,
            failed: 0,
            unmatched: 0
        })
    );
    assert_eq!(fetched.span(CIK), DateSpan::new("2025-09-01", "2025-09-03"));
    assert_eq!(stored_dates(&store), vec!["2025-09-03", "2025-09-02", "2025-09-01"]);

    let latest: Index =
        serde_json::from_str(&std::fs::read_to_string(store.latest_path("VTI")).unwrap()).unwrap();
    assert_eq!(latest.filing_date, "2025-09-03");
    assert_eq!(latest.series_id, "S000002848");
    // The future is dropped; the rest is sorted by weight.
    let ids: Vec<&str> = latest.components.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["US5949181045", "US0378331005"]);

    // Run 2: two newer filings and one older than the recorded span.
    server.reset().await;
    mount_submissions(
        &server,
        &[
            (5, "2025-09-05"),
            (4, "2025-09-04"),
            (3, "2025-09-03"),
            (2, "2025-09-02"),
            (1, "2025-09-01"),
            (6, "2025-08-30"),
        ],
    )
    .await;
    mount_primary_docs(&server).await;

    let mut fetched = FetchedDates::load(&store.fetched_map_path()).unwrap();
    assert_eq!(fetched.span(CIK), DateSpan::new("2025-09-01", "2025-09-03"));
    pipeline(&server, dir.path()).run(&mut fetched).await.unwrap();

    assert_eq!(
        requested_doc_accessions(&server).await,
        vec!["000003640525000005", "000003640525000004", "000003640525000006"]
    );
    assert_eq!(fetched.span(CIK), DateSpan::new("2025-08-30", "2025-09-05"));
    assert_eq!(
        stored_dates(&store),
        vec![
            "2025-09-05",
            "2025-09-04",
            "2025-09-03",
            "2025-09-02",
            "2025-09-01",
            "2025-08-30"
        ]
    );

    // Run 3: nothing new.
    let summary = pipeline(&server, dir.path()).run(&mut fetched).await.unwrap();
    assert_eq!(
        summary.outcome(CIK),
        Some(&CikOutcome::Skipped(SkipReason::UpToDate))
    );
}

#[tokio::test]
async fn failed_document_date_stays_outside_span() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::new(dir.path());

    mount_submissions(&server, &[(2, "2025-09-02"), (1, "2025-09-01")]).await;
    Mock::given(path("/Archives/edgar/data/36405/000003640525000001/primary_doc.xml"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_primary_docs(&server).await;

    let mut fetched = FetchedDates::default();
    let summary = pipeline(&server, dir.path()).run(&mut fetched).await.unwrap();

    assert_eq!(
        summary.outcome(CIK),
        Some(&CikOutcome::Fetched {
            fetched: 1,
            failed: 1,
            unmatched: 0
        })
    );
    assert_eq!(summary.total_failed(), 1);
    assert_eq!(fetched.span(CIK), DateSpan::new("2025-09-02", "2025-09-02"));
    assert!(!fetched.span(CIK).contains("2025-09-01"));
    assert_eq!(
        FetchedDates::load(&store.fetched_map_path()).unwrap(),
        fetched
    );
    // The successful snapshot is still written.
    assert_eq!(stored_dates(&store), vec!["2025-09-02"]);
}

#[tokio::test]
async fn persistent_failure_does_not_pin_the_backlog() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_submissions(
        &server,
        &[
            (5, "2025-09-05"),
            (4, "2025-09-04"),
            (3, "2025-09-03"),
            (2, "2025-09-02"),
            (1, "2025-09-01"),
        ],
    )
    .await;
    Mock::given(path("/Archives/edgar/data/36405/000003640525000005/primary_doc.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_primary_docs(&server).await;

    // Two filings per run: the broken newest one plus one more.
    let mut fetched = FetchedDates::default();
    let expected_spans = [
        ("2025-09-04", "2025-09-04"),
        ("2025-09-03", "2025-09-04"),
        ("2025-09-02", "2025-09-04"),
        ("2025-09-01", "2025-09-04"),
    ];
    for (start, end) in expected_spans {
        let summary = pipeline_with(
            &server,
            dir.path(),
            catalog(),
            small_window(3),
            Arc::new(FakeClock::new()),
        )
        .run(&mut fetched)
        .await
        .unwrap();
        assert_eq!(
            summary.outcome(CIK),
            Some(&CikOutcome::Fetched {
                fetched: 1,
                failed: 1,
                unmatched: 0
            })
        );
        assert_eq!(fetched.span(CIK), DateSpan::new(start, end));
    }

    let accessions = requested_doc_accessions(&server).await;
    assert!(accessions.contains(&"000003640525000001".to_string()), "{accessions:?}");
    assert_eq!(
        accessions.iter().filter(|a| a.ends_with("000005")).count(),
        4,
        "the broken filing is retried every run"
    );
    let store = DataStore::new(dir.path());
    assert_eq!(
        stored_dates(&store),
        vec!["2025-09-04", "2025-09-03", "2025-09-02", "2025-09-01"]
    );
}

#[tokio::test]
async fn oversized_backlog_is_finished_on_the_next_run() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_submissions(
        &server,
        &[
            (5, "2025-09-05"),
            (4, "2025-09-04"),
            (3, "2025-09-04"),
            (2, "2025-09-03"),
            (1, "2025-09-02"),
        ],
    )
    .await;
    mount_primary_docs(&server).await;

    // Three slots left after the submission index: the cut lands after 09-04.
    let mut fetched = FetchedDates::default();
    pipeline_with(&server, dir.path(), catalog(), small_window(4), Arc::new(FakeClock::new()))
        .run(&mut fetched)
        .await
        .unwrap();
    assert_eq!(
        requested_doc_accessions(&server).await,
        vec!["000003640525000005", "000003640525000004", "000003640525000003"]
    );
    assert_eq!(fetched.span(CIK), DateSpan::new("2025-09-04", "2025-09-05"));

    let clock = Arc::new(FakeClock::new());
    let summary = pipeline_with(&server, dir.path(), catalog(), small_window(4), clock.clone())
        .run(&mut fetched)
        .await
        .unwrap();
    assert_eq!(
        summary.outcome(CIK),
        Some(&CikOutcome::Fetched {
            fetched: 2,
            failed: 0,
            unmatched: 0
        })
    );
    assert_eq!(fetched.span(CIK), DateSpan::new("2025-09-02", "2025-09-05"));
    assert!(!clock.sleeps().contains(&WINDOW));
}

#[tokio::test]
async fn no_boundary_aborts_run_but_keeps_earlier_spans() {
    const EARLIER_CIK: u64 = 10;

    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::new(dir.path());

    Mock::given(path("/submissions/CIK0000000010.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cik": "10",
            "filings": {"recent": {
                "accessionNumber": ["0000000010-25-000001"],
                "filingDate": ["2025-09-01"],
                "form": ["NPORT-P"]
            }}
        })))
        .mount(&server)
        .await;
    Mock::given(path("/Archives/edgar/data/10/000000001025000001/primary_doc.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRIMARY_DOC))
        .mount(&server)
        .await;
    mount_submissions(&server, &[(3, "2025-09-05"), (2, "2025-09-05"), (1, "2025-09-05")]).await;
    mount_primary_docs(&server).await;

    let mut by_cik = BTreeMap::new();
    by_cik.insert(
        EARLIER_CIK,
        vec![StoredSeries {
            series_id: "S000002848".into(),
            name: "EARLY".into(),
        }],
    );
    by_cik.insert(
        CIK,
        vec![StoredSeries {
            series_id: "S000002848".into(),
            name: "VTI".into(),
        }],
    );

    // Even a full window of 2 cannot hold three filings of one day.
    let clock = Arc::new(FakeClock::new());
    let mut fetched = FetchedDates::default();
    let err = pipeline_with(
        &server,
        dir.path(),
        EtfCatalog::from_map(by_cik),
        small_window(2),
        clock.clone(),
    )
    .run(&mut fetched)
    .await
    .unwrap_err();

    let msg = format!("{err:#}");
    assert!(msg.contains("processing cik 36405"), "{msg}");
    assert!(msg.contains("no filing-date boundary"), "{msg}");

    let on_disk = FetchedDates::load(&store.fetched_map_path()).unwrap();
    assert_eq!(on_disk.span(EARLIER_CIK), DateSpan::new("2025-09-01", "2025-09-01"));
    assert!(on_disk.span(CIK).is_empty());
    // One throttled submission request, then one forced sleep before giving up.
    assert_eq!(clock.sleeps().iter().filter(|d| **d == WINDOW).count(), 2);
    assert!(!store.all_path("VTI").exists());
}

#[tokio::test]
async fn missing_submission_index_skips_cik() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(path("/submissions/CIK0000036405.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut fetched = FetchedDates::default();
    let summary = pipeline(&server, dir.path()).run(&mut fetched).await.unwrap();
    assert_eq!(
        summary.outcome(CIK),
        Some(&CikOutcome::Skipped(SkipReason::SubmissionsUnavailable))
    );
    assert!(fetched.is_empty());
    // Layout is created up front.
    assert!(dir.path().join("all").is_dir());
    assert!(dir.path().join("latest").is_dir());
}

#[tokio::test]
async fn unknown_series_is_not_stored() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::new(dir.path());

    mount_submissions(&server, &[(1, "2025-09-01")]).await;
    Mock::given(method("GET"))
        .and(path_regex(r"/primary_doc\.xml$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(PRIMARY_DOC.replace("S000002848", "S000099999")),
        )
        .mount(&server)
        .await;

    let mut fetched = FetchedDates::default();
    let summary = pipeline(&server, dir.path()).run(&mut fetched).await.unwrap();
    assert_eq!(
        summary.outcome(CIK),
        Some(&CikOutcome::Fetched {
            fetched: 1,
            failed: 0,
            unmatched: 1
        })
    );
    assert!(!store.all_path("VTI").exists());
    // The filing was fetched and decoded, so the date still counts as covered.
    assert_eq!(fetched.span(CIK), DateSpan::new("2025-09-01", "2025-09-01"));
}
