//! End-to-end reconciliation cycles over mock collaborators.

use std::path::PathBuf;
use std::sync::Arc;

use crossseed_core::client::{DownloadClient, LocalTorrent, TorrentState};
use crossseed_core::config::ReconcileConfig;
use crossseed_core::ledger::{LedgerEntry, LedgerStore, SqliteLedger};
use crossseed_core::metadata::Normalizer;
use crossseed_core::reconciler::{EventOutcome, ReconcileError, Reconciler};
use crossseed_core::search::{SearchCandidate, SiteRegistry};
use crossseed_core::testing::{MockDownloadClient, MockSiteRegistry};

const GIB4: u64 = 4 * 1024 * 1024 * 1024;

fn local_torrent(hash: &str, name: &str, tags: &[&str]) -> LocalTorrent {
    LocalTorrent {
        hash: hash.to_string(),
        name: name.to_string(),
        source_site: Some("site-src".to_string()),
        save_path: PathBuf::from("/data/show"),
        files: Vec::new(),
        total_size: GIB4,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

fn candidate(site: &str, title: &str, size: u64) -> SearchCandidate {
    SearchCandidate {
        site: site.to_string(),
        source_url: format!("http://{}/dl/1.torrent", site),
        title: title.to_string(),
        size_bytes: size,
        files: None,
    }
}

struct Harness {
    client: Arc<MockDownloadClient>,
    registry: Arc<MockSiteRegistry>,
    ledger: Arc<SqliteLedger>,
    reconciler: Reconciler,
}

fn harness(sites: &[&str], config: ReconcileConfig) -> Harness {
    let client = Arc::new(MockDownloadClient::new());
    let registry = Arc::new(MockSiteRegistry::new(
        sites.iter().map(|s| s.to_string()).collect(),
    ));
    let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
    let reconciler = Reconciler::new(
        Arc::clone(&client) as Arc<dyn DownloadClient>,
        Arc::clone(&ledger) as Arc<dyn LedgerStore>,
        Arc::clone(&registry) as Arc<dyn SiteRegistry>,
        Normalizer::new(None),
        config,
    );
    Harness {
        client,
        registry,
        ledger,
        reconciler,
    }
}

fn fast_config() -> ReconcileConfig {
    ReconcileConfig {
        cooldown_min_secs: 0,
        cooldown_max_secs: 0,
        ..ReconcileConfig::default()
    }
}

// A near-exact remote copy is found, injected in split mode against the
// existing data, and recorded as a success.
#[tokio::test]
async fn cycle_injects_close_match_and_records_success() {
    let config = ReconcileConfig {
        split_mode: true,
        ..fast_config()
    };
    let h = harness(&["site-a"], config);
    h.client
        .set_completed(vec![local_torrent(
            "aaa111",
            "Show.Name.2024.1080p.H265-GROUP",
            &[],
        )])
        .await;
    h.client.set_added_state(TorrentState::Seeding).await;
    h.registry
        .set_results(
            "site-a",
            vec![candidate("site-a", "Show Name (2024) 1080p", GIB4 - 4096)],
        )
        .await;

    let summary = h.reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.injected, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.events.len(), 1);
    assert_eq!(summary.events[0].outcome, EventOutcome::Injected);
    assert_eq!(summary.events[0].target_sites, vec!["site-a"]);

    match h.ledger.lookup("aaa111").unwrap() {
        Some(LedgerEntry::Success { target_sites, .. }) => {
            assert_eq!(target_sites, vec!["site-a"]);
        }
        other => panic!("expected success entry, got {:?}", other),
    }

    // The injection pinned the original data location.
    let requests = h.client.add_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].save_path, Some(PathBuf::from("/data/show")));
    assert!(requests[0].no_relocate);
}

// A remote hit 2 MB off is rejected on size and recorded as a retryable failure.
#[tokio::test]
async fn cycle_rejects_oversized_delta_and_records_failure() {
    let h = harness(&["site-a"], fast_config());
    h.client
        .set_completed(vec![local_torrent(
            "bbb222",
            "Show.Name.2024.1080p.H265-GROUP",
            &[],
        )])
        .await;
    h.registry
        .set_results(
            "site-a",
            vec![candidate(
                "site-a",
                "Show Name 2024 1080p",
                GIB4 + 2 * 1024 * 1024,
            )],
        )
        .await;

    let summary = h.reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.matched, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.events[0].reason.as_deref(), Some("size-mismatch"));
    assert!(h.client.add_requests().await.is_empty());

    match h.ledger.lookup("bbb222").unwrap() {
        Some(LedgerEntry::Failed {
            reason,
            retry_count,
            ..
        }) => {
            assert_eq!(reason, "size-mismatch");
            assert_eq!(retry_count, 1);
        }
        other => panic!("expected failure entry, got {:?}", other),
    }
}

// An injected torrent that starts downloading is rolled back; the ledger
// records the mismatch and never a success.
#[tokio::test]
async fn cycle_rolls_back_downloading_injection() {
    let h = harness(&["site-a"], fast_config());
    h.client
        .set_completed(vec![local_torrent(
            "ccc333",
            "Show.Name.2024.1080p.H265-GROUP",
            &[],
        )])
        .await;
    h.client.set_added_state(TorrentState::Downloading).await;
    h.registry
        .set_results(
            "site-a",
            vec![candidate("site-a", "Show Name 2024 1080p", GIB4)],
        )
        .await;

    let summary = h.reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.matched, 1);
    assert_eq!(summary.injected, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        summary.events[0].reason.as_deref(),
        Some("post-injection-mismatch")
    );

    let removals = h.client.removals().await;
    assert_eq!(removals.len(), 1);
    // The injected copy downloaded into its own location; rollback takes
    // its files with it.
    assert!(removals[0].1);

    match h.ledger.lookup("ccc333").unwrap() {
        Some(LedgerEntry::Failed { reason, .. }) => {
            assert_eq!(reason, "post-injection-mismatch");
        }
        other => panic!("expected failure entry, got {:?}", other),
    }
}

// Every site down: the torrent fails with no-candidates and stays retryable.
#[tokio::test]
async fn cycle_survives_total_site_outage() {
    let h = harness(&["site-a", "site-b"], fast_config());
    h.client
        .set_completed(vec![local_torrent(
            "ddd444",
            "Show.Name.2024.1080p.H265-GROUP",
            &[],
        )])
        .await;
    h.registry.fail_next("site-a", 10, true).await;
    h.registry.fail_next("site-b", 10, true).await;

    let summary = h.reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.events[0].reason.as_deref(), Some("no-candidates"));

    match h.ledger.lookup("ddd444").unwrap() {
        Some(LedgerEntry::Failed {
            reason,
            retry_count,
            ..
        }) => {
            assert_eq!(reason, "no-candidates");
            assert_eq!(retry_count, 1);
        }
        other => panic!("expected failure entry, got {:?}", other),
    }

    // Still eligible next cycle with the default retry ceiling.
    assert!(h.ledger.is_eligible("ddd444", 3).unwrap());
}

// Torrents carrying an excluded tag never enter the pipeline.
#[tokio::test]
async fn cycle_never_touches_excluded_tags() {
    let config = ReconcileConfig {
        exclude_tags: vec!["no-cross".to_string()],
        ..fast_config()
    };
    let h = harness(&["site-a"], config);
    h.client
        .set_completed(vec![local_torrent(
            "eee555",
            "Show.Name.2024.1080p.H265-GROUP",
            &["no-cross"],
        )])
        .await;
    h.registry
        .set_results(
            "site-a",
            vec![candidate("site-a", "Show Name 2024 1080p", GIB4)],
        )
        .await;

    let summary = h.reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.scanned, 0);
    assert!(summary.events.is_empty());
    assert_eq!(h.registry.search_count("site-a").await, 0);
    assert!(h.client.add_requests().await.is_empty());
    assert!(h.ledger.lookup("eee555").unwrap().is_none());
}

// Retry counts rise monotonically across cycles and gate eligibility.
#[tokio::test]
async fn failures_accumulate_until_retry_ceiling() {
    let h = harness(&["site-a"], fast_config());
    h.client
        .set_completed(vec![local_torrent(
            "fff666",
            "Show.Name.2024.1080p.H265-GROUP",
            &[],
        )])
        .await;

    for expected in 1..=3u32 {
        let summary = h.reconciler.run_cycle().await.unwrap();
        assert_eq!(summary.failed, 1, "cycle {}", expected);
        match h.ledger.lookup("fff666").unwrap() {
            Some(LedgerEntry::Failed { retry_count, .. }) => {
                assert_eq!(retry_count, expected);
            }
            other => panic!("expected failure entry, got {:?}", other),
        }
    }

    // Fourth cycle: the hash is out of retries and is not scanned.
    let summary = h.reconciler.run_cycle().await.unwrap();
    assert_eq!(summary.scanned, 0);
}

// A success is terminal: later cycles skip the hash entirely.
#[tokio::test]
async fn success_is_terminal_across_cycles() {
    let h = harness(&["site-a"], fast_config());
    h.client
        .set_completed(vec![local_torrent(
            "abc123",
            "Show.Name.2024.1080p.H265-GROUP",
            &[],
        )])
        .await;
    h.registry
        .set_results(
            "site-a",
            vec![candidate("site-a", "Show Name 2024 1080p", GIB4)],
        )
        .await;

    let first = h.reconciler.run_cycle().await.unwrap();
    assert_eq!(first.injected, 1);

    let second = h.reconciler.run_cycle().await.unwrap();
    assert_eq!(second.scanned, 0);
    assert_eq!(h.client.add_requests().await.len(), 1);
}

// Two identical-score candidates: the site with fewer recorded successes wins.
#[tokio::test]
async fn ties_spread_load_to_less_served_site() {
    let h = harness(&["site-busy", "site-fresh"], fast_config());
    for n in 0..5 {
        h.ledger
            .record_success(&format!("old{}", n), None, &["site-busy".to_string()])
            .unwrap();
    }
    h.client
        .set_completed(vec![local_torrent(
            "tie111",
            "Show.Name.2024.1080p.H265-GROUP",
            &[],
        )])
        .await;
    h.registry
        .set_results(
            "site-busy",
            vec![candidate("site-busy", "Show Name 2024 1080p", GIB4)],
        )
        .await;
    h.registry
        .set_results(
            "site-fresh",
            vec![candidate("site-fresh", "Show Name 2024 1080p", GIB4)],
        )
        .await;

    let summary = h.reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.injected, 1);
    assert_eq!(summary.events[0].target_sites, vec!["site-fresh"]);
}

// The overlap guard rejects a second concurrent cycle.
#[tokio::test]
async fn overlapping_cycles_are_rejected() {
    let config = ReconcileConfig {
        // Non-zero cooldown keeps the first cycle in flight long enough
        // for the second call to collide with it.
        cooldown_min_secs: 1,
        cooldown_max_secs: 1,
        ..ReconcileConfig::default()
    };
    let h = harness(&["site-a"], config);
    h.client
        .set_completed(vec![local_torrent(
            "slow11",
            "Show.Name.2024.1080p.H265-GROUP",
            &[],
        )])
        .await;

    let reconciler = Arc::new(h.reconciler);
    let first = {
        let reconciler = Arc::clone(&reconciler);
        tokio::spawn(async move { reconciler.run_cycle().await })
    };
    // Let the first cycle take the lock.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let second = reconciler.run_cycle().await;
    assert!(matches!(second, Err(ReconcileError::CycleInProgress)));

    let first = first.await.unwrap();
    assert!(first.is_ok());
}

// Shutdown lets in-flight work settle and leaves the rest eligible.
#[tokio::test]
async fn shutdown_leaves_unstarted_torrents_eligible() {
    let config = ReconcileConfig {
        cooldown_min_secs: 1,
        cooldown_max_secs: 1,
        worker_pool: 1,
        ..ReconcileConfig::default()
    };
    let h = harness(&["site-a"], config);
    h.client
        .set_completed(vec![
            local_torrent("one111", "Show.One.2024.1080p.H265-GRP", &[]),
            local_torrent("two222", "Show.Two.2024.1080p.H265-GRP", &[]),
        ])
        .await;
    h.registry
        .set_results(
            "site-a",
            vec![candidate("site-a", "Show One 2024 1080p", GIB4)],
        )
        .await;

    let shutdown = h.reconciler.shutdown_handle();
    let reconciler = Arc::new(h.reconciler);
    let cycle = {
        let reconciler = Arc::clone(&reconciler);
        tokio::spawn(async move { reconciler.run_cycle().await })
    };

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    shutdown.send(()).unwrap();

    let summary = cycle.await.unwrap().unwrap();
    // Both were scanned; at most one reached a terminal outcome before
    // the stop request landed.
    assert_eq!(summary.scanned, 2);
    assert!(summary.events.len() <= 1);
}
