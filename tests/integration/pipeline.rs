//! Update pipeline scenarios through the public API.

use serde_json::json;
use signed_launcher::test_utils::fixtures::{BUILD, BUILD_SIG, BUILD_SIGNER, ROGUE_SIG};
use signed_launcher::test_utils::{MockFetcher, ReleaseFixture, init_test_logging};
use signed_launcher::update::{
    ErrorKind, GraphOutcome, Halt, SignatureVerifier, TaskGraph, UpdateError, UpdateOutcome,
    Updater,
};
use tempfile::TempDir;
use tracing::Dispatch;

fn updater(fetcher: &MockFetcher) -> Updater<MockFetcher> {
    init_test_logging(None);
    Updater::new(fetcher.clone()).with_logger(Dispatch::none())
}

/// No local copy yet: both files are installed.
#[tokio::test]
async fn first_install_writes_executable_and_signature() {
    let temp = TempDir::new().unwrap();
    let fixture = ReleaseFixture::new("tool-linux");
    let fetcher = MockFetcher::new();
    fixture.publish(&fetcher);
    let targets = fixture.targets(temp.path());

    let outcome = updater(&fetcher).run(&targets).await;

    let UpdateOutcome::Updated(report) = outcome else {
        panic!("expected update, got {outcome:?}");
    };
    assert_eq!(report.signer.to_string(), BUILD_SIGNER);
    assert_eq!(report.executable, targets.executable);
    assert_eq!(std::fs::read(&targets.executable).unwrap(), BUILD);
    assert_eq!(std::fs::read_to_string(&targets.signature).unwrap(), BUILD_SIG);
}

/// Same signature locally: no binary or key download, nothing rewritten.
#[tokio::test]
async fn current_install_is_left_untouched() {
    let temp = TempDir::new().unwrap();
    let fixture = ReleaseFixture::new("tool-linux");
    let fetcher = MockFetcher::new();
    fixture.publish(&fetcher);
    let targets = fixture.targets(temp.path());
    std::fs::write(&targets.signature, BUILD_SIG).unwrap();
    std::fs::write(&targets.executable, b"installed").unwrap();
    let before = std::fs::metadata(&targets.signature).unwrap().modified().unwrap();

    let outcome = updater(&fetcher).run(&targets).await;

    assert!(matches!(outcome, UpdateOutcome::Skipped { .. }));
    assert!(outcome.should_launch());
    assert_eq!(fetcher.request_count(&fixture.executable_url), 0);
    assert_eq!(fetcher.request_count(&fixture.public_key_url), 0);
    assert_eq!(std::fs::metadata(&targets.signature).unwrap().modified().unwrap(), before);
    assert_eq!(std::fs::read(&targets.executable).unwrap(), b"installed");
}

/// New signature from an untrusted key: refused, old files stay.
#[tokio::test]
async fn untrusted_release_fails_closed() {
    let temp = TempDir::new().unwrap();
    let fixture = ReleaseFixture::new("tool-linux");
    let fetcher = MockFetcher::new();
    fixture.publish(&fetcher);
    fetcher.serve(&fixture.signature_url, ROGUE_SIG);
    let targets = fixture.targets(temp.path());
    std::fs::write(&targets.signature, "sigA").unwrap();
    std::fs::write(&targets.executable, b"installed").unwrap();

    let outcome = updater(&fetcher).run(&targets).await;

    assert!(!outcome.should_launch());
    let UpdateOutcome::Failed {
        error, ..
    } = outcome
    else {
        panic!("expected failure");
    };
    assert_eq!(error.kind(), ErrorKind::Verification);
    assert_eq!(std::fs::read_to_string(&targets.signature).unwrap(), "sigA");
    assert_eq!(std::fs::read(&targets.executable).unwrap(), b"installed");
}

#[tokio::test]
async fn duplicated_asset_is_refused() {
    let temp = TempDir::new().unwrap();
    let fixture = ReleaseFixture::new("tool-linux");
    let fetcher = MockFetcher::new();
    fixture.publish(&fetcher);
    let release = json!({
        "assets": [
            { "name": "tool-linux.sig", "browser_download_url": fixture.signature_url },
            { "name": "tool-linux", "browser_download_url": fixture.executable_url },
            { "name": "tool-linux", "browser_download_url": "https://mirror.example.test/tool-linux" },
        ]
    });
    fetcher.serve(&fixture.release_url, release.to_string());

    let outcome = updater(&fetcher).run(&fixture.targets(temp.path())).await;

    assert!(matches!(
        outcome,
        UpdateOutcome::Failed {
            node: "remote_exe_url",
            error: UpdateError::DuplicateAsset { count: 2, .. },
        }
    ));
}

#[tokio::test]
async fn prehashed_only_verifier_accepts_fixture_build() {
    let temp = TempDir::new().unwrap();
    let fixture = ReleaseFixture::new("tool-win.exe");
    let fetcher = MockFetcher::new();
    fixture.publish(&fetcher);

    let outcome = updater(&fetcher)
        .with_verifier(SignatureVerifier::prehashed_only())
        .run(&fixture.targets(temp.path()))
        .await;

    assert!(matches!(outcome, UpdateOutcome::Updated(_)));
    assert!(temp.path().join("tool-win.exe.sig").exists());
}

#[tokio::test]
async fn task_graph_is_usable_on_its_own() {
    let mut graph = TaskGraph::<UpdateError>::new();
    let greeting = graph.add("greeting", (), |()| async { Ok("hello".to_string()) }).unwrap();
    let length = graph
        .add("length", (greeting.clone(),), |(text,): (String,)| async move { Ok(text.len()) })
        .unwrap();
    graph
        .add("gate", (length.clone(),), |(n,): (usize,)| async move {
            if n > 3 { Err(Halt::Skip("long enough".to_string())) } else { Ok(()) }
        })
        .unwrap();

    assert_eq!(graph.plan().unwrap(), ["greeting", "length", "gate"]);

    let outcome = graph.run().await;

    assert!(matches!(
        outcome,
        GraphOutcome::Skipped {
            node: "gate",
            ..
        }
    ));
    assert_eq!(length.get(), Some(&5));
}
