mod common;

use bytes::Bytes;
use common::{DONE, MockProvider, Step, chunk, record};
use futures::StreamExt;
use indictment_relay::{
    RelayError,
    config::RelaySettings,
    models::CompletionRequest,
    provider::Provider,
    streaming::{RelayOutcome, RelayReceiver, spawn_relay, watch_relay},
};
use std::time::Duration;
use tokio::task::JoinHandle;

fn request() -> CompletionRequest {
    CompletionRequest::new("text-davinci-003", "prompt", &Default::default())
}

async fn start(
    provider: &MockProvider,
    settings: RelaySettings,
) -> (RelayReceiver, JoinHandle<RelayOutcome>) {
    let upstream = provider.stream_completion(request()).await.unwrap();
    spawn_relay(upstream, settings)
}

/// Drain the receiver into (text, terminal error)
async fn drain(mut rx: RelayReceiver) -> (String, Option<RelayError>) {
    let mut text = Vec::new();
    while let Some(item) = rx.next().await {
        match item {
            Ok(bytes) => text.extend_from_slice(&bytes),
            Err(e) => return (String::from_utf8(text).unwrap(), Some(e)),
        }
    }
    (String::from_utf8(text).unwrap(), None)
}

#[tokio::test]
async fn test_relays_tokens_in_order_and_closes_at_done() {
    let body = format!(
        "{}{}{}{}{}",
        record("\n"),
        record("\n"),
        record("民事起诉状"),
        record("\n原告："),
        DONE
    );
    // Deliberately awkward chunking, including inside multi-byte characters
    let steps = body
        .as_bytes()
        .chunks(5)
        .map(|c| Step::Chunk(c.to_vec()))
        .collect();
    let provider = MockProvider::new(steps);

    let (rx, handle) = start(&provider, RelaySettings::default()).await;
    let (text, error) = drain(rx).await;

    assert!(error.is_none());
    assert_eq!(text, "民事起诉状\n原告：");
    assert_eq!(
        handle.await.unwrap(),
        RelayOutcome::Completed { tokens_forwarded: 2 }
    );
}

#[tokio::test]
async fn test_bytes_after_sentinel_are_ignored() {
    let provider = MockProvider::new(vec![
        chunk(&format!("{}{}{}", record("Hello"), DONE, record("ignored"))),
        chunk(&record("also ignored")),
        Step::Fail("should never be observed".to_string()),
    ]);

    let (rx, handle) = start(&provider, RelaySettings::default()).await;
    let (text, error) = drain(rx).await;

    assert_eq!(text, "Hello");
    assert!(error.is_none());
    assert!(matches!(handle.await.unwrap(), RelayOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_decode_failure_closes_with_error() {
    let provider = MockProvider::new(vec![
        chunk(&record("partial ")),
        chunk("data: {\"choices\":[{\"index\":0}]}\n\n"),
        chunk(&record("never sent")),
        chunk(DONE),
    ]);

    let (rx, handle) = start(&provider, RelaySettings::default()).await;
    let (text, error) = drain(rx).await;

    assert_eq!(text, "partial ");
    assert!(matches!(error, Some(RelayError::FramingError(_))));
    assert!(matches!(handle.await.unwrap(), RelayOutcome::Failed { .. }));
}

#[tokio::test]
async fn test_tokens_before_undecodable_record_reach_consumer() {
    let mut body = record("kept").into_bytes();
    body.extend_from_slice(b"data: \xff\n\n");
    let provider = MockProvider::new(vec![Step::Chunk(body), chunk(DONE)]);

    let (rx, handle) = start(&provider, RelaySettings::default()).await;
    let (text, error) = drain(rx).await;

    assert_eq!(text, "kept");
    assert!(matches!(error, Some(RelayError::FramingError(_))));
    assert!(matches!(handle.await.unwrap(), RelayOutcome::Failed { .. }));
}

#[tokio::test]
async fn test_malformed_json_payload_is_terminal() {
    let provider = MockProvider::new(vec![chunk("data: not-json\n\n"), chunk(DONE)]);

    let (rx, _handle) = start(&provider, RelaySettings::default()).await;
    let (text, error) = drain(rx).await;

    assert!(text.is_empty());
    assert!(matches!(error, Some(RelayError::FramingError(_))));
}

#[tokio::test]
async fn test_upstream_drop_mid_stream_is_observable() {
    let provider = MockProvider::new(vec![
        chunk(&record("a")),
        Step::Fail("connection reset".to_string()),
    ]);

    let (rx, handle) = start(&provider, RelaySettings::default()).await;
    let (text, error) = drain(rx).await;

    assert_eq!(text, "a");
    match error {
        Some(RelayError::UpstreamError(msg)) => assert!(msg.contains("connection reset")),
        other => panic!("unexpected terminal item: {:?}", other),
    }
    assert!(matches!(handle.await.unwrap(), RelayOutcome::Failed { .. }));
}

#[tokio::test]
async fn test_upstream_end_without_sentinel_is_an_error() {
    let provider = MockProvider::new(vec![chunk(&record("a")), chunk("data: {\"cho")]);

    let (rx, _handle) = start(&provider, RelaySettings::default()).await;
    let (text, error) = drain(rx).await;

    assert_eq!(text, "a");
    assert!(matches!(error, Some(RelayError::UpstreamError(_))));
}

#[tokio::test]
async fn test_pending_buffer_overflow_is_terminal() {
    let settings = RelaySettings {
        max_pending_bytes: 32,
        ..RelaySettings::default()
    };
    let provider = MockProvider::new(vec![chunk(&format!("data: {}", "x".repeat(64)))]);

    let (rx, _handle) = start(&provider, settings).await;
    let (_, error) = drain(rx).await;

    assert!(matches!(error, Some(RelayError::FramingError(_))));
}

#[tokio::test]
async fn test_tokens_before_overflow_reach_consumer() {
    let settings = RelaySettings {
        max_pending_bytes: 64,
        ..RelaySettings::default()
    };
    let provider = MockProvider::new(vec![chunk(&format!(
        "{}data: {}",
        record("kept"),
        "x".repeat(100)
    ))]);

    let (rx, _handle) = start(&provider, settings).await;
    let (text, error) = drain(rx).await;

    assert_eq!(text, "kept");
    assert!(matches!(error, Some(RelayError::FramingError(_))));
}

#[tokio::test]
async fn test_relay_waits_for_slow_consumer() {
    let settings = RelaySettings {
        channel_capacity: 1,
        ..RelaySettings::default()
    };
    let body: String = (0..8).map(|i| record(&format!("t{} ", i))).collect();
    let provider = MockProvider::new(vec![chunk(&body), chunk(DONE)]);

    let (mut rx, handle) = start(&provider, settings).await;

    // Nothing is read yet, so the relay must be parked on the full channel
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    let first = rx.next().await.unwrap().unwrap();
    assert_eq!(first, Bytes::from("t0 "));

    let (rest, error) = drain(rx).await;
    assert!(error.is_none());
    assert_eq!(rest, "t1 t2 t3 t4 t5 t6 t7 ");
    assert_eq!(
        handle.await.unwrap(),
        RelayOutcome::Completed { tokens_forwarded: 8 }
    );
}

#[tokio::test]
async fn test_consumer_disconnect_cancels_upstream() {
    let provider = MockProvider::new(vec![chunk(&record("first")), Step::Hang]);

    let (mut rx, handle) = start(&provider, RelaySettings::default()).await;
    let first = rx.next().await.unwrap().unwrap();
    assert_eq!(first, Bytes::from("first"));

    drop(rx);

    let outcome = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("relay did not stop after consumer left")
        .unwrap();
    assert_eq!(outcome, RelayOutcome::ConsumerGone { tokens_forwarded: 1 });
    assert!(provider.was_dropped());
}

#[tokio::test]
async fn test_concurrent_sessions_do_not_share_filter_state() {
    let a = MockProvider::new(vec![chunk(&format!("{}{}{}", record("A"), record("\n"), DONE))]);
    let b = MockProvider::new(vec![chunk(&format!("{}{}{}", record("\n"), record("B"), DONE))]);

    let (rx_a, _) = start(&a, RelaySettings::default()).await;
    let (rx_b, _) = start(&b, RelaySettings::default()).await;

    let ((text_a, _), (text_b, _)) = tokio::join!(drain(rx_a), drain(rx_b));
    assert_eq!(text_a, "A\n");
    assert_eq!(text_b, "B");
}

#[tokio::test]
async fn test_watch_relay_reports_outcome() {
    let provider = MockProvider::new(vec![chunk(&format!("{}{}", record("done"), DONE))]);

    let (rx, handle) = start(&provider, RelaySettings::default()).await;
    let watcher = tokio::spawn(watch_relay(handle));
    let (text, _) = drain(rx).await;

    assert_eq!(text, "done");
    assert_eq!(
        watcher.await.unwrap(),
        Some(RelayOutcome::Completed { tokens_forwarded: 1 })
    );
}

#[tokio::test]
async fn test_watch_relay_reports_aborted_task() {
    let provider = MockProvider::new(vec![Step::Hang]);

    let (_rx, handle) = start(&provider, RelaySettings::default()).await;
    handle.abort();

    assert_eq!(watch_relay(handle).await, None);
}
