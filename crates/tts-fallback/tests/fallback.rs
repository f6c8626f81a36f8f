//! End-to-end scenario tests (§8 Concrete scenarios). Each mirrors one of
//! the six cases the port was validated against, using `FakeTtsBackend`
//! in place of a live provider.

use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;
use tts_core::{ConnectOptions, TtsBackend};
use tts_fallback::testing::FakeTtsBackend;
use tts_fallback::{FallbackAdapter, FallbackAdapterConfig};

fn opts(timeout: Duration, max_retry: Option<usize>) -> ConnectOptions {
    ConnectOptions { timeout, max_retry }
}

#[tokio::test]
async fn primary_fails_secondary_succeeds() {
    let b1 = Arc::new(FakeTtsBackend::always_failing("b1", 48000));
    let b2 = Arc::new(FakeTtsBackend::new("b2", 48000));
    b2.set_audio_duration(Duration::from_secs_f64(5.0));

    let backends: Vec<Arc<dyn TtsBackend>> = vec![b1.clone(), b2.clone()];
    let adapter = FallbackAdapter::new(FallbackAdapterConfig::builder(backends).build());

    let mut stream = Box::pin(adapter.synthesize("hello test", opts(Duration::from_secs(10), Some(0))));

    let mut total = Duration::ZERO;
    let mut saw_final = false;
    while let Some(item) = stream.next().await {
        let audio = item.expect("synthesis should succeed via b2");
        total += audio.frame.duration();
        if audio.is_final {
            saw_final = true;
        }
    }

    assert!(saw_final);
    assert!((total.as_secs_f64() - 5.01).abs() < 0.01, "{total:?}");
    assert_eq!(b1.call_count(), 1);
    assert_eq!(b2.call_count(), 1);
    assert!(!adapter.is_available(0));
    assert!(adapter.is_available(1));

    adapter.aclose().await;
}

#[tokio::test]
async fn silent_backend_is_treated_as_failure() {
    let b1 = Arc::new(FakeTtsBackend::new("b1", 16000));
    b1.set_audio_duration(Duration::ZERO);

    let backends: Vec<Arc<dyn TtsBackend>> = vec![b1];
    let adapter = FallbackAdapter::new(
        FallbackAdapterConfig::builder(backends)
            .max_retry_per_tts(0)
            .build(),
    );

    let mut stream = Box::pin(adapter.synthesize(
        "hello test chunked",
        opts(Duration::from_secs(10), Some(0)),
    ));

    let first = stream.next().await.expect("stream should yield an error");
    assert!(first.is_err());

    adapter.aclose().await;
}

#[tokio::test]
async fn streaming_fails_over_to_secondary() {
    let b1 = Arc::new(FakeTtsBackend::always_failing("b1", 48000));
    let b2 = Arc::new(FakeTtsBackend::new("b2", 48000));
    b2.set_audio_duration(Duration::from_secs_f64(5.0));

    let backends: Vec<Arc<dyn TtsBackend>> = vec![b1.clone(), b2.clone()];
    let adapter = FallbackAdapter::new(FallbackAdapterConfig::builder(backends).build());

    let stream = adapter.stream(opts(Duration::from_secs(10), Some(0)));
    stream.push_text("hello test");
    stream.end_input();

    let mut pinned = Box::pin(stream);
    let mut saw_final = false;
    let mut total = Duration::ZERO;
    while let Some(item) = pinned.next().await {
        let audio = item.expect("segment should succeed via b2");
        total += audio.frame.duration();
        if audio.is_final {
            saw_final = true;
        }
    }

    assert!(saw_final);
    assert!((total.as_secs_f64() - 5.01).abs() < 0.01, "{total:?}");
    assert_eq!(b1.call_count(), 1);
    assert_eq!(b2.call_count(), 1);
    assert!(!adapter.is_available(0));

    adapter.aclose().await;
}

#[tokio::test]
async fn unavailable_backend_recovers_via_prober() {
    let b1 = Arc::new(FakeTtsBackend::always_failing("b1", 16000));
    let b2 = Arc::new(FakeTtsBackend::always_failing("b2", 16000));

    let backends: Vec<Arc<dyn TtsBackend>> = vec![b1.clone(), b2.clone()];
    let adapter = FallbackAdapter::new(
        FallbackAdapterConfig::builder(backends)
            .max_retry_per_tts(0)
            .prober_interval(Duration::from_millis(20))
            .build(),
    );

    let mut first = Box::pin(adapter.synthesize("hello", opts(Duration::from_secs(1), Some(0))));
    let result = first.next().await.expect("first call should error");
    assert!(result.is_err());
    drop(first);

    b2.heal(Duration::from_secs_f64(5.0));

    let recovered = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if adapter.is_available(1) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(recovered.is_ok(), "b2 should recover within 1s");

    let mut second = Box::pin(adapter.synthesize("hello again", opts(Duration::from_secs(10), Some(0))));
    let mut succeeded = false;
    while let Some(item) = second.next().await {
        if item.is_ok() {
            succeeded = true;
        }
    }
    assert!(succeeded);

    adapter.aclose().await;
}

#[tokio::test]
async fn cross_backend_resampling_normalizes_output_rate() {
    let b1 = Arc::new(FakeTtsBackend::always_failing("b1", 48000));
    let b2 = Arc::new(FakeTtsBackend::new("b2", 16000));
    b2.set_audio_duration(Duration::from_secs_f64(5.0));

    let backends: Vec<Arc<dyn TtsBackend>> = vec![b1, b2];
    let adapter = FallbackAdapter::new(
        FallbackAdapterConfig::builder(backends)
            .sample_rate(48000)
            .build(),
    );

    let mut stream = Box::pin(adapter.synthesize("hello", opts(Duration::from_secs(10), Some(0))));
    let mut total = Duration::ZERO;
    while let Some(item) = stream.next().await {
        let audio = item.unwrap();
        assert_eq!(audio.frame.sample_rate(), 48000);
        total += audio.frame.duration();
    }

    assert!((total.as_secs_f64() - 5.01).abs() < 0.05, "{total:?}");

    adapter.aclose().await;
}

#[tokio::test]
async fn timeout_fails_both_backends_over() {
    let b1 = Arc::new(FakeTtsBackend::new("b1", 16000));
    b1.set_hangs(true);
    let b2 = Arc::new(FakeTtsBackend::new("b2", 16000));
    b2.set_hangs(true);

    let backends: Vec<Arc<dyn TtsBackend>> = vec![b1.clone(), b2.clone()];
    let adapter = FallbackAdapter::new(
        FallbackAdapterConfig::builder(backends)
            .max_retry_per_tts(0)
            .build(),
    );

    let mut stream = Box::pin(adapter.synthesize("hello", opts(Duration::from_millis(100), Some(0))));
    let result = stream.next().await.expect("stream should error");
    assert!(result.is_err());

    assert_eq!(b1.call_count(), 1);
    assert_eq!(b2.call_count(), 1);
    assert!(!adapter.is_available(0));
    assert!(!adapter.is_available(1));

    adapter.aclose().await;
}

#[tokio::test]
async fn aclose_is_idempotent() {
    let b1 = Arc::new(FakeTtsBackend::new("b1", 16000));
    let backends: Vec<Arc<dyn TtsBackend>> = vec![b1];
    let adapter = FallbackAdapter::new(FallbackAdapterConfig::builder(backends).build());

    adapter.aclose().await;
    adapter.aclose().await;
}
