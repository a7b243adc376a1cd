// Tests for the frame forwarding gate.
//
// Capture and transport buffer frames independently, so stopping a session
// must discard anything still queued between them. The forwarding loop is
// exercised here with a plain channel and a collecting sink.

use medscribe::audio::{AudioFrame, TARGET_SAMPLE_RATE};
use medscribe::session::forward_frames;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

fn frame(samples: Vec<i16>) -> AudioFrame {
    AudioFrame {
        samples,
        sample_rate: TARGET_SAMPLE_RATE,
        channels: 1,
        timestamp_ms: 0,
    }
}

#[tokio::test]
async fn test_frames_forward_in_order_while_gate_is_set() {
    let (tx, rx) = mpsc::channel(8);
    let forwarding = Arc::new(AtomicBool::new(true));

    tx.send(frame(vec![1])).await.unwrap();
    tx.send(frame(vec![2, 3])).await.unwrap();
    drop(tx);

    let mut sent = Vec::new();
    forward_frames(rx, forwarding, |samples| sent.push(samples.to_vec())).await;

    assert_eq!(sent, vec![vec![1], vec![2, 3]]);
}

#[tokio::test]
async fn test_buffered_frames_discarded_after_stop() {
    let (tx, rx) = mpsc::channel(8);
    let forwarding = Arc::new(AtomicBool::new(true));

    // Frames queued before the gate clears must never reach the sink.
    tx.send(frame(vec![1])).await.unwrap();
    tx.send(frame(vec![2])).await.unwrap();
    forwarding.store(false, Ordering::SeqCst);
    drop(tx);

    let mut sent = Vec::new();
    forward_frames(rx, forwarding, |samples| sent.push(samples.to_vec())).await;

    assert!(sent.is_empty());
}

#[tokio::test]
async fn test_gate_cleared_mid_stream_stops_forwarding() {
    let (tx, rx) = mpsc::channel(8);
    let forwarding = Arc::new(AtomicBool::new(true));

    tx.send(frame(vec![1])).await.unwrap();
    tx.send(frame(vec![2])).await.unwrap();
    tx.send(frame(vec![3])).await.unwrap();
    drop(tx);

    let gate = Arc::clone(&forwarding);
    let mut sent = Vec::new();
    forward_frames(rx, forwarding, |samples| {
        sent.push(samples.to_vec());
        // Stop arrives while the remaining frames are still in flight.
        gate.store(false, Ordering::SeqCst);
    })
    .await;

    assert_eq!(sent, vec![vec![1]]);
}
