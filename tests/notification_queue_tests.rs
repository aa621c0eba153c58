use std::time::Duration;

use anyhow::Result;
use fedmsg_notify::{models::notification::Notification, queue::NotificationQueue};
use tokio::time::{Instant, timeout};

use crate::common::{RecordingRenderer, RenderEvent};

fn queue(renderer: &RecordingRenderer, max: usize, expiration: Duration) -> NotificationQueue {
    NotificationQueue::new(Box::new(renderer.clone()), max, expiration)
}

fn titles(queue: &NotificationQueue) -> Vec<String> {
    queue.iter().map(|active| active.notification.title.clone()).collect()
}

/// Test: Notifications are kept newest first
#[tokio::test]
async fn test_queue_is_newest_first() -> Result<()> {
    let renderer = RecordingRenderer::default();
    let mut queue = queue(&renderer, 5, Duration::ZERO);

    queue.push(Notification::new("A", ""));
    queue.push(Notification::new("B", ""));
    queue.push(Notification::new("C", ""));

    assert_eq!(titles(&queue), vec!["C", "B", "A"]);
    assert_eq!(renderer.shown_titles(), vec!["A", "B", "C"]);
    assert!(renderer.closed_ids().is_empty());

    Ok(())
}

/// Test: Exceeding the bound closes the oldest notification
#[tokio::test]
async fn test_oldest_is_evicted_past_bound() -> Result<()> {
    let renderer = RecordingRenderer::default();
    let mut queue = queue(&renderer, 2, Duration::ZERO);

    queue.push(Notification::new("A", ""));
    queue.push(Notification::new("B", ""));
    queue.push(Notification::new("C", ""));

    assert_eq!(queue.len(), 2);
    assert_eq!(titles(&queue), vec!["C", "B"]);
    assert_eq!(renderer.closed_ids(), vec![renderer.id_of("A").unwrap_or_default()]);

    Ok(())
}

/// Test: The queue never holds more than its bound
#[tokio::test]
async fn test_queue_length_stays_bounded() -> Result<()> {
    let renderer = RecordingRenderer::default();
    let mut queue = queue(&renderer, 3, Duration::ZERO);

    for i in 0..10 {
        queue.push(Notification::new(format!("n{}", i), ""));
        assert!(queue.len() <= 3);
    }

    assert_eq!(titles(&queue), vec!["n9", "n8", "n7"]);
    assert_eq!(renderer.closed_ids().len(), 7);

    Ok(())
}

/// Test: A zero bound still keeps the latest notification
#[tokio::test]
async fn test_zero_bound_is_clamped() -> Result<()> {
    let renderer = RecordingRenderer::default();
    let mut queue = queue(&renderer, 0, Duration::ZERO);

    queue.push(Notification::new("A", ""));
    queue.push(Notification::new("B", ""));

    assert_eq!(titles(&queue), vec!["B"]);

    Ok(())
}

/// Test: A notification the renderer refuses is not tracked
#[tokio::test]
async fn test_rejected_notification_is_dropped() -> Result<()> {
    let renderer = RecordingRenderer::failing_show();
    let mut queue = queue(&renderer, 5, Duration::from_secs(30));

    let key = queue.push(Notification::new("A", ""));

    assert!(key.is_none());
    assert!(queue.is_empty());

    let expired = timeout(Duration::from_millis(50), queue.expire_next()).await;
    assert!(expired.is_err(), "no timer should be scheduled");

    Ok(())
}

/// Test: A notification is closed once its expiration elapses
#[tokio::test(start_paused = true)]
async fn test_notification_expires_after_duration() -> Result<()> {
    let renderer = RecordingRenderer::default();
    let mut queue = queue(&renderer, 5, Duration::from_secs(30));

    let start = Instant::now();
    let key = queue.push(Notification::new("A", ""));

    let expired = queue.expire_next().await;
    let elapsed = start.elapsed();

    assert_eq!(expired, key);
    assert!(elapsed >= Duration::from_secs(30));
    assert!(elapsed < Duration::from_millis(30_010));
    assert!(queue.is_empty());
    assert_eq!(renderer.closed_ids(), vec![renderer.id_of("A").unwrap_or_default()]);

    Ok(())
}

/// Test: A timer firing after eviction closes nothing twice
#[tokio::test(start_paused = true)]
async fn test_expiration_after_eviction_is_noop() -> Result<()> {
    let renderer = RecordingRenderer::default();
    let mut queue = queue(&renderer, 1, Duration::from_secs(10));

    queue.push(Notification::new("A", ""));
    queue.push(Notification::new("B", ""));
    assert_eq!(renderer.closed_ids().len(), 1);

    let first = queue.expire_next().await;
    let second = queue.expire_next().await;

    let expired: Vec<_> = [first, second].into_iter().flatten().collect();
    assert_eq!(expired.len(), 1);
    assert!(queue.is_empty());

    let a = renderer.id_of("A").unwrap_or_default();
    let b = renderer.id_of("B").unwrap_or_default();
    assert_eq!(renderer.closed_ids(), vec![a, b]);

    Ok(())
}

/// Test: A shortened expiration applies to later notifications only
#[tokio::test(start_paused = true)]
async fn test_expiration_change_applies_to_new_notifications() -> Result<()> {
    let renderer = RecordingRenderer::default();
    let mut queue = queue(&renderer, 5, Duration::ZERO);

    queue.push(Notification::new("forever", ""));
    queue.set_expiration(Duration::from_secs(5));
    let short = queue.push(Notification::new("short", ""));

    assert_eq!(queue.expiration(), Duration::from_secs(5));
    assert_eq!(queue.expire_next().await, short);
    assert_eq!(titles(&queue), vec!["forever"]);

    Ok(())
}

/// Test: Removing an unknown key does nothing
#[tokio::test]
async fn test_remove_is_idempotent() -> Result<()> {
    let renderer = RecordingRenderer::default();
    let mut queue = queue(&renderer, 5, Duration::ZERO);

    let key = queue.push(Notification::new("A", "")).expect("shown");

    assert!(queue.remove(key));
    assert!(!queue.remove(key));
    assert_eq!(renderer.closed_ids().len(), 1);

    Ok(())
}

/// Test: Closing everything tolerates renderer close failures
#[tokio::test]
async fn test_close_all_survives_close_errors() -> Result<()> {
    let renderer = RecordingRenderer::failing_close();
    let mut queue = queue(&renderer, 5, Duration::from_secs(60));

    queue.push(Notification::new("A", ""));
    queue.push(Notification::new("B", ""));

    queue.close_all();

    assert!(queue.is_empty());
    assert_eq!(renderer.closed_ids().len(), 2);
    assert!(matches!(renderer.events().last(), Some(RenderEvent::Closed(_))));

    let expired = timeout(Duration::from_millis(50), queue.expire_next()).await;
    assert!(expired.is_err(), "timers should be cancelled");

    Ok(())
}
