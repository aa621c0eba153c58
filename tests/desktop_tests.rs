use anyhow::Result;
use fedmsg_notify::clients::desktop::{DesktopRenderer, NotificationRenderer};

/// Test: Closing an id the renderer never showed is an error, not a bus call
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_unknown_notification_fails() -> Result<()> {
    let mut renderer = DesktopRenderer::new("fedmsg");

    let error = tokio_test::assert_err!(renderer.close(42));
    assert!(error.to_string().contains("Unknown notification id 42"));

    Ok(())
}
