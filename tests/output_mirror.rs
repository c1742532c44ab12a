// tests/output_mirror.rs

mod common;

use std::time::Duration;

use common::{TestResult, init_tracing};
use procline::process::{LineMatcher, ProcessHandle, ReadTimeout};
use procline_test_utils::with_timeout;

#[tokio::test]
async fn subscribers_see_every_line_the_handle_reads() -> TestResult {
    init_tracing();
    let mut handle = ProcessHandle::new("/bin/cat")?;
    let mut first = handle.subscribe();
    let mut second = handle.subscribe();
    handle.start(&["/bin/cat"])?;

    handle.send_command("alpha")?;
    handle.send_command("beta")?;
    let outcome = handle.read_until(
        ReadTimeout::After(Duration::from_secs(2)),
        &LineMatcher::prefix("beta"),
    )?;
    assert_eq!(outcome.lines, vec!["alpha", "beta"]);

    for rx in [&mut first, &mut second] {
        assert_eq!(with_timeout(rx.recv()).await.as_deref(), Some("alpha"));
        assert_eq!(with_timeout(rx.recv()).await.as_deref(), Some("beta"));
    }

    handle.kill();
    assert_eq!(with_timeout(first.recv()).await, None);
    assert_eq!(with_timeout(second.recv()).await, None);
    Ok(())
}

#[tokio::test]
async fn late_subscriber_only_sees_later_lines() -> TestResult {
    init_tracing();
    let mut handle = ProcessHandle::new("/bin/cat")?;
    handle.start(&["/bin/cat"])?;
    let timeout = ReadTimeout::After(Duration::from_millis(300));

    handle.send_command("before")?;
    handle.read(timeout)?;

    let mut rx = handle.subscribe();
    handle.send_command("after")?;
    handle.read(timeout)?;

    assert_eq!(with_timeout(rx.recv()).await.as_deref(), Some("after"));
    drop(handle);
    assert_eq!(with_timeout(rx.recv()).await, None);
    Ok(())
}
