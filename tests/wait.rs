mod common;

use common::Pipe;
use evloop::{Mask, wait};

use std::time::{Duration, Instant};

#[test]
fn test_wait_reports_readable_pipe() {
    let pipe = Pipe::new();
    pipe.send(b"data");

    let ready = wait(pipe.read, Mask::READABLE, 1_000).unwrap();
    assert_eq!(ready, Mask::READABLE);
}

#[test]
fn test_wait_times_out_with_empty_mask() {
    let pipe = Pipe::new();

    let start = Instant::now();
    let ready = wait(pipe.read, Mask::READABLE, 30).unwrap();

    assert_eq!(ready, Mask::NONE);
    assert!(start.elapsed() >= Duration::from_millis(25));
}

#[test]
fn test_wait_reports_writable_pipe() {
    let pipe = Pipe::new();

    let ready = wait(pipe.write, Mask::ALL, 0).unwrap();
    assert_eq!(ready, Mask::WRITABLE);
}

#[test]
fn test_wait_reports_hangup_as_writable() {
    let mut pipe = Pipe::new();
    pipe.close_write();

    let ready = wait(pipe.read, Mask::READABLE, 1_000).unwrap();
    assert!(ready.contains(Mask::WRITABLE));
}
