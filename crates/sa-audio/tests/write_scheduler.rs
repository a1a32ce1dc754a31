//! Buffer selection, reuse and playback start on the simulated device
//!
//! Sessions drain when dropped, so tests on a manually stepped driver finish
//! playback before returning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use sa_audio::device::{QueueDriver, SourceState};
use sa_audio::{PollWait, SessionConfig, SimDriver, StreamSession};
use sa_core::{SampleFormat, StreamParams};

fn open(driver: &SimDriver, pool_capacity: usize) -> StreamSession<SimDriver> {
    let config = SessionConfig {
        pool_capacity,
        wait: PollWait::new(Duration::from_micros(100)),
    };
    match StreamSession::open(
        driver.clone(),
        StreamParams::playback(SampleFormat::S16, 44100, 1),
        config,
    ) {
        Ok(session) => session,
        Err((err, _)) => panic!("open failed: {err}"),
    }
}

fn chunk(value: i16, frames: usize) -> Vec<u8> {
    bytemuck::cast_slice::<i16, u8>(&vec![value; frames]).to_vec()
}

#[test]
fn fills_pool_in_order_then_blocks_for_a_processed_buffer() {
    let driver = SimDriver::new();
    let mut session = open(&driver, 128);
    let handles = session.pool().handles().to_vec();
    assert_eq!(handles.len(), 128);

    for i in 0..128 {
        assert_eq!(session.write(&chunk(i as i16, 1), 1).unwrap(), 1);
        let uploads = driver.uploads();
        assert_eq!(uploads[i].buffer, handles[i]);
        assert_eq!(uploads[i].data, chunk(i as i16, 1));
    }
    let source = session.source();
    assert_eq!(driver.queue_of(source).len(), 128);
    assert_eq!(session.pool().in_flight(), 128);

    let done = AtomicBool::new(false);
    thread::scope(|s| {
        let writer = s.spawn(|| {
            let written = session.write(&chunk(500, 1), 1);
            done.store(true, Ordering::SeqCst);
            written
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst), "write must block on a full pool");

        assert_eq!(driver.complete(1), 1);
        assert_eq!(writer.join().unwrap().unwrap(), 1);
    });

    let last = driver.uploads().pop().unwrap();
    assert_eq!(last.buffer, handles[0]);
    assert_eq!(last.data, chunk(500, 1));

    let queue = driver.queue_of(source);
    assert_eq!(queue.len(), 128);
    assert_eq!(queue.first(), Some(&handles[1]));
    assert_eq!(queue.last(), Some(&handles[0]));
    driver.complete(128);
}

#[test]
fn first_write_starts_playback() {
    let driver = SimDriver::new();
    let mut session = open(&driver, 8);
    let source = session.source();

    assert_eq!(driver.source_state(source).unwrap(), SourceState::Initial);
    session.write(&chunk(1, 16), 16).unwrap();
    assert_eq!(driver.source_state(source).unwrap(), SourceState::Playing);
    driver.complete(1);
}

#[test]
fn processed_buffers_come_back_oldest_first() {
    let driver = SimDriver::new();
    let mut session = open(&driver, 4);
    let handles = session.pool().handles().to_vec();

    for i in 0..4 {
        session.write(&chunk(i, 2), 2).unwrap();
    }
    assert_eq!(driver.complete(2), 2);

    session.write(&chunk(10, 2), 2).unwrap();
    session.write(&chunk(11, 2), 2).unwrap();

    let reused: Vec<_> = driver.uploads()[4..].iter().map(|u| u.buffer).collect();
    assert_eq!(reused, vec![handles[0], handles[1]]);
    assert_eq!(
        driver.queue_of(session.source()),
        vec![handles[2], handles[3], handles[0], handles[1]]
    );
    driver.complete(4);
}

#[test]
fn accepts_every_frame_and_never_exceeds_the_pool() {
    let driver = SimDriver::with_autoplay();
    let mut session = open(&driver, 8);

    let mut submitted = 0usize;
    let mut accepted = 0usize;
    for i in 0..1000usize {
        let frames = 1 + (i * 7) % 64;
        accepted += session.write(&chunk(i as i16, frames), frames).unwrap();
        submitted += frames;
    }

    assert_eq!(accepted, submitted);
    let uploaded: usize = driver.uploads().iter().map(|u| u.data.len()).sum();
    assert_eq!(uploaded, submitted * session.frame_size());
    assert!(driver.max_queued() <= 8);
}

#[test]
fn stereo_frames_are_four_bytes() {
    let driver = SimDriver::new();
    let config = SessionConfig {
        pool_capacity: 2,
        wait: PollWait::spin(),
    };
    let mut session = match StreamSession::open(
        driver.clone(),
        StreamParams::playback(SampleFormat::S16, 48000, 2),
        config,
    ) {
        Ok(session) => session,
        Err((err, _)) => panic!("open failed: {err}"),
    };

    assert_eq!(session.frame_size(), 4);
    assert_eq!(session.write(&chunk(3, 8), 4).unwrap(), 4);

    let upload = &driver.uploads()[0];
    assert_eq!(upload.rate, 48000);
    assert_eq!(upload.format, sa_audio::BufferFormat::Stereo16);
    driver.complete(1);
}
