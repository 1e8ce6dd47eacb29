//! Concurrency tests for the line sinks
//!
//! Many producer threads hammer one sink; afterwards every item must appear
//! in the output exactly once, and each producer's items must appear in the
//! order that producer submitted them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use spool_sinks::{
    BackgroundSink, FileTarget, LineMapper, LineSink, LineSinkConfig, MemoryTarget,
};
use tempfile::TempDir;

const PRODUCERS: usize = 8;
const ITEMS_PER_PRODUCER: usize = 2_000;

/// One submitted item: which producer sent it and its sequence number there
#[derive(Debug, Clone, Copy)]
struct Tagged {
    producer: usize,
    seq: usize,
}

fn tagged_mapper() -> LineMapper<impl Fn(&Tagged) -> Option<String> + Send + Sync> {
    LineMapper::new(|t: &Tagged| Some(format!("{}:{}", t.producer, t.seq)))
}

/// Check the exactly-once and per-producer order properties of `lines`
fn assert_complete_and_ordered(lines: &[String], producers: usize, per_producer: usize) {
    assert_eq!(lines.len(), producers * per_producer, "wrong line count");

    let mut next: HashMap<usize, usize> = HashMap::new();
    for line in lines {
        let (producer, seq) = line.split_once(':').expect("malformed line");
        let producer: usize = producer.parse().unwrap();
        let seq: usize = seq.parse().unwrap();

        let expected = next.entry(producer).or_insert(0);
        assert_eq!(seq, *expected, "producer {producer} out of order");
        *expected += 1;
    }

    assert_eq!(next.len(), producers);
    assert!(next.values().all(|&n| n == per_producer));
}

/// Run `PRODUCERS` threads, each submitting `ITEMS_PER_PRODUCER` tagged items
fn run_producers(submit: impl Fn(Tagged) + Send + Sync + 'static) {
    let submit = Arc::new(submit);
    let start = Arc::new(Barrier::new(PRODUCERS));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let submit = Arc::clone(&submit);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for seq in 0..ITEMS_PER_PRODUCER {
                    submit(Tagged { producer, seq });
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("producer panicked");
    }
}

#[test]
fn test_line_sink_every_item_exactly_once() {
    let target = MemoryTarget::new();
    let sink = Arc::new(LineSink::new(tagged_mapper(), target.clone()).unwrap());

    let producer_sink = Arc::clone(&sink);
    run_producers(move |item| producer_sink.write(item).unwrap());

    // every drain ran inside some write call, so nothing is left behind
    assert_eq!(sink.pending(), 0);

    let snapshot = sink.close();
    assert_eq!(snapshot.items_written, (PRODUCERS * ITEMS_PER_PRODUCER) as u64);
    assert_complete_and_ordered(&target.lines(), PRODUCERS, ITEMS_PER_PRODUCER);
}

#[test]
fn test_line_sink_file_every_item_exactly_once() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let path = temp_dir.path().join("items.log");
    let sink = Arc::new(LineSink::file(tagged_mapper(), &path).unwrap());

    let producer_sink = Arc::clone(&sink);
    run_producers(move |item| producer_sink.write(item).unwrap());
    sink.close();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<String> = content.lines().map(str::to_owned).collect();
    assert_complete_and_ordered(&lines, PRODUCERS, ITEMS_PER_PRODUCER);
}

#[test]
fn test_line_sink_batches_stay_contiguous_per_producer() {
    let target = MemoryTarget::new();
    let sink = Arc::new(LineSink::new(tagged_mapper(), target.clone()).unwrap());

    let producer_sink = Arc::clone(&sink);
    run_producers(move |item| {
        // submit in pairs: (seq, seq + 1) for even seq
        if item.seq % 2 == 0 {
            let next = Tagged {
                seq: item.seq + 1,
                ..item
            };
            producer_sink.write_batch([item, next]).unwrap();
        }
    });
    sink.close();

    assert_complete_and_ordered(&target.lines(), PRODUCERS, ITEMS_PER_PRODUCER);
}

#[test]
fn test_line_sink_recovers_from_intermittent_failures() {
    let target = MemoryTarget::new();
    let sink = Arc::new(LineSink::new(tagged_mapper(), target.clone()).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    // keep injecting failures while producers run
    let saboteur = {
        let target = target.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                target.fail_appends(1);
                thread::sleep(Duration::from_micros(200));
                target.fail_flushes(1);
                thread::sleep(Duration::from_micros(200));
            }
        })
    };

    let producer_sink = Arc::clone(&sink);
    run_producers(move |item| producer_sink.write(item).unwrap());
    done.store(true, Ordering::Release);
    saboteur.join().unwrap();

    // failures are gone; one explicit drain catches up on anything stalled
    target.fail_appends(0);
    target.fail_flushes(0);
    sink.flush().unwrap();
    assert_eq!(sink.pending(), 0);

    assert_complete_and_ordered(&target.lines(), PRODUCERS, ITEMS_PER_PRODUCER);
}

#[test]
fn test_flush_concurrent_with_producers_does_not_deadlock() {
    let target = MemoryTarget::new();
    let sink = Arc::new(LineSink::new(tagged_mapper(), target.clone()).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let flusher = {
        let sink = Arc::clone(&sink);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut flushes = 0usize;
            while !done.load(Ordering::Acquire) {
                sink.flush().unwrap();
                let _ = sink.pending();
                flushes += 1;
            }
            flushes
        })
    };

    let producer_sink = Arc::clone(&sink);
    run_producers(move |item| producer_sink.write(item).unwrap());
    done.store(true, Ordering::Release);
    assert!(flusher.join().unwrap() > 0);

    sink.close();
    assert_complete_and_ordered(&target.lines(), PRODUCERS, ITEMS_PER_PRODUCER);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_sink_every_item_exactly_once() {
    let target = MemoryTarget::new();
    let sink = Arc::new(
        BackgroundSink::spawn(LineSinkConfig::default(), tagged_mapper(), target.clone()).unwrap(),
    );

    let producer_sink = Arc::clone(&sink);
    tokio::task::spawn_blocking(move || {
        run_producers(move |item| producer_sink.write(item).unwrap())
    })
    .await
    .unwrap();

    let sink = Arc::into_inner(sink).expect("producers still hold the sink");
    let snapshot = sink.close().await;

    assert_eq!(snapshot.items_written, (PRODUCERS * ITEMS_PER_PRODUCER) as u64);
    assert_eq!(snapshot.items_dropped, 0);
    assert_complete_and_ordered(&target.lines(), PRODUCERS, ITEMS_PER_PRODUCER);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_sink_file_target() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let path = temp_dir.path().join("items.log");
    let sink = Arc::new(
        BackgroundSink::spawn(
            LineSinkConfig::default(),
            tagged_mapper(),
            FileTarget::new(&path),
        )
        .unwrap(),
    );

    let producer_sink = Arc::clone(&sink);
    tokio::task::spawn_blocking(move || {
        run_producers(move |item| producer_sink.write(item).unwrap())
    })
    .await
    .unwrap();

    let sink = Arc::into_inner(sink).expect("producers still hold the sink");
    sink.close().await;

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<String> = content.lines().map(str::to_owned).collect();
    assert_complete_and_ordered(&lines, PRODUCERS, ITEMS_PER_PRODUCER);
}
