use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tso::config::Config;
use tso::events::{Reply, ReplyChannel, RowSet};
use tso::pipeline::Pipeline;
use tso::Timestamp;

struct Collector {
    replies: Mutex<Vec<Reply>>,
}

impl ReplyChannel for Collector {
    fn send_reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push(reply);
    }
}

fn wait_for(collector: &Collector, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while collector.replies.lock().unwrap().len() < count && Instant::now() < deadline {
        std::thread::yield_now();
    }
}

/// Invariant 6: replies for a single client arrive in the same order the
/// corresponding requests were enqueued, even though the pipeline is
/// staged across two worker threads.
#[test]
fn single_client_replies_preserve_request_order() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        data_dir: dir.path().to_path_buf(),
        ring_capacity: 64,
        batch_size: 64,
        persist_batch_size: 4,
        persist_batch_timeout_us: 500,
        ..Config::default()
    };
    let pipeline = Pipeline::start(&cfg).unwrap();
    let collector = Arc::new(Collector {
        replies: Mutex::new(Vec::new()),
    });

    // Interleave timestamp requests and (disjoint, always-committing)
    // commit requests from the same client.
    for i in 0..20u64 {
        if i % 2 == 0 {
            pipeline.timestamp_request(collector.clone());
        } else {
            let mut rows = RowSet::new();
            rows.push((i + 1000).into());
            pipeline.commit_request(Timestamp(1), rows, false, collector.clone());
        }
    }

    wait_for(&collector, 20);
    let replies = collector.replies.lock().unwrap();
    assert_eq!(replies.len(), 20);
    for (i, reply) in replies.iter().enumerate() {
        let is_timestamp = matches!(reply, Reply::Timestamp { .. });
        if i % 2 == 0 {
            assert!(is_timestamp, "expected a timestamp reply at position {i}");
        } else {
            assert!(!is_timestamp, "expected a commit/abort reply at position {i}");
        }
    }
}
