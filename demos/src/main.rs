//! Demo harness binary.
//!
//! Try:
//! ```text
//! treebench-demos list
//! treebench-demos tree playground
//! treebench-demos "playground|ctx1|push a million"
//! treebench-demos --repeat 5 --log run.log playground
//! treebench-demos eval base.log run.log
//! ```

use treebench::prelude::*;

fn playground(s: &Scope) {
    s.before(|| println!("before - suite level"));
    s.before_each(|| println!("beforeEach - suite level"));
    s.after(|| println!("after - suite level"));
    s.after_each(|| println!("afterEach - suite level"));

    s.time_it("hello world", || {
        let mut values = Vec::new();
        for i in 0..100_000u64 {
            values.push(i);
        }
        values.len()
    })
    .show_runtime()
    .show_average_runtime();

    s.context("ctx1", |s| {
        s.before(|| println!("before - ctx1"));
        s.after(|| println!("after - ctx1"));

        s.time_it_with(
            "push a million",
            CaseOptions {
                repeat: 10,
                ..Default::default()
            },
            || {
                let mut values = Vec::new();
                for i in 0..1_000_000u64 {
                    values.push(i);
                }
                values.len()
            },
        )
        .show_runtime()
        .show_average_runtime();

        s.throughput_with(
            "byte shuffling",
            CaseOptions {
                repeat: 10,
                ..Default::default()
            },
            || {
                let payload = vec![b'a'; 100_000];
                let mut codes = Vec::with_capacity(payload.len());
                for byte in &payload {
                    codes.push(*byte as u16);
                }
                serde_json::json!({"payloadSize": payload.len()})
            },
        )
        .show_throughput()
        .show_average_throughput();
    });
}
treebench::suite!("playground", playground);

fn isolated(s: &Scope) {
    // Forked cases measure in a fresh process; state from earlier cases
    // never skews them.
    s.time_it_with(
        "clean-state allocation",
        CaseOptions {
            fork: true,
            repeat: 5,
            ..Default::default()
        },
        || {
            let mut buffers = Vec::new();
            for _ in 0..64 {
                buffers.push(vec![0u8; 64 * 1024]);
            }
            buffers.len()
        },
    )
    .show_average_runtime();
}
treebench::suite!("isolated", isolated);

fn main() -> anyhow::Result<()> {
    treebench::run()
}
