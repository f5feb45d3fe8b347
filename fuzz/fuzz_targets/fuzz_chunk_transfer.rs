//! Fuzz target: `ChunkedTransfer` sequencing
//!
//! The first two bytes pick a chunk size, the next byte is a script of
//! ack/fail decisions, the rest is the payload.  Checks that:
//! - `split` reassembles to the payload
//! - no second chunk is handed out while one is in flight
//! - `written` never exceeds the total and only counts acked chunks
//! - nothing is handed out after a failure
//!
//! cargo fuzz run fuzz_chunk_transfer

#![no_main]

use gattpool::chunked::{ChunkedTransfer, split};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let chunk_size = usize::from(u16::from_le_bytes([data[0], data[1]]) % 520);
    let script = data[2];
    let payload = &data[3..];

    let chunks = split(payload, chunk_size);
    if chunk_size > 0 {
        assert_eq!(chunks.concat(), payload);
    } else {
        assert!(chunks.is_empty());
    }

    let Some(mut t) = ChunkedTransfer::new(payload.to_vec(), chunk_size) else {
        assert!(payload.is_empty() || chunk_size == 0);
        return;
    };

    let mut acked = 0usize;
    let mut step = 0u32;
    while let Some(chunk) = t.next_chunk() {
        assert!(chunk.len() <= chunk_size);
        assert!(t.next_chunk().is_none());

        let fail = script.rotate_left(step) & 1 == 1 && step % 3 == 2;
        step += 1;
        if fail {
            assert_eq!(t.on_chunk_failed(), acked);
            assert!(t.next_chunk().is_none());
            return;
        }
        acked += chunk.len();
        let progress = t.on_chunk_acked().expect("chunk was in flight");
        assert_eq!(progress.written, acked);
        assert!(progress.written <= progress.total);
    }
    assert!(t.is_complete());
    assert_eq!(acked, payload.len());
});
