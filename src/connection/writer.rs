//! Chunked write driver.
//!
//! Feeds a [`ChunkedTransfer`] through the single-chunk
//! [`DeviceConnection::write`] primitive, so every chunk passes the same
//! precondition and MTU checks as an ordinary write.  Chunk results arrive
//! on the dispatcher thread; the driver reports progress from there and
//! only then releases the next chunk, optionally after a delay scheduled
//! on the timeout port.
//!
//! A transfer is bound to the link it started on.  Once that link is torn
//! down the transfer goes quiet: teardown drops callers without notice,
//! and a late chunk result must not reach the application after
//! `on_disconnected`.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use log::{debug, warn};

use super::DeviceConnection;
use crate::callbacks::ChunkedWriteCallback;
use crate::chunked::ChunkedTransfer;
use crate::device::OperationKey;
use crate::error::Result;
use crate::lock;
use crate::ports::LinkId;

pub(crate) struct ChunkedWriter {
    conn: Weak<DeviceConnection>,
    link: LinkId,
    key: OperationKey,
    delay: Duration,
    transfer: Mutex<ChunkedTransfer>,
    callback: Arc<dyn ChunkedWriteCallback>,
}

impl ChunkedWriter {
    pub(crate) fn new(
        conn: Weak<DeviceConnection>,
        link: LinkId,
        key: OperationKey,
        delay: Duration,
        transfer: ChunkedTransfer,
        callback: Arc<dyn ChunkedWriteCallback>,
    ) -> Arc<Self> {
        Arc::new(Self {
            conn,
            link,
            key,
            delay,
            transfer: Mutex::new(transfer),
            callback,
        })
    }

    pub(crate) fn start(self: &Arc<Self>) {
        {
            let t = lock(&self.transfer);
            debug!(
                "chunked {}: {} bytes in {} chunks of {}",
                self.key,
                t.total(),
                t.chunk_count(),
                t.chunk_size()
            );
        }
        self.send_next();
    }

    fn send_next(self: &Arc<Self>) {
        let Some(chunk) = lock(&self.transfer).next_chunk() else {
            return;
        };
        let Some(conn) = self.conn.upgrade() else {
            warn!("chunked {}: connection dropped, abandoning", self.key);
            return;
        };
        if conn.current_link() != Some(self.link) {
            self.abandon_quietly();
            return;
        }
        let writer = Arc::clone(self);
        conn.write(
            self.key.service,
            self.key.attribute,
            chunk,
            Box::new(move |result| writer.on_chunk_result(result)),
        );
    }

    fn on_chunk_result(self: &Arc<Self>, result: Result<Vec<u8>>) {
        if !self.link_is_live() {
            self.abandon_quietly();
            return;
        }
        match result {
            Ok(_) => {
                let (progress, finished) = {
                    let mut t = lock(&self.transfer);
                    let Some(progress) = t.on_chunk_acked() else {
                        return;
                    };
                    let finished = t.is_complete().then(|| t.payload().to_vec());
                    (progress, finished)
                };
                self.callback.on_progress(progress);
                if let Some(payload) = finished {
                    self.callback.on_success(payload);
                } else if self.delay.is_zero() {
                    self.send_next();
                } else {
                    self.send_next_after_delay();
                }
            }
            Err(e) => {
                let (written, index) = {
                    let mut t = lock(&self.transfer);
                    let index = t.in_flight_index();
                    (t.on_chunk_failed(), index)
                };
                warn!(
                    "chunked {}: chunk {:?} failed ({}), {} bytes written",
                    self.key, index, e, written
                );
                self.callback.on_failure(e, written);
            }
        }
    }

    fn send_next_after_delay(self: &Arc<Self>) {
        let Some(conn) = self.conn.upgrade() else {
            return;
        };
        let writer = Arc::clone(self);
        conn.defer(self.delay, Box::new(move || writer.send_next()));
    }

    fn link_is_live(&self) -> bool {
        self.conn
            .upgrade()
            .is_some_and(|conn| conn.current_link() == Some(self.link))
    }

    fn abandon_quietly(&self) {
        let written = lock(&self.transfer).on_chunk_failed();
        debug!(
            "chunked {}: {} gone after {} bytes, dropping transfer",
            self.key, self.link, written
        );
    }
}
