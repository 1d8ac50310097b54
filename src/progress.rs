use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

/// Wraps a sink and reports `(bytes written so far, expected total)` after
/// every successful write. A total of `None` means the size is unknown.
pub struct ProgressWriter<W, F> {
    inner: W,
    on_progress: F,
    total: Option<u64>,
    written: u64,
    callback_panicked: bool,
}

impl<W: Write, F: FnMut(u64, Option<u64>)> ProgressWriter<W, F> {
    pub fn new(inner: W, total: Option<u64>, on_progress: F) -> Self {
        Self { inner, on_progress, total, written: 0, callback_panicked: false }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn report(&mut self) {
        let (written, total) = (self.written, self.total);
        let on_progress = &mut self.on_progress;
        // the callback belongs to the caller; whatever it does must not abort
        // the transfer
        let result = panic::catch_unwind(AssertUnwindSafe(|| on_progress(written, total)));
        if result.is_err() && !self.callback_panicked {
            warn!("progress callback panicked; continuing the transfer without it");
            self.callback_panicked = true;
        }
    }
}

impl<W: Write, F: FnMut(u64, Option<u64>)> Write for ProgressWriter<W, F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        self.report();
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
