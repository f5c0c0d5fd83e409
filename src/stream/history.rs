// Sliding history window placed in front of a resumed job's source.

use crate::regs::layout::QW;

#[derive(Debug, Default)]
pub(crate) struct History {
    bytes: Vec<u8>,
    window: usize,
}

impl History {
    pub(crate) fn new(window: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(window),
            window,
        }
    }

    /// Append uncompressed data, keeping only the last `window` bytes.
    pub(crate) fn push(&mut self, data: &[u8]) {
        if self.window == 0 {
            return;
        }
        if data.len() >= self.window {
            self.bytes.clear();
            self.bytes
                .extend_from_slice(&data[data.len() - self.window..]);
            return;
        }
        self.bytes.extend_from_slice(data);
        if self.bytes.len() > self.window {
            let excess = self.bytes.len() - self.window;
            self.bytes.drain(..excess);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Append the history to `out`, zero-padded at the front to a whole
    /// number of quadwords. Returns the length in quadwords.
    ///
    /// Valid compressed data never reaches into the padding.
    pub(crate) fn write_padded(&self, out: &mut Vec<u8>) -> u16 {
        let qw = self.bytes.len().div_ceil(QW);
        out.resize(out.len() + qw * QW - self.bytes.len(), 0);
        out.extend_from_slice(&self.bytes);
        qw as u16
    }

    /// Append the newest whole quadwords of history to `out`. Returns the
    /// length in quadwords.
    ///
    /// A compressor may match against anything it is given, so it only
    /// sees real data.
    pub(crate) fn write_truncated(&self, out: &mut Vec<u8>) -> u16 {
        let qw = self.bytes.len() / QW;
        out.extend_from_slice(&self.bytes[self.bytes.len() - qw * QW..]);
        qw as u16
    }
}
