//! Fixed-size rolling buckets backing the fee market.
//!
//! A window covers the last [`WINDOW_SIZE`] seconds, one bucket per second,
//! newest bucket last. Blocks carry two of these on the wire: one counting
//! consumed units, one counting produced blocks.

use crate::codec::{CodecError, Reader, Writer};

/// Number of one-second buckets in a window.
pub const WINDOW_SIZE: usize = 10;
/// Serialized size of a window, in bytes.
pub const WINDOW_BYTES: usize = WINDOW_SIZE * 8;

/// Rolling consumption history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Window([u64; WINDOW_SIZE]);

impl Window {
    pub const fn zero() -> Self {
        Window([0; WINDOW_SIZE])
    }

    pub fn from_buckets(buckets: [u64; WINDOW_SIZE]) -> Self {
        Window(buckets)
    }

    pub fn buckets(&self) -> &[u64; WINDOW_SIZE] {
        &self.0
    }

    /// Adds `amount` into the newest bucket, saturating.
    pub fn record(&mut self, amount: u64) {
        let newest = WINDOW_SIZE - 1;
        self.0[newest] = self.0[newest].saturating_add(amount);
    }

    /// Ages the window by `elapsed` seconds: the oldest buckets fall off and
    /// empty buckets shift in at the newest end.
    pub fn roll(&self, elapsed: u64) -> Window {
        if elapsed as usize >= WINDOW_SIZE {
            return Window::zero();
        }
        let shift = elapsed as usize;
        let mut next = [0u64; WINDOW_SIZE];
        next[..WINDOW_SIZE - shift].copy_from_slice(&self.0[shift..]);
        Window(next)
    }

    /// Total pressure across the window, saturating.
    pub fn sum(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |total, bucket| total.saturating_add(*bucket))
    }

    pub(crate) fn marshal(&self, writer: &mut Writer) -> Result<(), CodecError> {
        for bucket in &self.0 {
            writer.put_u64(*bucket)?;
        }
        Ok(())
    }

    pub(crate) fn unmarshal(
        reader: &mut Reader<'_>,
        field: &'static str,
    ) -> Result<Self, CodecError> {
        let mut buckets = [0u64; WINDOW_SIZE];
        for bucket in &mut buckets {
            *bucket = reader.get_u64(field)?;
        }
        Ok(Window(buckets))
    }
}
