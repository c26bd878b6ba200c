//! # Command Buffer
//!
//! An append-only byte arena for queued build commands. Records are written
//! as raw `Pod` bytes and freed all at once when the buffer is reset.

use bytemuck::Pod;

/// A bump-pointer byte buffer.
///
/// Appends are fast (copy + bump). Memory is released all at once when the
/// buffer is reset; the allocation itself is kept for the next cycle.
///
/// Records are stored unaligned and read back with
/// [`bytemuck::pod_read_unaligned`], so any `Pod` type can be queued.
///
/// # Thread Safety
///
/// This buffer is NOT thread-safe. Use one buffer per producer.
///
/// # Example
///
/// ```rust,ignore
/// let mut buffer = CommandBuffer::with_capacity(1024);
/// let at = buffer.push(&42u32);
/// assert_eq!(buffer.read::<u32>(at), Some(42));
///
/// buffer.reset();
/// ```
#[derive(Debug, Default)]
pub struct CommandBuffer {
    bytes: Vec<u8>,
}

impl CommandBuffer {
    /// Creates a buffer that can hold `capacity` bytes before growing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Returns the used space in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Checks if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the reserved capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// Appends a record, returning its byte offset.
    #[inline]
    pub fn push<T: Pod>(&mut self, value: &T) -> usize {
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(bytemuck::bytes_of(value));
        offset
    }

    /// Reads the record of type `T` stored at `offset`.
    #[inline]
    #[must_use]
    pub fn read<T: Pod>(&self, offset: usize) -> Option<T> {
        let end = offset.checked_add(std::mem::size_of::<T>())?;
        self.bytes.get(offset..end).map(bytemuck::pod_read_unaligned)
    }

    /// Overwrites the record of type `T` at `offset`.
    ///
    /// Returns `false` if the record lies outside the buffer.
    #[inline]
    pub fn write<T: Pod>(&mut self, offset: usize, value: &T) -> bool {
        let Some(end) = offset.checked_add(std::mem::size_of::<T>()) else {
            return false;
        };
        match self.bytes.get_mut(offset..end) {
            Some(slot) => {
                slot.copy_from_slice(bytemuck::bytes_of(value));
                true
            }
            None => false,
        }
    }

    /// Mutable view of `len` bytes starting at `offset`.
    #[inline]
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        let end = offset.checked_add(len)?;
        self.bytes.get_mut(offset..end)
    }

    /// All queued bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Resets the buffer, invalidating all records.
    ///
    /// No memory is freed or reallocated.
    #[inline]
    pub fn reset(&mut self) {
        self.bytes.clear();
    }
}

/// Sequential reader over the bytes of a [`CommandBuffer`].
#[derive(Debug, Clone)]
pub struct CommandReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> CommandReader<'a> {
    /// Starts reading at the first byte.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    /// Checks if every byte was consumed.
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.bytes.len()
    }

    /// Current byte offset.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.cursor
    }

    /// Reads the next record of type `T`.
    pub fn next_record<T: Pod>(&mut self) -> Option<T> {
        let bytes = self.take(std::mem::size_of::<T>())?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    /// Consumes the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.cursor.checked_add(len)?;
        let slice = self.bytes.get(self.cursor..end)?;
        self.cursor = end;
        Some(slice)
    }
}
