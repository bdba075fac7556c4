use core::iter::FusedIterator;
use memberflow_core::CreateRequest;

/// Counter-driven request source yielding `uid-1 ..= uid-total`.
///
/// The source is lazy: identifiers are formatted only when pulled. Cloning a
/// fresh source gives an independent, restartable sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidSource {
    next: u64,
    total: u64,
}

impl UidSource {
    pub const fn new(total: u64) -> Self {
        Self { next: 1, total }
    }

    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Number of requests not yet pulled.
    pub const fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.next - 1)
    }
}

impl Iterator for UidSource {
    type Item = CreateRequest;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.total {
            return None;
        }
        let request = CreateRequest::from_sequence(self.next);
        self.next += 1;
        Some(request)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for UidSource {}

impl FusedIterator for UidSource {}
