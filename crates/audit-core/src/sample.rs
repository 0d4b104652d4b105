//! Deterministic id sampling.
//!
//! Ids are produced by `id(i) = round(i^e)` for `i` in `[0, count)`. With the
//! default parameters the sequence starts dense near zero and reaches about
//! two billion, so old rows are probed heavily and large id spaces are
//! still covered.

use crate::error::AuditError;
use crate::row::RowId;

/// Number of ids probed by default.
pub const DEFAULT_SAMPLE_COUNT: u64 = 8128;

/// Exponent of the sampling curve.
pub const DEFAULT_EXPONENT: f64 = 2.38;

/// Lazy, restartable sequence of sampled ids.
///
/// Cloning the sequence, or building a new one with the same parameters,
/// yields exactly the same ids.
#[derive(Debug, Clone)]
pub struct SampleSequence {
    count: u64,
    exponent: f64,
    next: u64,
}

impl SampleSequence {
    pub fn new(count: u64, exponent: f64) -> Result<Self, AuditError> {
        if count == 0 {
            return Err(AuditError::InvalidConfig(
                "sample count must be greater than zero".to_string(),
            ));
        }
        if !exponent.is_finite() || exponent <= 1.0 {
            return Err(AuditError::InvalidConfig(format!(
                "sampling exponent must be a finite number above 1, got {exponent}"
            )));
        }
        let last = ((count - 1) as f64).powf(exponent).round();
        if last >= i64::MAX as f64 {
            return Err(AuditError::InvalidConfig(format!(
                "sampling {count} ids with exponent {exponent} overflows a 64-bit id"
            )));
        }
        Ok(Self {
            count,
            exponent,
            next: 0,
        })
    }

    /// Number of ids the sequence yields in total.
    pub fn sample_count(&self) -> u64 {
        self.count
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// The largest id the sequence will probe.
    pub fn max_id(&self) -> RowId {
        self.id_at(self.count - 1)
    }

    fn id_at(&self, i: u64) -> RowId {
        (i as f64).powf(self.exponent).round() as RowId
    }
}

impl Default for SampleSequence {
    fn default() -> Self {
        Self {
            count: DEFAULT_SAMPLE_COUNT,
            exponent: DEFAULT_EXPONENT,
            next: 0,
        }
    }
}

impl Iterator for SampleSequence {
    type Item = RowId;

    fn next(&mut self) -> Option<RowId> {
        if self.next >= self.count {
            return None;
        }
        let id = self.id_at(self.next);
        self.next += 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.count - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SampleSequence {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence_shape() {
        let ids: Vec<RowId> = SampleSequence::default().collect();
        assert_eq!(ids.len(), 8128);
        assert_eq!(&ids[..4], &[0, 1, 5, 14]);
        // 8127^2.38
        let last = *ids.last().unwrap();
        assert!(last > 2_000_000_000 && last < 2_050_000_000, "last = {last}");
        assert_eq!(last, SampleSequence::default().max_id());
    }

    #[test]
    fn test_strictly_increasing() {
        for count in [1, 2, 3, 10, 1000, 8128] {
            let ids: Vec<RowId> = SampleSequence::new(count, DEFAULT_EXPONENT)
                .unwrap()
                .collect();
            assert_eq!(ids.len() as u64, count);
            assert!(ids.windows(2).all(|w| w[0] < w[1]), "count = {count}");
        }
    }

    #[test]
    fn test_reproducible() {
        let first: Vec<RowId> = SampleSequence::new(500, 2.4).unwrap().collect();
        let second: Vec<RowId> = SampleSequence::new(500, 2.4).unwrap().collect();
        assert_eq!(first, second);

        let mut seq = SampleSequence::new(500, 2.4).unwrap();
        let restarted = seq.clone();
        seq.next();
        assert_eq!(restarted.collect::<Vec<_>>(), first);
    }

    #[test]
    fn test_exact_size() {
        let mut seq = SampleSequence::new(10, DEFAULT_EXPONENT).unwrap();
        assert_eq!(seq.len(), 10);
        seq.next();
        assert_eq!(seq.len(), 9);
        assert_eq!(seq.sample_count(), 10);
        assert_eq!(seq.max_id(), 187);
    }

    #[test]
    fn test_rejects_zero_count() {
        assert!(matches!(
            SampleSequence::new(0, DEFAULT_EXPONENT),
            Err(AuditError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_overflowing_count() {
        assert!(SampleSequence::new(200_000_000, DEFAULT_EXPONENT).is_err());
        assert!(SampleSequence::new(10, 0.5).is_err());
    }
}
