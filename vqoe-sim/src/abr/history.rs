//! Causal download history visible to ABR policies.

use vqoe_core::RungId;

/// Observation recorded when a segment download completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadRecord {
    /// Segment index
    pub index: usize,
    /// Rung that was fetched
    pub rung: RungId,
    /// Bits transferred
    pub size_bits: u64,
    /// Fetch duration including latency
    pub download_time_ms: f64,
}

impl DownloadRecord {
    /// Observed throughput in bits per second; infinite for instant fetches.
    pub fn throughput_bps(&self) -> f64 {
        if self.download_time_ms <= 0.0 {
            return f64::INFINITY;
        }
        self.size_bits as f64 / (self.download_time_ms / 1000.0)
    }
}

/// Completed downloads in segment order.
#[derive(Debug, Clone, Default)]
pub struct CausalHistory {
    downloads: Vec<DownloadRecord>,
}

impl CausalHistory {
    /// Creates empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a completed download.
    pub fn record(&mut self, record: DownloadRecord) {
        self.downloads.push(record);
    }

    /// All completed downloads, oldest first.
    pub fn downloads(&self) -> &[DownloadRecord] {
        &self.downloads
    }

    /// Rung of the most recent download.
    pub fn last_rung(&self) -> Option<RungId> {
        self.downloads.last().map(|d| d.rung)
    }

    /// Throughputs of the `count` most recent downloads, newest first.
    pub fn recent_throughputs(&self, count: usize) -> impl Iterator<Item = f64> + '_ {
        self.downloads
            .iter()
            .rev()
            .take(count)
            .map(DownloadRecord::throughput_bps)
    }

    /// Number of completed downloads.
    pub fn len(&self) -> usize {
        self.downloads.len()
    }

    /// Whether no download has completed yet.
    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, size_bits: u64, download_time_ms: f64) -> DownloadRecord {
        DownloadRecord {
            index,
            rung: RungId::new(0),
            size_bits,
            download_time_ms,
        }
    }

    #[test]
    fn test_throughput_from_record() {
        assert_eq!(record(0, 2_000_000, 500.0).throughput_bps(), 4_000_000.0);
        assert_eq!(record(0, 1, 0.0).throughput_bps(), f64::INFINITY);
    }

    #[test]
    fn test_recent_throughputs_newest_first() {
        let mut history = CausalHistory::new();
        assert!(history.is_empty());
        history.record(record(0, 1_000_000, 1000.0));
        history.record(record(1, 2_000_000, 1000.0));
        history.record(record(2, 3_000_000, 1000.0));

        let recent = history.recent_throughputs(2).collect::<Vec<_>>();
        assert_eq!(recent, vec![3_000_000.0, 2_000_000.0]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.last_rung(), Some(RungId::new(0)));
    }
}
