//! Video manifest model: quality rungs and per-segment sizes.
//!
//! A manifest is validated once at construction and is immutable afterwards,
//! so it can be shared by reference across any number of concurrent runs.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors raised while constructing or loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest has no quality rungs")]
    NoRungs,

    #[error("Manifest has no segments")]
    NoSegments,

    #[error("Rung bitrates must be positive and strictly ascending (rung {rung}: {bitrate_bps} bps)")]
    UnorderedRungs { rung: usize, bitrate_bps: u64 },

    #[error("Segment {index} lists {actual} sizes, expected one per rung ({expected})")]
    SizeCountMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Segment {index} has invalid duration {duration_s}s")]
    InvalidDuration { index: usize, duration_s: f64 },

    #[error("Manifest value is not a finite non-negative number: {reason}")]
    InvalidValue { reason: String },

    #[error("Failed to parse manifest JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
}

/// Position of a quality rung in the ascending-bitrate ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RungId(usize);

impl RungId {
    /// Creates rung identifier from its ladder position.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the ladder position.
    pub const fn as_index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RungId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One discrete quality level offered by the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityRung {
    pub id: RungId,
    /// Nominal encoding bitrate in bits per second
    pub bitrate_bps: u64,
}

/// One playable segment with an encoded size for every rung.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    index: usize,
    duration_s: f64,
    sizes_bits: Vec<u64>,
}

impl Segment {
    /// Returns the 0-based segment index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the playback duration in seconds.
    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    /// Returns the encoded size of this segment at `rung`, in bits.
    pub fn size_bits(&self, rung: RungId) -> Option<u64> {
        self.sizes_bits.get(rung.as_index()).copied()
    }
}

/// Immutable description of a video.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    rungs: Vec<QualityRung>,
    segments: Vec<Segment>,
}

/// Sabre-style manifest document.
#[derive(Debug, Deserialize)]
struct SabreManifest {
    segment_duration_ms: f64,
    bitrates_kbps: Vec<f64>,
    segment_sizes_bits: Vec<Vec<f64>>,
}

impl Manifest {
    /// Builds a manifest from ascending rung bitrates and `(duration, sizes)` pairs.
    ///
    /// # Errors
    ///
    /// - `ManifestError::NoRungs` / `NoSegments` - Empty ladder or segment list
    /// - `ManifestError::UnorderedRungs` - Bitrates not strictly ascending
    /// - `ManifestError::SizeCountMismatch` - A segment lacks a size for some rung
    /// - `ManifestError::InvalidDuration` - Non-positive or non-finite duration
    pub fn new(
        bitrates_bps: Vec<u64>,
        segments: Vec<(f64, Vec<u64>)>,
    ) -> Result<Self, ManifestError> {
        if bitrates_bps.is_empty() {
            return Err(ManifestError::NoRungs);
        }
        if segments.is_empty() {
            return Err(ManifestError::NoSegments);
        }

        let mut previous = 0;
        for (rung, &bitrate_bps) in bitrates_bps.iter().enumerate() {
            if bitrate_bps <= previous {
                return Err(ManifestError::UnorderedRungs { rung, bitrate_bps });
            }
            previous = bitrate_bps;
        }

        let rungs = bitrates_bps
            .iter()
            .enumerate()
            .map(|(i, &bitrate_bps)| QualityRung {
                id: RungId::new(i),
                bitrate_bps,
            })
            .collect::<Vec<_>>();

        let segments = segments
            .into_iter()
            .enumerate()
            .map(|(index, (duration_s, sizes_bits))| {
                if !duration_s.is_finite() || duration_s <= 0.0 {
                    return Err(ManifestError::InvalidDuration { index, duration_s });
                }
                if sizes_bits.len() != rungs.len() {
                    return Err(ManifestError::SizeCountMismatch {
                        index,
                        expected: rungs.len(),
                        actual: sizes_bits.len(),
                    });
                }
                Ok(Segment {
                    index,
                    duration_s,
                    sizes_bits,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rungs, segments })
    }

    /// Builds a constant-bitrate manifest where every segment at rung `r`
    /// is exactly `bitrate(r) * duration` bits.
    ///
    /// # Errors
    ///
    /// - `ManifestError` - Same conditions as [`Manifest::new`]
    pub fn constant_bitrate(
        bitrates_bps: Vec<u64>,
        segment_duration_s: f64,
        segment_count: usize,
    ) -> Result<Self, ManifestError> {
        let sizes = bitrates_bps
            .iter()
            .map(|&bps| (bps as f64 * segment_duration_s).round() as u64)
            .collect::<Vec<_>>();
        let segments = (0..segment_count)
            .map(|_| (segment_duration_s, sizes.clone()))
            .collect();
        Self::new(bitrates_bps, segments)
    }

    /// Parses a Sabre JSON manifest
    /// (`segment_duration_ms`, `bitrates_kbps`, `segment_sizes_bits`).
    ///
    /// # Errors
    ///
    /// - `ManifestError::Parse` - Malformed JSON or missing fields
    /// - `ManifestError::InvalidValue` - Negative or non-finite numbers
    /// - `ManifestError` - Any validation error from [`Manifest::new`]
    pub fn from_sabre_json(json: &str) -> Result<Self, ManifestError> {
        let doc: SabreManifest = serde_json::from_str(json)?;

        let bitrates_bps = doc
            .bitrates_kbps
            .iter()
            .map(|&kbps| to_whole_units(kbps * 1000.0, "bitrates_kbps"))
            .collect::<Result<Vec<_>, _>>()?;

        let duration_s = doc.segment_duration_ms / 1000.0;
        let segments = doc
            .segment_sizes_bits
            .iter()
            .map(|sizes| {
                let sizes = sizes
                    .iter()
                    .map(|&bits| to_whole_units(bits, "segment_sizes_bits"))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((duration_s, sizes))
            })
            .collect::<Result<Vec<_>, ManifestError>>()?;

        Self::new(bitrates_bps, segments)
    }

    /// Loads a Sabre JSON manifest from disk.
    ///
    /// # Errors
    ///
    /// - `ManifestError::Io` - File could not be read
    /// - `ManifestError` - Any error from [`Manifest::from_sabre_json`]
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let json = std::fs::read_to_string(path)?;
        let manifest = Self::from_sabre_json(&json)?;
        tracing::debug!(
            "Loaded manifest {}: {} rungs, {} segments, {:.1}s",
            path.display(),
            manifest.rungs.len(),
            manifest.segments.len(),
            manifest.total_duration_s()
        );
        Ok(manifest)
    }

    /// Returns rungs in ascending bitrate order.
    pub fn rungs(&self) -> &[QualityRung] {
        &self.rungs
    }

    /// Returns rung by identifier, if it exists.
    pub fn rung(&self, id: RungId) -> Option<&QualityRung> {
        self.rungs.get(id.as_index())
    }

    pub fn rung_count(&self) -> usize {
        self.rungs.len()
    }

    pub fn lowest_rung(&self) -> RungId {
        RungId::new(0)
    }

    pub fn highest_rung(&self) -> RungId {
        RungId::new(self.rungs.len() - 1)
    }

    /// Returns bitrate of `rung` in bits per second.
    pub fn bitrate_bps(&self, rung: RungId) -> Option<u64> {
        self.rung(rung).map(|r| r.bitrate_bps)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Total content duration in seconds.
    pub fn total_duration_s(&self) -> f64 {
        self.segments.iter().map(Segment::duration_s).sum()
    }
}

fn to_whole_units(value: f64, field: &str) -> Result<u64, ManifestError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ManifestError::InvalidValue {
            reason: format!("{field} contains {value}"),
        });
    }
    Ok(value.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SABRE_JSON: &str = r#"{
        "segment_duration_ms": 3000,
        "bitrates_kbps": [230, 477, 991],
        "segment_sizes_bits": [
            [886360, 1180512, 1757888],
            [1095384, 2096528, 3298528]
        ]
    }"#;

    #[test]
    fn test_sabre_manifest_parsing() {
        let manifest = Manifest::from_sabre_json(SABRE_JSON).unwrap();

        assert_eq!(manifest.rung_count(), 3);
        assert_eq!(manifest.segment_count(), 2);
        assert_eq!(manifest.bitrate_bps(RungId::new(1)), Some(477_000));
        assert_eq!(manifest.segment(0).unwrap().duration_s(), 3.0);
        assert_eq!(
            manifest.segment(1).unwrap().size_bits(RungId::new(2)),
            Some(3_298_528)
        );
        assert_eq!(manifest.total_duration_s(), 6.0);
    }

    #[test]
    fn test_constant_bitrate_sizes() {
        let manifest = Manifest::constant_bitrate(vec![1_000_000, 4_000_000], 2.0, 3).unwrap();

        assert_eq!(manifest.highest_rung(), RungId::new(1));
        for segment in manifest.segments() {
            assert_eq!(segment.size_bits(RungId::new(0)), Some(2_000_000));
            assert_eq!(segment.size_bits(RungId::new(1)), Some(8_000_000));
        }
        assert_eq!(manifest.segment(2).unwrap().index(), 2);
    }

    #[test]
    fn test_rejects_unordered_rungs() {
        let result = Manifest::constant_bitrate(vec![4_000_000, 1_000_000], 2.0, 1);
        assert!(matches!(
            result,
            Err(ManifestError::UnorderedRungs { rung: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_missing_rung_size() {
        let result = Manifest::new(vec![100, 200], vec![(2.0, vec![200, 400]), (2.0, vec![200])]);
        assert!(matches!(
            result,
            Err(ManifestError::SizeCountMismatch {
                index: 1,
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_rejects_empty_and_zero_duration() {
        assert!(matches!(
            Manifest::new(vec![], vec![(2.0, vec![])]),
            Err(ManifestError::NoRungs)
        ));
        assert!(matches!(
            Manifest::new(vec![100], vec![]),
            Err(ManifestError::NoSegments)
        ));
        assert!(matches!(
            Manifest::new(vec![100], vec![(0.0, vec![1])]),
            Err(ManifestError::InvalidDuration { index: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_negative_sabre_size() {
        let json = r#"{"segment_duration_ms": 2000, "bitrates_kbps": [100],
                       "segment_sizes_bits": [[-5]]}"#;
        assert!(matches!(
            Manifest::from_sabre_json(json),
            Err(ManifestError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, SABRE_JSON).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.segment_count(), 2);

        let missing = Manifest::load(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ManifestError::Io(_))));
    }
}
