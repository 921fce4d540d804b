// src/criteria/volume.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::trace;
use uuid::Uuid;

use super::elevation::{Candidate, ELEVATION_EPSILON, ElevationBand};
use crate::catalog::FileEntry;

/// Tolerance when matching a scan to an explicit elevation list.
pub const ANGLE_TOLERANCE: f64 = 0.05;

/// Which scans make up a volume.
#[derive(Debug, Clone, PartialEq)]
pub enum ElevationSelection {
    /// Continuous band. Ascending volumes are complete once the top of the
    /// band is reached, descending ones once the bottom is.
    Band { band: ElevationBand, ascending: bool },
    /// Explicit angle list; complete once every angle is present.
    Angles(Vec<f64>),
}

/// Angle bucket key: elevation in hundredths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct AngleKey(i64);

impl AngleKey {
    fn of(elevation: f64) -> Self {
        AngleKey((elevation * 100.0).round() as i64)
    }
}

/// Scans accepted into a volume, one per elevation angle.
#[derive(Debug, Clone, Default)]
pub struct VolumeScans {
    scans: BTreeMap<AngleKey, Candidate>,
    /// Observation time of the scan that closed the sweep, if any. Later
    /// scans belong to the next volume.
    sealed_at: Option<DateTime<Utc>>,
}

impl VolumeScans {
    /// Offer a scan. The first scan at an angle is kept; later ones at the
    /// same angle are ignored. Returns `true` if the set changed.
    pub fn offer(&mut self, entry: &FileEntry, selection: &ElevationSelection) -> bool {
        let Some(elevation) = entry.elevation else {
            return false;
        };
        if self.sealed_at.is_some_and(|sealed| entry.datetime > sealed) {
            trace!(source = %entry.source, elevation, "volume sealed; scan ignored");
            return false;
        }

        let key = match selection {
            ElevationSelection::Band { band, .. } => {
                if !band.contains(elevation) {
                    return false;
                }
                AngleKey::of(elevation)
            }
            ElevationSelection::Angles(angles) => {
                match angles
                    .iter()
                    .find(|a| (*a - elevation).abs() <= ANGLE_TOLERANCE)
                {
                    Some(angle) => AngleKey::of(*angle),
                    None => return false,
                }
            }
        };

        if let Some(existing) = self.scans.get(&key) {
            if existing.uuid != entry.uuid {
                trace!(
                    source = %entry.source,
                    elevation,
                    "angle already filled by an earlier scan; keeping it"
                );
            }
            return false;
        }

        self.scans.insert(key, Candidate::from_entry(entry, elevation));

        if let ElevationSelection::Band { band, ascending } = selection {
            let closes = if *ascending {
                elevation >= band.max - ELEVATION_EPSILON
            } else {
                elevation <= band.min + ELEVATION_EPSILON
            };
            if closes {
                self.sealed_at = Some(entry.datetime);
            }
        }
        true
    }

    pub fn is_complete(&self, selection: &ElevationSelection) -> bool {
        match selection {
            ElevationSelection::Band { .. } => self.sealed_at.is_some(),
            ElevationSelection::Angles(angles) => {
                !angles.is_empty()
                    && angles
                        .iter()
                        .all(|a| self.scans.contains_key(&AngleKey::of(*a)))
            }
        }
    }

    /// Angles of an explicit list not yet filled.
    pub fn missing(&self, selection: &ElevationSelection) -> Vec<String> {
        match selection {
            ElevationSelection::Band { .. } => Vec::new(),
            ElevationSelection::Angles(angles) => angles
                .iter()
                .filter(|a| !self.scans.contains_key(&AngleKey::of(**a)))
                .map(|a| a.to_string())
                .collect(),
        }
    }

    /// Accepted files, lowest elevation first.
    pub fn files(&self) -> Vec<Uuid> {
        self.scans.values().map(|c| c.uuid).collect()
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ObjectType;
    use chrono::TimeZone;

    fn scan(minute: u32, elevation: f64) -> FileEntry {
        FileEntry {
            uuid: Uuid::new_v4(),
            source: "seang".to_string(),
            object_type: ObjectType::Scan,
            datetime: Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap(),
            elevation: Some(elevation),
            attributes: Default::default(),
        }
    }

    fn band(ascending: bool) -> ElevationSelection {
        ElevationSelection::Band {
            band: ElevationBand { min: 0.5, max: 4.0 },
            ascending,
        }
    }

    #[test]
    fn ascending_volume_completes_at_top_of_band() {
        let sel = band(true);
        let mut v = VolumeScans::default();

        let low = scan(0, 0.5);
        let mid = scan(1, 1.5);
        let top = scan(2, 4.0);
        assert!(v.offer(&low, &sel));
        assert!(v.offer(&mid, &sel));
        assert!(!v.is_complete(&sel));
        assert!(v.offer(&top, &sel));
        assert!(v.is_complete(&sel));

        // Next sweep has started; not part of this volume.
        assert!(!v.offer(&scan(3, 0.7), &sel));
        assert_eq!(v.files(), vec![low.uuid, mid.uuid, top.uuid]);
    }

    #[test]
    fn descending_volume_completes_at_bottom_of_band() {
        let sel = band(false);
        let mut v = VolumeScans::default();
        v.offer(&scan(0, 4.0), &sel);
        assert!(!v.is_complete(&sel));
        v.offer(&scan(1, 0.5), &sel);
        assert!(v.is_complete(&sel));
    }

    #[test]
    fn same_angle_keeps_earliest_scan() {
        let sel = band(true);
        let mut v = VolumeScans::default();
        let first = scan(0, 1.0);
        assert!(v.offer(&first, &sel));
        assert!(!v.offer(&scan(1, 1.0), &sel));
        assert_eq!(v.files(), vec![first.uuid]);
    }

    #[test]
    fn explicit_angle_list_needs_every_angle() {
        let sel = ElevationSelection::Angles(vec![0.5, 1.0, 2.0]);
        let mut v = VolumeScans::default();

        v.offer(&scan(0, 0.5), &sel);
        v.offer(&scan(1, 1.02), &sel);
        // Not in the list.
        assert!(!v.offer(&scan(2, 1.5), &sel));
        assert!(!v.is_complete(&sel));
        assert_eq!(v.missing(&sel), vec!["2".to_string()]);

        v.offer(&scan(3, 2.0), &sel);
        assert!(v.is_complete(&sel));
        assert_eq!(v.len(), 3);
    }
}
