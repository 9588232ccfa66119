//! Spatial and temporal extents and their rollup.

use chrono::{DateTime, TimeZone, Utc};
use harvest_common::{BoundingBox, TimeInterval};
use serde::Serialize;

use crate::item::Item;

/// Start of the open interval used when nothing is known about a collection's time range.
pub fn sentinel_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A non-empty sequence of bounding boxes.
///
/// The first box is the authoritative overall box. Rollups append further
/// boxes (one per child) rather than fusing them.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpatialExtent {
    bbox: Vec<BoundingBox>,
}

impl SpatialExtent {
    pub fn new(primary: BoundingBox) -> Self {
        Self {
            bbox: vec![primary],
        }
    }

    pub fn global() -> Self {
        Self::new(BoundingBox::global())
    }

    /// Build from a list of boxes, `None` when the list is empty.
    pub fn from_boxes(boxes: Vec<BoundingBox>) -> Option<Self> {
        if boxes.is_empty() {
            None
        } else {
            Some(Self { bbox: boxes })
        }
    }

    pub fn primary(&self) -> BoundingBox {
        self.bbox[0]
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.bbox
    }

    pub fn push(&mut self, bbox: BoundingBox) {
        self.bbox.push(bbox);
    }

    pub fn len(&self) -> usize {
        self.bbox.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// An ordered sequence of `[start, end-or-null]` intervals.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TemporalExtent {
    interval: Vec<TimeInterval>,
}

impl TemporalExtent {
    pub fn new(interval: TimeInterval) -> Self {
        Self {
            interval: vec![interval],
        }
    }

    /// Open interval beginning at the sentinel start.
    pub fn unknown() -> Self {
        Self::new(TimeInterval::open(sentinel_start()))
    }

    pub fn primary(&self) -> TimeInterval {
        self.interval[0]
    }

    pub fn intervals(&self) -> &[TimeInterval] {
        &self.interval
    }

    pub fn push(&mut self, interval: TimeInterval) {
        self.interval.push(interval);
    }
}

/// Spatial and temporal coverage of a collection.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Extent {
    pub spatial: SpatialExtent,
    pub temporal: TemporalExtent,
}

impl Extent {
    pub fn new(spatial: SpatialExtent, temporal: TemporalExtent) -> Self {
        Self { spatial, temporal }
    }

    /// Global bbox with an unknown (sentinel) time range.
    pub fn global() -> Self {
        Self::new(SpatialExtent::global(), TemporalExtent::unknown())
    }

    /// Compute an extent from items.
    ///
    /// Spatial is the union of item boxes, or the global box when no item has
    /// one. Temporal is `[min(start), max(end)]`, where an instant counts as
    /// both its own start and end.
    pub fn from_items(items: &[Item]) -> Self {
        let spatial = BoundingBox::union_all(items.iter().filter_map(|i| i.bbox.as_ref()))
            .map(SpatialExtent::new)
            .unwrap_or_else(SpatialExtent::global);

        let temporal = Self::time_envelope(items)
            .map(TemporalExtent::new)
            .unwrap_or_else(TemporalExtent::unknown);

        Self { spatial, temporal }
    }

    fn time_envelope(items: &[Item]) -> Option<TimeInterval> {
        let mut bounds: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
        for item in items {
            let (start, end) = item.time.bounds();
            bounds = Some(match bounds {
                Some((s, e)) => (s.min(start), e.max(end)),
                None => (start, end),
            });
        }
        bounds.map(|(start, end)| TimeInterval::closed(start, end))
    }

    /// Replace whichever component configuration fixes explicitly.
    pub fn apply_override(&mut self, bbox: Option<BoundingBox>, interval: Option<TimeInterval>) {
        if let Some(bbox) = bbox {
            self.spatial = SpatialExtent::new(bbox);
        }
        if let Some(interval) = interval {
            self.temporal = TemporalExtent::new(interval);
        }
    }

    /// Append each child's primary box to this extent's spatial sequence.
    pub fn rollup_child_bboxes<'a, I>(&mut self, children: I)
    where
        I: IntoIterator<Item = &'a Extent>,
    {
        for child in children {
            self.spatial.push(child.spatial.primary());
        }
    }

    /// Temporal envelope over the primary intervals of several extents.
    ///
    /// Open ends stay open.
    pub fn temporal_envelope<'a, I>(extents: I) -> Option<TimeInterval>
    where
        I: IntoIterator<Item = &'a Extent>,
    {
        extents
            .into_iter()
            .map(|e| e.temporal.primary())
            .fold(None, |acc: Option<TimeInterval>, next| match acc {
                None => Some(next),
                Some(current) => Some(TimeInterval::new(
                    current.start.min(next.start),
                    match (current.end, next.end) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        _ => None,
                    },
                )),
            })
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::global()
    }
}
