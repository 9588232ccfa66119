//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A WGS84 bounding box.
///
/// Serialized as a `[minLon, minLat, maxLon, maxLat]` array, which is how both
/// the declarative configuration and the STAC-style output spell it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The whole globe, used whenever nothing better is known.
    pub fn global() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }

    /// A small square of half-width `buffer` degrees around a point.
    pub fn around_point(lon: f64, lat: f64, buffer: f64) -> Self {
        Self::new(lon - buffer, lat - buffer, lon + buffer, lat + buffer)
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Union of every box in the iterator, `None` when it is empty.
    pub fn union_all<'a, I>(boxes: I) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = &'a BoundingBox>,
    {
        boxes
            .into_iter()
            .fold(None, |acc: Option<BoundingBox>, b| match acc {
                Some(a) => Some(a.union(b)),
                None => Some(*b),
            })
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Round every coordinate to `decimals` places.
    ///
    /// Capabilities documents tend to carry noisy float tails.
    pub fn rounded(&self, decimals: i32) -> BoundingBox {
        let factor = 10f64.powi(decimals);
        let round = |v: f64| (v * factor).round() / factor;
        BoundingBox::new(
            round(self.min_x),
            round(self.min_y),
            round(self.max_x),
            round(self.max_y),
        )
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(c: [f64; 4]) -> Self {
        BoundingBox::new(c[0], c[1], c[2], c[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}
