use ndarray::Array3;
use std::collections::BTreeSet;
use std::iter::Copied;
use std::slice::Iter;

use crate::volume::LabelMap;

/// Label value reserved for background voxels. Never reported.
pub const BACKGROUND: i64 = 0;

/// The distinct non-background labels of a label map, in ascending order.
/// Iterating borrows the set, so the sequence can be walked any number of times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<i64>,
}

impl LabelSet {
    pub fn from_array(data: &Array3<i64>) -> Self {
        let labels = data
            .iter()
            .copied()
            .filter(|&value| value != BACKGROUND)
            .collect::<BTreeSet<_>>();
        Self {
            labels: labels.into_iter().collect(),
        }
    }

    pub fn iter(&self) -> Copied<Iter<'_, i64>> {
        self.labels.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = i64;
    type IntoIter = Copied<Iter<'a, i64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl LabelMap {
    /// Labels present in this map, excluding background
    pub fn labels(&self) -> LabelSet {
        LabelSet::from_array(self.data())
    }
}
