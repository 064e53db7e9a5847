use derive_more::{Display, From, Into};

/// Identity of a [`Scan`](crate::Scan) row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
pub struct ScanId(i64);
impl ScanId {
    pub fn get(self) -> i64 {
        self.0
    }
}

/// Identity of a [`ScanResult`](crate::ScanResult) row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
pub struct ScanResultId(i64);
impl ScanResultId {
    pub fn get(self) -> i64 {
        self.0
    }
}
