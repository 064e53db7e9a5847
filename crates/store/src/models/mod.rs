mod result;
mod scan;

pub(crate) use self::result::ScanResultRow;
pub(crate) use self::scan::ScanRow;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::UtcDateTime;

/// Timestamps are stored as Unix milliseconds; anything finer is dropped.
pub(crate) fn to_millis(at: UtcDateTime) -> i64 {
    // i64 milliseconds covers every year `time` can represent.
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(millis: i64, field: &'static str) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).or_raise(|| ErrorKind::InvalidData(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_truncate_sub_millisecond_precision() {
        let at = UtcDateTime::from_unix_timestamp_nanos(1_700_000_000_123_456_789).unwrap();
        let millis = to_millis(at);
        assert_eq!(millis, 1_700_000_000_123);
        assert_eq!(
            from_millis(millis, "created_at").unwrap(),
            UtcDateTime::from_unix_timestamp_nanos(1_700_000_000_123_000_000).unwrap()
        );
    }

    #[test]
    fn test_out_of_range_millis_rejected() {
        let err = from_millis(i64::MAX, "created_at").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("created_at")));
    }
}
