//! Internal helpers shared by the codec modules.

/// Returns early with `Err($error)` unless `$predicate` holds.
///
/// The scanner uses it for its many one-line validity checks:
///
/// ```ignore
/// ensure!(byte == b'\n', ScanError::InvalidConstant);
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
