use std::ffi::OsStr;

use widestring::{error::ContainsNul, WideCString, WideString};

/// A helper to join a collection of `OsStr` into a nul-separated `WideString` ending with two nul
/// wide characters.
///
/// Input:
/// vec!["item one", "item two"]
///
/// Output:
/// "item one\0item two\0\0"
///
/// Returns None if the source collection is empty.
pub fn from_vec(source: &[impl AsRef<OsStr>]) -> Result<Option<WideString>, ContainsNul<u16>> {
    if source.is_empty() {
        Ok(None)
    } else {
        let mut wide = WideString::new();
        for s in source {
            let checked_str = WideCString::from_os_str(s)?;
            wide.push_slice(checked_str);
            wide.push_slice(&[0]);
        }
        wide.push_slice(&[0]);
        Ok(Some(wide))
    }
}
