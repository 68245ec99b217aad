use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;


/// Strip the last `.` delimited extension from a module's file name.
///
/// A name without any dot is returned unchanged.
pub(crate) fn strip_ext(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Build the path of the debug file for a module.
pub(crate) fn debug_file_path(dir: &Path, module: &str, ext: &OsStr) -> PathBuf {
    let mut file = strip_ext(module).to_string();
    let () = file.push('.');
    let () = file.push_str(&ext.to_string_lossy());
    dir.join(file)
}

/// Perform a binary search on a slice sorted by key, returning the index
/// of the first element whose key matches `item` (if found) or of the
/// last element with a key smaller than `item` (if any).
///
/// This functionality is useful for cases where we compare elements with a
/// size, such as ranges, and an address to search for can be covered by a range
/// whose start is before the item to search for.
#[cfg_attr(not(feature = "breakpad"), allow(dead_code))]
pub(crate) fn find_match_or_lower_bound_by_key<T, U, F>(
    slice: &[T],
    item: U,
    mut f: F,
) -> Option<usize>
where
    U: Ord,
    F: FnMut(&T) -> U,
{
    let idx = slice.partition_point(|e| f(e) < item);

    // At this point `idx` references the first item greater or equal to the one
    // we are looking for.
    if let Some(e) = slice.get(idx) {
        if f(e) == item {
            return Some(idx)
        }
    }

    // Otherwise `idx` points to a "greater" item. Hence, we pick the previous
    // one, but then have to scan backwards for as long as we see this one item,
    // so that we end up reporting the index of the first of all equal ones.
    let idx = idx.checked_sub(1)?;
    let cmp_e = f(slice.get(idx)?);

    for i in (0..idx).rev() {
        let e = slice.get(i)?;
        if f(e) != cmp_e {
            return Some(i + 1)
        }
    }
    Some(idx)
}
