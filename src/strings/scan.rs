//! Printable-run scanner.

/// Printable ASCII, space through tilde
#[inline]
pub fn is_printable(b: u8) -> bool {
    (0x20..=0x7e).contains(&b)
}

/// Maximal printable runs of at least `min_length` bytes as `(text, offset)`.
///
/// A run that reaches the end of `data` is kept like any other.
pub fn scan_printable(data: &[u8], min_length: usize) -> Vec<(String, usize)> {
    let min_length = min_length.max(1);
    let mut out = Vec::new();
    let mut start: Option<usize> = None;

    for (i, &b) in data.iter().enumerate() {
        match (is_printable(b), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                push_run(&mut out, data, s, i, min_length);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        push_run(&mut out, data, s, data.len(), min_length);
    }
    out
}

fn push_run(out: &mut Vec<(String, usize)>, data: &[u8], start: usize, end: usize, min_length: usize) {
    if end - start >= min_length {
        // Printable bytes are ASCII, so this never allocates a replacement
        out.push((String::from_utf8_lossy(&data[start..end]).into_owned(), start));
    }
}
