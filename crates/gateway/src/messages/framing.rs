//! NUL-terminated record framing

/// Byte ending every record on the wire
pub const RECORD_TERMINATOR: u8 = 0;

/// Whether the buffer holds at least one complete record
pub fn has_record(buf: &[u8]) -> bool {
    buf.contains(&RECORD_TERMINATOR)
}

/// Length of the unterminated tail (a record still being received)
pub fn partial_len(buf: &[u8]) -> usize {
    match buf.iter().rposition(|&b| b == RECORD_TERMINATOR) {
        Some(last) => buf.len() - last - 1,
        None => buf.len(),
    }
}

/// Take the next complete record off the front of the buffer
///
/// The terminator is consumed and not returned. An unterminated tail stays
/// in the buffer for the next read. Invalid UTF-8 is replaced rather than
/// rejected; the record grammar decides what to do with it.
pub fn next_record(buf: &mut Vec<u8>) -> Option<String> {
    let end = buf.iter().position(|&b| b == RECORD_TERMINATOR)?;
    let record: Vec<u8> = buf.drain(..=end).collect();
    let text = String::from_utf8_lossy(&record[..end]);
    Some(text.trim_end_matches(['\r', '\n']).to_string())
}

/// Append one record plus terminator
pub fn write_record(out: &mut Vec<u8>, text: &str) {
    out.extend_from_slice(text.as_bytes());
    out.push(RECORD_TERMINATOR);
}
