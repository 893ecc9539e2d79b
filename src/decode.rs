/// Convert the driver's temperature (tenths of a degree Kelvin) to Celsius.
pub fn kelvin_tenths_to_celsius(k10: u32) -> f64 {
    (k10 as f64 - 2731.6) / 10.0
}

/// Escape control characters in a raw unique ID.
///
/// Each code unit below 0x20 becomes `%` followed by `'0' + c / 16` and
/// `'0' + c % 16`. This is not hexadecimal: 0x1A encodes as `%1:`. Existing
/// identifiers depend on this exact output, so it must not be "fixed".
pub fn escape_unique_id(units: &[u16]) -> Vec<u16> {
    let mut escaped = Vec::with_capacity(units.len());
    for &c in units {
        if c < 0x20 {
            escaped.push(u16::from(b'%'));
            escaped.push(u16::from(b'0') + c / 16);
            escaped.push(u16::from(b'0') + c % 16);
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Turn a unique ID buffer into the identifier string.
///
/// `bytes_returned` is the count reported by the exchange; it includes one
/// trailing NUL unit, which is dropped.
pub fn decode_unique_id(buffer: &[u16], bytes_returned: usize) -> String {
    let len = (bytes_returned / 2).saturating_sub(1).min(buffer.len());
    String::from_utf16_lossy(&escape_unique_id(&buffer[..len]))
}

/// Decode a plain UTF-16 string level (device name, serial number, ...).
pub fn decode_string(buffer: &[u16], bytes_returned: usize) -> String {
    let len = (bytes_returned / 2).min(buffer.len());
    let units = &buffer[..len];
    let end = units.iter().position(|&c| c == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end]).trim().to_string()
}
