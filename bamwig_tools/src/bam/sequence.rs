/// 4-bit base codes as stored in BAM.
pub const SEQ_ALPHABET: &[u8; 16] = b"=ACMGRSVTWYHKDBN";

/// Decodes `len` bases from nibble-packed `packed`, high nibble first. The low
/// nibble of the last byte is padding when `len` is odd.
pub fn decode(packed: &[u8], len: usize) -> String {
    let mut seq = String::with_capacity(len);
    for (i, byte) in packed.iter().enumerate() {
        seq.push(SEQ_ALPHABET[(byte >> 4) as usize] as char);
        if 2 * i + 1 < len {
            seq.push(SEQ_ALPHABET[(byte & 0xF) as usize] as char);
        }
    }
    seq.truncate(len);
    seq
}

/// Packs a base string, unknown symbols become `N`.
pub fn encode(seq: &str) -> Vec<u8> {
    let code = |b: u8| {
        SEQ_ALPHABET
            .iter()
            .position(|&c| c == b.to_ascii_uppercase())
            .unwrap_or(15) as u8
    };
    seq.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = code(pair[0]) << 4;
            let lo = pair.get(1).map_or(0, |&b| code(b));
            hi | lo
        })
        .collect()
}
