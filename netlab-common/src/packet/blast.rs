//! Blaster/blastee payload codec (spec.md §6): blast payload is
//! `seq(4 BE) || length(2 BE) || 0xFF * length`; ACK payload is
//! `seq(4 BE) || 0xFF * 8`. Grounded on `original_source/lab3/blaster.py`
//! (`seq_number.to_bytes(4, 'big')`) and `blastee.py`.

/// Length of the fixed `0xFF` filler in an ACK payload.
pub const ACK_FILLER_LEN: usize = 8;

pub fn encode_blast_payload(seq: u32, length_per_blast: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + 2 + length_per_blast as usize);
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&length_per_blast.to_be_bytes());
    buf.resize(buf.len() + length_per_blast as usize, 0xFF);
    buf
}

pub fn encode_ack_payload(seq: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + ACK_FILLER_LEN);
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.resize(buf.len() + ACK_FILLER_LEN, 0xFF);
    buf
}

/// Both payload shapes start with the same 4-byte big-endian sequence
/// number, so one decoder covers blast payloads and ACKs alike.
pub fn decode_seq(payload: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = payload.get(0..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}
