//! BEP-9 ut_metadata piece request/data/reject messages, carried as the
//! payload of a BEP-10 extension message whose extension id is whatever
//! the peer assigned `ut_metadata` in its handshake.

use bencode::BValue;

use crate::errors::{Error, Result};

pub const MSG_TYPE_REQUEST: i64 = 0;
pub const MSG_TYPE_DATA: i64 = 1;
pub const MSG_TYPE_REJECT: i64 = 2;

/// `bencode({msg_type: 0, piece: i})`, requesting the metadata piece at
/// index `piece`.
pub fn encode_request(piece: u32) -> Vec<u8> {
    let mut dict = std::collections::BTreeMap::new();
    dict.insert(b"msg_type".to_vec(), BValue::Int(MSG_TYPE_REQUEST));
    dict.insert(b"piece".to_vec(), BValue::Int(piece as i64));
    bencode::encode(&BValue::Dict(dict))
}

/// A decoded ut_metadata message: the header tells us what it is and,
/// for a `data` message, how many header bytes to skip to reach the raw
/// piece bytes appended after it.
pub enum Message<'a> {
    Data { piece: u32, payload: &'a [u8] },
    Reject { piece: u32 },
}

/// Decodes a ut_metadata payload. `data` messages are a bencoded header
/// immediately followed by raw piece bytes with no separator, so this
/// uses `bencode::decode_prefix` rather than `bencode::decode` to find
/// where the header ends.
pub fn decode(payload: &[u8]) -> Result<Message<'_>> {
    let (header, consumed) = bencode::decode_prefix(payload).map_err(|_| Error::PeerReject)?;

    let msg_type = header.get(b"msg_type").and_then(BValue::as_int).ok_or(Error::PeerReject)?;
    let piece = header.get(b"piece").and_then(BValue::as_int).ok_or(Error::PeerReject)? as u32;

    match msg_type {
        MSG_TYPE_DATA => Ok(Message::Data {
            piece,
            payload: &payload[consumed..],
        }),
        MSG_TYPE_REJECT => Ok(Message::Reject { piece }),
        _ => Err(Error::PeerReject),
    }
}
