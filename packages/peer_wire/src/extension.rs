use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::errors::{Error, Result};

/// BEP-10 message type byte for every extension message; the specific
/// extension (handshake vs. a registered one like ut_metadata) is carried
/// by the second byte.
pub const EXTENSION_MESSAGE_ID: u8 = 20;

/// Reserved BEP-10 extension ID: the handshake itself always rides on
/// message ID 0, before either side knows what ID its peer assigned
/// ut_metadata.
pub const HANDSHAKE_EXTENSION_ID: u8 = 0;

/// The `m` dictionary and `metadata_size` of a BEP-10 handshake. Only the
/// fields this crawler cares about are modeled; an unknown extra key in
/// `m` (e.g. `ut_pex`) round-trips fine through `HashMap`, it's just
/// ignored.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ExtensionHandshake {
    #[serde(rename = "m")]
    pub messages: HashMap<String, i64>,

    #[serde(rename = "metadata_size", skip_serializing_if = "Option::is_none")]
    pub metadata_size: Option<i64>,
}

impl ExtensionHandshake {
    pub fn offering_ut_metadata() -> ExtensionHandshake {
        let mut messages = HashMap::new();
        messages.insert("ut_metadata".to_string(), 1);
        ExtensionHandshake {
            messages,
            metadata_size: None,
        }
    }

    pub fn ut_metadata_id(&self) -> Option<u8> {
        self.messages.get("ut_metadata").map(|id| *id as u8)
    }

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_bencode::ser::to_bytes(self)?)
    }

    fn decode(bytes: &[u8]) -> Result<ExtensionHandshake> {
        Ok(serde_bencode::de::from_bytes(bytes)?)
    }
}

/// Sends our BEP-10 handshake (offering `ut_metadata`) and reads the
/// peer's, validating `metadata_size` against `max_metadata_size`.
/// Returns the peer's assigned ut_metadata message ID and metadata_size.
pub async fn perform<S>(stream: &mut S, max_metadata_size: i64) -> Result<(u8, i64)>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    send_message(stream, HANDSHAKE_EXTENSION_ID, &ExtensionHandshake::offering_ut_metadata().encode()?).await?;

    let (extension_id, payload) = read_message(stream, max_metadata_size).await?;
    if extension_id != HANDSHAKE_EXTENSION_ID {
        return Err(Error::NoExtensionSupport);
    }

    let handshake = ExtensionHandshake::decode(&payload)?;
    let ut_metadata_id = handshake.ut_metadata_id().ok_or(Error::NoMetadataExtension)?;
    let metadata_size = handshake.metadata_size.ok_or(Error::NoMetadataExtension)?;
    if metadata_size <= 0 {
        return Err(Error::BadMetadataSize { size: metadata_size });
    }
    if metadata_size > max_metadata_size {
        return Err(Error::BadMetadataSize { size: metadata_size });
    }

    Ok((ut_metadata_id, metadata_size))
}

/// Writes a single peer-wire message: 4-byte big-endian length prefix
/// (covering the extension-message-id byte and payload), the `20`
/// extension-protocol message id, the per-extension `extension_id`, then
/// the raw payload.
pub async fn send_message<S>(stream: &mut S, extension_id: u8, payload: &[u8]) -> Result<()>
where
    S: tokio::io::AsyncWrite + Unpin,
{
    let len = (payload.len() + 2) as u32;
    let mut out = Vec::with_capacity(4 + len as usize);
    out.extend_from_slice(&len.to_be_bytes());
    out.push(EXTENSION_MESSAGE_ID);
    out.push(extension_id);
    out.extend_from_slice(payload);
    stream.write_all(&out).await?;
    Ok(())
}

/// Reads a single peer-wire extension message, rejecting anything larger
/// than `max_metadata_size + 64` (headroom for the bencoded envelope
/// around a data piece) so a misbehaving peer can't force an unbounded
/// allocation.
pub async fn read_message<S>(stream: &mut S, max_metadata_size: i64) -> Result<(u8, Vec<u8>)>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let limit = (max_metadata_size as usize).saturating_add(64);

    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > limit {
        return Err(Error::OversizedMessage { len, limit });
    }
    if len < 2 {
        return Err(Error::NoExtensionSupport);
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    if body[0] != EXTENSION_MESSAGE_ID {
        return Err(Error::NoExtensionSupport);
    }
    let extension_id = body[1];
    Ok((extension_id, body[2..].to_vec()))
}
