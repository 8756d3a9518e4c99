use std::net::SocketAddr;
use std::time::Duration;

use sha1::{Digest, Sha1};
use tokio::net::TcpStream;

use crate::errors::{Error, Result};
use crate::extension;
use crate::handshake;
use crate::metadata;

/// BEP-9 fixes the metadata piece size at 16 KiB.
pub const PIECE_SIZE: usize = 16 * 1024;

/// Total wall clock a single session is allowed, start to finish.
pub const PEER_TIMEOUT: Duration = Duration::from_secs(30);

/// Any individual read that stalls longer than this resets (fails) the
/// session, rather than letting a slow-drip peer occupy a fetch slot for
/// the full `PEER_TIMEOUT`.
pub const READ_STALL_TIMEOUT: Duration = Duration::from_secs(5);

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outstanding piece requests kept in flight at once.
const REQUEST_WINDOW: usize = 4;

/// One TCP connection to one peer, fetching the metadata for a single
/// infohash: BT handshake, BEP-10 extension handshake, pipelined
/// ut_metadata piece fetch, SHA-1 verification. Returns the raw bencoded
/// `info` dictionary bytes on success.
pub async fn fetch_metadata(
    addr: SocketAddr,
    info_hash: [u8; 20],
    own_peer_id: [u8; 20],
    max_metadata_size: i64,
) -> Result<Vec<u8>> {
    tokio::time::timeout(PEER_TIMEOUT, fetch_metadata_inner(addr, info_hash, own_peer_id, max_metadata_size))
        .await
        .map_err(|_| Error::Timeout(PEER_TIMEOUT))?
}

async fn fetch_metadata_inner(
    addr: SocketAddr,
    info_hash: [u8; 20],
    own_peer_id: [u8; 20],
    max_metadata_size: i64,
) -> Result<Vec<u8>> {
    let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Timeout(CONNECT_TIMEOUT))??;

    handshake::perform(&mut stream, info_hash, own_peer_id).await?;
    let (ut_metadata_id, metadata_size) = extension::perform(&mut stream, max_metadata_size).await?;

    let num_pieces = (metadata_size as usize).div_ceil(PIECE_SIZE);
    let mut pieces: Vec<Option<Vec<u8>>> = vec![None; num_pieces];
    let mut next_to_request = 0usize;
    let mut outstanding = 0usize;
    let mut collected = 0usize;

    while next_to_request < num_pieces && outstanding < REQUEST_WINDOW {
        request_piece(&mut stream, ut_metadata_id, next_to_request).await?;
        next_to_request += 1;
        outstanding += 1;
    }

    while collected < num_pieces {
        let (extension_id, payload) = read_with_stall(&mut stream, max_metadata_size).await?;
        if extension_id != ut_metadata_id {
            // Traffic for some other extension (e.g. ut_pex); not our concern.
            continue;
        }

        match metadata::decode(&payload)? {
            metadata::Message::Reject { .. } => return Err(Error::PeerReject),
            metadata::Message::Data { piece, payload } => {
                let index = piece as usize;
                if index >= num_pieces {
                    return Err(Error::PeerReject);
                }
                if pieces[index].is_none() {
                    pieces[index] = Some(payload.to_vec());
                    collected += 1;
                    outstanding -= 1;
                }
                if next_to_request < num_pieces {
                    request_piece(&mut stream, ut_metadata_id, next_to_request).await?;
                    next_to_request += 1;
                    outstanding += 1;
                }
            }
        }
    }

    let mut raw = Vec::with_capacity(metadata_size as usize);
    for piece in pieces {
        raw.extend_from_slice(&piece.expect("every index was collected before the loop exits"));
    }

    let digest = Sha1::digest(&raw);
    if digest.as_slice() != info_hash {
        return Err(Error::ChecksumMismatch);
    }

    Ok(raw)
}

async fn request_piece<S>(stream: &mut S, ut_metadata_id: u8, piece: usize) -> Result<()>
where
    S: tokio::io::AsyncWrite + Unpin,
{
    extension::send_message(stream, ut_metadata_id, &metadata::encode_request(piece as u32)).await
}

async fn read_with_stall<S>(stream: &mut S, max_metadata_size: i64) -> Result<(u8, Vec<u8>)>
where
    S: tokio::io::AsyncRead + Unpin,
{
    tokio::time::timeout(READ_STALL_TIMEOUT, extension::read_message(stream, max_metadata_size))
        .await
        .map_err(|_| Error::Timeout(READ_STALL_TIMEOUT))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::ExtensionHandshake;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn serve_metadata(mut server: impl tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin, info_hash: [u8; 20], blob: Vec<u8>, corrupt_piece_one: bool) {
        let mut buf = [0u8; 68];
        server.read_exact(&mut buf).await.unwrap();
        let reply = handshake::Handshake::new(info_hash, [9u8; 20]);
        server.write_all(&reply.to_bytes()).await.unwrap();

        let (_, _payload) = extension::read_message(&mut server, blob.len() as i64).await.unwrap();
        let mut ours = ExtensionHandshake::offering_ut_metadata();
        ours.metadata_size = Some(blob.len() as i64);
        extension::send_message(&mut server, extension::HANDSHAKE_EXTENSION_ID, &serde_bencode::ser::to_bytes(&ours).unwrap())
            .await
            .unwrap();

        let num_pieces = blob.len().div_ceil(PIECE_SIZE);
        let mut served = 0;
        while served < num_pieces {
            let (_, payload) = extension::read_message(&mut server, blob.len() as i64).await.unwrap();
            let (header, _) = bencode::decode_prefix(&payload).unwrap();
            let piece = header.get(b"piece").unwrap().as_int().unwrap() as usize;

            let start = piece * PIECE_SIZE;
            let end = (start + PIECE_SIZE).min(blob.len());
            let mut chunk = blob[start..end].to_vec();
            if corrupt_piece_one && piece == 1 {
                chunk[0] ^= 0xFF;
            }

            let mut header = std::collections::BTreeMap::new();
            header.insert(b"msg_type".to_vec(), bencode::BValue::Int(1));
            header.insert(b"piece".to_vec(), bencode::BValue::Int(piece as i64));
            header.insert(b"total_size".to_vec(), bencode::BValue::Int(blob.len() as i64));
            let mut data_payload = bencode::encode(&bencode::BValue::Dict(header));
            data_payload.extend_from_slice(&chunk);

            extension::send_message(&mut server, 1, &data_payload).await.unwrap();
            served += 1;
        }
    }

    #[tokio::test]
    async fn fetches_and_verifies_metadata_across_three_pieces() {
        let blob = vec![0x42u8; 40_000];
        let info_hash: [u8; 20] = Sha1::digest(&blob).into();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let blob_clone = blob.clone();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            serve_metadata(socket, info_hash, blob_clone, false).await;
        });

        let raw = fetch_metadata(addr, info_hash, [1u8; 20], 10 * 1024 * 1024).await.unwrap();
        assert_eq!(raw, blob);
    }

    #[tokio::test]
    async fn checksum_mismatch_is_reported() {
        let blob = vec![0x7u8; 40_000];
        let info_hash: [u8; 20] = Sha1::digest(&blob).into();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            serve_metadata(socket, info_hash, blob, true).await;
        });

        let result = fetch_metadata(addr, info_hash, [1u8; 20], 10 * 1024 * 1024).await;
        assert!(matches!(result, Err(Error::ChecksumMismatch)));
    }
}
