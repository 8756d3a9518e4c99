use std::collections::HashMap;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::sync::{mpsc, Mutex};

use krpc_protocol::NodeID;

use crate::config::Config;
use crate::job::Job;

/// A candidate peer to fetch an infohash's metadata from, published by
/// the Sybil DHT node when an `announce_peer` reveals a not-yet-seen
/// infohash. Mirrors `sybil::FetchRequest` by shape rather than by
/// dependency, so the two crates stay decoupled; the binary wiring them
/// together converts one into the other.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest {
    pub info_hash: NodeID,
    pub peer: SocketAddrV4,
}

/// Successfully decoded (but not yet persisted) torrent metadata,
/// delivered in FIFO order of completion — not of discovery, since
/// fetch durations vary per spec.md §5.
#[derive(Debug, Clone)]
pub struct FetchedMetadata {
    pub info_hash: NodeID,
    pub raw_info: Vec<u8>,
}

enum Outcome {
    Success(Vec<u8>),
    Failure,
}

/// Coordinates `peer_wire` sessions across every live infohash: a bounded
/// per-infohash concurrency cap, a global concurrency ceiling, and
/// cancel-on-first-success.
pub struct Pool {
    jobs: Mutex<HashMap<NodeID, Arc<Job>>>,
    recently_tried: Mutex<HashMap<NodeID, Instant>>,
    active_sessions: AtomicUsize,
    success_tx: mpsc::Sender<FetchedMetadata>,
    config: Config,
}

impl Pool {
    pub fn new(config: Config, success_tx: mpsc::Sender<FetchedMetadata>) -> Arc<Pool> {
        Arc::new(Pool {
            jobs: Mutex::new(HashMap::new()),
            recently_tried: Mutex::new(HashMap::new()),
            active_sessions: AtomicUsize::new(0),
            success_tx,
            config,
        })
    }

    pub fn active_session_count(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    pub async fn live_job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Accepts (or silently drops) a newly observed `(infohash, peer)`
    /// pairing. Dropped when: the infohash was tried and exhausted
    /// within the last `recently_tried_window`, or the global session
    /// ceiling is already saturated — spec.md §4.7 calls for sampling
    /// new requests away under load rather than queuing them.
    pub async fn submit(self: &Arc<Pool>, request: FetchRequest) {
        if let Some(tried_at) = self.recently_tried.lock().await.get(&request.info_hash) {
            if tried_at.elapsed() < self.config.recently_tried_window {
                return;
            }
        }

        if self.active_session_count() >= self.config.global_cap {
            debug!("global fetch cap reached, dropping FetchRequest for {}", request.info_hash);
            return;
        }

        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.get(&request.info_hash) {
            let job = job.clone();
            drop(jobs);
            job.push_peer(request.peer).await;
            return;
        }

        let job = Arc::new(Job::new());
        job.push_peer(request.peer).await;
        jobs.insert(request.info_hash, job.clone());
        drop(jobs);

        let pool = self.clone();
        let info_hash = request.info_hash;
        tokio::spawn(async move {
            pool.run_job(info_hash, job).await;
        });
    }

    async fn run_job(self: Arc<Pool>, info_hash: NodeID, job: Arc<Job>) {
        let deadline = tokio::time::Instant::now() + self.config.fetch_job_timeout;
        let (completion_tx, mut completion_rx) = mpsc::channel::<Outcome>(self.config.max_active_peers_per_info_hash);

        loop {
            self.fill_slots(info_hash, &job, &completion_tx).await;

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    debug!("fetch job for {} timed out awaiting a successful peer", info_hash);
                    self.finish_job(&info_hash, false).await;
                    return;
                }
                outcome = completion_rx.recv() => {
                    match outcome {
                        Some(Outcome::Success(raw_info)) => {
                            if self.success_tx.send(FetchedMetadata { info_hash, raw_info }).await.is_err() {
                                warn!("persistence channel closed, dropping successful fetch for {}", info_hash);
                            }
                            self.finish_job(&info_hash, true).await;
                            return;
                        }
                        Some(Outcome::Failure) => {
                            job.in_flight.fetch_sub(1, Ordering::Relaxed);
                            self.active_sessions.fetch_sub(1, Ordering::Relaxed);
                        }
                        None => return,
                    }
                }
                _ = job.notify.notified() => {}
            }
        }
    }

    async fn fill_slots(&self, info_hash: NodeID, job: &Arc<Job>, completion_tx: &mpsc::Sender<Outcome>) {
        loop {
            if job.in_flight_count() >= self.config.max_active_peers_per_info_hash {
                return;
            }
            if self.active_session_count() >= self.config.global_cap {
                return;
            }
            let Some(peer) = job.pop_peer().await else { return };

            job.in_flight.fetch_add(1, Ordering::Relaxed);
            self.active_sessions.fetch_add(1, Ordering::Relaxed);

            let own_peer_id = self.config.own_peer_id;
            let max_metadata_size = self.config.max_metadata_size;
            let tx = completion_tx.clone();
            let handle = tokio::spawn(async move {
                let result = peer_wire::fetch_metadata(
                    SocketAddr::V4(peer),
                    *info_hash.as_bytes(),
                    own_peer_id,
                    max_metadata_size,
                )
                .await;
                let outcome = match result {
                    Ok(raw_info) => Outcome::Success(raw_info),
                    Err(err) => {
                        debug!("peer session with {} for {} failed: {}", peer, info_hash, err);
                        Outcome::Failure
                    }
                };
                // The receiver is dropped once the job supervisor returns
                // (success, timeout, or this very session was aborted as
                // a cancelled sibling); a failed send here just means the
                // job no longer cares, which is fine.
                let _ = tx.send(outcome).await;
            });
            job.track_session(handle).await;
        }
    }

    async fn finish_job(&self, info_hash: &NodeID, success: bool) {
        let job = self.jobs.lock().await.remove(info_hash);
        if let Some(job) = job {
            let abandoned = job.in_flight_count();
            if abandoned > 0 {
                self.active_sessions.fetch_sub(abandoned, Ordering::Relaxed);
            }
            job.cancel_all().await;
        }

        if !success {
            self.recently_tried.lock().await.insert(*info_hash, Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn info_hash(byte: u8) -> NodeID {
        NodeID([byte; 20])
    }

    fn config(global_cap: usize) -> Config {
        let mut config = Config::new(global_cap, [9u8; 20]);
        config.fetch_job_timeout = Duration::from_millis(500);
        config.recently_tried_window = Duration::from_millis(200);
        config
    }

    /// A fake peer that accepts a connection, holds it open without
    /// replying to anything (so the real BT handshake read stalls), and
    /// never completes — exercising the "peer never succeeds" path
    /// without needing a full protocol implementation.
    async fn spawn_stalling_peer() -> SocketAddrV4 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = match listener.local_addr().unwrap() {
            SocketAddr::V4(v4) => v4,
            _ => unreachable!(),
        };
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1];
                    let _ = socket.read(&mut buf).await;
                    // never respond; the peer_wire handshake read will
                    // eventually stall and time out.
                    std::future::pending::<()>().await;
                });
            }
        });
        addr
    }

    /// A fake peer that immediately closes the connection, failing the
    /// handshake fast (used to exercise the failure/retry path without
    /// waiting on a real timeout).
    async fn spawn_refusing_peer() -> SocketAddrV4 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = match listener.local_addr().unwrap() {
            SocketAddr::V4(v4) => v4,
            _ => unreachable!(),
        };
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });
        addr
    }

    #[tokio::test]
    async fn duplicate_submissions_for_the_same_info_hash_share_one_job() {
        let (tx, _rx) = mpsc::channel(8);
        let pool = Pool::new(config(10), tx);
        let hash = info_hash(1);

        let peer_a = spawn_refusing_peer().await;
        let peer_b = spawn_refusing_peer().await;

        pool.submit(FetchRequest { info_hash: hash, peer: peer_a }).await;
        pool.submit(FetchRequest { info_hash: hash, peer: peer_b }).await;

        assert_eq!(pool.live_job_count().await, 1);
    }

    #[tokio::test]
    async fn global_cap_rejects_overflow_requests() {
        let (tx, _rx) = mpsc::channel(8);
        let pool = Pool::new(config(0), tx);
        let peer = spawn_refusing_peer().await;

        pool.submit(FetchRequest { info_hash: info_hash(2), peer }).await;

        // global_cap is zero: no session and no job should ever start.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.live_job_count().await, 0);
    }

    #[tokio::test]
    async fn recently_tried_window_blocks_immediate_resubmission_after_timeout() {
        let (tx, _rx) = mpsc::channel(8);
        let pool = Pool::new(config(10), tx);
        let hash = info_hash(3);
        let peer = spawn_stalling_peer().await;

        pool.submit(FetchRequest { info_hash: hash, peer }).await;
        // Let the job run past its (500ms) timeout and get dropped.
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(pool.live_job_count().await, 0);

        // Immediately resubmitting the same infohash should be ignored:
        // it's inside the 200ms recently-tried window.
        let peer2 = spawn_stalling_peer().await;
        pool.submit(FetchRequest { info_hash: hash, peer: peer2 }).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.live_job_count().await, 0);
    }

    #[tokio::test]
    async fn first_success_delivers_metadata_and_cancels_siblings() {
        let (tx, mut rx) = mpsc::channel(8);
        let pool = Pool::new(config(10), tx);
        let hash = info_hash(4);

        let stalling_peer = spawn_stalling_peer().await;

        let blob = vec![0x11u8; 20_000];
        let real_hash: [u8; 20] = {
            use sha1::{Digest, Sha1};
            Sha1::digest(&blob).into()
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let success_addr = match listener.local_addr().unwrap() {
            SocketAddr::V4(v4) => v4,
            _ => unreachable!(),
        };
        let blob_clone = blob.clone();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            serve_one_piece_metadata(socket, real_hash, blob_clone).await;
        });

        let hash = NodeID(real_hash);
        pool.submit(FetchRequest { info_hash: hash, peer: stalling_peer }).await;
        pool.submit(FetchRequest { info_hash: hash, peer: success_addr }).await;

        let delivered = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("expected a FetchedMetadata before the test timeout")
            .unwrap();
        assert_eq!(delivered.info_hash, hash);
        assert_eq!(delivered.raw_info, blob);
    }

    /// A minimal fake peer offering a single-piece metadata blob, built
    /// from `peer_wire`'s own public handshake/extension helpers rather
    /// than hand-rolled bytes.
    async fn serve_one_piece_metadata(mut socket: TcpStream, info_hash: [u8; 20], blob: Vec<u8>) {
        let mut handshake_buf = [0u8; 68];
        socket.read_exact(&mut handshake_buf).await.unwrap();
        let reply = peer_wire::Handshake::new(info_hash, [7u8; 20]);
        socket.write_all(&reply.to_bytes()).await.unwrap();

        let (_, _payload) = read_extension_message(&mut socket).await;
        let mut ours = peer_wire::ExtensionHandshake::offering_ut_metadata();
        ours.metadata_size = Some(blob.len() as i64);
        write_extension_message(&mut socket, 0, &serde_bencode::ser::to_bytes(&ours).unwrap()).await;

        let (_, _payload) = read_extension_message(&mut socket).await;

        let mut header = std::collections::BTreeMap::new();
        header.insert(b"msg_type".to_vec(), bencode::BValue::Int(1));
        header.insert(b"piece".to_vec(), bencode::BValue::Int(0));
        header.insert(b"total_size".to_vec(), bencode::BValue::Int(blob.len() as i64));
        let mut payload = bencode::encode(&bencode::BValue::Dict(header));
        payload.extend_from_slice(&blob);
        write_extension_message(&mut socket, 1, &payload).await;
    }

    async fn read_extension_message(socket: &mut TcpStream) -> (u8, Vec<u8>) {
        let mut len_buf = [0u8; 4];
        socket.read_exact(&mut len_buf).await.unwrap();
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        socket.read_exact(&mut body).await.unwrap();
        (body[1], body[2..].to_vec())
    }

    async fn write_extension_message(socket: &mut TcpStream, extension_id: u8, payload: &[u8]) {
        let len = (payload.len() + 2) as u32;
        let mut out = Vec::with_capacity(4 + len as usize);
        out.extend_from_slice(&len.to_be_bytes());
        out.push(20);
        out.push(extension_id);
        out.extend_from_slice(payload);
        socket.write_all(&out).await.unwrap();
    }
}
