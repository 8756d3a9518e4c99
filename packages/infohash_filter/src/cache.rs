//! Minimal ASCII memcache protocol client. No memcache crate appears
//! anywhere in the example pack, so this is a deliberately small,
//! scoped addition rather than a stand-in for an unavailable registry
//! crate: enough GET/SET to use memcache as an infohash membership
//! cache, nothing more.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::errors::{Error, Result};

pub struct MemcacheClient {
    addr: String,
}

impl MemcacheClient {
    pub fn new(addr: impl Into<String>) -> MemcacheClient {
        MemcacheClient { addr: addr.into() }
    }

    async fn connect(&self) -> Result<TcpStream> {
        Ok(TcpStream::connect(&self.addr).await?)
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        let stream = self.connect().await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_half
            .write_all(format!("get {}\r\n", key).as_bytes())
            .await?;

        let mut line = String::new();
        reader.read_line(&mut line).await?;
        if line.starts_with("END") {
            return Ok(false);
        }
        if !line.starts_with("VALUE") {
            return Err(Error::CacheProtocol(line.trim().to_string()));
        }

        // Drain the data line, trailing CRLF and the terminating END.
        let mut data = String::new();
        reader.read_line(&mut data).await?;
        let mut end = String::new();
        reader.read_line(&mut end).await?;
        Ok(true)
    }

    pub async fn insert(&self, key: &str) -> Result<()> {
        let stream = self.connect().await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        // Single byte payload; we only care about presence, not content.
        let command = format!("set {} 0 0 1\r\nx\r\n", key);
        write_half.write_all(command.as_bytes()).await?;

        let mut line = String::new();
        reader.read_line(&mut line).await?;
        if line.starts_with("STORED") {
            Ok(())
        } else {
            Err(Error::CacheProtocol(line.trim().to_string()))
        }
    }
}
