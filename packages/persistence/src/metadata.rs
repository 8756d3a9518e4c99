use bencode::BValue;

use crate::errors::{Error, Result};

/// One file inside a decoded `info` dictionary, with its path already
/// flattened to a single `/`-joined string (multi-file torrents store
/// their path components as a bencode list; single-file torrents use
/// the torrent's own name as the sole file's path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub size: i64,
    pub path: String,
}

/// The decoded, validated view of a raw `info` dictionary, ready to be
/// queued for a batched insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMetadata {
    pub name: String,
    pub total_size: i64,
    pub files: Vec<FileEntry>,
}

fn malformed(msg: impl Into<String>) -> Error {
    Error::MalformedMetadata(msg.into())
}

fn clean_component(bytes: &[u8]) -> Result<String> {
    if bytes.contains(&b'/') || bytes.contains(&0u8) {
        return Err(malformed("path component contains '/' or NUL"));
    }
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| malformed("path component is not valid utf-8"))
}

/// Decodes and validates a raw bencoded `info` dictionary per spec.md §3's
/// `MetadataArtifact` invariants: no `/` or NUL in `name` or any file path
/// component, every length strictly positive, `total_size` the sum of the
/// individual file sizes. Does not re-verify `SHA1(raw) == info_hash`;
/// `peer_wire::fetch_metadata` has already done that before handing the
/// bytes off.
pub fn decode_info(raw: &[u8]) -> Result<DecodedMetadata> {
    let value = bencode::decode(raw).map_err(|err| malformed(err.to_string()))?;
    let dict = value.as_dict().ok_or_else(|| malformed("info is not a dictionary"))?;

    let name_bytes = dict
        .get(b"name".as_slice())
        .and_then(BValue::as_bytes)
        .ok_or_else(|| malformed("info.name is missing or not a byte string"))?;
    let name = clean_component(name_bytes)?;

    let files = match dict.get(b"files".as_slice()) {
        Some(files_value) => {
            let entries = files_value.as_list().ok_or_else(|| malformed("info.files is not a list"))?;
            entries.iter().map(decode_file_entry).collect::<Result<Vec<_>>>()?
        }
        None => {
            let length = dict
                .get(b"length".as_slice())
                .and_then(BValue::as_int)
                .ok_or_else(|| malformed("info.length is missing or not an integer"))?;
            if length <= 0 {
                return Err(malformed("info.length must be positive"));
            }
            vec![FileEntry { size: length, path: name.clone() }]
        }
    };

    let total_size: i64 = files.iter().map(|f| f.size).sum();
    if total_size <= 0 {
        return Err(malformed("total_size must be positive"));
    }

    Ok(DecodedMetadata { name, total_size, files })
}

fn decode_file_entry(value: &BValue) -> Result<FileEntry> {
    let dict = value.as_dict().ok_or_else(|| malformed("file entry is not a dictionary"))?;

    let size = dict
        .get(b"length".as_slice())
        .and_then(BValue::as_int)
        .ok_or_else(|| malformed("file.length is missing or not an integer"))?;
    if size <= 0 {
        return Err(malformed("file.length must be positive"));
    }

    let path_list = dict
        .get(b"path".as_slice())
        .and_then(BValue::as_list)
        .ok_or_else(|| malformed("file.path is missing or not a list"))?;
    if path_list.is_empty() {
        return Err(malformed("file.path must have at least one component"));
    }

    let mut components = Vec::with_capacity(path_list.len());
    for component in path_list {
        let bytes = component.as_bytes().ok_or_else(|| malformed("file.path component is not a byte string"))?;
        components.push(clean_component(bytes)?);
    }

    Ok(FileEntry { size, path: components.join("/") })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn bytes(s: &str) -> BValue {
        BValue::Bytes(s.as_bytes().to_vec())
    }

    #[test]
    fn decodes_a_single_file_torrent() {
        let mut dict = BTreeMap::new();
        dict.insert(b"name".to_vec(), bytes("ubuntu.iso"));
        dict.insert(b"length".to_vec(), BValue::Int(123));
        let raw = bencode::encode(&BValue::Dict(dict));

        let decoded = decode_info(&raw).unwrap();
        assert_eq!(decoded.name, "ubuntu.iso");
        assert_eq!(decoded.total_size, 123);
        assert_eq!(decoded.files, vec![FileEntry { size: 123, path: "ubuntu.iso".to_string() }]);
    }

    #[test]
    fn decodes_a_multi_file_torrent_and_sums_sizes() {
        let mut file_a = BTreeMap::new();
        file_a.insert(b"length".to_vec(), BValue::Int(10));
        file_a.insert(b"path".to_vec(), BValue::List(vec![bytes("a.txt")]));

        let mut file_b = BTreeMap::new();
        file_b.insert(b"length".to_vec(), BValue::Int(20));
        file_b.insert(b"path".to_vec(), BValue::List(vec![bytes("sub"), bytes("b.txt")]));

        let mut dict = BTreeMap::new();
        dict.insert(b"name".to_vec(), bytes("bundle"));
        dict.insert(b"files".to_vec(), BValue::List(vec![BValue::Dict(file_a), BValue::Dict(file_b)]));
        let raw = bencode::encode(&BValue::Dict(dict));

        let decoded = decode_info(&raw).unwrap();
        assert_eq!(decoded.total_size, 30);
        assert_eq!(decoded.files[1].path, "sub/b.txt");
    }

    #[test]
    fn rejects_a_name_containing_a_slash() {
        let mut dict = BTreeMap::new();
        dict.insert(b"name".to_vec(), bytes("evil/name"));
        dict.insert(b"length".to_vec(), BValue::Int(1));
        let raw = bencode::encode(&BValue::Dict(dict));

        assert!(decode_info(&raw).is_err());
    }

    #[test]
    fn rejects_a_non_positive_length() {
        let mut dict = BTreeMap::new();
        dict.insert(b"name".to_vec(), bytes("empty"));
        dict.insert(b"length".to_vec(), BValue::Int(0));
        let raw = bencode::encode(&BValue::Dict(dict));

        assert!(decode_info(&raw).is_err());
    }
}
