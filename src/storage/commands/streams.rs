//! Stream command implementations: XADD, XRANGE, XREAD.

use crate::error::{CommandError, Result};
use crate::protocol::RespFrame;
use crate::storage::stream::StreamId;
use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;

fn arg_bytes(frame: &RespFrame) -> Result<&[u8]> {
    match frame {
        RespFrame::BulkString(Some(bytes)) => Ok(bytes.as_ref()),
        _ => Err(CommandError::Generic("invalid argument format".into()).into()),
    }
}

fn arg_string(frame: &RespFrame) -> Result<String> {
    let bytes = arg_bytes(frame)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CommandError::Generic("invalid UTF-8 argument".into()).into())
}

/// XADD key ID field value [field value ...] — ID is `*`, a full `ms-seq`,
/// or `ms-*` (auto sequence for a pinned millisecond).
pub fn handle_xadd(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() < 5 || (parts.len() - 3) % 2 != 0 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'xadd' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();
    let id_str = arg_string(&parts[2])?;

    let mut fields = Vec::with_capacity((parts.len() - 3) / 2);
    for i in (3..parts.len()).step_by(2) {
        let field = arg_bytes(&parts[i])?.to_vec();
        let value = arg_bytes(&parts[i + 1])?.to_vec();
        fields.push((field, value));
    }

    let outcome = if id_str == "*" {
        match storage.xadd_auto(key, fields) {
            Ok(id) => Ok(id),
            Err(e) => return Ok(RespFrame::error(e.to_string())),
        }
    } else if let Some(millis_str) = id_str.strip_suffix("-*") {
        let millis: u64 = match millis_str.parse() {
            Ok(m) => m,
            Err(_) => return Ok(RespFrame::error("ERR Invalid stream ID specified as stream command argument")),
        };
        match storage.xadd_with_id_spec(key, millis, None, fields) {
            Ok(outcome) => outcome,
            Err(e) => return Ok(RespFrame::error(e.to_string())),
        }
    } else {
        let id = match StreamId::from_string(&id_str) {
            Some(id) => id,
            None => return Ok(RespFrame::error("ERR Invalid stream ID specified as stream command argument")),
        };
        match storage.xadd_with_id_spec(key, id.millis(), Some(id.seq()), fields) {
            Ok(outcome) => outcome,
            Err(e) => return Ok(RespFrame::error(e.to_string())),
        }
    };

    match outcome {
        Ok(id) => Ok(RespFrame::from_string(id.to_string())),
        Err(msg) => Ok(RespFrame::error(format!("ERR {}", msg))),
    }
}

fn parse_range_bound(s: &str, is_start: bool) -> Option<StreamId> {
    match s {
        "-" => Some(StreamId::min()),
        "+" => Some(StreamId::max()),
        _ => {
            if s.contains('-') {
                StreamId::from_string(s)
            } else {
                let millis = StreamId::parse_millis(s)?;
                Some(if is_start {
                    StreamId::new(millis, 0)
                } else {
                    StreamId::new(millis, u64::MAX)
                })
            }
        }
    }
}

/// XRANGE key start end [COUNT count]
pub fn handle_xrange(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() != 4 && parts.len() != 6 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'xrange' command"));
    }

    let key = arg_bytes(&parts[1])?.to_vec();
    let start_str = arg_string(&parts[2])?;
    let end_str = arg_string(&parts[3])?;

    let start = match parse_range_bound(&start_str, true) {
        Some(id) => id,
        None => return Ok(RespFrame::error("ERR Invalid stream ID specified as stream command argument")),
    };
    let end = match parse_range_bound(&end_str, false) {
        Some(id) => id,
        None => return Ok(RespFrame::error("ERR Invalid stream ID specified as stream command argument")),
    };

    let count = if parts.len() == 6 {
        let opt = arg_string(&parts[4])?.to_uppercase();
        if opt != "COUNT" {
            return Ok(RespFrame::error("ERR syntax error"));
        }
        match arg_string(&parts[5])?.parse::<usize>() {
            Ok(n) => Some(n),
            Err(_) => return Err(CommandError::NotInteger.into()),
        }
    } else {
        None
    };

    let entries = storage.xrange(&key, start, end, count);
    Ok(RespFrame::array(
        entries
            .into_iter()
            .map(|entry| {
                let mut flat = Vec::with_capacity(entry.fields.len() * 2);
                for (field, value) in entry.fields {
                    flat.push(RespFrame::from_bytes(field));
                    flat.push(RespFrame::from_bytes(value));
                }
                RespFrame::array(vec![RespFrame::from_string(entry.id.to_string()), RespFrame::array(flat)])
            })
            .collect(),
    ))
}

/// XREAD [COUNT count] [BLOCK milliseconds] STREAMS key [key ...] id [id ...]
pub fn handle_xread(storage: &Arc<StorageEngine>, parts: &[RespFrame]) -> Result<RespFrame> {
    let mut i = 1;
    let mut count: Option<usize> = None;
    let mut block_ms: Option<u64> = None;

    while i < parts.len() {
        let opt = arg_string(&parts[i])?.to_uppercase();
        match opt.as_str() {
            "COUNT" => {
                i += 1;
                if i >= parts.len() {
                    return Ok(RespFrame::error("ERR syntax error"));
                }
                count = Some(
                    arg_string(&parts[i])?
                        .parse()
                        .map_err(|_| CommandError::NotInteger)?,
                );
                i += 1;
            }
            "BLOCK" => {
                i += 1;
                if i >= parts.len() {
                    return Ok(RespFrame::error("ERR syntax error"));
                }
                block_ms = Some(
                    arg_string(&parts[i])?
                        .parse()
                        .map_err(|_| CommandError::NotInteger)?,
                );
                i += 1;
            }
            "STREAMS" => {
                i += 1;
                break;
            }
            _ => return Ok(RespFrame::error("ERR syntax error")),
        }
    }

    let remaining = parts.len() - i;
    if remaining == 0 || remaining % 2 != 0 {
        return Ok(RespFrame::error(
            "ERR Unbalanced XREAD list of streams: for each stream key an ID or '$' must be specified.",
        ));
    }

    let num_streams = remaining / 2;
    let mut keys_and_ids = Vec::with_capacity(num_streams);
    for k in 0..num_streams {
        let key = arg_bytes(&parts[i + k])?.to_vec();
        let id_str = arg_string(&parts[i + num_streams + k])?;

        let after = if id_str == "$" {
            let entries = storage.xrange(&key, StreamId::min(), StreamId::max(), None);
            entries.last().map(|e| e.id).unwrap_or_else(StreamId::min)
        } else if !id_str.is_empty() && id_str.chars().all(|c| c.is_ascii_digit()) {
            let millis: u64 = match id_str.parse() {
                Ok(m) => m,
                Err(_) => return Ok(RespFrame::error("ERR Invalid stream ID specified as stream command argument")),
            };
            StreamId::new(millis, 0)
        } else {
            match StreamId::from_string(&id_str) {
                Some(id) => id,
                None => return Ok(RespFrame::error("ERR Invalid stream ID specified as stream command argument")),
            }
        };

        keys_and_ids.push((key, after));
    }

    let block = block_ms.map(Duration::from_millis);
    let results = storage.xread(&keys_and_ids, count, block);

    if results.is_empty() {
        return Ok(RespFrame::null_array());
    }

    Ok(RespFrame::array(
        results
            .into_iter()
            .map(|(key, entries)| {
                let entry_frames = entries
                    .into_iter()
                    .map(|entry| {
                        let mut flat = Vec::with_capacity(entry.fields.len() * 2);
                        for (field, value) in entry.fields {
                            flat.push(RespFrame::from_bytes(field));
                            flat.push(RespFrame::from_bytes(value));
                        }
                        RespFrame::array(vec![
                            RespFrame::from_string(entry.id.to_string()),
                            RespFrame::array(flat),
                        ])
                    })
                    .collect();
                RespFrame::array(vec![RespFrame::from_bytes(key), RespFrame::array(entry_frames)])
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> RespFrame {
        RespFrame::from_string(s)
    }

    #[test]
    fn test_xadd_auto_id() {
        let storage = StorageEngine::new();
        let parts = vec![bulk("XADD"), bulk("s"), bulk("*"), bulk("field"), bulk("value")];
        let result = handle_xadd(&storage, &parts).unwrap();
        assert!(matches!(result, RespFrame::BulkString(Some(_))));
    }

    #[test]
    fn test_xadd_partial_id() {
        let storage = StorageEngine::new();
        let parts = vec![bulk("XADD"), bulk("s"), bulk("5-*"), bulk("f"), bulk("v")];
        let result = handle_xadd(&storage, &parts).unwrap();
        match result {
            RespFrame::BulkString(Some(bytes)) => {
                assert_eq!(bytes.as_ref(), b"5-0");
            }
            _ => panic!("expected bulk string id"),
        }
    }

    #[test]
    fn test_xadd_rejects_smaller_id() {
        let storage = StorageEngine::new();
        handle_xadd(&storage, &[bulk("XADD"), bulk("s"), bulk("5-0"), bulk("f"), bulk("v")]).unwrap();
        let result = handle_xadd(&storage, &[bulk("XADD"), bulk("s"), bulk("4-0"), bulk("f"), bulk("v")]).unwrap();
        assert!(result.is_error());
    }

    #[test]
    fn test_xrange_full() {
        let storage = StorageEngine::new();
        handle_xadd(&storage, &[bulk("XADD"), bulk("s"), bulk("1-1"), bulk("f"), bulk("v1")]).unwrap();
        handle_xadd(&storage, &[bulk("XADD"), bulk("s"), bulk("2-1"), bulk("f"), bulk("v2")]).unwrap();

        let parts = vec![bulk("XRANGE"), bulk("s"), bulk("-"), bulk("+")];
        let result = handle_xrange(&storage, &parts).unwrap();
        assert!(matches!(result, RespFrame::Array(Some(ref v)) if v.len() == 2));
    }

    #[test]
    fn test_xread_nonblocking_empty() {
        let storage = StorageEngine::new();
        let parts = vec![bulk("XREAD"), bulk("STREAMS"), bulk("s"), bulk("0")];
        let result = handle_xread(&storage, &parts).unwrap();
        assert_eq!(result, RespFrame::null_array());
    }

    #[test]
    fn test_xread_returns_new_entries() {
        let storage = StorageEngine::new();
        handle_xadd(&storage, &[bulk("XADD"), bulk("s"), bulk("1-1"), bulk("f"), bulk("v")]).unwrap();

        let parts = vec![bulk("XREAD"), bulk("STREAMS"), bulk("s"), bulk("0")];
        let result = handle_xread(&storage, &parts).unwrap();
        assert!(matches!(result, RespFrame::Array(Some(ref v)) if v.len() == 1));
    }

    #[test]
    fn test_xread_bare_millisecond_id() {
        let storage = StorageEngine::new();
        handle_xadd(&storage, &[bulk("XADD"), bulk("s"), bulk("1526985054069-0"), bulk("f"), bulk("v")]).unwrap();
        handle_xadd(&storage, &[bulk("XADD"), bulk("s"), bulk("1526985054070-0"), bulk("f"), bulk("v")]).unwrap();

        let parts = vec![bulk("XREAD"), bulk("STREAMS"), bulk("s"), bulk("1526985054069")];
        let result = handle_xread(&storage, &parts).unwrap();
        assert!(matches!(result, RespFrame::Array(Some(ref v)) if v.len() == 1));
    }

    #[test]
    fn test_xadd_against_string_key_returns_wrongtype_reply() {
        let storage = StorageEngine::new();
        storage.set(b"s".to_vec(), b"v".to_vec(), false, false, None);
        let result = handle_xadd(&storage, &[bulk("XADD"), bulk("s"), bulk("*"), bulk("f"), bulk("v")]).unwrap();
        assert!(result.is_error());
    }
}
