//! CONFIG command implementation
//!
//! Only GET is implemented, and only against the handful of parameters the
//! running config actually tracks (`dir`, `dbfilename`, `port`, `bind`).

use crate::config::Config;
use crate::error::Result;
use crate::protocol::RespFrame;

/// CONFIG GET|SET|RESETSTAT|REWRITE
pub fn handle_config(config: &Config, parts: &[RespFrame]) -> Result<RespFrame> {
    if parts.len() < 2 {
        return Ok(RespFrame::error("ERR wrong number of arguments for 'config' command"));
    }

    let subcommand = match &parts[1] {
        RespFrame::BulkString(Some(bytes)) => String::from_utf8_lossy(bytes).to_uppercase(),
        _ => return Ok(RespFrame::error("ERR invalid subcommand format")),
    };

    match subcommand.as_str() {
        "GET" => {
            if parts.len() != 3 {
                return Ok(RespFrame::error("ERR wrong number of arguments for 'config|get' command"));
            }

            let param = match &parts[2] {
                RespFrame::BulkString(Some(bytes)) => String::from_utf8_lossy(bytes).to_lowercase(),
                _ => return Ok(RespFrame::error("ERR invalid parameter format")),
            };

            handle_config_get(config, &param)
        }
        "SET" => Ok(RespFrame::error("ERR CONFIG SET not supported")),
        "RESETSTAT" => Ok(RespFrame::error("ERR CONFIG RESETSTAT not supported")),
        "REWRITE" => Ok(RespFrame::error("ERR CONFIG REWRITE not supported")),
        _ => Ok(RespFrame::error("ERR CONFIG command not supported")),
    }
}

fn handle_config_get(config: &Config, param: &str) -> Result<RespFrame> {
    if param == "*" {
        return Ok(RespFrame::array(vec![
            RespFrame::from_string("dir"),
            RespFrame::from_string(config.dir.clone()),
            RespFrame::from_string("dbfilename"),
            RespFrame::from_string(config.dbfilename.clone()),
            RespFrame::from_string("port"),
            RespFrame::from_string(config.port.to_string()),
            RespFrame::from_string("bind"),
            RespFrame::from_string(config.bind.clone()),
        ]));
    }

    match config.get(param) {
        Some(value) => Ok(RespFrame::array(vec![
            RespFrame::from_string(param.to_string()),
            RespFrame::from_string(value),
        ])),
        None => Ok(RespFrame::array(vec![])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> RespFrame {
        RespFrame::from_string(s)
    }

    #[test]
    fn test_config_get_dir() {
        let config = Config::default();
        let parts = vec![bulk("CONFIG"), bulk("GET"), bulk("dir")];
        let result = handle_config(&config, &parts).unwrap();
        match result {
            RespFrame::Array(Some(v)) => {
                assert_eq!(v[0], RespFrame::from_string("dir"));
                assert_eq!(v[1], RespFrame::from_string(config.dir.clone()));
            }
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn test_config_get_unknown_param() {
        let config = Config::default();
        let parts = vec![bulk("CONFIG"), bulk("GET"), bulk("nosuchparam")];
        let result = handle_config(&config, &parts).unwrap();
        assert_eq!(result, RespFrame::Array(Some(vec![])));
    }

    #[test]
    fn test_config_set_unsupported() {
        let config = Config::default();
        let parts = vec![bulk("CONFIG"), bulk("SET"), bulk("dir"), bulk("/tmp")];
        let result = handle_config(&config, &parts).unwrap();
        assert!(result.is_error());
    }
}
