//! `grastate.dat` parser.
//!
//! Galera persists its replication position in a small `key: value` file:
//!
//! ```text
//! # GALERA saved state
//! version: 2.1
//! uuid:    5ee99582-bb8d-11e2-b8e3-23de375c1d30
//! seqno:   1234
//! safe_to_bootstrap: 0
//! ```
//!
//! A running node, or one that crashed, records `seqno: -1`. That value
//! is surfaced as `None` so it can never be compared against a real position.

use thiserror::Error;

use crate::types::SeqNo;

/// Errors raised while parsing a grastate record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrastateError {
    #[error("grastate record has no seqno field")]
    MissingSeqno,

    #[error("invalid seqno value: {0:?}")]
    InvalidSeqno(String),
}

/// Parsed contents of a node's `grastate.dat`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrastateRecord {
    pub version: Option<String>,
    pub uuid: Option<String>,
    /// Last committed position, `None` when recorded as `-1`.
    pub seqno: Option<SeqNo>,
    /// `safe_to_bootstrap` flag, absent on pre-3.19 Galera.
    pub safe_to_bootstrap: Option<bool>,
}

impl GrastateRecord {
    /// Parse the textual record.
    ///
    /// Unknown keys and comment lines are ignored. A missing or
    /// non-numeric `seqno` is an error.
    pub fn parse(contents: &str) -> Result<Self, GrastateError> {
        let mut record = GrastateRecord::default();
        let mut saw_seqno = false;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "version" => record.version = Some(value.to_string()),
                "uuid" => record.uuid = Some(value.to_string()),
                "seqno" => {
                    let seqno: SeqNo = value
                        .parse()
                        .map_err(|_| GrastateError::InvalidSeqno(value.to_string()))?;
                    record.seqno = (seqno >= 0).then_some(seqno);
                    saw_seqno = true;
                }
                "safe_to_bootstrap" => {
                    record.safe_to_bootstrap = match value {
                        "1" => Some(true),
                        "0" => Some(false),
                        _ => None,
                    };
                }
                _ => {}
            }
        }

        if !saw_seqno {
            return Err(GrastateError::MissingSeqno);
        }
        Ok(record)
    }
}
