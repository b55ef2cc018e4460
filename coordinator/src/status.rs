use std::io::{self, BufRead};

use log::{error, info};
use serde::{Deserialize, Serialize};

/// The outcome of a run, logged as one JSON object per line so the runner can
/// tail the log and find how the run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusRecord {
    Completed {
        #[serde(rename = "fileName")]
        file_name: String,
    },
    Failed {
        error: String,
    },
}

impl StatusRecord {
    pub fn log(&self) {
        let line = match serde_json::to_string(self) {
            Ok(line) => line,
            Err(e) => {
                error!("failed to encode status record: {e}");
                return;
            }
        };

        match self {
            Self::Completed { .. } => info!("{line}"),
            Self::Failed { .. } => error!("{line}"),
        }
    }

    /// Parses a log line, tolerating any prefix the log format adds.
    pub fn parse(line: &str) -> Option<Self> {
        let start = line.find('{')?;
        serde_json::from_str(&line[start..]).ok()
    }
}

/// Scans a log for the last `COMPLETED` record.
///
/// Lines that aren't status records are skipped.
pub fn last_completed<R: BufRead>(reader: R) -> io::Result<Option<StatusRecord>> {
    let mut last = None;
    for line in reader.lines() {
        if let Some(record @ StatusRecord::Completed { .. }) = StatusRecord::parse(&line?) {
            last = Some(record);
        }
    }

    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_keep_the_runner_shape() {
        let completed = StatusRecord::Completed {
            file_name: "out/ckpt.safetensors".into(),
        };
        assert_eq!(
            serde_json::to_string(&completed).unwrap(),
            r#"{"status":"COMPLETED","fileName":"out/ckpt.safetensors"}"#
        );

        let failed = StatusRecord::Failed {
            error: "boom".into(),
        };
        assert_eq!(
            serde_json::to_string(&failed).unwrap(),
            r#"{"status":"FAILED","error":"boom"}"#
        );
    }

    #[test]
    fn scan_finds_the_last_completion() {
        let log = concat!(
            "{\"hash\":\"aa\",\"epoch\":1}\n",
            "{\"status\":\"COMPLETED\",\"fileName\":\"first\"}\n",
            "not json at all\n",
            "[2026-01-01T00:00:00Z INFO  coordinator] {\"status\":\"COMPLETED\",\"fileName\":\"second\"}\n",
            "{\"status\":\"FAILED\",\"error\":\"later\"}\n",
        );

        let record = last_completed(log.as_bytes()).unwrap();
        assert_eq!(
            record,
            Some(StatusRecord::Completed {
                file_name: "second".into()
            })
        );
    }

    #[test]
    fn scan_without_completion_is_none() {
        let log = "{\"status\":\"FAILED\",\"error\":\"boom\"}\n";
        assert_eq!(last_completed(log.as_bytes()).unwrap(), None);
    }
}
