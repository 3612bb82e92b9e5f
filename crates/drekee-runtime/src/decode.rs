//! Decoders for the sub-protocols models embed in plain-text replies.
//!
//! Wire formats:
//!
//! ```text
//! <think>free-form deliberation</think>final answer
//!
//! ---FILES-JSON---
//! {"files":[{"name":"a.txt","content":"hi"}]}
//! ---END-FILES-JSON---
//! ```

use drekee_protocol::ChatFile;
use serde::Deserialize;

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";
pub const FILES_OPEN: &str = "---FILES-JSON---";
pub const FILES_CLOSE: &str = "---END-FILES-JSON---";

/// A reply split into its deliberation and its displayed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkSplit {
    /// Trimmed contents of the first think region, empty when absent.
    pub reasoning: String,
    pub response: String,
}

/// Split off the first `<think>...</think>` region.
///
/// Without a complete region the text is returned unchanged as the response.
/// Later regions are left in the response untouched.
pub fn split_think(text: &str) -> ThinkSplit {
    let Some(open) = text.find(THINK_OPEN) else {
        return ThinkSplit {
            reasoning: String::new(),
            response: text.to_owned(),
        };
    };
    let inner_start = open + THINK_OPEN.len();
    let Some(close) = text[inner_start..].find(THINK_CLOSE).map(|at| inner_start + at) else {
        return ThinkSplit {
            reasoning: String::new(),
            response: text.to_owned(),
        };
    };

    let remainder = format!("{}{}", &text[..open], &text[close + THINK_CLOSE.len()..]);
    ThinkSplit {
        reasoning: text[inner_start..close].trim().to_owned(),
        response: remainder.trim().to_owned(),
    }
}

/// Outcome of scanning a reply for an embedded file block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilesBlock {
    /// No block markers in the text.
    Absent,
    /// A well-formed, non-empty block. `remainder` is the text with the
    /// block removed, trimmed.
    Extracted {
        files: Vec<ChatFile>,
        remainder: String,
    },
    /// Markers found but the payload is unusable. The text stays as it was.
    Invalid { reason: String },
}

impl FilesBlock {
    /// Files carried by the block, empty unless extracted.
    pub fn files(&self) -> &[ChatFile] {
        match self {
            Self::Extracted { files, .. } => files.as_slice(),
            Self::Absent | Self::Invalid { .. } => &[],
        }
    }

    /// Text to display for the original `text`.
    pub fn display_text(self, text: &str) -> String {
        match self {
            Self::Extracted { remainder, .. } => remainder,
            Self::Absent | Self::Invalid { .. } => text.to_owned(),
        }
    }
}

#[derive(Deserialize)]
struct FilesPayload {
    files: Vec<ChatFile>,
}

/// Find the first file block. Markers match case-insensitively.
pub fn decode_files(text: &str) -> FilesBlock {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lowered = text.to_ascii_lowercase();
    let Some(open) = lowered.find(&FILES_OPEN.to_ascii_lowercase()) else {
        return FilesBlock::Absent;
    };
    let payload_start = open + FILES_OPEN.len();
    let Some(close) = lowered[payload_start..]
        .find(&FILES_CLOSE.to_ascii_lowercase())
        .map(|at| payload_start + at)
    else {
        return FilesBlock::Absent;
    };

    let payload = text[payload_start..close].trim();
    let files = match serde_json::from_str::<FilesPayload>(payload) {
        Ok(parsed) => parsed.files,
        Err(error) => {
            return FilesBlock::Invalid {
                reason: error.to_string(),
            };
        }
    };
    if files.is_empty() {
        return FilesBlock::Invalid {
            reason: "file block lists no files".to_owned(),
        };
    }

    let remainder = format!("{}{}", &text[..open], &text[close + FILES_CLOSE.len()..]);
    FilesBlock::Extracted {
        files,
        remainder: remainder.trim().to_owned(),
    }
}
