// ─── Credential Files ───
// Parses Valve key-value credential documents into depot records.

use keyvalues_parser::{Obj, Value, Vdf};
use tracing::debug;

use super::DepotInfo;

const DEPOTS_KEY: &str = "depots";
const DECRYPTION_KEY: &str = "DecryptionKey";

/// Parse a credential document into depot records.
///
/// The document must expose a `depots` object, either as the root pair or
/// as a direct child of it; each child entry with a `DecryptionKey` string
/// becomes one record. Malformed input yields zero records, never an
/// error, so one bad file cannot poison a whole assembly.
pub fn parse_key_file(content: &[u8]) -> Vec<DepotInfo> {
    let text = match std::str::from_utf8(content) {
        Ok(text) => text,
        Err(e) => {
            debug!("credential file is not UTF-8: {e}");
            return Vec::new();
        }
    };

    let document = match Vdf::parse(text) {
        Ok(document) => document,
        Err(e) => {
            debug!("credential file failed to parse: {e}");
            return Vec::new();
        }
    };

    let Some(depots) = find_depots(&document) else {
        debug!("credential file has no depots object");
        return Vec::new();
    };

    let mut records = Vec::new();
    for (depot_id, values) in depots.iter() {
        let Some(key) = decryption_key(values) else {
            continue;
        };
        records.push(DepotInfo {
            depot_id: depot_id.to_string(),
            decryption_key: key.to_string(),
            manifest_ids: Vec::new(),
        });
    }
    records
}

fn find_depots<'a>(document: &'a Vdf<'a>) -> Option<&'a Obj<'a>> {
    let root = match &document.value {
        Value::Obj(obj) => obj,
        Value::Str(_) => return None,
    };

    if document.key.eq_ignore_ascii_case(DEPOTS_KEY) {
        return Some(root);
    }

    // Some documents wrap depots one level deeper.
    root.get(DEPOTS_KEY)?.iter().find_map(|value| match value {
        Value::Obj(obj) => Some(obj),
        Value::Str(_) => None,
    })
}

fn decryption_key<'a>(values: &'a [Value<'a>]) -> Option<&'a str> {
    let entry = values.iter().find_map(|value| match value {
        Value::Obj(obj) => Some(obj),
        Value::Str(_) => None,
    })?;

    entry.get(DECRYPTION_KEY)?.iter().find_map(|value| match value {
        Value::Str(key) => Some(key.as_ref()),
        Value::Obj(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_root_depots_document() {
        let text = r#"
"depots"
{
	"228990"
	{
		"DecryptionKey"		"deadbeefcafe"
	}
	"228991"
	{
		"DecryptionKey"		"0123456789ab"
	}
}
"#;
        let records = parse_key_file(text.as_bytes());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].depot_id, "228990");
        assert_eq!(records[0].decryption_key, "deadbeefcafe");
        assert!(records[0].manifest_ids.is_empty());
    }

    #[test]
    fn parses_wrapped_depots_document() {
        let text = r#"
"AppState"
{
	"depots"
	{
		"10"
		{
			"DecryptionKey"		"aa"
		}
	}
}
"#;
        let records = parse_key_file(text.as_bytes());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].depot_id, "10");
    }

    #[test]
    fn malformed_document_yields_no_records() {
        assert!(parse_key_file(b"{{{ not a key-value document").is_empty());
        assert!(parse_key_file(&[0xff, 0xfe, 0x00]).is_empty());
    }

    #[test]
    fn entries_without_a_key_are_skipped() {
        let text = r#"
"depots"
{
	"10"
	{
		"SomethingElse"		"aa"
	}
	"20"
	{
		"DecryptionKey"		"bb"
	}
}
"#;
        let records = parse_key_file(text.as_bytes());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].depot_id, "20");
    }
}
