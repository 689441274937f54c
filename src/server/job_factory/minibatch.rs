//! Stringwise minibatch ranging (§4.6, §9 open question).
//!
//! The source system predicted a minibatch's next key with a stringwise "natural successor"
//! rather than numeric addition, so that both `"1".."9"` and `"a".."z"` range correctly. This
//! module preserves that behavior: [`magic_increment`] implements the same increment-with-carry
//! rule (digit wraps `9`→`0` carrying left and growing the string on overflow; lowercase wraps
//! `z`→`a`; uppercase wraps `Z`→`A`; anything else falls back to plain numeric-string
//! increment, or leaves the value unchanged if it isn't numeric either, which simply ends the
//! batch at the next row).

use serde_json::Value;

use crate::server::error::worker::WorkerError;
use crate::server::error::Error;

/// Computes the "natural successor" of `s` the same way the source system's minibatch ranging
/// did: increment the rightmost character, carrying into the next one on overflow, growing the
/// string by one character if the carry runs off the front.
pub fn magic_increment(s: &str) -> String {
    if s.is_empty() {
        return "1".to_string();
    }

    let mut chars: Vec<char> = s.chars().collect();
    let mut i = chars.len();

    loop {
        if i == 0 {
            let prepend = match chars[0] {
                c if c.is_ascii_digit() => '1',
                c if c.is_ascii_uppercase() => 'A',
                _ => 'a',
            };
            chars.insert(0, prepend);
            return chars.into_iter().collect();
        }

        i -= 1;
        match chars[i] {
            '9' => chars[i] = '0',
            c @ '0'..='8' => {
                chars[i] = ((c as u8) + 1) as char;
                return chars.into_iter().collect();
            }
            'z' => chars[i] = 'a',
            c if c.is_ascii_lowercase() => {
                chars[i] = ((c as u8) + 1) as char;
                return chars.into_iter().collect();
            }
            'Z' => chars[i] = 'A',
            c if c.is_ascii_uppercase() => {
                chars[i] = ((c as u8) + 1) as char;
                return chars.into_iter().collect();
            }
            _ => return numeric_fallback(s),
        }
    }
}

/// For a key value outside the alnum alphabet the source's stringwise increment covers, falls
/// back to treating it as a base-10 number; if it isn't one either, returns it unchanged so the
/// very next comparison fails and the minibatch ends at one row.
fn numeric_fallback(s: &str) -> String {
    match s.parse::<i64>() {
        Ok(n) => (n + 1).to_string(),
        Err(_) => s.to_string(),
    }
}

fn scalar_to_key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Groups `rows` into contiguous runs of up to `step` rows whose `key_column` values form an
/// unbroken stringwise-increment chain, and renders each run into one job's output parameters
/// with `key_column` replaced by a `[start, end]` range pair.
pub(crate) fn minibatch(
    columns: &Option<Vec<String>>,
    rows: Vec<Vec<Value>>,
    step: usize,
    key_column: &str,
) -> Result<Vec<Value>, Error> {
    let key_index = columns
        .as_ref()
        .and_then(|cols| cols.iter().position(|c| c == key_column))
        .ok_or_else(|| {
            WorkerError::ParamDecode(format!("key_column `{key_column}` not found among input columns"))
        })?;

    let mut batches = Vec::new();
    let mut i = 0;

    while i < rows.len() {
        let start = i;
        let mut expected = magic_increment(&scalar_to_key_string(&rows[i][key_index]));
        let mut count = 1;

        while count < step && i + 1 < rows.len() {
            let actual = scalar_to_key_string(&rows[i + 1][key_index]);
            if actual != expected {
                break;
            }
            expected = magic_increment(&actual);
            i += 1;
            count += 1;
        }

        let end = i;
        let mut params = super::row_to_params(columns, &rows[start]);
        if let Some(obj) = params.as_object_mut() {
            let start_val = rows[start][key_index].clone();
            let end_val = rows[end][key_index].clone();
            obj.insert(key_column.to_string(), Value::Array(vec![start_val, end_val]));
        }

        batches.push(params);
        i += 1;
    }

    Ok(batches)
}
