//! Value-label tables.
//!
//! Every release from 113 on stores a label set as
//! `n, txtlen, off[n], val[n], txt[txtlen]`, all integers 4 bytes wide.

use crate::error::Error;
use crate::types::{ByteOrder, CodeKey, Result, ValueLabelMap};

use super::cursor::Cursor;
use super::layout::TextEncoding;

/// Parse one value-label table, keeping entries in file order
pub(crate) fn parse_label_table(
    table: &[u8],
    order: ByteOrder,
    encoding: TextEncoding,
) -> Result<ValueLabelMap> {
    let mut cursor = Cursor::new(table, order);
    let n = cursor.len32()?;
    let text_len = cursor.len32()?;

    let offsets = (0..n)
        .map(|_| cursor.len32())
        .collect::<Result<Vec<_>>>()?;
    let values = (0..n)
        .map(|_| cursor.i32())
        .collect::<Result<Vec<_>>>()?;
    let text = cursor.take(text_len)?;

    let mut labels = ValueLabelMap::with_capacity(n);
    for (offset, value) in offsets.into_iter().zip(values) {
        let bytes = text.get(offset..).ok_or_else(|| {
            Error::invalid_format(format!(
                "value label offset {} outside text of {} bytes",
                offset, text_len
            ))
        })?;
        labels.insert(CodeKey::Int(i64::from(value)), encoding.decode(bytes));
    }
    Ok(labels)
}
