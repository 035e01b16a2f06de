//! Result materialization into [`EntityCollection`] rows.

use bson::Document;

use entitystore_common::StoreError;

use crate::core::Value;
use crate::list::EntityCollection;
use crate::mapper::document_to_row;

/// Append one row per document, then point the cursor at the last row.
///
/// Every document is converted before anything is appended, so a conversion
/// failure leaves `list` unchanged. Returns the number of rows appended.
pub fn materialize(list: &mut EntityCollection, documents: &[Document]) -> Result<usize, StoreError> {
    let rows = documents
        .iter()
        .map(|document| document_to_row(list.model(), document))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(append_rows(list, rows))
}

/// Append already-ordered rows and move the cursor to the last one
pub fn append_rows(list: &mut EntityCollection, rows: Vec<Vec<Value>>) -> usize {
    let count = rows.len();
    for row in rows {
        list.push_row(row);
    }
    list.move_last();
    count
}
