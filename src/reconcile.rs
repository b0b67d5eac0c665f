use crate::records::AssetRecord;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub fields_written: u32,
}

/// Merges `batch` into `collection` in input order, keyed on the natural key.
///
/// Unmatched incoming records are appended with their internal id left unset
/// for the persistence layer to assign. Matched records are merged
/// field-by-field; equal fields are not written and the stored internal id is
/// never altered. Records absent from the batch are left untouched — there is
/// no delete path.
pub fn reconcile<R: AssetRecord>(collection: &mut Vec<R>, batch: Vec<R>) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();
    for incoming in batch {
        let found = collection
            .iter()
            .position(|existing| existing.natural_key() == incoming.natural_key());
        match found {
            Some(index) => {
                let written = collection[index].merge_from(&incoming);
                summary.fields_written += written;
                if written > 0 {
                    summary.updated += 1;
                } else {
                    summary.unchanged += 1;
                }
            }
            None => {
                collection.push(incoming);
                summary.inserted += 1;
            }
        }
    }
    summary
}
