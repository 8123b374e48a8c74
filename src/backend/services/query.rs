// src/backend/services/query.rs
use crate::metrics::{record, Counter};
use crate::remote::{Document, DocumentStore, Query, StoreError};
use crate::runtime::Runtime;
use crate::session::Session;

/// Runs an ordered query. When the store cannot serve the ordering because
/// its composite index is missing or still building, the same filters run
/// unordered and the result is sorted and truncated here with the comparator
/// the store itself uses, so both paths return the same sequence.
pub async fn fetch_ordered<S, R>(
    session: &Session<S, R>,
    operation: &str,
    query: &Query,
) -> Result<Vec<Document>, StoreError>
where
    S: DocumentStore,
    R: Runtime,
{
    let store = session.store();
    match session.call(operation, move || store.query(query)).await {
        Err(e) if e.is_index_unavailable() => {
            log_warn!(
                "{}: ordered query unavailable ({}), sorting in memory",
                operation,
                e.message
            );
            record(Counter::FallbackQuery);
            let unordered = query.without_ordering();
            let unordered = &unordered;
            let docs = session
                .call(operation, move || store.query(unordered))
                .await?;
            Ok(query.apply(docs))
        }
        result => result,
    }
}
