use crate::error::{DataResult, StorageError};
use crate::store::StorageSession;

/// Next value of the sequence bound to `table.column`.
///
/// The id is fetched before the insert so that new and existing orders go
/// through the same explicit-id upsert.
pub async fn next_serial_value<S: StorageSession>(
    session: &mut S,
    table: &str,
    column: &str,
) -> DataResult<i32> {
    let unavailable = || StorageError::SerialUnavailable {
        table: table.to_string(),
        column: column.to_string(),
    };

    let value = session
        .next_serial_value(table, column)
        .await?
        .ok_or_else(unavailable)?;

    // Ids are `integer` columns
    let id = i32::try_from(value).map_err(|_| unavailable())?;

    tracing::debug!(table = table, column = column, value = id, "Allocated serial value");
    Ok(id)
}
