//! The historical range query over the platform's transactions.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{Error, transaction::TransactionRecord};

/// Reads the transactions a viewer may see within a time range.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Get the viewer's transactions notified between `start` and `end`
    /// (inclusive), most recent first.
    ///
    /// # Errors
    /// Returns an error if the query could not be completed.
    async fn get_transactions_by_date(
        &self,
        viewer_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TransactionRecord>, Error>;
}
