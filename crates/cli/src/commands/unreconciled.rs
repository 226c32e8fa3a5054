//! Reconciliation queue commands.
//!
//! Lists payments the gateway confirmed but no order was written for. Each
//! one needs a manual refund or a hand-entered order.
//!
//! # Usage
//!
//! ```bash
//! lark unreconciled list
//! ```

use larkspur_storefront::db::PgReconciliationLog;
use larkspur_storefront::store::ReconciliationLog;

use super::{CommandError, connect};

/// Print the reconciliation queue, newest first.
pub async fn list() -> Result<(), CommandError> {
    let log = PgReconciliationLog::new(connect().await?);
    let entries = log.list().await?;

    #[allow(clippy::print_stdout)]
    {
        if entries.is_empty() {
            println!("No unreconciled payments.");
        }
        for entry in entries {
            println!(
                "{}  {}  {} {}  {}  {}",
                entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                entry.authorization_id,
                entry.amount_minor,
                entry.currency,
                entry.customer_email,
                entry.reason
            );
        }
    }
    Ok(())
}
