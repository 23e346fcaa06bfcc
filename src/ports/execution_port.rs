//! Order execution port trait.

use crate::domain::order::OrderRequest;
use crate::domain::trade::TradeRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionReport {
    Accepted(TradeRecord),
    Rejected { reason: String },
}

/// Called exactly once per accepted order request. Retrying is left to the
/// caller.
pub trait ExecutionGateway {
    fn submit(&self, order: &OrderRequest) -> ExecutionReport;
}
