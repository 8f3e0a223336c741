//! Fault reporting.
//!
//! Unexpected internal faults are logged on a dedicated target so an external
//! collector (OTel exporter, log shipper) can pick them up without the kernel
//! knowing about it. The kernel never tries to repair state here: the open
//! transaction is dropped and rolls back on its own.

/// Tracing target for internal faults.
pub const FAULT_TARGET: &str = "pagewright::fault";

/// Report an unexpected fault raised while performing `op`.
pub fn report(op: &str, err: &dyn std::error::Error) {
    tracing::error!(target: FAULT_TARGET, op, error = %err, "internal fault");
}
