pub mod coordinator;
pub mod error;
pub mod notifier;
pub mod pricing;

pub use coordinator::{DraftLine, DraftSale, NotificationStatus, SaleCoordinator, SaleOutcome};
pub use error::LedgerError;
pub use notifier::{BillLine, BillMessage, BillNotifier, NotifyError, VerificationImages};
