use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the WebSocket change feed.
///
/// Consumers treat every event as "reload your working set": payloads
/// identify the affected rows but carry no field-level diffs, so duplicate
/// or out-of-order delivery is harmless.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LedgerEvent {
    /// Server confirms successful authentication
    Ready { employee_id: Uuid, character_name: String },

    SaleCreated { sale_id: Uuid, employee_id: Uuid },

    /// Totals, verification state or the fake flag changed
    SaleUpdated { sale_id: Uuid, employee_id: Uuid },

    SaleDeleted { sale_id: Uuid, employee_id: Uuid },

    /// An employee was blocked, unblocked or removed
    EmployeeUpdated { employee_id: Uuid },

    /// The active announcement changed (created, edited, deleted or expired)
    AnnouncementChanged,
}

impl LedgerEvent {
    /// Returns the employee_id if this event is scoped to one employee's
    /// sales. Events that return `None` are global and are delivered to
    /// every subscriber.
    pub fn employee_scope(&self) -> Option<Uuid> {
        match self {
            Self::SaleCreated { employee_id, .. } => Some(*employee_id),
            Self::SaleUpdated { employee_id, .. } => Some(*employee_id),
            Self::SaleDeleted { employee_id, .. } => Some(*employee_id),
            // Ready, EmployeeUpdated and AnnouncementChanged are global
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Choose which sales events to receive. `employee_id: None` means
    /// all employees, only honored for owner sessions.
    Subscribe { employee_id: Option<Uuid> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sale_events_are_employee_scoped() {
        let eid = Uuid::new_v4();
        let ev = LedgerEvent::SaleUpdated { sale_id: Uuid::new_v4(), employee_id: eid };
        assert_eq!(ev.employee_scope(), Some(eid));
        assert_eq!(LedgerEvent::AnnouncementChanged.employee_scope(), None);
    }
}
