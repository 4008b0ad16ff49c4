use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether the caller authenticated as a plain employee or as an owner
/// (acting through their shadow employee record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Owner,
}

/// What a session is allowed to do. Resolved once from the role when the
/// session is created; handlers check these flags instead of re-deriving
/// owner-ness from identity comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_block_employees: bool,
    pub can_see_all_sales: bool,
    pub can_mark_fake: bool,
    pub can_manage_announcements: bool,
    /// Sales created by this session are trusted without proof images.
    pub auto_verify_sales: bool,
}

impl Capabilities {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Employee => Self {
                can_block_employees: false,
                can_see_all_sales: false,
                can_mark_fake: false,
                can_manage_announcements: false,
                auto_verify_sales: false,
            },
            Role::Owner => Self {
                can_block_employees: true,
                can_see_all_sales: true,
                can_mark_fake: true,
                can_manage_announcements: true,
                auto_verify_sales: true,
            },
        }
    }
}

/// The authenticated caller, passed explicitly into every coordinator
/// operation. `employee_id` is always the employees-table id; for owners
/// that is the shadow record created on first login.
#[derive(Debug, Clone)]
pub struct Session {
    pub employee_id: Uuid,
    pub character_name: String,
    pub discord_id: String,
    pub role: Role,
    pub capabilities: Capabilities,
}

impl Session {
    pub fn new(employee_id: Uuid, character_name: String, discord_id: String, role: Role) -> Self {
        Self {
            employee_id,
            character_name,
            discord_id,
            role,
            capabilities: Capabilities::for_role(role),
        }
    }

}
