//! Desk configuration
//!
//! Everything the engines need to know that is not entity state: who the
//! administrator is, which identities belong to support, the intake
//! enumerations rendered as buttons, and the repair-ticket defaults.

use serde::{Deserialize, Serialize};

use crate::entities::UserId;
use crate::errors::{DeskError, DeskResult};

/// Static configuration for the desk core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Single identity allowed to run administrative commands
    pub admin_id: UserId,
    /// Support allow-list: may initiate questions, receives intake
    /// notifications and answer fan-out
    pub support_admins: Vec<UserId>,
    /// Items per page in equipment and request listings
    pub page_size: usize,
    /// Drafts older than this are eligible for eviction; zero disables
    pub draft_ttl_secs: u64,
    /// Request categories, rendered as buttons in declaration order
    pub categories: Vec<String>,
    /// Priority labels
    pub priorities: Vec<String>,
    /// Subcategory labels
    pub subcategories: Vec<String>,
    /// Category assigned to repair tickets filed from the equipment workflow
    pub repair_category: String,
    /// Priority assigned to repair tickets
    pub repair_priority: String,
    /// When set, filing a repair ticket also moves the equipment to
    /// `NeedRepair` in the same commit. Off by default: the desk has always
    /// treated repair reporting as a ticket, not a status mutation.
    pub repair_marks_equipment: bool,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            admin_id: UserId(0),
            support_admins: Vec::new(),
            page_size: 10,
            draft_ttl_secs: 0,
            categories: vec![
                "Maintenance".to_string(),
                "CCTV".to_string(),
                "Fire alarm".to_string(),
                "Access cards".to_string(),
                "Security alarm".to_string(),
            ],
            priorities: vec![
                "low".to_string(),
                "medium".to_string(),
                "blocking".to_string(),
            ],
            subcategories: vec![
                "Electrical".to_string(),
                "Air conditioning".to_string(),
                "Hardware".to_string(),
                "Other".to_string(),
            ],
            repair_category: "Equipment repair".to_string(),
            repair_priority: "medium".to_string(),
            repair_marks_equipment: false,
        }
    }
}

impl DeskConfig {
    /// Parse a configuration from a JSON document; absent fields keep their
    /// defaults.
    pub fn from_json(json: &str) -> DeskResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DeskError::InvalidInput(format!("bad config: {e}")))
    }

    /// Check if an identity is on the support allow-list
    pub fn is_support(&self, user: UserId) -> bool {
        self.support_admins.contains(&user)
    }
}
