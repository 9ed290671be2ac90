//! Backend configuration.

/// In-memory backend configuration.
#[derive(Debug, Clone)]
pub struct MemoryDbConfig {
    /// Accept statements with more than one FROM/JOIN participant
    pub can_join: bool,
    /// Accept `field AS alias` projections
    pub can_field_alias: bool,
    /// First value handed out by auto-increment fields
    pub first_auto_increment: i64,
}

impl MemoryDbConfig {
    /// Configuration with joins and field aliases enabled.
    pub fn relational() -> Self {
        Self {
            can_join: true,
            can_field_alias: true,
            ..Default::default()
        }
    }
}

impl Default for MemoryDbConfig {
    fn default() -> Self {
        Self {
            can_join: false,
            can_field_alias: false,
            first_auto_increment: 1,
        }
    }
}
