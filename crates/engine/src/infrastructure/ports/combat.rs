//! Ports describing the characters taking part in an encounter.

use openpf2_domain::CharacterId;

// =============================================================================
// Combatant Roster
// =============================================================================

/// Facts about combatants that the initiative queue and encounter need but do not own.
#[cfg_attr(test, mockall::automock)]
pub trait CombatantRoster: Send + Sync {
    /// Stable creation-order key; lower values were created earlier.
    fn creation_order(&self, id: CharacterId) -> Option<u64>;

    fn is_player_controlled(&self, id: CharacterId) -> bool;

    fn is_alive(&self, id: CharacterId) -> bool;

    /// Human-readable label for logs.
    fn id_for_logs(&self, id: CharacterId) -> String {
        id.to_string()
    }
}
