// Solcino Lottery - Utility Functions
use solana_program::pubkey::Pubkey;

/// Seed prefix of raffle account addresses
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// Index of the winning player for a random word.
///
/// Plain modulo reduction: a uniform 64-bit word over a few thousand players
/// carries a negligible bias, but the choice is not bias-free for huge rounds.
pub fn winner_index(random_word: u64, num_players: u64) -> Option<u64> {
    if num_players == 0 {
        return None;
    }
    Some(random_word % num_players)
}

/// Find the program derived address of the raffle created by `authority`
pub fn find_raffle_address(program_id: &Pubkey, authority: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED, authority.as_ref()], program_id)
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winner_index() {
        assert_eq!(winner_index(42, 1), Some(0));
        assert_eq!(winner_index(7, 4), Some(3));
        assert_eq!(winner_index(u64::MAX, 10), Some(5));
        assert_eq!(winner_index(7, 0), None);
    }

    #[test]
    fn test_raffle_address_is_per_authority() {
        let program_id = Pubkey::new_unique();
        let (a, _) = find_raffle_address(&program_id, &Pubkey::new_unique());
        let (b, _) = find_raffle_address(&program_id, &Pubkey::new_unique());
        assert_ne!(a, b);
    }
}
