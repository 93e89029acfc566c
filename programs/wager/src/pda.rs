//! Deterministic account addresses. Anyone can locate a game, any of its
//! rounds, or its escrow from the admin key alone.

use anchor_lang::prelude::*;

use crate::{GAME_SEED, ROUND_SEED, VAULT_SEED};

pub fn game_address(admin: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[GAME_SEED, admin.as_ref()], &crate::ID)
}

pub fn round_address(game: &Pubkey, round_number: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[ROUND_SEED, game.as_ref(), &round_number.to_le_bytes()],
        &crate::ID,
    )
}

pub fn vault_address(game: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED, game.as_ref()], &crate::ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_are_stable() {
        let admin = Pubkey::new_from_array([1u8; 32]);
        let (game, _) = game_address(&admin);

        assert_eq!(game_address(&admin), game_address(&admin));
        assert_eq!(round_address(&game, 7), round_address(&game, 7));
        assert_eq!(vault_address(&game), vault_address(&game));
    }

    #[test]
    fn test_each_admin_gets_its_own_game() {
        let (a, _) = game_address(&Pubkey::new_from_array([1u8; 32]));
        let (b, _) = game_address(&Pubkey::new_from_array([2u8; 32]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_round_addresses_are_distinct() {
        let (game, _) = game_address(&Pubkey::new_from_array([3u8; 32]));
        let (vault, _) = vault_address(&game);

        let rounds: Vec<Pubkey> = (1..=20).map(|n| round_address(&game, n).0).collect();
        for (i, round) in rounds.iter().enumerate() {
            assert_ne!(*round, game);
            assert_ne!(*round, vault);
            assert!(!rounds[i + 1..].contains(round));
        }
    }

    #[test]
    fn test_round_number_is_little_endian_seed() {
        let (game, _) = game_address(&Pubkey::new_from_array([4u8; 32]));
        let expected = Pubkey::find_program_address(
            &[b"round", game.as_ref(), &[2, 0, 0, 0, 0, 0, 0, 0]],
            &crate::ID,
        );
        assert_eq!(round_address(&game, 2), expected);
    }
}
