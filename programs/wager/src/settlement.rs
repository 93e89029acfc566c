//! Winner selection and pot split for `close_round`.
//!
//! Everything here is a pure function of already-loaded state plus an
//! externally supplied seed, so a client can replay the exact computation
//! the program performs.

use anchor_lang::prelude::*;
use bytemuck::{Pod, Zeroable};
use sha2::{Digest, Sha256};

use crate::state::{Game, Round};
use crate::{WagerError, BPS_DENOMINATOR, SEED_DOMAIN};

/// One entry of the `SlotHashes` sysvar as laid out in account data.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SlotHashEntry {
    pub slot: u64,
    pub hash: [u8; 32],
}

const ENTRY_COUNT_LEN: usize = 8;
const ENTRY_LEN: usize = core::mem::size_of::<SlotHashEntry>();

/// Returns the newest `(slot, hash)` pair from raw `SlotHashes` data.
///
/// Layout: u64 entry count followed by entries sorted newest first.
pub fn latest_slot_hash(data: &[u8]) -> Result<SlotHashEntry> {
    require!(
        data.len() >= ENTRY_COUNT_LEN + ENTRY_LEN,
        WagerError::InvalidRandomnessSource
    );
    let count: u64 = bytemuck::pod_read_unaligned(&data[..ENTRY_COUNT_LEN]);
    require!(count > 0, WagerError::InvalidRandomnessSource);

    Ok(bytemuck::pod_read_unaligned(
        &data[ENTRY_COUNT_LEN..ENTRY_COUNT_LEN + ENTRY_LEN],
    ))
}

/// Inputs that are only known once the close transaction executes.
pub struct SeedSource {
    pub latest_slot_hash: [u8; 32],
    pub slot: u64,
    pub unix_timestamp: i64,
    pub round: Pubkey,
    pub total_pot: u64,
}

/// sha256(domain || slot hash || slot || timestamp || round || pot), first
/// 8 bytes little endian.
pub fn derive_seed(source: &SeedSource) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(SEED_DOMAIN);
    hasher.update(source.latest_slot_hash);
    hasher.update(source.slot.to_le_bytes());
    hasher.update(source.unix_timestamp.to_le_bytes());
    hasher.update(source.round.as_ref());
    hasher.update(source.total_pot.to_le_bytes());
    let digest = hasher.finalize();

    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(word)
}

/// `seed mod player_count`, unsigned so the index can never be negative.
pub fn winner_index(seed: u64, player_count: usize) -> Option<usize> {
    if player_count == 0 {
        return None;
    }
    Some((seed % player_count as u64) as usize)
}

/// Splits the pot into `(fee, payout)` with `fee = floor(pot * bps / 10000)`.
pub fn split_pot(total_pot: u64, fee_basis_points: u16) -> Result<(u64, u64)> {
    require!(
        (fee_basis_points as u64) <= BPS_DENOMINATOR,
        WagerError::InvalidConfiguration
    );

    // u128 keeps pot * bps exact for any u64 pot
    let fee = (total_pot as u128)
        .checked_mul(fee_basis_points as u128)
        .ok_or(WagerError::MathOverflow)?
        .checked_div(BPS_DENOMINATOR as u128)
        .ok_or(WagerError::MathOverflow)?;
    let fee = u64::try_from(fee).map_err(|_| WagerError::MathOverflow)?;

    let payout = total_pot
        .checked_sub(fee)
        .ok_or(WagerError::MathOverflow)?;

    Ok((fee, payout))
}

/// Every effect of a successful close, computed before anything is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementPlan {
    pub winner: Pubkey,
    pub winner_index: usize,
    pub fee_recipient: Pubkey,
    pub fee: u64,
    pub payout: u64,
    pub next_round_number: u64,
}

impl SettlementPlan {
    /// State side of a close, run after the vault paid out: the round is
    /// settled, the game points at the next round and `next_round` opens
    /// empty at `now`.
    pub fn apply(
        &self,
        game: &mut Game,
        round: &mut Round,
        next_round: &mut Round,
        now: i64,
        next_round_bump: u8,
    ) {
        round.settle(self.winner);
        game.current_round_number = self.next_round_number;
        next_round.open(round.game, self.next_round_number, now, next_round_bump);
    }
}

/// Validates a close attempt and returns the effects to apply.
///
/// - `fee_recipient` must be the game admin.
/// - Eligibility comes from `Round::check_closable`.
/// - `proposed_winner` must equal `players[seed % players.len()]`; anything
///   else (including a key that never joined) is `WinnerMismatch`.
/// - `fee + payout == total_pot`.
pub fn plan_settlement(
    game: &Game,
    round: &Round,
    now: i64,
    seed: u64,
    proposed_winner: &Pubkey,
    fee_recipient: &Pubkey,
) -> Result<SettlementPlan> {
    require_keys_eq!(*fee_recipient, game.admin, WagerError::InvalidFeeRecipient);
    round.check_closable(game, now)?;

    let winner_index =
        winner_index(seed, round.players.len()).ok_or(WagerError::NotEnoughPlayers)?;
    let winner = round.players[winner_index];
    require_keys_eq!(*proposed_winner, winner, WagerError::WinnerMismatch);

    let (fee, payout) = split_pot(round.total_pot, game.fee_basis_points)?;
    let next_round_number = game.next_round_number()?;

    Ok(SettlementPlan {
        winner,
        winner_index,
        fee_recipient: *fee_recipient,
        fee,
        payout,
        next_round_number,
    })
}
