use anchor_lang::prelude::*;
use anchor_lang::solana_program::sysvar::slot_hashes;
use anchor_lang::solana_program::{program::invoke_signed, system_instruction};
use anchor_lang::system_program;

pub mod pda;
pub mod settlement;
pub mod state;

use settlement::{derive_seed, latest_slot_hash, plan_settlement, SeedSource};
use state::*;

declare_id!("3E6csALNQow5ge51T2nSSaXinPKC4ynngPao3oGnaGWV");

pub const GAME_SEED: &[u8] = b"game";
pub const ROUND_SEED: &[u8] = b"round";
pub const VAULT_SEED: &[u8] = b"vault";
// Domain tag mixed into the settlement seed hash
pub const SEED_DOMAIN: &[u8] = b"wager:settlement-seed:v1";

pub const FIRST_ROUND_NUMBER: u64 = 1;
pub const BPS_DENOMINATOR: u64 = 10_000;
pub const MIN_PLAYERS_PER_ROUND: u8 = 2;
pub const MIN_PLAYERS_TO_CLOSE: usize = 2;

fn transfer_with_signer<'info>(
    amount: u64,
    from: &AccountInfo<'info>,
    to: &AccountInfo<'info>,
    system_program: &Program<'info, System>,
    signer_seeds: &[&[&[u8]]],
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }

    let ix = system_instruction::transfer(from.key, to.key, amount);

    invoke_signed(
        &ix,
        &[
            from.clone(),
            to.clone(),
            system_program.to_account_info(),
        ],
        signer_seeds,
    )?;

    Ok(())
}

/// Lamports the admin owes the vault to bring it up to `rent_floor`.
pub fn vault_top_up(vault_lamports: u64, rent_floor: u64) -> u64 {
    rent_floor.saturating_sub(vault_lamports)
}

#[program]
pub mod wager {
    use super::*;

    /// Creates the admin's game, its escrow vault and round #1.
    ///
    /// - Parameters are immutable once stored.
    /// - The game address is derived from the admin key, so a second call by
    ///   the same admin finds the populated game and fails with
    ///   `AlreadyInitialized` during account validation.
    /// - The vault is topped up to its rent-exempt floor; no stake moves.
    pub fn initialize_game(
        ctx: Context<InitializeGame>,
        wager_amount: u64,
        max_players_per_round: u8,
        round_duration: i64,
        fee_basis_points: u16,
    ) -> Result<()> {
        let game_state = Game::new(
            ctx.accounts.admin.key(),
            ctx.bumps.game,
            ctx.bumps.vault,
            wager_amount,
            max_players_per_round,
            round_duration,
            fee_basis_points,
        )?;

        // The vault holds a rent-exempt floor plus the live pot
        let rent_floor = Rent::get()?.minimum_balance(0);
        let top_up = vault_top_up(ctx.accounts.vault.to_account_info().lamports(), rent_floor);
        if top_up > 0 {
            let cpi_ctx = CpiContext::new(
                ctx.accounts.system_program.to_account_info(),
                system_program::Transfer {
                    from: ctx.accounts.admin.to_account_info(),
                    to: ctx.accounts.vault.to_account_info(),
                },
            );
            system_program::transfer(cpi_ctx, top_up)?;
        }

        let clock = Clock::get()?;
        let game_key = ctx.accounts.game.key();
        ctx.accounts.game.set_inner(game_state);

        ctx.accounts.round.open(
            game_key,
            FIRST_ROUND_NUMBER,
            clock.unix_timestamp,
            ctx.bumps.round,
        );

        msg!(
            "Game {} initialized: wager {} lamports, {} players, {}s, fee {} bps",
            game_key,
            wager_amount,
            max_players_per_round,
            round_duration,
            fee_basis_points
        );

        emit!(GameInitializedEvent {
            game: game_key,
            admin: ctx.accounts.admin.key(),
            wager_amount,
            max_players_per_round,
            round_duration,
            fee_basis_points,
        });
        emit!(RoundOpenedEvent {
            game: game_key,
            round_number: FIRST_ROUND_NUMBER,
            start_time: clock.unix_timestamp,
        });

        Ok(())
    }

    /// Seats the signer in the current round and moves one stake into the vault.
    ///
    /// Admission is re-checked here against the loaded round, never trusted
    /// from the client: open, a free seat, not already seated, enough lamports
    /// to pay the stake without leaving a non-exempt remainder.
    pub fn place_wager(ctx: Context<PlaceWager>) -> Result<()> {
        let player_key = ctx.accounts.player.key();
        let wager_amount = ctx.accounts.game.wager_amount;

        ctx.accounts.round.check_admission(
            &ctx.accounts.game,
            &player_key,
            ctx.accounts.player.to_account_info().lamports(),
            Rent::get()?.minimum_balance(0),
        )?;

        let cpi_ctx = CpiContext::new(
            ctx.accounts.system_program.to_account_info(),
            system_program::Transfer {
                from: ctx.accounts.player.to_account_info(),
                to: ctx.accounts.vault.to_account_info(),
            },
        );
        system_program::transfer(cpi_ctx, wager_amount)?;

        let round = &mut ctx.accounts.round;
        round.record_wager(player_key, wager_amount)?;

        msg!(
            "Round {}: player {} joined ({} seated, pot {})",
            round.round_number,
            player_key,
            round.players.len(),
            round.total_pot
        );

        emit!(WagerPlacedEvent {
            game: round.game,
            round_number: round.round_number,
            player: player_key,
            player_count: round.players.len() as u8,
            total_pot: round.total_pot,
        });

        Ok(())
    }

    /// Settles the current round and opens the next one.
    ///
    /// - Callable by anyone once the round has 2+ players and is full or expired.
    /// - The caller proposes `winner`; the program recomputes it from the
    ///   newest slot hash and clock and fails with `WinnerMismatch` otherwise.
    ///   Clients retry with the recomputed winner.
    /// - The fee recipient must be the game admin (`InvalidFeeRecipient`).
    /// - Pays `payout` to the winner and `fee` to the admin from the vault,
    ///   then settles the round, bumps the counter and opens the next round.
    ///   The whole transaction aborts on any failure.
    pub fn close_round(mut ctx: Context<CloseRound>) -> Result<()> {
        let clock = Clock::get()?;

        let latest = {
            let data = ctx.accounts.recent_slot_hashes.try_borrow_data()?;
            latest_slot_hash(&data)?
        };
        let seed = derive_seed(&SeedSource {
            latest_slot_hash: latest.hash,
            slot: clock.slot,
            unix_timestamp: clock.unix_timestamp,
            round: ctx.accounts.round.key(),
            total_pot: ctx.accounts.round.total_pot,
        });

        let plan = plan_settlement(
            &ctx.accounts.game,
            &ctx.accounts.round,
            clock.unix_timestamp,
            seed,
            &ctx.accounts.winner.key(),
            &ctx.accounts.fee_recipient.key(),
        )?;

        let game_key = ctx.accounts.game.key();
        let vault_bump = [ctx.accounts.game.vault_bump];
        let seeds: &[&[u8]] = &[VAULT_SEED, game_key.as_ref(), &vault_bump];
        let signer_seeds: &[&[&[u8]]] = &[seeds];

        let vault_ai = ctx.accounts.vault.to_account_info();
        let system_program = &ctx.accounts.system_program;

        transfer_with_signer(
            plan.payout,
            &vault_ai,
            &ctx.accounts.winner.to_account_info(),
            system_program,
            signer_seeds,
        )?;
        transfer_with_signer(
            plan.fee,
            &vault_ai,
            &ctx.accounts.fee_recipient.to_account_info(),
            system_program,
            signer_seeds,
        )?;

        let accounts = &mut ctx.accounts;
        plan.apply(
            &mut accounts.game,
            &mut accounts.round,
            &mut accounts.next_round,
            clock.unix_timestamp,
            ctx.bumps.next_round,
        );
        let closed_round_number = accounts.round.round_number;
        let total_pot = accounts.round.total_pot;

        msg!(
            "Round {} closed: winner {} (index {}), payout {}, fee {} to {}",
            closed_round_number,
            plan.winner,
            plan.winner_index,
            plan.payout,
            plan.fee,
            plan.fee_recipient
        );

        emit!(RoundClosedEvent {
            game: game_key,
            round_number: closed_round_number,
            winner: plan.winner,
            winner_index: plan.winner_index as u8,
            total_pot,
            fee: plan.fee,
            payout: plan.payout,
            seed,
        });
        emit!(RoundOpenedEvent {
            game: game_key,
            round_number: plan.next_round_number,
            start_time: clock.unix_timestamp,
        });

        Ok(())
    }
}

// ---------- Instruction Contexts ----------

#[derive(Accounts)]
#[instruction(wager_amount: u64, max_players_per_round: u8)]
pub struct InitializeGame<'info> {
    #[account(mut)]
    pub admin: Signer<'info>,

    #[account(
        init_if_needed,
        payer = admin,
        space = Game::SPACE,
        seeds = [GAME_SEED, admin.key().as_ref()],
        bump,
        constraint = !game.is_initialized() @ WagerError::AlreadyInitialized
    )]
    pub game: Account<'info, Game>,

    #[account(
        init_if_needed,
        payer = admin,
        space = Round::space(max_players_per_round),
        seeds = [ROUND_SEED, game.key().as_ref(), &FIRST_ROUND_NUMBER.to_le_bytes()],
        bump
    )]
    pub round: Account<'info, Round>,

    /// System-owned escrow for every round of this game. Only holds lamports.
    #[account(
        mut,
        seeds = [VAULT_SEED, game.key().as_ref()],
        bump
    )]
    pub vault: SystemAccount<'info>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct PlaceWager<'info> {
    #[account(mut)]
    pub player: Signer<'info>,

    #[account(
        seeds = [GAME_SEED, game.admin.as_ref()],
        bump = game.bump
    )]
    pub game: Account<'info, Game>,

    /// Only the game's current round resolves to this address
    #[account(
        mut,
        seeds = [ROUND_SEED, game.key().as_ref(), &game.current_round_number.to_le_bytes()],
        bump = round.bump,
        has_one = game
    )]
    pub round: Account<'info, Round>,

    #[account(
        mut,
        seeds = [VAULT_SEED, game.key().as_ref()],
        bump = game.vault_bump
    )]
    pub vault: SystemAccount<'info>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct CloseRound<'info> {
    /// Anyone can settle. Pays rent for the next round account.
    #[account(mut)]
    pub caller: Signer<'info>,

    #[account(
        mut,
        seeds = [GAME_SEED, game.admin.as_ref()],
        bump = game.bump
    )]
    pub game: Account<'info, Game>,

    #[account(
        mut,
        seeds = [ROUND_SEED, game.key().as_ref(), &game.current_round_number.to_le_bytes()],
        bump = round.bump,
        has_one = game
    )]
    pub round: Account<'info, Round>,

    #[account(
        init,
        payer = caller,
        space = Round::space(game.max_players_per_round),
        seeds = [
            ROUND_SEED,
            game.key().as_ref(),
            &game.current_round_number.saturating_add(1).to_le_bytes()
        ],
        bump
    )]
    pub next_round: Account<'info, Round>,

    #[account(
        mut,
        seeds = [VAULT_SEED, game.key().as_ref()],
        bump = game.vault_bump
    )]
    pub vault: SystemAccount<'info>,

    /// CHECK: proposed winner, compared against the recomputed winner in the handler
    #[account(mut)]
    pub winner: UncheckedAccount<'info>,

    /// CHECK: fee destination, compared against the game admin in the handler
    #[account(mut)]
    pub fee_recipient: UncheckedAccount<'info>,

    /// CHECK: SlotHashes sysvar, address-checked and read as raw bytes
    #[account(address = slot_hashes::ID)]
    pub recent_slot_hashes: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
}

// ---------- Events ----------

#[event]
pub struct GameInitializedEvent {
    pub game: Pubkey,
    pub admin: Pubkey,
    pub wager_amount: u64,
    pub max_players_per_round: u8,
    pub round_duration: i64,
    pub fee_basis_points: u16,
}

#[event]
pub struct RoundOpenedEvent {
    pub game: Pubkey,
    pub round_number: u64,
    pub start_time: i64,
}

#[event]
pub struct WagerPlacedEvent {
    pub game: Pubkey,
    pub round_number: u64,
    pub player: Pubkey,
    pub player_count: u8,
    pub total_pot: u64,
}

#[event]
pub struct RoundClosedEvent {
    pub game: Pubkey,
    pub round_number: u64,
    pub winner: Pubkey,
    pub winner_index: u8,
    pub total_pot: u64,
    pub fee: u64,
    pub payout: u64,
    pub seed: u64,
}

// ---------- Errors ----------

#[error_code]
pub enum WagerError {
    #[msg("Invalid game configuration")]
    InvalidConfiguration,
    #[msg("Game already initialized for this admin")]
    AlreadyInitialized,
    #[msg("Round is not open")]
    RoundNotOpen,
    #[msg("Round is full")]
    RoundFull,
    #[msg("Player already placed a wager in this round")]
    AlreadyInRound,
    #[msg("Insufficient funds for the wager")]
    InsufficientFunds,
    #[msg("Need at least 2 players to close the round")]
    NotEnoughPlayers,
    #[msg("Round is neither full nor expired")]
    RoundStillActive,
    #[msg("Proposed winner does not match the computed winner")]
    WinnerMismatch,
    #[msg("Math overflow")]
    MathOverflow,
    #[msg("Fee recipient must be the game admin")]
    InvalidFeeRecipient,
    #[msg("Slot hashes sysvar data is unreadable")]
    InvalidRandomnessSource,
}
