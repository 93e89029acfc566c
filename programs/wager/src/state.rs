use anchor_lang::prelude::*;

use crate::{
    WagerError, BPS_DENOMINATOR, FIRST_ROUND_NUMBER, MIN_PLAYERS_PER_ROUND, MIN_PLAYERS_TO_CLOSE,
};

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum RoundStatus {
    Open,
    Closed, // terminal, the game continues in the next round account
}

#[account]
#[derive(Debug)]
pub struct Game {
    pub bump: u8,
    pub vault_bump: u8,
    pub admin: Pubkey, // receives the protocol fee

    pub wager_amount: u64, // lamports per player per round
    pub max_players_per_round: u8,
    pub round_duration: i64, // seconds
    pub fee_basis_points: u16,

    pub current_round_number: u64, // 0 until initialized, then starts at 1
}

impl Game {
    pub const SPACE: usize = 8 // discriminator
        + 1                    // bump
        + 1                    // vault_bump
        + 32                   // admin
        + 8                    // wager_amount
        + 1                    // max_players_per_round
        + 8                    // round_duration
        + 2                    // fee_basis_points
        + 8;                   // current_round_number

    /// Range checks for `initialize_game` parameters.
    pub fn validate_config(
        wager_amount: u64,
        max_players_per_round: u8,
        round_duration: i64,
        fee_basis_points: u16,
    ) -> Result<()> {
        require!(wager_amount > 0, WagerError::InvalidConfiguration);
        require!(
            max_players_per_round >= MIN_PLAYERS_PER_ROUND,
            WagerError::InvalidConfiguration
        );
        require!(round_duration > 0, WagerError::InvalidConfiguration);
        require!(
            (fee_basis_points as u64) <= BPS_DENOMINATOR,
            WagerError::InvalidConfiguration
        );
        Ok(())
    }

    /// A validated game pointed at round #1.
    pub fn new(
        admin: Pubkey,
        bump: u8,
        vault_bump: u8,
        wager_amount: u64,
        max_players_per_round: u8,
        round_duration: i64,
        fee_basis_points: u16,
    ) -> Result<Self> {
        Self::validate_config(
            wager_amount,
            max_players_per_round,
            round_duration,
            fee_basis_points,
        )?;

        Ok(Self {
            bump,
            vault_bump,
            admin,
            wager_amount,
            max_players_per_round,
            round_duration,
            fee_basis_points,
            current_round_number: FIRST_ROUND_NUMBER,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.current_round_number != 0
    }

    pub fn next_round_number(&self) -> Result<u64> {
        self.current_round_number
            .checked_add(1)
            .ok_or_else(|| error!(WagerError::MathOverflow))
    }
}

#[account]
pub struct Round {
    pub bump: u8,
    pub game: Pubkey,
    pub round_number: u64,

    // join order, unique, at most game.max_players_per_round
    pub players: Vec<Pubkey>,
    pub total_pot: u64, // always players.len() * game.wager_amount

    pub start_time: i64,
    pub status: RoundStatus,
    pub winner: Pubkey, // default while open
}

impl Round {
    pub const BASE_SPACE: usize = 8 // discriminator
        + 1                         // bump
        + 32                        // game
        + 8                         // round_number
        + 4                         // players vec length prefix
        + 8                         // total_pot
        + 8                         // start_time
        + 1                         // status
        + 32;                       // winner

    /// Account size for a round that can hold `max_players` entries.
    pub fn space(max_players: u8) -> usize {
        Self::BASE_SPACE + 32 * max_players as usize
    }

    /// Resets the account into a fresh open round.
    pub fn open(&mut self, game: Pubkey, round_number: u64, start_time: i64, bump: u8) {
        self.bump = bump;
        self.game = game;
        self.round_number = round_number;
        self.players = Vec::new();
        self.total_pot = 0;
        self.start_time = start_time;
        self.status = RoundStatus::Open;
        self.winner = Pubkey::default();
    }

    pub fn is_full(&self, game: &Game) -> bool {
        self.players.len() >= game.max_players_per_round as usize
    }

    /// Point-in-time check, there is no scheduled timer behind it.
    pub fn is_expired(&self, game: &Game, now: i64) -> bool {
        now.saturating_sub(self.start_time) >= game.round_duration
    }

    /// Admission rules for `place_wager`, evaluated in order against the
    /// freshly loaded round.
    ///
    /// - The round must be open.
    /// - It must have a free seat.
    /// - The player must not already be seated.
    /// - `available_lamports` must cover the stake, leaving the player either
    ///   empty or at least `rent_floor`.
    pub fn check_admission(
        &self,
        game: &Game,
        player: &Pubkey,
        available_lamports: u64,
        rent_floor: u64,
    ) -> Result<()> {
        require!(self.status == RoundStatus::Open, WagerError::RoundNotOpen);
        require!(!self.is_full(game), WagerError::RoundFull);
        require!(!self.players.contains(player), WagerError::AlreadyInRound);

        let remaining = available_lamports
            .checked_sub(game.wager_amount)
            .ok_or(WagerError::InsufficientFunds)?;
        require!(
            remaining == 0 || remaining >= rent_floor,
            WagerError::InsufficientFunds
        );
        Ok(())
    }

    /// Seats `player` and grows the pot by one stake. Only call after
    /// `check_admission` passed and the stake was transferred.
    pub fn record_wager(&mut self, player: Pubkey, wager_amount: u64) -> Result<()> {
        self.total_pot = self
            .total_pot
            .checked_add(wager_amount)
            .ok_or(WagerError::MathOverflow)?;
        self.players.push(player);
        Ok(())
    }

    /// Eligibility for `close_round`: open, at least two players, and either
    /// full or past `round_duration`.
    pub fn check_closable(&self, game: &Game, now: i64) -> Result<()> {
        require!(self.status == RoundStatus::Open, WagerError::RoundNotOpen);
        require!(
            self.players.len() >= MIN_PLAYERS_TO_CLOSE,
            WagerError::NotEnoughPlayers
        );
        require!(
            self.is_full(game) || self.is_expired(game, now),
            WagerError::RoundStillActive
        );
        Ok(())
    }

    pub fn settle(&mut self, winner: Pubkey) {
        self.status = RoundStatus::Closed;
        self.winner = winner;
    }
}
