// Solcino Lottery - Instruction Processor
//
// Hosts the lottery engine in a program account. Every instruction loads the
// engine, runs exactly one operation and stores it back; the runtime makes
// the whole instruction atomic.
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

use crate::{
    engine::{LotteryEngine, PrizeLedger},
    error::RaffleError,
    events::ProgramLogSink,
    instruction::RaffleInstruction,
    oracle::{LogOracle, RequestId},
    state::{RaffleAccount, RaffleConfig},
    utils::{self, RAFFLE_SEED},
};

/// Pays the prize from the lamports held by the raffle account. Only the
/// account supplied as winner can be paid, and the raffle account keeps its
/// rent-exempt minimum.
pub struct LamportLedger<'a, 'b> {
    pool: &'a AccountInfo<'b>,
    recipient: &'a AccountInfo<'b>,
}

impl<'a, 'b> LamportLedger<'a, 'b> {
    pub fn new(pool: &'a AccountInfo<'b>, recipient: &'a AccountInfo<'b>) -> Self {
        Self { pool, recipient }
    }
}

impl<'a, 'b> PrizeLedger for LamportLedger<'a, 'b> {
    fn transfer(&mut self, to: &Pubkey, amount: u64) -> Result<(), RaffleError> {
        if self.recipient.key != to {
            msg!(
                "Winner account {} does not match selected winner {}",
                self.recipient.key,
                to
            );
            return Err(RaffleError::TransferFailed);
        }
        if !self.recipient.is_writable {
            msg!("Winner account must be writable");
            return Err(RaffleError::TransferFailed);
        }

        let rent_floor = Rent::get()
            .map_err(|_| RaffleError::TransferFailed)?
            .minimum_balance(self.pool.data_len());
        let remaining = self
            .pool
            .lamports()
            .checked_sub(amount)
            .filter(|remaining| *remaining >= rent_floor)
            .ok_or(RaffleError::TransferFailed)?;
        let credited = self
            .recipient
            .lamports()
            .checked_add(amount)
            .ok_or(RaffleError::TransferFailed)?;

        // take both borrows before writing so a failure moves nothing
        let mut pool_lamports = self
            .pool
            .try_borrow_mut_lamports()
            .map_err(|_| RaffleError::TransferFailed)?;
        let mut recipient_lamports = self
            .recipient
            .try_borrow_mut_lamports()
            .map_err(|_| RaffleError::TransferFailed)?;
        **pool_lamports = remaining;
        **recipient_lamports = credited;
        Ok(())
    }
}

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle { config } => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(program_id, accounts, config)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(program_id, accounts, amount)
            }
            RaffleInstruction::CheckUpkeep {} => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(program_id, accounts)
            }
            RaffleInstruction::PerformUpkeep {} => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(program_id, accounts)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_word,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(
                    program_id,
                    accounts,
                    request_id,
                    random_word,
                )
            }
        }
    }

    fn load_raffle(
        program_id: &Pubkey,
        raffle_info: &AccountInfo,
    ) -> Result<RaffleAccount, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let raffle = RaffleAccount::unpack(&raffle_info.data.borrow())?;
        Ok(raffle)
    }

    fn process_initialize_raffle(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        config: RaffleConfig,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            msg!("Authority must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_raffle, bump) = utils::find_raffle_address(program_id, authority_info.key);
        if *raffle_info.key != expected_raffle {
            msg!("Invalid raffle account address");
            return Err(ProgramError::InvalidArgument);
        }
        if raffle_info.owner == program_id {
            msg!("Raffle account is already initialized");
            return Err(RaffleError::AlreadyInitialized.into());
        }

        let now = Clock::get()?.unix_timestamp;
        let raffle = RaffleAccount {
            is_initialized: true,
            authority: *authority_info.key,
            bump,
            request_nonce: 0,
            engine: LotteryEngine::new(config, now)?,
        };

        let space = RaffleAccount::space(&raffle.engine)?;
        let seeds: &[&[u8]] = &[RAFFLE_SEED, authority_info.key.as_ref(), &[bump]];
        Self::create_raffle_account(
            program_id,
            authority_info,
            raffle_info,
            system_program_info,
            space,
            seeds,
        )?;

        raffle.pack(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: EntranceFee={} SOL, Interval={}s, Coordinator={}, MaxPlayers={}",
            utils::lamports_to_sol(config.entrance_fee),
            config.interval,
            config.vrf_coordinator,
            config.max_players
        );
        Ok(())
    }

    /// Creates the raffle PDA. Anyone can send lamports to the address before
    /// it exists, which makes `create_account` fail, so a funded address is
    /// topped up to the rent minimum and then allocated and assigned instead.
    fn create_raffle_account<'a>(
        program_id: &Pubkey,
        payer_info: &AccountInfo<'a>,
        raffle_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
        space: usize,
        seeds: &[&[u8]],
    ) -> ProgramResult {
        let rent_lamports = Rent::get()?.minimum_balance(space);
        let current_lamports = raffle_info.lamports();

        if current_lamports == 0 {
            return invoke_signed(
                &system_instruction::create_account(
                    payer_info.key,
                    raffle_info.key,
                    rent_lamports,
                    space as u64,
                    program_id,
                ),
                &[
                    payer_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
                &[seeds],
            );
        }

        msg!("Raffle address already holds {} lamports", current_lamports);
        let shortfall = rent_lamports.saturating_sub(current_lamports);
        if shortfall > 0 {
            invoke(
                &system_instruction::transfer(payer_info.key, raffle_info.key, shortfall),
                &[
                    payer_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }
        invoke_signed(
            &system_instruction::allocate(raffle_info.key, space as u64),
            &[raffle_info.clone(), system_program_info.clone()],
            &[seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(raffle_info.key, program_id),
            &[raffle_info.clone(), system_program_info.clone()],
            &[seeds],
        )
    }

    fn process_enter_raffle(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;
        raffle
            .engine
            .enter_raffle(*player_info.key, amount, &mut ProgramLogSink)?;

        invoke(
            &system_instruction::transfer(player_info.key, raffle_info.key, amount),
            &[
                player_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        raffle.pack(&mut raffle_info.data.borrow_mut())?;
        Ok(())
    }

    fn process_check_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let raffle = Self::load_raffle(program_id, raffle_info)?;
        let now = Clock::get()?.unix_timestamp;
        let status = raffle.engine.upkeep_status(now);
        msg!("Upkeep status: {:?}", status);

        set_return_data(&[status.upkeep_needed() as u8]);
        Ok(())
    }

    fn process_perform_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;
        let now = Clock::get()?.unix_timestamp;

        let mut oracle = LogOracle::new(*raffle_info.key, &mut raffle.request_nonce);
        raffle
            .engine
            .perform_upkeep(now, &mut oracle, &mut ProgramLogSink)?;

        raffle.pack(&mut raffle_info.data.borrow_mut())?;
        Ok(())
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: RequestId,
        random_word: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let coordinator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        // the coordinator identity only counts when proven by a signature
        if !coordinator_info.is_signer {
            msg!("Coordinator must sign the transaction");
            return Err(RaffleError::Unauthorized.into());
        }

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;
        let now = Clock::get()?.unix_timestamp;

        let mut ledger = LamportLedger::new(raffle_info, winner_info);
        raffle.engine.fulfill_random_words(
            coordinator_info.key,
            request_id,
            random_word,
            now,
            &mut ledger,
            &mut ProgramLogSink,
        )?;

        raffle.pack(&mut raffle_info.data.borrow_mut())?;
        Ok(())
    }
}
