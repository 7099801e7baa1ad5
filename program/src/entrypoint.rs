// Solcino Lottery - Program entrypoint
#![cfg(not(feature = "no-entrypoint"))]

use crate::process_instruction;
use solana_program::entrypoint;

entrypoint!(process_instruction);
