//! C FFI bindings
//!
//! Hash values cross the boundary as raw byte buffers of their fixed size:
//! 32 bytes for header, mix, final hashes, boundaries and difficulties.
//! Null pointers are rejected without touching the other arguments.

use core::slice;

use crate::{EpochContext, Hash256, VerificationError, ethash, progpow};

/// Opaque epoch context handle for FFI
pub struct EthashEpochContext {
    inner: EpochContext,
}

/// Verification outcome codes
pub const ETHASH_VERIFY_OK: i32 = 0;
pub const ETHASH_VERIFY_INVALID_FINAL_HASH: i32 = 1;
pub const ETHASH_VERIFY_INVALID_MIX_HASH: i32 = 2;
pub const ETHASH_VERIFY_INVALID_ARGUMENT: i32 = -1;

/// # Safety
/// `ptr` must be null or point to 32 readable bytes.
unsafe fn read_hash256(ptr: *const u8) -> Option<Hash256> {
    if ptr.is_null() {
        return None;
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(unsafe { slice::from_raw_parts(ptr, 32) });
    Some(Hash256(bytes))
}

/// # Safety
/// `ptr` must be null or point to 32 writable bytes.
unsafe fn write_hash256(ptr: *mut u8, value: &Hash256) {
    if !ptr.is_null() {
        unsafe { slice::from_raw_parts_mut(ptr, 32) }.copy_from_slice(&value.0);
    }
}

fn verification_code(result: Result<(), VerificationError>) -> i32 {
    match result {
        Ok(()) => ETHASH_VERIFY_OK,
        Err(VerificationError::InvalidFinalHash) => ETHASH_VERIFY_INVALID_FINAL_HASH,
        Err(VerificationError::InvalidMixHash) => ETHASH_VERIFY_INVALID_MIX_HASH,
    }
}

/// Write the 32-byte seed of `epoch_number` to `output`
#[unsafe(no_mangle)]
pub extern "C" fn ethash_calculate_epoch_seed(epoch_number: u32, output: *mut u8) {
    let seed = crate::calculate_epoch_seed(epoch_number);
    unsafe { write_hash256(output, &seed) };
}

/// Light cache item count, 0 past the last epoch
#[unsafe(no_mangle)]
pub extern "C" fn ethash_calculate_light_cache_num_items(epoch_number: u32) -> u32 {
    crate::calculate_light_cache_num_items(epoch_number)
}

/// Full dataset item count, 0 past the last epoch
#[unsafe(no_mangle)]
pub extern "C" fn ethash_calculate_full_dataset_num_items(epoch_number: u32) -> u32 {
    crate::calculate_full_dataset_num_items(epoch_number)
}

/// Epoch of a 32-byte seed, or -1 when unknown
#[unsafe(no_mangle)]
pub extern "C" fn ethash_find_epoch_number(seed: *const u8) -> i32 {
    match unsafe { read_hash256(seed) }.and_then(|seed| crate::find_epoch_number(&seed)) {
        // Epochs never exceed MAX_EPOCH_NUMBER, well within i32
        Some(epoch) => epoch as i32,
        None => -1,
    }
}

fn into_handle(context: Result<EpochContext, crate::Error>) -> *mut EthashEpochContext {
    match context {
        Ok(inner) => Box::into_raw(Box::new(EthashEpochContext { inner })),
        Err(_) => core::ptr::null_mut(),
    }
}

/// Create a light context; null on failure
/// Caller must free with ethash_destroy_epoch_context
#[unsafe(no_mangle)]
pub extern "C" fn ethash_create_epoch_context(epoch_number: u32) -> *mut EthashEpochContext {
    into_handle(crate::create_epoch_context(epoch_number))
}

/// Create a full context with a lazily filled dataset; null on failure
#[unsafe(no_mangle)]
pub extern "C" fn ethash_create_epoch_context_full(epoch_number: u32) -> *mut EthashEpochContext {
    into_handle(crate::create_epoch_context_full(epoch_number))
}

/// Free a context
#[unsafe(no_mangle)]
pub extern "C" fn ethash_destroy_epoch_context(context: *mut EthashEpochContext) {
    if !context.is_null() {
        unsafe {
            let _ = Box::from_raw(context);
        }
    }
}

/// Free a context made by ethash_create_epoch_context_full
#[unsafe(no_mangle)]
pub extern "C" fn ethash_destroy_epoch_context_full(context: *mut EthashEpochContext) {
    ethash_destroy_epoch_context(context)
}

/// Ethash of `header || nonce`
/// - header: 32 bytes
/// - final_hash, mix_hash: 32-byte output buffers
#[unsafe(no_mangle)]
pub extern "C" fn ethash_hash(
    context: *const EthashEpochContext,
    header: *const u8,
    nonce: u64,
    final_hash: *mut u8,
    mix_hash: *mut u8,
) {
    if context.is_null() || final_hash.is_null() || mix_hash.is_null() {
        return;
    }
    let Some(header) = (unsafe { read_hash256(header) }) else {
        return;
    };

    unsafe {
        let context = &(*context).inner;
        let result = ethash::hash(context, &header, nonce);
        write_hash256(final_hash, &result.final_hash);
        write_hash256(mix_hash, &result.mix_hash);
    }
}

/// Verify an Ethash proof against a boundary; see ETHASH_VERIFY_* codes
#[unsafe(no_mangle)]
pub extern "C" fn ethash_verify(
    context: *const EthashEpochContext,
    header: *const u8,
    mix_hash: *const u8,
    nonce: u64,
    boundary: *const u8,
) -> i32 {
    if context.is_null() {
        return ETHASH_VERIFY_INVALID_ARGUMENT;
    }
    let (Some(header), Some(mix_hash), Some(boundary)) =
        (unsafe { (read_hash256(header), read_hash256(mix_hash), read_hash256(boundary)) })
    else {
        return ETHASH_VERIFY_INVALID_ARGUMENT;
    };

    let context = unsafe { &(*context).inner };
    verification_code(ethash::verify_against_boundary(
        context, &header, &mix_hash, nonce, &boundary,
    ))
}

/// Verify an Ethash proof against a 32-byte big-endian difficulty
#[unsafe(no_mangle)]
pub extern "C" fn ethash_verify_against_difficulty(
    context: *const EthashEpochContext,
    header: *const u8,
    mix_hash: *const u8,
    nonce: u64,
    difficulty: *const u8,
) -> i32 {
    if context.is_null() {
        return ETHASH_VERIFY_INVALID_ARGUMENT;
    }
    let (Some(header), Some(mix_hash), Some(difficulty)) =
        (unsafe { (read_hash256(header), read_hash256(mix_hash), read_hash256(difficulty)) })
    else {
        return ETHASH_VERIFY_INVALID_ARGUMENT;
    };

    let context = unsafe { &(*context).inner };
    verification_code(ethash::verify_against_difficulty(
        context, &header, &mix_hash, nonce, &difficulty,
    ))
}

/// ProgPoW of `header || nonce` at `block_number`
#[unsafe(no_mangle)]
pub extern "C" fn progpow_hash(
    context: *const EthashEpochContext,
    block_number: u64,
    header: *const u8,
    nonce: u64,
    final_hash: *mut u8,
    mix_hash: *mut u8,
) {
    if context.is_null() || final_hash.is_null() || mix_hash.is_null() {
        return;
    }
    let Some(header) = (unsafe { read_hash256(header) }) else {
        return;
    };

    unsafe {
        let context = &(*context).inner;
        let result = progpow::hash(context, block_number, &header, nonce);
        write_hash256(final_hash, &result.final_hash);
        write_hash256(mix_hash, &result.mix_hash);
    }
}

/// Verify a ProgPoW proof against a boundary; see ETHASH_VERIFY_* codes
#[unsafe(no_mangle)]
pub extern "C" fn progpow_verify(
    context: *const EthashEpochContext,
    block_number: u64,
    header: *const u8,
    mix_hash: *const u8,
    nonce: u64,
    boundary: *const u8,
) -> i32 {
    if context.is_null() {
        return ETHASH_VERIFY_INVALID_ARGUMENT;
    }
    let (Some(header), Some(mix_hash), Some(boundary)) =
        (unsafe { (read_hash256(header), read_hash256(mix_hash), read_hash256(boundary)) })
    else {
        return ETHASH_VERIFY_INVALID_ARGUMENT;
    };

    let context = unsafe { &(*context).inner };
    verification_code(progpow::verify_against_boundary(
        context,
        block_number,
        &header,
        &mix_hash,
        nonce,
        &boundary,
    ))
}

/// Scan `iterations` nonces from `start_nonce`
/// Returns true and fills the outputs when a nonce within `boundary` is found
#[unsafe(no_mangle)]
pub extern "C" fn ethash_search(
    context: *const EthashEpochContext,
    header: *const u8,
    boundary: *const u8,
    start_nonce: u64,
    iterations: u64,
    nonce: *mut u64,
    final_hash: *mut u8,
    mix_hash: *mut u8,
) -> bool {
    if context.is_null() || nonce.is_null() {
        return false;
    }
    let (Some(header), Some(boundary)) =
        (unsafe { (read_hash256(header), read_hash256(boundary)) })
    else {
        return false;
    };

    unsafe {
        let context = &(*context).inner;
        let found = ethash::search(context, &header, &boundary, start_nonce, iterations);
        if !found.solution_found {
            return false;
        }
        *nonce = found.nonce;
        write_hash256(final_hash, &found.result.final_hash);
        write_hash256(mix_hash, &found.result.mix_hash);
        true
    }
}
