//! Decodes raw vault logs into [`NormalizedVaultEvent`]s.
//!
//! Pure: no I/O. Anything unexpected (unknown topic0, wrong topic count,
//! short data, values outside the ledger's numeric range) is rejected.

use rust_decimal::Decimal;

use super::vault_model::{EventExtra, NormalizedVaultEvent, RawVaultLog, VaultEventKind};
use crate::errors::{Result, ValidationError};
use crate::utils::amounts::normalize_address;

const WORD_BYTES: usize = 32;
const ADDRESS_BYTES: usize = 20;
// Largest magnitude a Decimal mantissa can hold.
const MAX_MANTISSA_BITS: u32 = 96;

fn reject(raw: &RawVaultLog, reason: impl AsRef<str>) -> crate::errors::Error {
    ValidationError::InvalidInput(format!(
        "Rejected log {}#{}: {}",
        raw.transaction_hash,
        raw.log_index,
        reason.as_ref()
    ))
    .into()
}

fn decode_hex(raw: &RawVaultLog, value: &str) -> Result<Vec<u8>> {
    let stripped = value.trim().trim_start_matches("0x").trim_start_matches("0X");
    hex::decode(stripped).map_err(|e| reject(raw, format!("invalid hex: {}", e)))
}

fn decode_word(raw: &RawVaultLog, value: &str) -> Result<[u8; WORD_BYTES]> {
    let bytes = decode_hex(raw, value)?;
    <[u8; WORD_BYTES]>::try_from(bytes.as_slice())
        .map_err(|_| reject(raw, format!("expected a 32-byte word, got {} bytes", bytes.len())))
}

fn word_to_decimal(raw: &RawVaultLog, word: &[u8; WORD_BYTES]) -> Result<Decimal> {
    let (high, low) = word.split_at(WORD_BYTES - 16);
    if high.iter().any(|b| *b != 0) {
        return Err(reject(raw, "value exceeds the supported amount range"));
    }
    let mut low_bytes = [0u8; 16];
    low_bytes.copy_from_slice(low);
    let value = u128::from_be_bytes(low_bytes);
    if value >> MAX_MANTISSA_BITS != 0 {
        return Err(reject(raw, "value exceeds the supported amount range"));
    }
    Decimal::try_from_i128_with_scale(value as i128, 0)
        .map_err(|e| reject(raw, format!("value out of range: {}", e)))
}

fn word_to_address(raw: &RawVaultLog, word: &[u8; WORD_BYTES]) -> Result<String> {
    let (padding, address) = word.split_at(WORD_BYTES - ADDRESS_BYTES);
    if padding.iter().any(|b| *b != 0) {
        return Err(reject(raw, "indexed address has non-zero padding"));
    }
    Ok(format!("0x{}", hex::encode(address)))
}

fn topic(raw: &RawVaultLog, index: usize) -> Result<[u8; WORD_BYTES]> {
    let value = raw
        .topics
        .get(index)
        .ok_or_else(|| reject(raw, format!("missing topic {}", index)))?;
    decode_word(raw, value)
}

fn data_words(raw: &RawVaultLog, expected: usize) -> Result<Vec<[u8; WORD_BYTES]>> {
    let bytes = decode_hex(raw, &raw.data)?;
    if bytes.len() != expected * WORD_BYTES {
        return Err(reject(
            raw,
            format!(
                "expected {} data words, got {} bytes",
                expected,
                bytes.len()
            ),
        ));
    }
    Ok(bytes
        .chunks_exact(WORD_BYTES)
        .map(|chunk| {
            let mut word = [0u8; WORD_BYTES];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

fn expect_topics(raw: &RawVaultLog, count: usize) -> Result<()> {
    if raw.topics.len() != count {
        return Err(reject(
            raw,
            format!("expected {} topics, got {}", count, raw.topics.len()),
        ));
    }
    Ok(())
}

/// Normalizes one log emitted by `vault_address` on `network`.
pub fn normalize(network: &str, vault_address: &str, raw: &RawVaultLog) -> Result<NormalizedVaultEvent> {
    let vault_address = normalize_address(vault_address);
    if normalize_address(&raw.address) != vault_address {
        return Err(reject(
            raw,
            format!("emitted by {} instead of {}", raw.address, vault_address),
        ));
    }
    let topic0 = raw
        .topics
        .first()
        .ok_or_else(|| reject(raw, "log has no topics"))?;
    let kind = VaultEventKind::from_topic0(topic0)
        .ok_or_else(|| reject(raw, format!("unrecognized event topic {}", topic0)))?;

    let (user_address, correlation_id, amount, extra) = match kind {
        VaultEventKind::Deposited => {
            expect_topics(raw, 3)?;
            let user = word_to_address(raw, &topic(raw, 1)?)?;
            let deposit_id = word_to_decimal(raw, &topic(raw, 2)?)?;
            let words = data_words(raw, 3)?;
            let lock_tier = word_to_decimal(raw, &words[2])?;
            let lock_tier = u8::try_from(lock_tier.mantissa())
                .map_err(|_| reject(raw, format!("lock tier {} is not a uint8", lock_tier)))?;
            (
                Some(user),
                Some(deposit_id.to_string()),
                word_to_decimal(raw, &words[0])?,
                EventExtra::Deposited {
                    shares: word_to_decimal(raw, &words[1])?,
                    lock_tier,
                },
            )
        }
        VaultEventKind::Withdrawn => {
            expect_topics(raw, 3)?;
            let user = word_to_address(raw, &topic(raw, 1)?)?;
            let deposit_id = word_to_decimal(raw, &topic(raw, 2)?)?;
            let words = data_words(raw, 3)?;
            (
                Some(user),
                Some(deposit_id.to_string()),
                word_to_decimal(raw, &words[0])?,
                EventExtra::Withdrawn {
                    yield_amount: word_to_decimal(raw, &words[1])?,
                    shares_burned: word_to_decimal(raw, &words[2])?,
                },
            )
        }
        VaultEventKind::YieldDistributed => {
            expect_topics(raw, 1)?;
            let words = data_words(raw, 2)?;
            (
                None,
                None,
                word_to_decimal(raw, &words[0])?,
                EventExtra::YieldDistributed {
                    new_interest_index: word_to_decimal(raw, &words[1])?,
                },
            )
        }
    };

    Ok(NormalizedVaultEvent {
        network: network.trim().to_lowercase(),
        vault_address,
        kind,
        user_address,
        amount,
        correlation_id,
        block_number: raw.block_number,
        log_index: raw.log_index,
        tx_hash: normalize_address(&raw.transaction_hash),
        extra,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn word(value: u128) -> String {
        format!("{:064x}", value)
    }

    pub fn address_topic(address_hex: &str) -> String {
        format!("0x{:0>64}", address_hex.trim_start_matches("0x"))
    }

    pub fn deposited_log(
        vault: &str,
        user: &str,
        deposit_id: u128,
        amount: u128,
        tx_hash: &str,
        block: u64,
        log_index: u64,
    ) -> RawVaultLog {
        RawVaultLog {
            address: vault.to_string(),
            topics: vec![
                VaultEventKind::Deposited.topic0(),
                address_topic(user),
                format!("0x{}", word(deposit_id)),
            ],
            data: format!("0x{}{}{}", word(amount), word(amount), word(1)),
            block_number: block,
            log_index,
            transaction_hash: tx_hash.to_string(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn withdrawn_log(
        vault: &str,
        user: &str,
        deposit_id: u128,
        amount: u128,
        yield_amount: u128,
        tx_hash: &str,
        block: u64,
        log_index: u64,
    ) -> RawVaultLog {
        RawVaultLog {
            address: vault.to_string(),
            topics: vec![
                VaultEventKind::Withdrawn.topic0(),
                address_topic(user),
                format!("0x{}", word(deposit_id)),
            ],
            data: format!("0x{}{}{}", word(amount), word(yield_amount), word(amount)),
            block_number: block,
            log_index,
            transaction_hash: tx_hash.to_string(),
        }
    }

    pub fn yield_log(vault: &str, amount: u128, index: u128, tx_hash: &str, block: u64) -> RawVaultLog {
        RawVaultLog {
            address: vault.to_string(),
            topics: vec![VaultEventKind::YieldDistributed.topic0()],
            data: format!("0x{}{}", word(amount), word(index)),
            block_number: block,
            log_index: 0,
            transaction_hash: tx_hash.to_string(),
        }
    }
}
