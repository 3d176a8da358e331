//! Password-derived page cipher
//!
//! TPS files protected with an owner password have every page scrambled with
//! a 64-byte block transform keyed only by the password. There is no nonce
//! and no authentication tag, so the transform must match the legacy runtime
//! bit for bit; a wrong key simply yields garbage that fails the first page
//! address or header tag check.

use byteorder::{ByteOrder, LittleEndian};
use zeroize::Zeroize;

use crate::error::{TpsError, TpsResult};

/// Cipher block size in bytes
pub const BLOCK_SIZE: usize = 64;

const WORDS: usize = BLOCK_SIZE / 4;

/// Expanded key schedule (sixteen 32-bit words)
#[derive(Clone)]
pub struct Key {
    words: [u32; WORDS],
}

impl Key {
    /// Derive the key schedule from an owner password
    pub fn from_password(password: &str) -> TpsResult<Self> {
        if password.is_empty() {
            return Err(TpsError::InvalidArgument("password is empty".into()));
        }
        let mut pw = Vec::with_capacity(password.len());
        for c in password.chars() {
            let code = c as u32;
            if code > 0xFF {
                return Err(TpsError::InvalidArgument(format!(
                    "password character {:?} is outside ISO-8859-1",
                    c
                )));
            }
            pw.push(code as u8);
        }

        // Transposition / substitution into a 64-byte buffer
        let mut bytes = [0u8; BLOCK_SIZE];
        for t in 0..BLOCK_SIZE {
            bytes[(t * 0x11) & 0x3F] = pw[t % pw.len()].wrapping_add(t as u8);
        }
        pw.zeroize();

        let mut words = [0u32; WORDS];
        LittleEndian::read_u32_into(&bytes, &mut words);
        bytes.zeroize();

        for round in 0..WORDS as u32 {
            for y in 0..WORDS {
                let a = y;
                let b = (words[y] & 0x0F) as usize;
                let ka = words[a];
                let kb = words[b];
                words[a] = ka.wrapping_add(kb).rotate_left(round + 1);
                words[b] = kb ^ words[a];
            }
        }

        Ok(Key { words })
    }

    /// Decrypt whole blocks in place. The buffer length must be a multiple of 64.
    pub fn decrypt(&self, buf: &mut [u8]) -> TpsResult<()> {
        check_blocks(buf.len())?;
        let mut w = [0u32; WORDS];
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            LittleEndian::read_u32_into(block, &mut w);
            for t in (0..WORDS).rev() {
                let k = self.words[t];
                let a = t;
                let b = (k & 0x0F) as usize;
                let va = w[a];
                let vb = w[b];
                w[a] = ((vb & k) | (va & !k)).wrapping_sub(k);
                w[b] = ((va & k) | (vb & !k)).wrapping_sub(k);
            }
            LittleEndian::write_u32_into(&w, block);
        }
        w.zeroize();
        Ok(())
    }

    /// Inverse of [`Key::decrypt`]
    pub fn encrypt(&self, buf: &mut [u8]) -> TpsResult<()> {
        check_blocks(buf.len())?;
        let mut w = [0u32; WORDS];
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            LittleEndian::read_u32_into(block, &mut w);
            for t in 0..WORDS {
                let k = self.words[t];
                let a = t;
                let b = (k & 0x0F) as usize;
                let sa = w[a].wrapping_add(k);
                let sb = w[b].wrapping_add(k);
                w[a] = (sb & k) | (sa & !k);
                w[b] = (sa & k) | (sb & !k);
            }
            LittleEndian::write_u32_into(&w, block);
        }
        w.zeroize();
        Ok(())
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.words.zeroize();
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key").finish_non_exhaustive()
    }
}

/// Round a span length up to whole cipher blocks
pub fn block_aligned(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

fn check_blocks(len: usize) -> TpsResult<()> {
    if len % BLOCK_SIZE != 0 {
        return Err(TpsError::InvalidArgument(format!(
            "cipher input of {} bytes is not a multiple of {}",
            len, BLOCK_SIZE
        )));
    }
    Ok(())
}
