//! Config-credential scrambling for `cpdlcd -e`.
//!
//! Produces `scr1:<salt>:<data>` values for the `auth.username` /
//! `auth.password` config keys so credentials are not stored in the
//! clear. This is keyed scrambling against casual disclosure of the
//! config file, not cryptography; protect the file itself with
//! permissions.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use rand::RngCore;

const PREFIX: &str = "scr1";

/// Expand a salt into a keystream with a xorshift64 generator.
fn keystream(salt: u64, len: usize) -> Vec<u8> {
    let mut state = salt | 1;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        out.extend_from_slice(&state.to_be_bytes());
    }
    out.truncate(len);
    out
}

/// Scramble a value into its config representation.
pub fn scramble(value: &str) -> String {
    let mut salt_bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = u64::from_be_bytes(salt_bytes);
    let data: Vec<u8> = value
        .bytes()
        .zip(keystream(salt, value.len()))
        .map(|(b, k)| b ^ k)
        .collect();
    format!("{PREFIX}:{salt:016x}:{}", hex::encode(&data))
}

/// Reverse [`scramble`]; plain values pass through untouched.
pub fn unscramble(value: &str) -> Result<String> {
    let Some(rest) = value.strip_prefix(&format!("{PREFIX}:")) else {
        return Ok(value.to_string());
    };
    let (salt_hex, data_hex) = rest
        .split_once(':')
        .context("malformed scrambled credential")?;
    let salt = u64::from_str_radix(salt_hex, 16).context("bad credential salt")?;
    let data = hex::decode(data_hex).context("bad credential payload")?;
    let plain: Vec<u8> = data
        .iter()
        .zip(keystream(salt, data.len()))
        .map(|(b, k)| b ^ k)
        .collect();
    String::from_utf8(plain).context("scrambled credential is not UTF-8")
}

/// The `-e` entry point: read username and password, print the
/// config-ready scrambled values.
pub fn encrypt_userpwd(silent: bool) -> Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let mut read_value = |prompt: &str| -> Result<String> {
        if !silent {
            print!("{prompt}: ");
            std::io::stdout().flush().ok();
        }
        lines
            .next()
            .context("unexpected end of input")?
            .context("reading input")
    };

    let username = read_value("auth username")?;
    let password = read_value("auth password")?;
    println!("username = \"{}\"", scramble(&username));
    println!("password = \"{}\"", scramble(&password));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scramble_round_trip() {
        for value in ["", "broker", "hunter2", "pa ss:wo/rd"] {
            let scrambled = scramble(value);
            assert!(scrambled.starts_with("scr1:"));
            assert_eq!(unscramble(&scrambled).unwrap(), value);
        }
    }

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(unscramble("plain-password").unwrap(), "plain-password");
    }

    #[test]
    fn distinct_salts() {
        assert_ne!(scramble("same"), scramble("same"));
    }

    #[test]
    fn malformed_rejected() {
        assert!(unscramble("scr1:zz:aa").is_err());
        assert!(unscramble("scr1:0123").is_err());
    }
}
