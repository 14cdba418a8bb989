//! Code for the creation of random alphanumeric strings

use rand::Rng;

/// The alphabet every generated string is drawn from.
pub const ALPHANUM: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Characters produced per unit of `size` by [`random_string_big`].
///
/// NOTE the unit is nominally a megabyte but one unit yields ten thousand
/// characters, not a million. Existing load profiles are calibrated against
/// this factor so it stays as is.
pub const CHARS_PER_SIZE_UNIT: usize = 10_000;

/// Default length for [`random_string`] callers without an opinion.
pub const DEFAULT_LENGTH: usize = 20;

/// Number of characters [`random_string_big`] produces for `size`.
#[must_use]
pub fn chars_for_size(size: u32) -> usize {
    usize::try_from(size)
        .unwrap_or(usize::MAX)
        .saturating_mul(CHARS_PER_SIZE_UNIT)
}

/// Generate a random string of `size` units, see [`CHARS_PER_SIZE_UNIT`].
pub fn random_string_big<R>(rng: &mut R, size: u32) -> String
where
    R: Rng + ?Sized,
{
    random_string(rng, chars_for_size(size))
}

/// Generate a random string of exactly `length` characters. Each character is
/// chosen independently and uniformly from [`ALPHANUM`].
pub fn random_string<R>(rng: &mut R, length: usize) -> String
where
    R: Rng + ?Sized,
{
    let mut s = String::with_capacity(length);
    for _ in 0..length {
        let idx = rng.random_range(0..ALPHANUM.len());
        s.push(char::from(ALPHANUM[idx]));
    }
    s
}
