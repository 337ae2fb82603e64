use crate::config::SPIN_LIMIT;
use crate::error::{Error, Result};

pub(crate) trait BitsExt {
    fn set(self, shift: u8) -> Self;
    fn clear(self, shift: u8) -> Self;
    fn check(self, shift: u8) -> Self;
    fn set_mask(self, mask: Self) -> Self;
    fn clear_mask(self, mask: Self) -> Self;
}

impl BitsExt for u8 {
    #[inline(always)]
    fn set(self, shift: u8) -> Self {
        self | (1 << shift)
    }

    #[inline(always)]
    fn clear(self, shift: u8) -> Self {
        self & !(1 << shift)
    }

    #[inline(always)]
    fn check(self, shift: u8) -> Self {
        self & (1 << shift)
    }

    #[inline(always)]
    fn set_mask(self, mask: Self) -> Self {
        self | mask
    }

    #[inline(always)]
    fn clear_mask(self, mask: Self) -> Self {
        self & !mask
    }
}

/// Spin until `done` returns true, giving up with `Error::Timeout` after `SPIN_LIMIT` polls
#[inline]
pub(crate) fn spin_until<F: FnMut() -> bool>(mut done: F) -> Result {
    for _ in 0..SPIN_LIMIT {
        if done() {
            return Ok(());
        }
        core::hint::spin_loop();
    }
    if done() {
        Ok(())
    } else {
        Err(Error::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_ext() {
        assert_eq!(0u8.set(3), 0x08);
        assert_eq!(0xFFu8.clear(0), 0xFE);
        assert_eq!(0x81u8.check(7), 0x80);
        assert_eq!(0x81u8.check(6), 0);
        assert_eq!(0x0Fu8.clear_mask(0x03), 0x0C);
    }

    #[test]
    fn spin_gives_up() {
        assert_eq!(spin_until(|| false), Err(Error::Timeout));
        let mut n = 0;
        assert_eq!(
            spin_until(|| {
                n += 1;
                n == 10
            }),
            Ok(())
        );
    }
}
