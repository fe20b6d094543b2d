//! Wide (bus) → narrow (pipeline) sample conversion.
//!
//! The bus delivers 32-bit words; the pipeline works in 16-bit PCM. Each word
//! is arithmetically shifted right by [`NARROW_SHIFT`] and truncated to `i16`.
//! There is no rounding and no saturation: values outside the `i16` range wrap
//! with two's-complement truncation.

/// Fixed right-shift applied to every wide sample.
pub const NARROW_SHIFT: u32 = 8;

/// Convert one bus word to a pipeline sample.
#[inline]
pub fn narrow_sample(wide: i32) -> i16 {
    (wide >> NARROW_SHIFT) as i16
}

/// Convert one frame of bus words into `narrow`.
///
/// Both slices must have the same length (one frame).
pub fn narrow_frame(wide: &[i32], narrow: &mut [i16]) {
    debug_assert_eq!(wide.len(), narrow.len());
    for (dst, &src) in narrow.iter_mut().zip(wide) {
        *dst = narrow_sample(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_out_low_byte() {
        assert_eq!(narrow_sample(0x0012_3400), 0x1234);
        assert_eq!(narrow_sample(0x0012_34FF), 0x1234);
        assert_eq!(narrow_sample(0), 0);
    }

    #[test]
    fn shift_is_arithmetic_for_negative_words() {
        assert_eq!(narrow_sample(-256), -1);
        assert_eq!(narrow_sample(-1), -1);
        assert_eq!(narrow_sample(-0x0080_0000), i16::MIN);
    }

    #[test]
    fn out_of_range_values_wrap_instead_of_saturating() {
        // 0x0100_0000 >> 8 = 0x1_0000, whose low 16 bits are zero.
        assert_eq!(narrow_sample(0x0100_0000), 0);
        // 0x7FFF_FF00 >> 8 = 0x7F_FFFF → 0xFFFF → -1.
        assert_eq!(narrow_sample(0x7FFF_FF00), -1);
        // 0x0080_0000 >> 8 = 0x8000 → i16::MIN, not i16::MAX.
        assert_eq!(narrow_sample(0x0080_0000), i16::MIN);
    }

    #[test]
    fn frame_conversion_is_deterministic() {
        let wide: Vec<i32> = (0..160).map(|i| (i * 7_919 - 500_000) << 4).collect();
        let mut first = vec![0i16; 160];
        let mut second = vec![0i16; 160];
        narrow_frame(&wide, &mut first);
        narrow_frame(&wide, &mut second);
        assert_eq!(first, second);
        for (w, n) in wide.iter().zip(&first) {
            assert_eq!(*n, narrow_sample(*w));
        }
    }
}
