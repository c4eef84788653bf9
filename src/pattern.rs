//! The deterministic payload pattern `p[i] = i mod 256`, ported from
//! `Session`'s buffer initialization and `Session::verify` in
//! `Session.cpp`.

/// Size of the fixed send/receive scratch buffers (128 KiB).
pub const BUFFER_SIZE: usize = 128 << 10;

/// Build a buffer pre-filled with the reference pattern.
pub fn make_pattern_buffer() -> Vec<u8> {
    (0..BUFFER_SIZE).map(|i| (i % 256) as u8).collect()
}

/// How received bytes are checked against the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verify {
    None,
    First,
    All,
}

/// Check `data`, the bytes just received, against the continuing
/// pattern counter `received_before` (the number of bytes received
/// prior to this completion). Returns the absolute offset and the
/// mismatching bytes on the first failure.
pub fn verify(mode: Verify, received_before: u64, data: &[u8]) -> Result<(), (u64, u8, u8)> {
    match mode {
        Verify::None => Ok(()),
        Verify::First => {
            if data.is_empty() {
                return Ok(());
            }
            let expected = (received_before % 256) as u8;
            let actual = data[0];
            if actual != expected {
                return Err((received_before, expected, actual));
            }
            Ok(())
        }
        Verify::All => {
            for (i, &actual) in data.iter().enumerate() {
                let offset = received_before + i as u64;
                let expected = (offset % 256) as u8;
                if actual != expected {
                    return Err((offset, expected, actual));
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_follows_pattern() {
        let buf = make_pattern_buffer();
        assert_eq!(buf.len(), BUFFER_SIZE);
        for (i, &b) in buf.iter().enumerate() {
            assert_eq!(b, (i % 256) as u8);
        }
    }

    #[test]
    fn verify_all_passes_on_correct_pattern() {
        let data: Vec<u8> = (300..300 + 600).map(|i: u64| (i % 256) as u8).collect();
        assert!(verify(Verify::All, 300, &data).is_ok());
    }

    #[test]
    fn verify_all_detects_mismatch() {
        let mut data: Vec<u8> = (0..10).map(|i: u64| (i % 256) as u8).collect();
        data[5] = data[5].wrapping_add(1);
        let err = verify(Verify::All, 0, &data).unwrap_err();
        assert_eq!(err.0, 5);
    }

    #[test]
    fn verify_first_checks_only_first_byte() {
        let mut data: Vec<u8> = (100..110).map(|i: u64| (i % 256) as u8).collect();
        data[9] = 0xFF; // corrupting a later byte must not matter for FIRST.
        assert!(verify(Verify::First, 100, &data).is_ok());
    }

    #[test]
    fn verify_none_always_passes() {
        let data = vec![0xFFu8; 16];
        assert!(verify(Verify::None, 0, &data).is_ok());
    }
}
