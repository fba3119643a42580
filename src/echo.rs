//! The echo transform.
//!
//! Maps request bytes to response bytes. For echo the response is the
//! request itself, so the transform operates in place on the session
//! buffer and reports how many bytes to send back.

/// Produce the response for a chunk of received bytes.
///
/// Leaves the buffer contents untouched and returns the number of bytes
/// to transmit (all of them, unmodified, in order).
pub fn respond_in_place(received: &mut [u8]) -> usize {
    received.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_is_identical() {
        let mut buf = *b"ping";
        let n = respond_in_place(&mut buf);
        assert_eq!(n, 4);
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn test_empty_chunk() {
        let mut buf = [0u8; 0];
        assert_eq!(respond_in_place(&mut buf), 0);
    }

    #[test]
    fn test_arbitrary_bytes_preserved() {
        let original: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
        let mut buf = original.clone();
        let n = respond_in_place(&mut buf);
        assert_eq!(n, original.len());
        assert_eq!(buf, original);
    }
}
