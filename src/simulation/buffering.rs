//! Particle buffer roles per frame
//!
//! With [`BufferingMode::PingPong`] the compute pass of frame `f` writes
//! buffer `f mod 2` while the render pass reads buffer `(f + 1) mod 2`, which
//! is what frame `f - 1` wrote. The two passes never touch the same buffer for
//! writing and reading in one frame.
//!
//! With [`BufferingMode::InPlace`] there is a single buffer. The kernel updates
//! it in place and the render pass of the same frame draws the fresh result.
//! wgpu orders the compute pass before the render pass on that buffer, but
//! invocations inside one dispatch read neighbours that other invocations may
//! already have overwritten.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferingMode {
    #[default]
    PingPong,
    InPlace,
}

/// Buffer indices used by one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferParity {
    /// Buffer the compute pass writes (and the readback copies from).
    pub write: usize,
    /// Buffer the render pass draws.
    pub read: usize,
}

impl BufferingMode {
    pub fn buffer_count(self) -> usize {
        match self {
            BufferingMode::PingPong => 2,
            BufferingMode::InPlace => 1,
        }
    }

    pub fn parity(self, frame: u64) -> BufferParity {
        match self {
            BufferingMode::PingPong => BufferParity {
                write: (frame % 2) as usize,
                read: ((frame + 1) % 2) as usize,
            },
            BufferingMode::InPlace => BufferParity { write: 0, read: 0 },
        }
    }
}

impl fmt::Display for BufferingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferingMode::PingPong => f.write_str("ping-pong"),
            BufferingMode::InPlace => f.write_str("in-place"),
        }
    }
}

impl FromStr for BufferingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ping-pong" | "pingpong" | "double" => Ok(BufferingMode::PingPong),
            "in-place" | "inplace" | "single" => Ok(BufferingMode::InPlace),
            _ => Err("expected `ping-pong` or `in-place`".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_pong_never_renders_write_target() {
        for frame in 0..64u64 {
            let parity = BufferingMode::PingPong.parity(frame);
            assert_eq!(parity.write as u64, frame % 2);
            assert_eq!(parity.read as u64, (frame + 1) % 2);
            assert_ne!(parity.write, parity.read);
        }
    }

    #[test]
    fn test_ping_pong_renders_previous_write() {
        for frame in 1..64u64 {
            let previous = BufferingMode::PingPong.parity(frame - 1);
            let current = BufferingMode::PingPong.parity(frame);
            assert_eq!(current.read, previous.write);
        }
    }

    #[test]
    fn test_in_place_uses_single_buffer() {
        assert_eq!(BufferingMode::InPlace.buffer_count(), 1);
        for frame in 0..8u64 {
            assert_eq!(
                BufferingMode::InPlace.parity(frame),
                BufferParity { write: 0, read: 0 }
            );
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("ping-pong".parse(), Ok(BufferingMode::PingPong));
        assert_eq!("In-Place".parse(), Ok(BufferingMode::InPlace));
        assert!("triple".parse::<BufferingMode>().is_err());
    }
}
