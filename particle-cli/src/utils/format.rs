//! Formatting utilities

use humansize::{DECIMAL, format_size};
use particle_sheet::SequenceFlags;
use particle_sim::prelude::Vec3;

/// Format file size in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// Format a duration in seconds
pub fn format_seconds(seconds: f32) -> String {
    format!("{seconds:.3}s")
}

/// Format a position with one decimal per axis
pub fn format_vec3(v: Vec3) -> String {
    format!("({:.1}, {:.1}, {:.1})", v.x, v.y, v.z)
}

/// Format sequence flags as `CLAMP | NO_ALPHA`, or `-` when none are set
pub fn format_flags(flags: SequenceFlags) -> String {
    if flags.is_empty() {
        return "-".to_string();
    }
    flags
        .iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1024), "1.02 kB");
    }

    #[test]
    fn test_format_flags() {
        assert_eq!(format_flags(SequenceFlags::empty()), "-");
        assert_eq!(format_flags(SequenceFlags::CLAMP), "CLAMP");
        assert_eq!(
            format_flags(SequenceFlags::CLAMP | SequenceFlags::NO_COLOR),
            "CLAMP | NO_COLOR"
        );
    }

    #[test]
    fn test_format_vec3() {
        assert_eq!(format_vec3(Vec3::new(1.0, -2.26, 0.04)), "(1.0, -2.3, 0.0)");
    }
}
