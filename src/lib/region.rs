//! The canonical textual region grammar:
//!
//! ```text
//! region := name [ ':' begin [ '-' end ] ]
//! begin  := integer   (1-based, inclusive)
//! end    := integer   (1-based, inclusive) | '' (meaning to end)
//! ```
//!
//! Name resolution is deferred to the caller via a closure, matching the
//! spec's description of the parser consulting the `SharedIndex` rather
//! than owning a copy of the sequence directory.

use crate::error::{RaidxError, Result};

/// A resolved, clamped, half-open region: `[begin, end)` in 0-based
/// coordinates against a sequence of the given `id` and `length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub id: u32,
    pub begin: u64,
    pub end: u64,
}

/// Parse `text` against the region grammar, resolving the sequence name via
/// `resolve`, which must return `(id, length)` for a known name.
///
/// A bare name with no `:begin-end` suffix resolves to the whole sequence.
/// Out-of-range positions are clamped into `[0, length]` with `begin <=
/// end`, rather than rejected.
pub fn parse_region(text: &str, resolve: impl Fn(&str) -> Option<(u32, u64)>) -> Result<Region> {
    // A name may itself contain ':' (rare but not forbidden), so the whole
    // string is tried as a name first.
    if let Some((id, length)) = resolve(text) {
        return Ok(Region { id, begin: 0, end: length });
    }

    let colon = text
        .rfind(':')
        .ok_or_else(|| RaidxError::UnknownSequence(text.to_string()))?;
    let (name, coords) = (&text[..colon], &text[colon + 1..]);
    let (id, length) =
        resolve(name).ok_or_else(|| RaidxError::UnknownSequence(name.to_string()))?;

    // A dash with no trailing digits ("chr1:100-") means "to the end of the
    // sequence"; no dash at all ("chr1:100") means a single base, matching
    // the convention `hts_parse_reg` follows upstream.
    let (begin_1based, end_1based) = match coords.split_once('-') {
        Some((b, e)) => (parse_pos(b)?, if e.is_empty() { None } else { Some(parse_pos(e)?) }),
        None => {
            let pos = parse_pos(coords)?;
            (pos, Some(pos))
        }
    };

    let mut begin = begin_1based.saturating_sub(1);
    let mut end = end_1based.unwrap_or(length);

    if begin > length {
        begin = length;
    }
    if end > length {
        end = length;
    }
    if begin > end {
        begin = end;
    }

    Ok(Region { id, begin, end })
}

fn parse_pos(text: &str) -> Result<u64> {
    text.parse::<u64>()
        .map_err(|_| RaidxError::UnknownSequence(format!("bad region coordinate: {text}")))
}

#[cfg(test)]
mod test {
    use super::*;

    fn resolver(entries: &'static [(&'static str, u64)]) -> impl Fn(&str) -> Option<(u32, u64)> {
        move |name| {
            entries
                .iter()
                .position(|(n, _)| *n == name)
                .map(|i| (i as u32, entries[i].1))
        }
    }

    #[test]
    fn bare_name_is_whole_sequence() {
        let r = parse_region("chr1", resolver(&[("chr1", 180)])).unwrap();
        assert_eq!(r, Region { id: 0, begin: 0, end: 180 });
    }

    #[test]
    fn begin_and_end_are_one_based_inclusive() {
        let r = parse_region("chr1:1-60", resolver(&[("chr1", 180)])).unwrap();
        assert_eq!(r, Region { id: 0, begin: 0, end: 60 });
    }

    #[test]
    fn open_ended_range_goes_to_sequence_end() {
        let r = parse_region("chr1:100-", resolver(&[("chr1", 180)])).unwrap();
        assert_eq!(r, Region { id: 0, begin: 99, end: 180 });
    }

    #[test]
    fn single_position_has_no_dash() {
        let r = parse_region("chr1:5", resolver(&[("chr1", 180)])).unwrap();
        assert_eq!(r, Region { id: 0, begin: 4, end: 5 });
    }

    #[test]
    fn out_of_range_positions_clamp() {
        let r = parse_region("chr1:1000-2000", resolver(&[("chr1", 180)])).unwrap();
        assert_eq!(r, Region { id: 0, begin: 180, end: 180 });
    }

    #[test]
    fn unknown_name_is_an_error() {
        assert!(matches::matches!(
            parse_region("chrX:1-10", resolver(&[("chr1", 180)])),
            Err(RaidxError::UnknownSequence(_))
        ));
    }
}
