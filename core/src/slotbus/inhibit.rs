//! Memory-inhibit arbitration.
//!
//! Every card's current claim goes in, the overlay map comes out. The map is
//! never edited in place: the bus rebuilds it from all claims after each
//! card access, so it cannot drift from the cards' own state.
//!
//! Priority is the lowest slot index. A later card whose claim overlaps an
//! earlier one is suppressed over the overlap (the earlier card drives the
//! data bus, like the stronger driver on real hardware) and keeps its
//! overlay everywhere else.

use serde::{Deserialize, Serialize};

use crate::card::InhibitClaim;

/// A maximal address run with one read owner and one write owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayRegion {
    pub start: u16,
    pub end: u16,
    pub read: Option<usize>,
    pub write: Option<usize>,
}

/// Disjoint overlay regions, sorted by address.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OverlayMap {
    regions: Vec<OverlayRegion>,
}

impl OverlayMap {
    pub fn regions(&self) -> &[OverlayRegion] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn region_at(&self, addr: u16) -> Option<&OverlayRegion> {
        let i = self.regions.partition_point(|r| r.end < addr);
        self.regions.get(i).filter(|r| r.start <= addr)
    }

    pub fn read_owner(&self, addr: u16) -> Option<usize> {
        self.region_at(addr).and_then(|r| r.read)
    }

    pub fn write_owner(&self, addr: u16) -> Option<usize> {
        self.region_at(addr).and_then(|r| r.write)
    }
}

/// A claim (or part of one) that lost to a lower slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suppressed {
    pub slot: usize,
    pub by: usize,
    pub start: u16,
    pub end: u16,
    pub write: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Arbitration {
    pub map: OverlayMap,
    pub suppressed: Vec<Suppressed>,
}

/// Compute the overlay map from `(slot, claim)` pairs.
pub fn arbitrate<I>(claims: I) -> Arbitration
where
    I: IntoIterator<Item = (usize, InhibitClaim)>,
{
    let mut claims: Vec<(usize, InhibitClaim)> = claims.into_iter().collect();
    claims.sort_by_key(|&(slot, _)| slot);

    // Elementary intervals: every claim edge splits the space.
    let mut edges: Vec<u32> = claims
        .iter()
        .flat_map(|(_, c)| [c.start as u32, c.end as u32 + 1])
        .collect();
    edges.sort_unstable();
    edges.dedup();

    let mut out = Arbitration::default();
    for pair in edges.windows(2) {
        let (start, end) = (pair[0] as u16, (pair[1] - 1) as u16);
        let covering = || claims.iter().filter(move |(_, c)| c.covers(start));

        let mut read = None;
        let mut write = None;
        for &(slot, claim) in covering() {
            if claim.mode.reads() {
                match read {
                    None => read = Some(slot),
                    Some(by) => push_suppressed(&mut out.suppressed, slot, by, start, end, false),
                }
            }
            if claim.mode.writes() {
                match write {
                    None => write = Some(slot),
                    Some(by) => push_suppressed(&mut out.suppressed, slot, by, start, end, true),
                }
            }
        }

        if read.is_none() && write.is_none() {
            continue;
        }
        match out.map.regions.last_mut() {
            Some(last)
                if last.end as u32 + 1 == start as u32
                    && last.read == read
                    && last.write == write =>
            {
                last.end = end;
            }
            _ => out.map.regions.push(OverlayRegion {
                start,
                end,
                read,
                write,
            }),
        }
    }
    out
}

fn push_suppressed(
    list: &mut Vec<Suppressed>,
    slot: usize,
    by: usize,
    start: u16,
    end: u16,
    write: bool,
) {
    if let Some(last) = list
        .iter_mut()
        .rev()
        .find(|s| s.slot == slot && s.by == by && s.write == write)
        && last.end as u32 + 1 == start as u32
    {
        last.end = end;
        return;
    }
    list.push(Suppressed {
        slot,
        by,
        start,
        end,
        write,
    });
}

/// Notification sent to the host memory when the overlay map changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayChange {
    /// The region is now served by the owning card(s).
    Redirect(OverlayRegion),
    /// The range is back to host memory.
    Restore { start: u16, end: u16 },
}

/// Changes taking `old` to `new`: restores first, then redirects.
pub fn changes(old: &OverlayMap, new: &OverlayMap) -> Vec<OverlayChange> {
    let restores = old
        .regions
        .iter()
        .filter(|r| !new.regions.contains(r))
        .map(|r| OverlayChange::Restore {
            start: r.start,
            end: r.end,
        });
    let redirects = new
        .regions
        .iter()
        .filter(|r| !old.regions.contains(r))
        .map(|r| OverlayChange::Redirect(*r));
    restores.chain(redirects).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::InhibitMode;

    fn claim(mode: InhibitMode, start: u16, end: u16) -> InhibitClaim {
        InhibitClaim { mode, start, end }
    }

    #[test]
    fn no_claims_no_regions() {
        assert!(arbitrate([]).map.is_empty());
    }

    #[test]
    fn lower_slot_wins_overlap() {
        let arb = arbitrate([
            (3, claim(InhibitMode::Read, 0xD000, 0xFFFF)),
            (1, claim(InhibitMode::Read, 0xE000, 0xEFFF)),
        ]);
        assert_eq!(arb.map.read_owner(0xD000), Some(3));
        assert_eq!(arb.map.read_owner(0xE800), Some(1));
        assert_eq!(arb.map.read_owner(0xF000), Some(3));
        assert_eq!(
            arb.suppressed,
            vec![Suppressed {
                slot: 3,
                by: 1,
                start: 0xE000,
                end: 0xEFFF,
                write: false
            }]
        );
    }

    #[test]
    fn read_and_write_owners_are_independent() {
        let arb = arbitrate([
            (0, claim(InhibitMode::Write, 0xD000, 0xDFFF)),
            (2, claim(InhibitMode::Read, 0xD000, 0xDFFF)),
        ]);
        let region = arb.map.region_at(0xD123).unwrap();
        assert_eq!(region.read, Some(2));
        assert_eq!(region.write, Some(0));
        assert!(arb.suppressed.is_empty());
    }

    #[test]
    fn adjacent_equal_regions_merge() {
        let arb = arbitrate([
            (1, claim(InhibitMode::Read, 0x1000, 0x1FFF)),
            (1, claim(InhibitMode::Read, 0x2000, 0x2FFF)),
        ]);
        assert_eq!(arb.map.regions().len(), 1);
        assert_eq!(arb.map.regions()[0].end, 0x2FFF);
    }

    #[test]
    fn claim_reaching_top_of_memory() {
        let arb = arbitrate([(0, claim(InhibitMode::ReadWrite, 0xFFFF, 0xFFFF))]);
        assert_eq!(arb.map.read_owner(0xFFFF), Some(0));
        assert_eq!(arb.map.read_owner(0xFFFE), None);
    }

    #[test]
    fn changes_restore_then_redirect() {
        let old = arbitrate([(1, claim(InhibitMode::Read, 0xD000, 0xFFFF))]).map;
        let new = arbitrate([(2, claim(InhibitMode::Read, 0xD000, 0xFFFF))]).map;
        let diff = changes(&old, &new);
        assert_eq!(diff.len(), 2);
        assert_eq!(
            diff[0],
            OverlayChange::Restore {
                start: 0xD000,
                end: 0xFFFF
            }
        );
        assert!(matches!(diff[1], OverlayChange::Redirect(r) if r.read == Some(2)));
        assert!(changes(&new, &new).is_empty());
    }
}
