//! Probe tiling over an ordered region stream.
//!
//! Regions at least one oligo long are tiled on their own. A shorter region
//! is held back: if the next region on the same chromosome starts within
//! the bubble gap, oligos are laid over the pair as if the gap were not
//! there ("bridge" probes with two blocks). Otherwise the held region is
//! force-designed or dropped depending on configuration.

use crate::config::TilerConfig;
use crate::error::{Result, TilerError};
use crate::interval::{Interval, Region};
use crate::names::NameTable;
use crate::probe::ProbeRecord;
use crate::reference::SequenceSource;
use crate::store::IntervalStore;
use log::debug;
use std::fmt;

/// Cursor over the region stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilerState {
    AwaitFirst,
    /// Last region was tiled (or bridged); nothing is held.
    InChrom { chrom_id: usize, last_end: u32 },
    /// Last region was shorter than one oligo and waits for a bridge.
    PendingBridge { chrom_id: usize, pending: Interval },
    Done,
}

impl TilerState {
    /// Chromosome and end of the previously consumed region.
    fn last(&self) -> Option<(usize, u32)> {
        match *self {
            TilerState::InChrom { chrom_id, last_end } => Some((chrom_id, last_end)),
            TilerState::PendingBridge { chrom_id, pending } => Some((chrom_id, pending.end)),
            TilerState::AwaitFirst | TilerState::Done => None,
        }
    }
}

/// Counters of one tiling run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TilerStats {
    /// Regions tiled on their own
    pub regions_tiled: u64,
    /// Short regions bridged to their successor
    pub regions_bridged: u64,
    /// Short regions designed without a bridge partner
    pub regions_forced: u64,
    /// Short regions left without probes
    pub regions_dropped: u64,
    /// Probes emitted
    pub probes: u64,
    /// Placements dropped on a short reference fetch
    pub placements_skipped: u64,
}

impl fmt::Display for TilerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Probes: {}, Tiled: {}, Bridged: {}, Forced: {}, Dropped: {}",
            self.probes,
            self.regions_tiled,
            self.regions_bridged,
            self.regions_forced,
            self.regions_dropped
        )
    }
}

/// Placement plan for a stretch of `len` bases.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Layout {
    oligo_length: u32,
    /// Fractional oligo count; placements run over `0..ceil(parts)`
    parts: f32,
    spacing: u32,
}

impl Layout {
    fn new(config: &TilerConfig, len: u32) -> Self {
        let oligo_length = config.oligo_length.resolve(len);
        let parts = if len < oligo_length {
            config.depth
        } else {
            (len / oligo_length) as f32 * config.depth
        };
        let spacing = (len as f32 / parts) as u32;
        Self {
            oligo_length,
            parts,
            spacing,
        }
    }

    #[inline]
    fn count(&self) -> u32 {
        self.parts.ceil() as u32
    }

    /// Shift that centres each oligo on its share of the region.
    #[inline]
    fn offset(&self) -> u32 {
        if self.spacing < self.oligo_length {
            (self.oligo_length - self.spacing) / 2
        } else {
            0
        }
    }
}

/// Tiles the regions of a store into probes.
pub struct ProbeTiler<S: SequenceSource> {
    config: TilerConfig,
    reference: S,
    state: TilerState,
    stats: TilerStats,
}

impl<S: SequenceSource> ProbeTiler<S> {
    pub fn new(config: TilerConfig, reference: S) -> Self {
        Self {
            config,
            reference,
            state: TilerState::AwaitFirst,
            stats: TilerStats::default(),
        }
    }

    pub fn config(&self) -> &TilerConfig {
        &self.config
    }

    pub fn state(&self) -> TilerState {
        self.state
    }

    pub fn stats(&self) -> TilerStats {
        self.stats
    }

    /// Tile every merged region of `store`, handing each probe to `emit` in
    /// output order.
    pub fn run<F>(&mut self, store: &mut IntervalStore, mut emit: F) -> Result<TilerStats>
    where
        F: FnMut(ProbeRecord) -> Result<()>,
    {
        store.merge();
        self.state = TilerState::AwaitFirst;
        self.stats = TilerStats::default();

        let names = store.names();
        for region in store.iter() {
            self.step(region, names, &mut emit)?;
        }
        self.finish(names, &mut emit)?;

        Ok(self.stats)
    }

    /// Tile `store` and collect the probes.
    pub fn design(&mut self, store: &mut IntervalStore) -> Result<Vec<ProbeRecord>> {
        let mut probes = Vec::new();
        self.run(store, |probe| {
            probes.push(probe);
            Ok(())
        })?;
        Ok(probes)
    }

    /// Consume one region.
    pub fn step<F>(&mut self, region: Region, names: &NameTable, emit: &mut F) -> Result<()>
    where
        F: FnMut(ProbeRecord) -> Result<()>,
    {
        let mut current = region.interval();

        // Upstream data may not be fully merged
        if let Some((chrom_id, last_end)) = self.state.last() {
            if chrom_id == region.chrom_id && current.start < last_end {
                current.start = last_end;
                if current.is_empty() {
                    return Ok(());
                }
            }
        }

        let chrom = names.name(region.chrom_id).unwrap_or_default();

        if let TilerState::PendingBridge { chrom_id, pending } = self.state {
            let pending_chrom = names.name(chrom_id).unwrap_or_default();
            if chrom_id != region.chrom_id {
                self.resolve_pending(pending_chrom, pending, emit)?;
            } else {
                let gap = current.start - pending.end;
                if gap > self.config.max_bubble_gap
                    || !self.bridge_design(chrom, pending, current, emit)?
                {
                    self.resolve_pending(pending_chrom, pending, emit)?;
                }
            }
        }

        self.state = if current.len() >= self.config.oligo_length.shortest() {
            self.tile_design(chrom, current, emit)?;
            self.stats.regions_tiled += 1;
            TilerState::InChrom {
                chrom_id: region.chrom_id,
                last_end: current.end,
            }
        } else {
            TilerState::PendingBridge {
                chrom_id: region.chrom_id,
                pending: current,
            }
        };
        Ok(())
    }

    /// End of stream: settle any held region.
    pub fn finish<F>(&mut self, names: &NameTable, emit: &mut F) -> Result<()>
    where
        F: FnMut(ProbeRecord) -> Result<()>,
    {
        if let TilerState::PendingBridge { chrom_id, pending } = self.state {
            let chrom = names.name(chrom_id).unwrap_or_default();
            self.resolve_pending(chrom, pending, emit)?;
        }
        self.state = TilerState::Done;
        Ok(())
    }

    fn resolve_pending<F>(&mut self, chrom: &str, pending: Interval, emit: &mut F) -> Result<()>
    where
        F: FnMut(ProbeRecord) -> Result<()>,
    {
        if self.config.force_design {
            self.tile_design(chrom, pending, emit)?;
            self.stats.regions_forced += 1;
        } else {
            debug!(
                "No probes for short region {}:{}-{}",
                chrom, pending.start, pending.end
            );
            self.stats.regions_dropped += 1;
        }
        Ok(())
    }

    fn emit_probe<F>(&mut self, probe: ProbeRecord, emit: &mut F) -> Result<()>
    where
        F: FnMut(ProbeRecord) -> Result<()>,
    {
        self.stats.probes += 1;
        emit(probe)
    }

    /// Evenly spaced oligos over one region.
    ///
    /// A region shorter than one oligo (forced design) gets its first half of
    /// oligos anchored at its start and the rest ending at its end.
    fn tile_design<F>(&mut self, chrom: &str, region: Interval, emit: &mut F) -> Result<()>
    where
        F: FnMut(ProbeRecord) -> Result<()>,
    {
        let len = region.len();
        let layout = Layout::new(&self.config, len);
        let oligo_length = layout.oligo_length;
        let offset = layout.offset();
        debug!(
            "{}:{}-{}\toligo: {}\tn_parts: {}\tspacing: {}\toffset: {}",
            chrom, region.start, region.end, oligo_length, layout.parts, layout.spacing, offset
        );

        for i in 0..layout.count() {
            let (start, rank) = if len < oligo_length {
                if (i as f32) < layout.parts / 2.0 {
                    (region.start, 0)
                } else {
                    (region.end.saturating_sub(oligo_length), 0)
                }
            } else {
                let tentative = i64::from(region.start) + i64::from(i * layout.spacing)
                    - i64::from(offset);
                let lo = i64::from(region.start);
                let hi = i64::from(region.end - oligo_length);
                let start = tentative.clamp(lo, hi);
                (start as u32, u8::from(start == tentative))
            };

            let end = start + oligo_length;
            let sequence = self.reference.fetch(chrom, start, end)?;
            if sequence.len() < oligo_length as usize {
                debug!("Short fetch at {}:{}-{}, placement skipped", chrom, start, end);
                self.stats.placements_skipped += 1;
                continue;
            }

            let probe = ProbeRecord::new(
                chrom,
                vec![Interval::new(start, end)],
                oligo_length,
                sequence,
                rank,
            )?;
            self.emit_probe(probe, emit)?;
        }
        Ok(())
    }

    /// Oligos laid over `pending` and `next` as one virtual sequence.
    ///
    /// Returns false without emitting anything when the pair is shorter than
    /// one oligo.
    fn bridge_design<F>(
        &mut self,
        chrom: &str,
        pending: Interval,
        next: Interval,
        emit: &mut F,
    ) -> Result<bool>
    where
        F: FnMut(ProbeRecord) -> Result<()>,
    {
        let head = pending.len();
        let combined = head + next.len();
        let layout = Layout::new(&self.config, combined);
        let oligo_length = layout.oligo_length;

        if head >= oligo_length {
            return Err(TilerError::BridgePrecondition {
                chrom: chrom.to_string(),
                start: pending.start,
                end: pending.end,
                oligo_length,
            });
        }
        if combined < oligo_length {
            return Ok(false);
        }
        debug!(
            "bridge {}:{}-{} + {}-{}\toligo: {}\tn_parts: {}\tspacing: {}",
            chrom,
            pending.start,
            pending.end,
            next.start,
            next.end,
            oligo_length,
            layout.parts,
            layout.spacing
        );

        let last_offset = combined - oligo_length;
        for i in 0..layout.count() {
            let wanted = i * layout.spacing;
            let virtual_start = wanted.min(last_offset);
            let rank = u8::from(virtual_start == wanted);

            if virtual_start >= head {
                // Entirely inside the next region
                let start = next.start + (virtual_start - head);
                let end = start + oligo_length;
                let sequence = self.reference.fetch(chrom, start, end)?;
                if sequence.len() < oligo_length as usize {
                    self.stats.placements_skipped += 1;
                    continue;
                }
                let probe = ProbeRecord::new(
                    chrom,
                    vec![Interval::new(start, end)],
                    oligo_length,
                    sequence,
                    rank,
                )?;
                self.emit_probe(probe, emit)?;
                continue;
            }

            let left = Interval::new(pending.start + virtual_start, pending.end);
            let right = Interval::new(next.start, next.start + oligo_length - left.len());
            let mut sequence = self.reference.fetch(chrom, left.start, left.end)?;
            sequence.extend(self.reference.fetch(chrom, right.start, right.end)?);

            if sequence.len() != oligo_length as usize {
                return Err(TilerError::BridgeLength {
                    chrom: chrom.to_string(),
                    start: left.start,
                    end: right.end,
                    expected: oligo_length,
                    actual: sequence.len(),
                    blocks: format!("{},{}", left, right),
                });
            }

            let probe = ProbeRecord::new(chrom, vec![left, right], oligo_length, sequence, rank)?;
            self.emit_probe(probe, emit)?;
        }

        self.stats.regions_bridged += 1;
        Ok(true)
    }
}
