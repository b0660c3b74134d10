use crate::packet::ModulePacket;
use gs2_data::{RawSample, RawScanFrame, MAX_MODULES, SAMPLES_PER_MODULE};

/// A buffered, complete 160-sample frame for one module.
struct ModuleFrame {
    frame: u8,
    samples: [RawSample; SAMPLES_PER_MODULE],
    stamp: u64,
    scan_frequency: f64,
    checksum_ok: bool,
}

/// Buffers partial multi-module frames and emits one logical scan once
/// every participating module has reported the current frame number.
///
/// Each module owns exactly one in-flight slot; a newer frame for the same
/// module evicts the stale one, so memory stays bounded regardless of how
/// modules interleave.
pub(crate) struct Reassembler {
    slots: [Option<ModuleFrame>; MAX_MODULES],
    module_count: usize,
}

impl Reassembler {
    pub(crate) fn new(module_count: usize) -> Self {
        Reassembler {
            slots: [None, None, None],
            module_count: module_count.clamp(1, MAX_MODULES),
        }
    }

    /// Stores a decoded packet. Returns the assembled logical scan when the
    /// packet completes the current frame across all participating modules.
    pub(crate) fn insert(&mut self, packet: ModulePacket) -> Option<RawScanFrame> {
        let index = usize::from(packet.module);
        if index >= self.module_count {
            return None;
        }
        let current = packet.frame;
        self.slots[index] = Some(ModuleFrame {
            frame: packet.frame,
            samples: packet.samples,
            stamp: packet.stamp,
            scan_frequency: packet.scan_frequency,
            checksum_ok: packet.checksum_ok,
        });

        let complete = self.slots[..self.module_count]
            .iter()
            .all(|slot| slot.as_ref().map(|f| f.frame) == Some(current));
        if !complete {
            return None;
        }

        let mut samples = Vec::with_capacity(self.module_count * SAMPLES_PER_MODULE);
        let mut checksum_correct = true;
        let mut stamp = 0;
        let mut scan_frequency = 0.0;
        for frame in self.slots[..self.module_count].iter().flatten() {
            samples.extend_from_slice(&frame.samples);
            checksum_correct &= frame.checksum_ok;
            stamp = stamp.max(frame.stamp);
            scan_frequency = frame.scan_frequency;
        }
        Some(RawScanFrame {
            module: samples.first().map(|s| s.module).unwrap_or(0),
            samples,
            stamp,
            scan_frequency,
            checksum_correct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(module: u8, frame: u8) -> ModulePacket {
        let mut samples = [RawSample::default(); SAMPLES_PER_MODULE];
        for (n, sample) in samples.iter_mut().enumerate() {
            sample.index = n as u8;
            sample.module = module;
            sample.frame = frame;
            sample.distance = 100 + u16::from(module);
        }
        samples[0].sync = true;
        ModulePacket {
            module,
            frame,
            samples,
            checksum_ok: true,
            stamp: u64::from(frame),
            scan_frequency: 10.0,
        }
    }

    #[test]
    fn test_single_module_publishes_every_frame() {
        let mut reassembler = Reassembler::new(1);
        let scan = reassembler.insert(packet(0, 1)).unwrap();
        assert_eq!(scan.samples.len(), SAMPLES_PER_MODULE);
        assert!(reassembler.insert(packet(0, 2)).is_some());
    }

    #[test]
    fn test_waits_for_all_modules() {
        let mut reassembler = Reassembler::new(3);
        assert!(reassembler.insert(packet(0, 1)).is_none());
        assert!(reassembler.insert(packet(1, 1)).is_none());
        let scan = reassembler.insert(packet(2, 1)).unwrap();
        assert_eq!(scan.samples.len(), 3 * SAMPLES_PER_MODULE);
        // Per-module identity is preserved through the sample tags.
        assert_eq!(scan.samples[0].module, 0);
        assert_eq!(scan.samples[SAMPLES_PER_MODULE].module, 1);
        assert_eq!(scan.samples[2 * SAMPLES_PER_MODULE].module, 2);
    }

    #[test]
    fn test_stale_frame_is_evicted() {
        let mut reassembler = Reassembler::new(2);
        assert!(reassembler.insert(packet(0, 1)).is_none());
        // Module 0 advances before module 1 ever reported frame 1; the old
        // entry is superseded, not retained.
        assert!(reassembler.insert(packet(0, 2)).is_none());
        assert!(reassembler.insert(packet(1, 1)).is_none());
        let scan = reassembler.insert(packet(1, 2)).unwrap();
        assert_eq!(scan.samples.len(), 2 * SAMPLES_PER_MODULE);
        assert!(scan.samples.iter().all(|s| s.frame == 2));
    }

    #[test]
    fn test_out_of_range_module_is_ignored() {
        let mut reassembler = Reassembler::new(1);
        assert!(reassembler.insert(packet(2, 1)).is_none());
        assert!(reassembler.insert(packet(0, 1)).is_some());
    }
}
