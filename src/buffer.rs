//! Buffer types carried by variables: audio, spectral, MIDI and record.
//!
//! Buffers are owned by the proc that produces them and shared with
//! consumers through `Rc<RefCell<..>>` handles inside [`Value`]
//! (crate::value::Value). Ownership never transfers through the graph:
//! a consumer that wants to keep data past the current cycle must copy it.
//!
//! Audio storage is channel-major: channel 0 occupies samples
//! `0..frame_n`, channel 1 `frame_n..2*frame_n`, and so on. Every audio
//! buffer in a network has the same frame count per cycle.

use crate::error::{Error, Result};
use crate::midi::ChMsg;
use crate::record::{Record, RecordType};
use std::cell::RefCell;
use std::rc::Rc;

pub type Sample = f32;

/// Interleaving-free multi-channel sample block.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuf {
    pub srate: f64,
    pub ch_n: usize,
    pub frame_n: usize,
    /// `buf[ch * frame_n + i]` is frame `i` of channel `ch`.
    pub buf: Vec<Sample>,
}

impl AudioBuf {
    pub fn new(srate: f64, ch_n: usize, frame_n: usize) -> Self {
        Self { srate, ch_n, frame_n, buf: vec![0.0; ch_n * frame_n] }
    }

    pub fn channel(&self, ch: usize) -> &[Sample] {
        &self.buf[ch * self.frame_n..(ch + 1) * self.frame_n]
    }

    pub fn channel_mut(&mut self, ch: usize) -> &mut [Sample] {
        &mut self.buf[ch * self.frame_n..(ch + 1) * self.frame_n]
    }

    pub fn zero(&mut self) {
        self.buf.fill(0.0);
    }

    /// Copy as many channels/frames as both buffers share.
    pub fn copy_from(&mut self, src: &AudioBuf) {
        let ch_n = self.ch_n.min(src.ch_n);
        let frame_n = self.frame_n.min(src.frame_n);
        for ch in 0..ch_n {
            self.channel_mut(ch)[..frame_n].copy_from_slice(&src.channel(ch)[..frame_n]);
        }
    }

    pub fn shared(self) -> Rc<RefCell<AudioBuf>> {
        Rc::new(RefCell::new(self))
    }
}

/// One channel of a spectral (phase-vocoder) frame stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralCh {
    pub max_bin_n: usize,
    pub bin_n: usize,
    pub hop_smp_n: usize,
    pub mag: Vec<Sample>,
    pub phs: Vec<Sample>,
    pub hz: Vec<Sample>,
    /// Set by the analysis side when a full frame is available; consumers
    /// must handle both states because the hop rate and the audio cycle
    /// rate are not locked.
    pub ready: bool,
}

/// Spectral buffer: per-channel mag/phase/hz vectors sized to the current
/// bin count, which may never exceed the allocated maximum.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralBuf {
    pub srate: f64,
    pub chans: Vec<SpectralCh>,
}

impl SpectralBuf {
    pub fn new(
        srate: f64,
        ch_n: usize,
        max_bin_n: usize,
        bin_n: usize,
        hop_smp_n: usize,
    ) -> Result<Self> {
        if bin_n > max_bin_n {
            return Err(Error::invalid_arg(format!(
                "spectral bin count {bin_n} exceeds the maximum {max_bin_n}"
            )));
        }
        let ch = SpectralCh {
            max_bin_n,
            bin_n,
            hop_smp_n,
            mag: vec![0.0; bin_n],
            phs: vec![0.0; bin_n],
            hz: vec![0.0; bin_n],
            ready: false,
        };
        Ok(Self { srate, chans: vec![ch; ch_n] })
    }

    pub fn ch_n(&self) -> usize {
        self.chans.len()
    }

    /// Resize a channel's current bin count within the allocated maximum.
    pub fn set_bin_n(&mut self, ch: usize, bin_n: usize) -> Result<()> {
        let c = self
            .chans
            .get_mut(ch)
            .ok_or_else(|| Error::invalid_arg(format!("spectral channel {ch} out of range")))?;
        if bin_n > c.max_bin_n {
            return Err(Error::invalid_arg(format!(
                "spectral bin count {bin_n} exceeds the maximum {}",
                c.max_bin_n
            )));
        }
        c.bin_n = bin_n;
        c.mag.resize(bin_n, 0.0);
        c.phs.resize(bin_n, 0.0);
        c.hz.resize(bin_n, 0.0);
        Ok(())
    }

    pub fn shared(self) -> Rc<RefCell<SpectralBuf>> {
        Rc::new(RefCell::new(self))
    }
}

/// Per-cycle MIDI message window. The producer refills `msgs` each cycle;
/// the payload is borrowed for the cycle only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MidiBuf {
    pub msgs: Vec<ChMsg>,
}

impl MidiBuf {
    pub fn shared(self) -> Rc<RefCell<MidiBuf>> {
        Rc::new(RefCell::new(self))
    }
}

/// Per-cycle record message window. Like [`MidiBuf`], the producer refills
/// `recds` each cycle; `max_recd_n` is the largest count the producer will
/// ever publish for the life of the network, so consumers can preallocate.
#[derive(Debug, Clone)]
pub struct RecordBuf {
    pub rtype: Rc<RecordType>,
    pub recds: Vec<Record>,
    pub max_recd_n: usize,
}

impl RecordBuf {
    pub fn new(rtype: Rc<RecordType>, max_recd_n: usize) -> Self {
        Self { rtype, recds: Vec::with_capacity(max_recd_n), max_recd_n }
    }

    pub fn shared(self) -> Rc<RefCell<RecordBuf>> {
        Rc::new(RefCell::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abuf_channel_major_layout() {
        let mut b = AudioBuf::new(48000.0, 2, 4);
        b.channel_mut(1)[2] = 0.5;
        assert_eq!(b.buf[1 * 4 + 2], 0.5);
        assert_eq!(b.channel(0), &[0.0; 4]);
    }

    #[test]
    fn test_abuf_copy_from_clips_to_common_shape() {
        let mut src = AudioBuf::new(48000.0, 2, 4);
        src.channel_mut(0).fill(1.0);
        src.channel_mut(1).fill(2.0);

        let mut dst = AudioBuf::new(48000.0, 1, 2);
        dst.copy_from(&src);
        assert_eq!(dst.channel(0), &[1.0, 1.0]);
    }

    #[test]
    fn test_sbuf_bin_count_exceeding_max_rejected() {
        assert!(SpectralBuf::new(48000.0, 1, 16, 17, 64).is_err());
        let mut sb = SpectralBuf::new(48000.0, 1, 16, 16, 64).unwrap();
        assert!(sb.set_bin_n(0, 17).is_err());
        assert!(sb.set_bin_n(0, 8).is_ok());
        assert_eq!(sb.chans[0].mag.len(), 8);
    }
}
