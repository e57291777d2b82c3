//! External device surface.
//!
//! The engine is handed a flat device list at initialize time. Audio
//! devices carry a cycle-sized buffer the `audio_in`/`audio_out` procs
//! read and write; MIDI input devices share one ordered per-cycle message
//! queue (so arrival order across devices is preserved) and MIDI output
//! goes through a per-device send hook. The engine never drives hardware
//! itself - the caller services the device buffers around each cycle.
//!
//! For offline runs a WAV-file device pair is provided: a feeder that
//! refills an input device from a WAV file each cycle, and a writer that
//! accumulates an output device into a WAV file.

use crate::buffer::AudioBuf;
use crate::error::{Error, Result};
use crate::midi::ChMsg;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Audio,
    Midi,
    Serial,
    Socket,
}

pub type MidiSendFn = Rc<RefCell<dyn FnMut(&ChMsg)>>;

pub struct ExternalDevice {
    pub label: String,
    pub kind: DeviceKind,
    pub in_fl: bool,
    pub out_fl: bool,
    /// Cycle-sized sample buffer (audio devices).
    pub abuf: Option<Rc<RefCell<AudioBuf>>>,
    /// Consolidated per-cycle MIDI input queue, shared by every MIDI
    /// input device so message order is maintained across devices.
    pub midi_q: Option<Rc<RefCell<Vec<ChMsg>>>>,
    /// Largest queue length the feeder will ever publish.
    pub midi_max_n: usize,
    /// Outgoing message hook (MIDI output devices).
    pub midi_send: Option<MidiSendFn>,
}

impl ExternalDevice {
    pub fn audio_in(label: &str, srate: f64, ch_n: usize, frame_n: usize) -> Self {
        Self {
            label: label.to_string(),
            kind: DeviceKind::Audio,
            in_fl: true,
            out_fl: false,
            abuf: Some(AudioBuf::new(srate, ch_n, frame_n).shared()),
            midi_q: None,
            midi_max_n: 0,
            midi_send: None,
        }
    }

    pub fn audio_out(label: &str, srate: f64, ch_n: usize, frame_n: usize) -> Self {
        Self {
            label: label.to_string(),
            kind: DeviceKind::Audio,
            in_fl: false,
            out_fl: true,
            abuf: Some(AudioBuf::new(srate, ch_n, frame_n).shared()),
            midi_q: None,
            midi_max_n: 0,
            midi_send: None,
        }
    }

    pub fn midi_in(label: &str, queue: Rc<RefCell<Vec<ChMsg>>>, max_n: usize) -> Self {
        Self {
            label: label.to_string(),
            kind: DeviceKind::Midi,
            in_fl: true,
            out_fl: false,
            abuf: None,
            midi_q: Some(queue),
            midi_max_n: max_n,
            midi_send: None,
        }
    }

    pub fn midi_out(label: &str, send: MidiSendFn) -> Self {
        Self {
            label: label.to_string(),
            kind: DeviceKind::Midi,
            in_fl: false,
            out_fl: true,
            abuf: None,
            midi_q: None,
            midi_max_n: 0,
            midi_send: Some(send),
        }
    }

    /// Clone for a cross-fade inner network: audio devices get their own
    /// buffer of the same shape, MIDI queues and send hooks are shared.
    pub fn clone_for_subnet(&self) -> Self {
        Self {
            label: self.label.clone(),
            kind: self.kind,
            in_fl: self.in_fl,
            out_fl: self.out_fl,
            abuf: self.abuf.as_ref().map(|b| {
                let b = b.borrow();
                AudioBuf::new(b.srate, b.ch_n, b.frame_n).shared()
            }),
            midi_q: self.midi_q.clone(),
            midi_max_n: self.midi_max_n,
            midi_send: self.midi_send.clone(),
        }
    }
}

impl std::fmt::Debug for ExternalDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalDevice")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("in_fl", &self.in_fl)
            .field("out_fl", &self.out_fl)
            .finish()
    }
}

/// Feeds an audio input device from a WAV file, one cycle per call.
pub struct WavInFeeder {
    /// De-interleaved channel-major samples.
    chans: Vec<Vec<f32>>,
    pos: usize,
    abuf: Rc<RefCell<AudioBuf>>,
}

impl WavInFeeder {
    /// Open `path` and build the matching input device.
    pub fn open(label: &str, path: &Path, frame_n: usize) -> Result<(Self, ExternalDevice)> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let ch_n = spec.channels as usize;
        let mut chans = vec![Vec::new(); ch_n];

        match spec.sample_format {
            hound::SampleFormat::Float => {
                for (i, s) in reader.samples::<f32>().enumerate() {
                    chans[i % ch_n].push(s?);
                }
            }
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                for (i, s) in reader.samples::<i32>().enumerate() {
                    chans[i % ch_n].push(s? as f32 * scale);
                }
            }
        }

        let dev = ExternalDevice::audio_in(label, spec.sample_rate as f64, ch_n, frame_n);
        let abuf = Rc::clone(dev.abuf.as_ref().unwrap());
        Ok((Self { chans, pos: 0, abuf }, dev))
    }

    /// Copy the next cycle of samples into the device buffer, zero-padding
    /// the tail. Returns false once the file is exhausted.
    pub fn fill_next(&mut self) -> bool {
        let mut buf = self.abuf.borrow_mut();
        let frame_n = buf.frame_n;
        if self.pos >= self.chans.first().map_or(0, Vec::len) {
            buf.zero();
            return false;
        }
        for (ch, data) in self.chans.iter().enumerate() {
            let dst = buf.channel_mut(ch);
            for i in 0..frame_n {
                dst[i] = data.get(self.pos + i).copied().unwrap_or(0.0);
            }
        }
        self.pos += frame_n;
        true
    }
}

/// Accumulates an audio output device into a WAV file.
pub struct WavOutWriter {
    abuf: Rc<RefCell<AudioBuf>>,
    /// Interleaved accumulation.
    samples: Vec<f32>,
    ch_n: usize,
    srate: u32,
}

impl WavOutWriter {
    pub fn new(dev: &ExternalDevice) -> Result<Self> {
        let abuf = dev
            .abuf
            .as_ref()
            .ok_or_else(|| Error::invalid_arg(format!("'{}' is not an audio device", dev.label)))?;
        let (ch_n, srate) = {
            let b = abuf.borrow();
            (b.ch_n, b.srate as u32)
        };
        Ok(Self { abuf: Rc::clone(abuf), samples: Vec::new(), ch_n, srate })
    }

    /// Append the device buffer's current cycle.
    pub fn append_cycle(&mut self) {
        let buf = self.abuf.borrow();
        for i in 0..buf.frame_n {
            for ch in 0..buf.ch_n {
                self.samples.push(buf.channel(ch)[i]);
            }
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: self.ch_n as u16,
            sample_rate: self.srate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut w = hound::WavWriter::create(path, spec)?;
        for s in &self.samples {
            w.write_sample(*s)?;
        }
        w.finalize()?;
        Ok(())
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_round_trip_through_devices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        // write a short ramp
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut w = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..128 {
            w.write_sample(i as f32 / 128.0).unwrap();
        }
        w.finalize().unwrap();

        let (mut feeder, dev) = WavInFeeder::open("main", &path, 64).unwrap();
        assert!(feeder.fill_next());
        let first = dev.abuf.as_ref().unwrap().borrow().channel(0)[1];
        assert!((first - 1.0 / 128.0).abs() < 1e-6);
        assert!(feeder.fill_next());
        assert!(!feeder.fill_next()); // exhausted
    }

    #[test]
    fn test_clone_for_subnet_has_private_audio_buffer() {
        let dev = ExternalDevice::audio_out("main", 48000.0, 2, 64);
        let clone = dev.clone_for_subnet();
        dev.abuf.as_ref().unwrap().borrow_mut().channel_mut(0)[0] = 1.0;
        assert_eq!(clone.abuf.as_ref().unwrap().borrow().channel(0)[0], 0.0);
    }
}
