//! Audio sources: whole files decoded to mono, and a push-driven stream for
//! live capture.

use crate::error::{Result, SonoscopeError};
use crate::types::AudioSamples;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// A source that yields one complete buffer.
pub trait AudioInput {
    fn is_supported(&self) -> bool;
    fn load_audio(&mut self) -> Result<AudioSamples>;
}

/// A source that delivers chunks to listeners while running.
pub trait AudioStream {
    fn is_supported(&self) -> bool;
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
    fn add_listener(&mut self, listener: Box<dyn FnMut(&AudioSamples)>) -> ListenerId;
    fn remove_listener(&mut self, id: ListenerId) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// In-memory audio file. Decoding happens on [`AudioInput::load_audio`].
#[derive(Clone, Debug, Default)]
pub struct FileAudioInput {
    file: Option<(String, Vec<u8>)>,
}

impl FileAudioInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_file(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.file = Some((name.into(), bytes));
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file.as_ref().map(|(name, _)| name.as_str())
    }
}

impl AudioInput for FileAudioInput {
    fn is_supported(&self) -> bool {
        true
    }

    fn load_audio(&mut self) -> Result<AudioSamples> {
        let (name, bytes) = self
            .file
            .as_ref()
            .ok_or_else(|| SonoscopeError::Decode("No file selected".into()))?;
        let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        let audio = decode_audio(bytes, extension.as_deref())?;
        log::info!(
            "Loaded {}: {} samples at {} Hz ({:.2}s)",
            name,
            audio.len(),
            audio.sample_rate(),
            audio.duration_secs()
        );
        Ok(audio)
    }
}

/// Decode WAV, FLAC or any symphonia-supported container to mono.
/// `extension` only guides format probing.
pub fn decode_audio(bytes: &[u8], extension: Option<&str>) -> Result<AudioSamples> {
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return decode_wav(bytes);
    }
    if bytes.starts_with(b"fLaC") {
        return decode_flac(bytes);
    }
    decode_with_symphonia(bytes, extension)
}

/// Average interleaved frames into one channel.
pub fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn decode_wav(bytes: &[u8]) -> Result<AudioSamples> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| SonoscopeError::Decode(format!("WAV: {e}")))?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| SonoscopeError::Decode(format!("WAV: {e}")))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| SonoscopeError::Decode(format!("WAV: {e}")))?
        }
    };
    AudioSamples::new(mix_to_mono(&interleaved, spec.channels as usize), spec.sample_rate)
}

fn decode_flac(bytes: &[u8]) -> Result<AudioSamples> {
    let mut reader = claxon::FlacReader::new(Cursor::new(bytes))
        .map_err(|e| SonoscopeError::Decode(format!("FLAC: {e}")))?;
    let info = reader.streaminfo();
    let scale = 1.0 / (1u64 << (info.bits_per_sample.max(1) - 1)) as f32;
    let interleaved: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 * scale))
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| SonoscopeError::Decode(format!("FLAC: {e}")))?;
    AudioSamples::new(mix_to_mono(&interleaved, info.channels as usize), info.sample_rate)
}

fn decode_with_symphonia(bytes: &[u8], extension: Option<&str>) -> Result<AudioSamples> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SonoscopeError::Decode(format!("unrecognised audio format: {e}")))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SonoscopeError::Decode("no audio track".into()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SonoscopeError::Decode("unknown sample rate".into()))?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SonoscopeError::Decode(format!("unsupported codec: {e}")))?;

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(SonoscopeError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(SonoscopeError::Decode(e.to_string())),
        };
        let spec = *decoded.spec();
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        mono.extend(mix_to_mono(buffer.samples(), spec.channels.count()));
    }
    AudioSamples::new(mono, sample_rate)
}

type Listener = Box<dyn FnMut(&AudioSamples)>;

/// Push-driven live source. A capture backend calls [`StreamingInput::push_chunk`]
/// with each block; chunks are dropped while the stream is stopped.
pub struct StreamingInput {
    sample_rate: u32,
    running: bool,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl StreamingInput {
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SonoscopeError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            sample_rate,
            running: false,
            listeners: Vec::new(),
            next_listener: 0,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Deliver one mono chunk to every listener. Returns false if the chunk
    /// was dropped.
    pub fn push_chunk(&mut self, samples: Vec<f32>) -> Result<bool> {
        if !self.running || samples.is_empty() {
            return Ok(false);
        }
        let chunk = AudioSamples::new(samples, self.sample_rate)?;
        for (_, listener) in self.listeners.iter_mut() {
            listener(&chunk);
        }
        Ok(true)
    }
}

impl AudioStream for StreamingInput {
    fn is_supported(&self) -> bool {
        true
    }

    fn start(&mut self) -> Result<()> {
        if !self.running {
            self.running = true;
            log::info!("Streaming input started at {} Hz", self.sample_rate);
        }
        Ok(())
    }

    fn stop(&mut self) {
        if self.running {
            self.running = false;
            log::info!("Streaming input stopped");
        }
    }

    fn add_listener(&mut self, listener: Listener) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, listener));
        id
    }

    fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn wav_bytes(channels: u16, frames: &[[i16; 2]]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for frame in frames {
                for &s in &frame[..channels as usize] {
                    writer.write_sample(s).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn stereo_wav_is_averaged_to_mono() {
        let bytes = wav_bytes(2, &[[16384, 0], [-16384, -16384], [0, 32767]]);
        let audio = decode_audio(&bytes, Some("wav")).unwrap();
        assert_eq!(audio.sample_rate(), 8000);
        assert_eq!(audio.len(), 3);
        assert!((audio.samples()[0] - 0.25).abs() < 1e-6);
        assert!((audio.samples()[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn mono_wav_passes_through() {
        let bytes = wav_bytes(1, &[[8192, 0], [-8192, 0]]);
        let audio = decode_audio(&bytes, None).unwrap();
        assert_eq!(audio.samples(), &[0.25, -0.25]);
    }

    #[test]
    fn file_input_requires_a_file() {
        let mut input = FileAudioInput::new();
        assert_eq!(
            input.load_audio().unwrap_err(),
            SonoscopeError::Decode("No file selected".into())
        );
        input.set_file("clip.WAV", wav_bytes(1, &[[0, 0]; 10]));
        assert_eq!(input.file_name(), Some("clip.WAV"));
        assert_eq!(input.load_audio().unwrap().len(), 10);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode_audio(b"definitely not audio", Some("mp3")),
            Err(SonoscopeError::Decode(_))
        ));
    }

    #[test]
    fn mixdown_handles_odd_channel_counts() {
        assert_eq!(mix_to_mono(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3), vec![2.0, 5.0]);
        assert_eq!(mix_to_mono(&[1.0, 2.0], 1), vec![1.0, 2.0]);
    }

    #[test]
    fn stream_delivers_only_while_running() {
        let mut stream = StreamingInput::new(48000).unwrap();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        let id = stream.add_listener(Box::new(move |chunk: &AudioSamples| sink.borrow_mut().push(chunk.len())));

        assert!(!stream.push_chunk(vec![0.0; 128]).unwrap());
        stream.start().unwrap();
        assert!(stream.push_chunk(vec![0.0; 128]).unwrap());
        assert!(stream.push_chunk(vec![0.0; 64]).unwrap());
        stream.stop();
        assert!(!stream.push_chunk(vec![0.0; 32]).unwrap());
        assert_eq!(*received.borrow(), vec![128, 64]);

        assert!(stream.remove_listener(id));
        assert!(!stream.remove_listener(id));
        stream.start().unwrap();
        stream.push_chunk(vec![0.0; 16]).unwrap();
        assert_eq!(received.borrow().len(), 2);
    }

    #[test]
    fn stream_rejects_zero_rate() {
        assert!(StreamingInput::new(0).is_err());
    }
}
