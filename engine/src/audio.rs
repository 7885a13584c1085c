use log::*;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Fire-and-forget playback of sounds registered by name.
pub trait SoundSink {
    fn play_sound(&mut self, name: &str);
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to create sink: {0}")]
    Sink(#[from] rodio::PlayError),
    #[error("Failed to decode audio: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),
}

/// Sounds kept in memory and decoded on every play. Without an output device
/// it accepts registrations and plays nothing.
pub struct SoundBank {
    sounds: HashMap<String, Arc<[u8]>>,
    stream_handle: Option<OutputStreamHandle>,
    // Dropping the stream stops all playback.
    _output_stream: Option<OutputStream>,
}

impl SoundBank {
    pub fn new() -> SoundBank {
        let (output_stream, stream_handle) = match OutputStream::try_default() {
            Ok((stream, handle)) => (Some(stream), Some(handle)),
            Err(error) => {
                warn!("No audio output ({}); running silent.", error);
                (None, None)
            }
        };

        SoundBank {
            sounds: HashMap::new(),
            stream_handle,
            _output_stream: output_stream,
        }
    }

    /// A bank that never opens an output device.
    pub fn silent() -> SoundBank {
        SoundBank {
            sounds: HashMap::new(),
            stream_handle: None,
            _output_stream: None,
        }
    }

    /// Loads `path` under `name`. A missing file only costs that sound.
    pub fn register(&mut self, name: &str, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => {
                debug!("Registered sound `{}` ({}).", name, path.display());
                self.sounds.insert(name.to_string(), bytes.into());
            }
            Err(error) => warn!("Could not load sound `{}` ({}): {}", name, path.display(), error),
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.sounds.contains_key(name)
    }

    fn play(&self, handle: &OutputStreamHandle, data: Arc<[u8]>) -> Result<(), AudioError> {
        let sink = Sink::try_new(handle)?;
        sink.append(Decoder::new(Cursor::new(data))?);
        sink.detach();
        Ok(())
    }
}

impl Default for SoundBank {
    fn default() -> Self {
        SoundBank::new()
    }
}

impl SoundSink for SoundBank {
    fn play_sound(&mut self, name: &str) {
        let Some(data) = self.sounds.get(name).cloned() else {
            warn!("Sound `{}` is not registered.", name);
            return;
        };
        if let Some(handle) = &self.stream_handle {
            if let Err(error) = self.play(handle, data) {
                warn!("Could not play `{}`: {}", name, error);
            }
        }
    }
}
