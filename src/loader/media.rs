use std::fmt::{Display, Formatter};
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::loader::{LoadAdapter, LoadContext, Resource};
use crate::manifest::AssetRequest;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media source is empty")]
    Empty,

    #[error("Unrecognised {0} container")]
    UnknownContainer(MediaKind),

    /// The container holds no track with a known codec.
    #[error("No decodable track")]
    NoTrack,

    #[cfg(feature = "symphonia")]
    #[error("Audio decoding error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => f.write_str("video"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

/// Media container recognised from the leading bytes of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    /// ISO base media: MP4, MOV, M4A.
    Mp4,
    /// Matroska and WebM.
    Matroska,
    Ogg,
    Avi,
    Wave,
    Aiff,
    Caf,
    Flac,
    Mp3,
    Aac,
}

impl Container {
    /// Recognises a container of the given kind.
    ///
    /// Containers that can carry both video and audio (MP4, Matroska, Ogg)
    /// are accepted for either kind.
    pub fn sniff(kind: MediaKind, bytes: &[u8]) -> Option<Self> {
        let container = match bytes {
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => Self::Mp4,
            [0x1A, 0x45, 0xDF, 0xA3, ..] => Self::Matroska,
            [b'O', b'g', b'g', b'S', ..] => Self::Ogg,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'A', b'V', b'I', b' ', ..] => Self::Avi,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Self::Wave,
            [b'F', b'O', b'R', b'M', _, _, _, _, b'A', b'I', b'F', b'F' | b'C', ..] => Self::Aiff,
            [b'c', b'a', b'f', b'f', ..] => Self::Caf,
            [b'f', b'L', b'a', b'C', ..] => Self::Flac,
            [b'I', b'D', b'3', ..] => Self::Mp3,
            // ADTS sync word with layer bits zeroed
            [0xFF, b, ..] if b & 0xF6 == 0xF0 => Self::Aac,
            // MPEG audio frame sync with a valid layer
            [0xFF, b, ..] if b & 0xE0 == 0xE0 && b & 0x06 != 0 => Self::Mp3,
            _ => return None,
        };

        container.carries(kind).then_some(container)
    }

    fn carries(self, kind: MediaKind) -> bool {
        match self {
            Self::Mp4 | Self::Matroska | Self::Ogg => true,
            Self::Avi => kind == MediaKind::Video,
            Self::Wave | Self::Aiff | Self::Caf | Self::Flac | Self::Mp3 | Self::Aac => {
                kind == MediaKind::Audio
            }
        }
    }
}

/// A loaded video or audio stream.
#[derive(Debug, Clone)]
pub struct Media {
    pub kind: MediaKind,
    pub container: Container,
    /// Short codec name of the decoded track, e.g. `pcm_s16le` or `vorbis`.
    pub codec: Option<&'static str>,
    pub sample_rate: Option<u32>,
    pub bytes: Arc<[u8]>,
}

impl Media {
    /// Accepts `bytes` once they are known to hold a stream of `kind`.
    ///
    /// With the `symphonia` feature, audio is probed and the first packet of
    /// its default track decoded; anything that fails to decode is refused.
    /// Video, and audio without the feature, is accepted on its container
    /// signature alone.
    pub fn probe(kind: MediaKind, bytes: Vec<u8>) -> Result<Self, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }

        let bytes: Arc<[u8]> = bytes.into();

        let stream = match kind {
            MediaKind::Audio => decode_audio(&bytes)?,
            MediaKind::Video => StreamInfo::default(),
        };

        let container = Container::sniff(kind, &bytes).ok_or(MediaError::UnknownContainer(kind))?;

        Ok(Self {
            kind,
            container,
            codec: stream.codec,
            sample_rate: stream.sample_rate,
            bytes,
        })
    }
}

#[derive(Debug, Default)]
struct StreamInfo {
    codec: Option<&'static str>,
    sample_rate: Option<u32>,
}

#[cfg(feature = "symphonia")]
fn decode_audio(bytes: &Arc<[u8]>) -> Result<StreamInfo, MediaError> {
    use std::io::Cursor;

    use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.clone())), Default::default());

    let probed = symphonia::default::get_probe().format(
        &Hint::new(),
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut reader = probed.format;

    let track = reader
        .default_track()
        .filter(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(MediaError::NoTrack)?;

    let track_id = track.id;
    let params = track.codec_params.clone();

    let codecs = symphonia::default::get_codecs();
    let mut decoder = codecs.make(&params, &DecoderOptions::default())?;

    // The first packet of the track has to decode.
    loop {
        let packet = reader.next_packet()?;
        if packet.track_id() == track_id {
            decoder.decode(&packet)?;
            break;
        }
    }

    Ok(StreamInfo {
        codec: codecs.get_codec(params.codec).map(|desc| desc.short_name),
        sample_rate: params.sample_rate,
    })
}

#[cfg(not(feature = "symphonia"))]
fn decode_audio(_: &Arc<[u8]>) -> Result<StreamInfo, MediaError> {
    Ok(StreamInfo::default())
}

/// Loads `video` or `audio` assets.
#[derive(Debug, Clone, Copy)]
pub struct MediaAdapter {
    kind: MediaKind,
}

impl MediaAdapter {
    pub fn new(kind: MediaKind) -> Self {
        Self { kind }
    }
}

impl LoadAdapter for MediaAdapter {
    fn load(
        &self,
        request: &AssetRequest,
        ctx: &LoadContext,
    ) -> BoxFuture<'static, anyhow::Result<Resource>> {
        Box::pin(load_media(ctx.clone(), self.kind, request.source.clone()))
    }
}

async fn load_media(ctx: LoadContext, kind: MediaKind, source: String) -> anyhow::Result<Resource> {
    let bytes = ctx.fetch(&source).await?;
    let media = Arc::new(Media::probe(kind, bytes)?);

    Ok(match kind {
        MediaKind::Video => Resource::Video(media),
        MediaKind::Audio => Resource::Audio(media),
    })
}
