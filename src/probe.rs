//! Media probing.
//!
//! [`MediaProbe::probe`] opens a file, identifies its container and streams,
//! chooses the first decodable video stream, and closes the demuxer again
//! before returning. The resulting [`MediaSource`] is a plain value: it owns
//! no native handle, so it can be cloned, logged, and handed to
//! [`DecodeSession::open`](crate::DecodeSession::open), which opens its own
//! fresh context.

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    codec::context::Context as CodecContext, format::stream::Disposition, media::Type,
};

use crate::error::ThumbnailError;

/// The medium carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Video (including embedded cover art).
    Video,
    /// Audio.
    Audio,
    /// Subtitles.
    Subtitle,
    /// Opaque data (timecode tracks and the like).
    Data,
    /// Attachments such as fonts.
    Attachment,
    /// Anything FFmpeg could not classify.
    Unknown,
}

impl From<Type> for StreamKind {
    fn from(medium: Type) -> Self {
        match medium {
            Type::Video => StreamKind::Video,
            Type::Audio => StreamKind::Audio,
            Type::Subtitle => StreamKind::Subtitle,
            Type::Data => StreamKind::Data,
            Type::Attachment => StreamKind::Attachment,
            Type::Unknown => StreamKind::Unknown,
        }
    }
}

/// Description of one stream in a container.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    /// Container-level stream index.
    pub index: usize,
    /// What the stream carries.
    pub kind: StreamKind,
    /// Codec name (e.g. `"h264"`, `"aac"`).
    pub codec: String,
    /// Frame width in pixels (video only, otherwise 0).
    pub width: u32,
    /// Frame height in pixels (video only, otherwise 0).
    pub height: u32,
    /// Decoder output pixel format (video only).
    pub pixel_format: Option<String>,
    /// Stream duration, when the container records one.
    pub duration: Option<Duration>,
    /// `true` for embedded cover art rather than real video.
    pub attached_picture: bool,
    /// `true` when a decoder for this stream could be created.
    pub decodable: bool,
}

/// A probed media file.
///
/// Immutable once probed; owns no native resources.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct MediaSource {
    /// Path of the probed file.
    pub path: PathBuf,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`, `"matroska,webm"`).
    pub format: String,
    /// Total duration. Falls back to the video stream's duration when the
    /// container does not record one, and to zero when neither does.
    pub duration: Duration,
    /// Every stream in the container, in index order.
    pub streams: Vec<StreamDescriptor>,
    /// Container index of the chosen video stream.
    pub video_stream_index: usize,
}

impl MediaSource {
    /// Descriptor of the chosen video stream.
    pub fn video_stream(&self) -> Option<&StreamDescriptor> {
        self.streams
            .iter()
            .find(|stream| stream.index == self.video_stream_index)
    }
}

/// Stateless media prober.
///
/// # Example
///
/// ```no_run
/// use vidthumb::MediaProbe;
///
/// let source = MediaProbe::probe("input.mp4")?;
/// println!("{} lasts {:?}", source.format, source.duration);
/// # Ok::<(), vidthumb::ThumbnailError>(())
/// ```
pub struct MediaProbe;

impl MediaProbe {
    /// Probe a media file.
    ///
    /// # Errors
    ///
    /// - [`ThumbnailError::Io`] if the file cannot be opened for reading.
    /// - [`ThumbnailError::Open`] if the FFmpeg backend failed to initialise.
    /// - [`ThumbnailError::Probe`] if the container is not recognised or no
    ///   decodable video stream exists.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<MediaSource, ThumbnailError> {
        let path = path.as_ref();

        // Distinguish unreadable files from unrecognised containers.
        let file = File::open(path).map_err(|error| ThumbnailError::io(path, error))?;
        let metadata = file
            .metadata()
            .map_err(|error| ThumbnailError::io(path, error))?;
        if !metadata.is_file() {
            return Err(ThumbnailError::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        crate::ffmpeg::ensure_initialized().map_err(|reason| ThumbnailError::Open {
            path: path.to_path_buf(),
            reason: format!("FFmpeg initialisation failed: {reason}"),
        })?;

        log::debug!("Probing {}", path.display());

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| ThumbnailError::Probe {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;

        let format = input_context.format().name().to_string();
        let container_microseconds = input_context.duration();

        let mut streams = Vec::new();
        for stream in input_context.streams() {
            let parameters = stream.parameters();
            let kind = StreamKind::from(parameters.medium());
            let codec = match parameters.id().name() {
                "" => "unknown".to_string(),
                name => name.to_string(),
            };
            let duration = match stream.duration() {
                ticks if ticks > 0 => Some(crate::utilities::pts_to_duration(
                    ticks,
                    stream.time_base(),
                )),
                _ => None,
            };
            let attached_picture = stream.disposition().contains(Disposition::ATTACHED_PIC);

            let mut descriptor = StreamDescriptor {
                index: stream.index(),
                kind,
                codec,
                width: 0,
                height: 0,
                pixel_format: None,
                duration,
                attached_picture,
                decodable: false,
            };

            if kind == StreamKind::Video {
                // A decoder that cannot be created marks the stream as
                // undecodable rather than failing the whole probe.
                match CodecContext::from_parameters(parameters)
                    .and_then(|context| context.decoder().video())
                {
                    Ok(decoder) => {
                        descriptor.width = decoder.width();
                        descriptor.height = decoder.height();
                        descriptor.pixel_format = {
                            let name = format!("{:?}", decoder.format());
                            if name == "None" { None } else { Some(name) }
                        };
                        descriptor.decodable = true;
                    }
                    Err(error) => {
                        log::debug!(
                            "Video stream {} of {} is not decodable: {error}",
                            descriptor.index,
                            path.display(),
                        );
                    }
                }
            }

            streams.push(descriptor);
        }

        // Input context closes here; sessions open their own.
        drop(input_context);

        let video = streams
            .iter()
            .find(|stream| {
                stream.kind == StreamKind::Video && stream.decodable && !stream.attached_picture
            })
            .ok_or_else(|| ThumbnailError::Probe {
                path: path.to_path_buf(),
                reason: "no decodable video stream found".to_string(),
            })?;
        let video_stream_index = video.index;

        let duration = if container_microseconds > 0 {
            Duration::from_micros(container_microseconds as u64)
        } else {
            video.duration.unwrap_or_default()
        };

        log::info!(
            "Probed {} (format={}, duration={:.2}s, streams={}, video_stream={})",
            path.display(),
            format,
            duration.as_secs_f64(),
            streams.len(),
            video_stream_index,
        );

        Ok(MediaSource {
            path: path.to_path_buf(),
            format,
            duration,
            streams,
            video_stream_index,
        })
    }
}
