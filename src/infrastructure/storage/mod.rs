use crate::domain::tts::{AudioCodec, AudioSegment, VoiceParams};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// Sidecar describing a persisted chunk payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SegmentMeta {
    chunk_index: usize,
    codec: AudioCodec,
    sample_rate: u32,
    channel_count: u16,
    payload_len: usize,
}

/// Resume key for a document: identical inputs map to the same run directory
pub fn run_key(normalized_text: &str, max_chunk_size: usize, voice: &VoiceParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_text.as_bytes());
    hasher.update(max_chunk_size.to_le_bytes());
    hasher.update(voice.voice.as_bytes());
    hasher.update([0u8]);
    hasher.update(voice.role.as_bytes());
    hasher.update([0u8]);
    hasher.update(voice.language.as_bytes());
    hasher.update(voice.sample_rate.to_le_bytes());

    hasher
        .finalize()
        .iter()
        .take(12)
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Per-run directory holding synthesized chunk audio
#[derive(Debug)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Open (or create) `<temp_root>/run-<key>`
    pub async fn open(temp_root: &Path, key: &str) -> io::Result<Self> {
        let root = temp_root.join(format!("run-{}", key));
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn payload_path(&self, index: usize, codec: AudioCodec) -> PathBuf {
        self.root
            .join(format!("chunk_{:04}.{}", index, codec.extension()))
    }

    fn meta_path(&self, index: usize) -> PathBuf {
        self.root.join(format!("chunk_{:04}.json", index))
    }

    /// Write the payload, then its sidecar. A chunk counts as stored once the sidecar exists.
    pub async fn persist(&self, segment: &AudioSegment) -> io::Result<PathBuf> {
        let payload_path = self.payload_path(segment.chunk_index, segment.codec);
        tokio::fs::write(&payload_path, &segment.payload).await?;

        let meta = SegmentMeta {
            chunk_index: segment.chunk_index,
            codec: segment.codec,
            sample_rate: segment.sample_rate,
            channel_count: segment.channel_count,
            payload_len: segment.payload.len(),
        };
        let meta_json = serde_json::to_vec_pretty(&meta).map_err(io::Error::other)?;

        let meta_path = self.meta_path(segment.chunk_index);
        let staging_path = meta_path.with_extension("json.tmp");
        tokio::fs::write(&staging_path, meta_json).await?;
        tokio::fs::rename(&staging_path, &meta_path).await?;

        tracing::debug!(
            chunk_index = segment.chunk_index,
            path = %payload_path.display(),
            "Chunk audio persisted"
        );
        Ok(payload_path)
    }

    /// Load a previously persisted chunk; incomplete or inconsistent entries read as absent
    pub async fn load(&self, index: usize) -> io::Result<Option<AudioSegment>> {
        let meta_bytes = match tokio::fs::read(self.meta_path(index)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let meta: SegmentMeta = match serde_json::from_slice(&meta_bytes) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(chunk_index = index, error = %e, "Ignoring unreadable chunk sidecar");
                return Ok(None);
            }
        };

        let payload = match tokio::fs::read(self.payload_path(index, meta.codec)).await {
            Ok(payload) => payload,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        if meta.chunk_index != index || payload.len() != meta.payload_len || payload.is_empty() {
            tracing::warn!(chunk_index = index, "Ignoring inconsistent persisted chunk");
            return Ok(None);
        }

        Ok(Some(AudioSegment {
            chunk_index: index,
            codec: meta.codec,
            sample_rate: meta.sample_rate,
            channel_count: meta.channel_count,
            payload,
        }))
    }

    /// Remove the run directory and everything in it
    pub async fn release(self) -> io::Result<()> {
        tokio::fs::remove_dir_all(&self.root).await
    }
}
