//! SpeechRecognizer capability: `transcribe(audioChunk) -> [SpeechSegment]`.
//!
//! Must return word-level timings when available; keyword extraction matches
//! a configurable bag against word tokens, case-insensitive and whole-word.

use async_trait::async_trait;

use crate::director_constants::SPEECH_RECOGNIZER_DEADLINE_MS;
use crate::error::DirectorResult;
use crate::ingress::AudioChunk;
use crate::model::{SpeechSegment, WordTiming};

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn transcribe(&self, chunk: &AudioChunk) -> DirectorResult<Vec<SpeechSegment>>;

    fn deadline_ms(&self) -> u64 {
        SPEECH_RECOGNIZER_DEADLINE_MS
    }
}

/// Energy-gated reference recognizer: above a presence floor it emits one
/// synthetic "speech" segment spanning the chunk, tagged with whichever
/// configured keywords happen to appear in an externally-supplied transcript
/// hint (tests provide one via [`KeywordSpeechRecognizer::with_transcript`]);
/// otherwise it falls back to an empty placeholder token so the rest of the
/// pipeline still has word timings to align against.
pub struct KeywordSpeechRecognizer {
    keywords: Vec<String>,
    presence_floor_dbfs: f32,
    transcript_hint: parking_lot::RwLock<Option<String>>,
}

impl Default for KeywordSpeechRecognizer {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            presence_floor_dbfs: -40.0,
            transcript_hint: parking_lot::RwLock::new(None),
        }
    }
}

impl KeywordSpeechRecognizer {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords,
            ..Self::default()
        }
    }

    /// Sets the text the next `transcribe` call should report speaking,
    /// standing in for what a real recognizer would decode from audio.
    pub fn with_transcript(&self, text: impl Into<String>) {
        *self.transcript_hint.write() = Some(text.into());
    }
}

#[async_trait]
impl SpeechRecognizer for KeywordSpeechRecognizer {
    async fn transcribe(&self, chunk: &AudioChunk) -> DirectorResult<Vec<SpeechSegment>> {
        let energy = chunk.energy_dbfs();
        if energy < self.presence_floor_dbfs {
            return Ok(Vec::new());
        }

        let text = self
            .transcript_hint
            .read()
            .clone()
            .unwrap_or_else(|| "speech detected".to_string());

        let words: Vec<&str> = text.split_whitespace().collect();
        let duration = chunk.end_ts - chunk.start_ts;
        let per_word = if words.is_empty() {
            duration
        } else {
            duration / words.len() as f64
        };

        let word_timings: Vec<WordTiming> = words
            .iter()
            .enumerate()
            .map(|(i, w)| WordTiming {
                word: (*w).to_string(),
                start_ts: chunk.start_ts + per_word * i as f64,
                end_ts: chunk.start_ts + per_word * (i as f64 + 1.0),
            })
            .collect();

        let lower = text.to_lowercase();
        let matched_keywords: Vec<String> = self
            .keywords
            .iter()
            .filter(|kw| {
                let kw_lower = kw.to_lowercase();
                lower
                    .split_whitespace()
                    .any(|token| token.trim_matches(|c: char| !c.is_alphanumeric()) == kw_lower)
            })
            .cloned()
            .collect();

        Ok(vec![SpeechSegment {
            text,
            start_ts: chunk.start_ts,
            end_ts: chunk.end_ts,
            word_timings,
            keywords: matched_keywords,
            energy_db: energy,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CameraId;

    fn chunk(samples: Vec<i16>) -> AudioChunk {
        AudioChunk {
            cam_id: CameraId::new("cam-1"),
            start_ts: 0.0,
            end_ts: 1.0,
            sample_rate: 16_000,
            samples,
        }
    }

    #[tokio::test]
    async fn silence_produces_no_segments() {
        let recognizer = KeywordSpeechRecognizer::default();
        let segments = recognizer.transcribe(&chunk(vec![0; 100])).await.unwrap();
        assert!(segments.is_empty());
    }

    #[tokio::test]
    async fn loud_audio_produces_a_segment_with_word_timings() {
        let recognizer = KeywordSpeechRecognizer::default();
        recognizer.with_transcript("what a goal");
        let loud: Vec<i16> = vec![i16::MAX / 2; 100];
        let segments = recognizer.transcribe(&chunk(loud)).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].word_timings.len(), 3);
    }

    #[tokio::test]
    async fn keyword_matching_is_case_insensitive_and_whole_word() {
        let recognizer = KeywordSpeechRecognizer::new(vec!["goal".to_string()]);
        recognizer.with_transcript("What a GOAL that was");
        let loud: Vec<i16> = vec![i16::MAX / 2; 100];
        let segments = recognizer.transcribe(&chunk(loud)).await.unwrap();
        assert_eq!(segments[0].keywords, vec!["goal".to_string()]);
    }

    #[tokio::test]
    async fn keyword_substring_does_not_match() {
        let recognizer = KeywordSpeechRecognizer::new(vec!["goal".to_string()]);
        recognizer.with_transcript("goalkeeper saves it");
        let loud: Vec<i16> = vec![i16::MAX / 2; 100];
        let segments = recognizer.transcribe(&chunk(loud)).await.unwrap();
        assert!(segments[0].keywords.is_empty());
    }
}
