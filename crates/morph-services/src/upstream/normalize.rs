//! Mapping of the extraction service's JSON onto [`MediaMetadata`].
//!
//! The provider is loose about types: ids arrive as numbers or strings, durations as
//! integers, floats or numeric strings, and any field may be `null` or missing. Everything is
//! accepted and defaulted; only input that is not a JSON object at all is a parse failure.

use morph_core::models::{MediaMetadata, MediaVariant};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVideo {
    #[serde(deserialize_with = "lenient_string")]
    url: String,
    #[serde(deserialize_with = "lenient_string")]
    source: String,
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    author: String,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_string")]
    thumbnail: String,
    #[serde(deserialize_with = "lenient_u64")]
    duration: u64,
    #[serde(deserialize_with = "lenient_medias")]
    medias: Vec<RawMedia>,
    #[serde(deserialize_with = "lenient_bool")]
    error: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMedia {
    #[serde(deserialize_with = "lenient_string")]
    url: String,
    #[serde(deserialize_with = "lenient_string")]
    quality: String,
    #[serde(deserialize_with = "lenient_u32")]
    width: u32,
    #[serde(deserialize_with = "lenient_u32")]
    height: u32,
    #[serde(deserialize_with = "lenient_string")]
    ext: String,
}

impl From<RawVideo> for MediaMetadata {
    fn from(raw: RawVideo) -> Self {
        MediaMetadata {
            url: raw.url,
            source: raw.source,
            id: raw.id,
            author: raw.author,
            title: raw.title,
            thumbnail: raw.thumbnail,
            duration_seconds: raw.duration,
            variants: raw
                .medias
                .into_iter()
                .map(|m| MediaVariant {
                    url: m.url,
                    quality: m.quality,
                    width: m.width,
                    height: m.height,
                    extension: m.ext,
                })
                .collect(),
            failed: raw.error,
        }
    }
}

/// Parse the provider payload, surfacing malformed JSON as an error.
pub fn try_normalize(raw: &[u8]) -> Result<MediaMetadata, serde_json::Error> {
    serde_json::from_slice::<RawVideo>(raw).map(MediaMetadata::from)
}

/// Parse the provider payload. Malformed input yields the `failed` sentinel.
pub fn normalize(raw: &[u8]) -> MediaMetadata {
    match try_normalize(raw) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(error = %e, body_bytes = raw.len(), "Unparseable metadata payload");
            MediaMetadata::failed()
        }
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn whole_number(value: &Value) -> u64 {
    let float = match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return v;
            }
            n.as_f64().unwrap_or(0.0)
        }
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if float.is_finite() && float > 0.0 {
        float.floor() as u64
    } else {
        0
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(whole_number(&Value::deserialize(d)?))
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(u32::try_from(whole_number(&Value::deserialize(d)?)).unwrap_or(u32::MAX))
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0")
        }
        Value::Null => false,
        // Objects and arrays here are error descriptions
        _ => true,
    })
}

fn lenient_medias<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<RawMedia>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    })
}
