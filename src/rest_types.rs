//! Wire types for the presign gateway.
//!
//! The gateway speaks camelCase JSON; these types pin that shape so the
//! contract cannot drift silently.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Media category attached to every upload descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
    Audio,
    Document,
}

impl FileType {
    /// Derive the category from a MIME type, defaulting to `Document`.
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type.split('/').next() {
            Some("image") => FileType::Image,
            Some("video") => FileType::Video,
            Some("audio") => FileType::Audio,
            _ => FileType::Document,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Document => "document",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignUploadRequest {
    pub filename: String,
    pub content_type: String,
    pub file_type: FileType,
}

/// Single-shot write grant: one PUT to `upload_url`, then the object is
/// reachable at `file_url`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignUploadResponse {
    pub upload_url: String,
    pub file_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateMultipartRequest {
    pub filename: String,
    pub content_type: String,
    pub file_type: FileType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateMultipartResponse {
    pub upload_id: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrlsRequest {
    pub upload_id: String,
    pub key: String,
    pub part_numbers: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrlsResponse {
    pub urls: Vec<PartUrl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrl {
    pub part_number: u64,
    pub url: String,
}

/// One successfully stored part, proven by its ETag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u64,
    pub etag: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMultipartRequest {
    pub upload_id: String,
    pub key: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMultipartResponse {
    pub file_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortMultipartRequest {
    pub upload_id: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlRequest {
    pub file_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlResponse {
    pub download_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailUrlRequest {
    pub file_key: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailUrlResponse {
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoManifestResponse {
    pub manifest_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPlaylistResponse {
    pub playlist_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_request_uses_camel_case_fields() {
        let request = PresignUploadRequest {
            filename: "clip.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            file_type: FileType::Video,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "filename": "clip.mp4",
                "contentType": "video/mp4",
                "fileType": "video",
            })
        );
    }

    #[test]
    fn completed_part_matches_the_finalize_contract() {
        let request = CompleteMultipartRequest {
            upload_id: "u-1".to_string(),
            key: "media/clip.mp4".to_string(),
            parts: vec![CompletedPart {
                part_number: 1,
                etag: "abc".to_string(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "uploadId": "u-1",
                "key": "media/clip.mp4",
                "parts": [{"partNumber": 1, "etag": "abc"}],
            })
        );
    }

    #[test]
    fn part_urls_response_deserializes() {
        let json = r#"{"urls": [{"partNumber": 1, "url": "https://s3/p1"}, {"partNumber": 2, "url": "https://s3/p2"}]}"#;
        let response: PartUrlsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.urls.len(), 2);
        assert_eq!(response.urls[1].part_number, 2);
        assert_eq!(response.urls[0].url, "https://s3/p1");
    }

    #[test]
    fn file_type_derives_from_content_type() {
        assert_eq!(FileType::from_content_type("image/png"), FileType::Image);
        assert_eq!(FileType::from_content_type("video/mp4"), FileType::Video);
        assert_eq!(FileType::from_content_type("audio/mpeg"), FileType::Audio);
        assert_eq!(
            FileType::from_content_type("application/pdf"),
            FileType::Document
        );
        assert_eq!(FileType::from_content_type(""), FileType::Document);
    }
}
