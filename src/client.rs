use std::{fs::File, io::Read, path::Path};

use async_stream::try_stream;
use futures::{StreamExt, stream::BoxStream};
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::mpsc;
use url::Url;

use crate::error::UploadError;
use crate::parts::{self, PartSlice, UploadStrategy};
use crate::rest_types::{
    AbortMultipartRequest, CompleteMultipartRequest, CompleteMultipartResponse, CompletedPart,
    DownloadUrlRequest, DownloadUrlResponse, FileType, InitiateMultipartRequest,
    InitiateMultipartResponse, PartUrl, PartUrlsRequest, PartUrlsResponse, PresignUploadRequest,
    PresignUploadResponse, ThumbnailUrlRequest, ThumbnailUrlResponse, VideoManifestResponse,
    VideoPlaylistResponse,
};
use crate::retry::{RetryConfig, RetryError, with_retry};

const PRESIGN_UPLOAD_ROUTE: &str = "presign/upload";
const MULTIPART_INITIATE_ROUTE: &str = "presign/multipart/initiate";
const MULTIPART_URLS_ROUTE: &str = "presign/multipart/urls";
const MULTIPART_COMPLETE_ROUTE: &str = "presign/multipart/complete";
const MULTIPART_ABORT_ROUTE: &str = "presign/multipart/abort";
const PRESIGN_DOWNLOAD_ROUTE: &str = "presign/download";
const PRESIGN_THUMBNAIL_ROUTE: &str = "presign/thumbnail";

/// Granularity of byte-level progress reporting on the single-shot path.
const PROGRESS_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug, Default)]
pub struct UploadProgress {
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_url: String,
}

/// Events emitted over the lifetime of one upload attempt: zero or more
/// monotonically non-decreasing `Progress` updates, then one `Complete`.
#[derive(Debug)]
pub enum UploadEvent {
    Progress(UploadProgress),
    Complete(UploadedFile),
}

pub struct BuchatClient {
    client: Client,
    rest_base_url: Url,
    auth_token: String,
    retry: RetryConfig,
}

impl BuchatClient {
    pub fn new(api_base_url: Url, auth_token: String) -> Self {
        Self {
            client: Client::new(),
            rest_base_url: api_base_url,
            auth_token,
            retry: RetryConfig::default(),
        }
    }

    /// Override the per-part retry policy.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Upload a file, picking the single-shot or multipart path by size.
    ///
    /// Returns a stream of [`UploadEvent`]s ending in `Complete` with the
    /// final object URL. Dropping the stream cancels whatever transfer is
    /// in flight. Concurrent calls are fully independent.
    pub fn upload_file<'a, P: AsRef<Path> + Send + 'a>(
        &'a self,
        file: P,
        content_type: &'a str,
        file_type: FileType,
    ) -> Result<BoxStream<'a, Result<UploadEvent, UploadError>>, UploadError> {
        let file_size = std::fs::metadata(file.as_ref())?.len();
        let filename = file
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                UploadError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "upload path has no file name",
                ))
            })?;

        let stream = try_stream! {
            yield UploadEvent::Progress(UploadProgress {
                bytes_uploaded: 0,
                total_bytes: file_size,
            });

            match parts::select_strategy(file_size) {
                UploadStrategy::SingleShot => {
                    let grant = self
                        .presign_upload(&filename, content_type, file_type)
                        .await?;
                    let data = std::fs::read(file.as_ref())?;

                    let (progress_tx, mut progress_rx) = mpsc::channel::<u64>(64);
                    let put_fut = self.put_single(&grant.upload_url, data, content_type, progress_tx);
                    tokio::pin!(put_fut);

                    let mut bytes_uploaded = 0u64;
                    let put_result: Result<(), UploadError> = loop {
                        tokio::select! {
                            biased;
                            result = &mut put_fut => {
                                break result;
                            }
                            Some(sent) = progress_rx.recv() => {
                                bytes_uploaded += sent;
                                yield UploadEvent::Progress(UploadProgress {
                                    bytes_uploaded,
                                    total_bytes: file_size,
                                });
                            }
                        }
                    };
                    put_result?;

                    yield UploadEvent::Progress(UploadProgress {
                        bytes_uploaded: file_size,
                        total_bytes: file_size,
                    });
                    yield UploadEvent::Complete(UploadedFile {
                        file_url: grant.file_url,
                    });
                }
                UploadStrategy::Multipart => {
                    let mut source = File::open(file.as_ref())?;
                    let slices = parts::part_slices(file_size);

                    let session = self
                        .initiate_multipart(&filename, content_type, file_type)
                        .await?;

                    // from here on the server holds session state, so every
                    // terminal failure releases it with a best-effort abort
                    let part_numbers: Vec<u64> =
                        slices.iter().map(|slice| slice.part_number).collect();
                    let urls = match self
                        .part_upload_urls(&session.upload_id, &session.key, &part_numbers)
                        .await
                    {
                        Ok(urls) => urls,
                        Err(e) => {
                            let _ = self.abort_multipart(&session.upload_id, &session.key).await;
                            Err(e)?
                        }
                    };

                    let mut uploaded_parts: Vec<CompletedPart> = Vec::with_capacity(slices.len());
                    let mut bytes_uploaded = 0u64;

                    for slice in &slices {
                        match self
                            .upload_one_part(&mut source, slice, &urls, content_type)
                            .await
                        {
                            Ok(etag) => {
                                uploaded_parts.push(CompletedPart {
                                    part_number: slice.part_number,
                                    etag,
                                });
                                bytes_uploaded += slice.len;
                                yield UploadEvent::Progress(UploadProgress {
                                    bytes_uploaded,
                                    total_bytes: file_size,
                                });
                            }
                            Err(e) => {
                                let _ = self.abort_multipart(&session.upload_id, &session.key).await;
                                Err(e)?;
                            }
                        }
                    }

                    match self
                        .complete_multipart(&session.upload_id, &session.key, &uploaded_parts)
                        .await
                    {
                        Ok(file_url) => {
                            yield UploadEvent::Complete(UploadedFile { file_url });
                        }
                        Err(e) => {
                            let _ = self.abort_multipart(&session.upload_id, &session.key).await;
                            Err(e)?;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    pub async fn presign_upload(
        &self,
        filename: &str,
        content_type: &str,
        file_type: FileType,
    ) -> Result<PresignUploadResponse, UploadError> {
        let request = PresignUploadRequest {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            file_type,
        };
        self.post_gateway(PRESIGN_UPLOAD_ROUTE, &request).await
    }

    pub async fn initiate_multipart(
        &self,
        filename: &str,
        content_type: &str,
        file_type: FileType,
    ) -> Result<InitiateMultipartResponse, UploadError> {
        let request = InitiateMultipartRequest {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            file_type,
        };
        self.post_gateway(MULTIPART_INITIATE_ROUTE, &request).await
    }

    pub async fn part_upload_urls(
        &self,
        upload_id: &str,
        key: &str,
        part_numbers: &[u64],
    ) -> Result<Vec<PartUrl>, UploadError> {
        let request = PartUrlsRequest {
            upload_id: upload_id.to_string(),
            key: key.to_string(),
            part_numbers: part_numbers.to_vec(),
        };
        let response: PartUrlsResponse = self.post_gateway(MULTIPART_URLS_ROUTE, &request).await?;
        Ok(response.urls)
    }

    /// Submit the ordered part list and finalize the object.
    ///
    /// The list is validated first; an inconsistent list never reaches the
    /// gateway.
    pub async fn complete_multipart(
        &self,
        upload_id: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> Result<String, UploadError> {
        parts::validate_parts(parts)?;

        let request = CompleteMultipartRequest {
            upload_id: upload_id.to_string(),
            key: key.to_string(),
            parts: parts.to_vec(),
        };
        let url = self.gateway_url(MULTIPART_COMPLETE_ROUTE)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.auth_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| UploadError::Finalize(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UploadError::Finalize(format!(
                "{} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let completed: CompleteMultipartResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Finalize(format!("invalid response: {e}")))?;
        Ok(completed.file_url)
    }

    /// Release server-side multipart state. Best effort: the session is
    /// already being torn down, so a failed abort is not surfaced.
    pub async fn abort_multipart(&self, upload_id: &str, key: &str) -> Result<(), UploadError> {
        let request = AbortMultipartRequest {
            upload_id: upload_id.to_string(),
            key: key.to_string(),
        };
        let url = self.gateway_url(MULTIPART_ABORT_ROUTE)?;
        let _ = self
            .client
            .post(url)
            .bearer_auth(&self.auth_token)
            .json(&request)
            .send()
            .await;
        Ok(())
    }

    pub async fn download_url(&self, file_key: &str) -> Result<String, UploadError> {
        let request = DownloadUrlRequest {
            file_key: file_key.to_string(),
        };
        let response: DownloadUrlResponse =
            self.post_gateway(PRESIGN_DOWNLOAD_ROUTE, &request).await?;
        Ok(response.download_url)
    }

    pub async fn thumbnail_url(
        &self,
        file_key: &str,
        width: u32,
        height: u32,
    ) -> Result<String, UploadError> {
        let request = ThumbnailUrlRequest {
            file_key: file_key.to_string(),
            width,
            height,
        };
        let response: ThumbnailUrlResponse =
            self.post_gateway(PRESIGN_THUMBNAIL_ROUTE, &request).await?;
        Ok(response.thumbnail_url)
    }

    pub async fn video_manifest_url(&self, video_id: &str) -> Result<String, UploadError> {
        let route = format!("presign/video/{video_id}/manifest.m3u8");
        let response: VideoManifestResponse = self.get_gateway(&route).await?;
        Ok(response.manifest_url)
    }

    pub async fn video_playlist_url(
        &self,
        video_id: &str,
        quality: &str,
    ) -> Result<String, UploadError> {
        let route = format!("presign/video/{video_id}/{quality}/playlist.m3u8");
        let response: VideoPlaylistResponse = self.get_gateway(&route).await?;
        Ok(response.playlist_url)
    }

    async fn upload_one_part(
        &self,
        source: &mut File,
        slice: &PartSlice,
        urls: &[PartUrl],
        content_type: &str,
    ) -> Result<String, UploadError> {
        let part_number = slice.part_number;
        let url = urls
            .iter()
            .find(|u| u.part_number == part_number)
            .ok_or_else(|| UploadError::PartUpload {
                part_number,
                reason: "no presigned URL issued for this part".to_string(),
            })?;

        // slices are contiguous from offset zero, so sequential reads line up
        let mut data = vec![0u8; slice.len as usize];
        source.read_exact(&mut data)?;

        with_retry(
            || self.put_part_once(&url.url, part_number, &data, content_type),
            &self.retry,
        )
        .await
    }

    async fn put_part_once(
        &self,
        url: &str,
        part_number: u64,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, RetryError> {
        let part_failed = |reason: String| UploadError::PartUpload {
            part_number,
            reason,
        };

        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| RetryError::Retryable(part_failed(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!(
                "{} - {}",
                status,
                response.text().await.unwrap_or_default()
            );
            return Err(if status.is_server_error() {
                RetryError::Retryable(part_failed(reason))
            } else {
                RetryError::NonRetryable(part_failed(reason))
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                RetryError::NonRetryable(part_failed(
                    "response is missing an ETag header".to_string(),
                ))
            })?;
        Ok(parts::normalize_etag(etag))
    }

    /// Streamed PUT of the whole file, pushing sent-byte counts through
    /// `progress_tx` as the body is consumed.
    async fn put_single(
        &self,
        url: &str,
        data: Vec<u8>,
        content_type: &str,
        progress_tx: mpsc::Sender<u64>,
    ) -> Result<(), UploadError> {
        let total_len = data.len();
        let chunks: Vec<Vec<u8>> = data
            .chunks(PROGRESS_CHUNK_SIZE)
            .map(|chunk| chunk.to_vec())
            .collect();

        let stream = futures::stream::iter(chunks).map(move |chunk| {
            let len = chunk.len() as u64;
            let _ = progress_tx.try_send(len);
            Ok::<_, std::io::Error>(chunk)
        });

        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, total_len)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| UploadError::Transfer(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UploadError::Transfer(format!(
                "{} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        Ok(())
    }

    async fn post_gateway<B, R>(&self, route: &str, body: &B) -> Result<R, UploadError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.gateway_url(route)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.auth_token)
            .json(body)
            .send()
            .await
            .map_err(|e| UploadError::Presign(format!("{route}: {e}")))?;

        if !response.status().is_success() {
            return Err(UploadError::Presign(format!(
                "{route}: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| UploadError::Presign(format!("{route}: invalid response: {e}")))
    }

    async fn get_gateway<R: DeserializeOwned>(&self, route: &str) -> Result<R, UploadError> {
        let url = self.gateway_url(route)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.auth_token)
            .send()
            .await
            .map_err(|e| UploadError::Presign(format!("{route}: {e}")))?;

        if !response.status().is_success() {
            return Err(UploadError::Presign(format!(
                "{route}: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| UploadError::Presign(format!("{route}: invalid response: {e}")))
    }

    fn gateway_url(&self, route: &str) -> Result<Url, UploadError> {
        self.rest_base_url
            .join(route)
            .map_err(|e| UploadError::Presign(format!("invalid gateway URL: {e}")))
    }
}
