//! Client library for the Buchat media gateway.
//!
//! Uploads go through presigned URLs issued by the gateway: small files as
//! one PUT, files over 100 MiB as a sequence of 5 MiB parts stitched
//! together by a finalize call. See [`BuchatClient::upload_file`].

pub mod client;
pub mod error;
pub mod parts;
pub mod rest_types;
pub mod retry;

pub use client::{BuchatClient, UploadEvent, UploadProgress, UploadedFile};
pub use error::UploadError;
pub use rest_types::FileType;
pub use retry::RetryConfig;
