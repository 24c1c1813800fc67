pub mod config;
pub mod document;
pub mod iam;
pub mod rate_limit;
pub mod repositories;
pub mod storage;
pub mod transcode;
