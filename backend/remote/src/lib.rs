pub mod client;
pub mod protocol;
pub mod recognizer;

pub use client::EndpointClient;
pub use protocol::{
    decode_data_url, encode_data_url, EndpointResponse, FastOcrData, FastOcrRequest, UploadRequest,
};
pub use recognizer::RemoteRecognizer;
