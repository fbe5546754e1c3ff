use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use exitrack_core::{CapturedImage, ImageKind, RawRecognition, Recognizer};

use crate::client::EndpointClient;

/// `Recognizer` backed by the endpoint's `fastOCR` action.
#[derive(Debug, Clone)]
pub struct RemoteRecognizer {
    client: Arc<EndpointClient>,
}

impl RemoteRecognizer {
    pub fn new(client: Arc<EndpointClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Recognizer for RemoteRecognizer {
    fn name(&self) -> &str {
        "fast-ocr"
    }

    async fn recognize(&self, image: &CapturedImage, kind: ImageKind) -> Result<RawRecognition> {
        let data = self.client.fast_ocr(image, kind).await?;
        Ok(data.render(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use exitrack_core::RecognitionResult;
    use serde_json::{json, Value};

    async fn serve(data: Value) -> String {
        let router = Router::new().route(
            "/exec",
            post(move |Json(_): Json<Value>| {
                let data = data.clone();
                async move { Json(json!({ "status": 200, "data": data })) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/exec")
    }

    #[tokio::test]
    async fn invoice_numbers_come_back_structured() {
        let url = serve(json!({ "invoiceNumbers": ["INV-1001", "INV-1002"], "confidence": 0.64 })).await;
        let recognizer = RemoteRecognizer::new(Arc::new(EndpointClient::new(url).unwrap()));
        let raw = recognizer
            .recognize(&CapturedImage::new(vec![1]), ImageKind::Invoice)
            .await
            .unwrap();
        assert_eq!(
            raw.extracted,
            Some(vec!["INV-1001".to_string(), "INV-1002".to_string()])
        );

        let result = RecognitionResult::from_raw(raw);
        assert!((result.confidence - 0.64).abs() < 1e-4);
    }

    #[tokio::test]
    async fn numbers_outside_local_patterns_survive_fusion() {
        let url = serve(json!({ "invoiceNumbers": ["SO#4471", "INV 2291"], "confidence": 0.9 })).await;
        let recognizer = RemoteRecognizer::new(Arc::new(EndpointClient::new(url).unwrap()));
        let raw = recognizer
            .recognize(&CapturedImage::new(vec![2]), ImageKind::Invoice)
            .await
            .unwrap();
        let result = RecognitionResult::from_raw(raw);

        let engine = exitrack_fusion::FusionEngine::default();
        let record = engine.invoice_record(&result);
        assert_eq!(record.invoice_numbers, vec!["SO#4471", "INV 2291"]);
        assert!((record.confidence - 0.9).abs() < 1e-4);
    }
}
