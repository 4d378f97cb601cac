use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::retry::RetryPolicy;
use crate::camera::Frame;
use crate::config::ConfigInference;

/// One (label, confidence) pair from the model. The response body is a JSON
/// array of these.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// A single submission of JPEG bytes to the remote model, returning the raw
/// response body on success. Failures here (connection errors, non-2xx
/// statuses) are the transient kind the retry policy applies to; parsing
/// happens outside, in [`Classifier`].
pub trait InferenceTransport {
    async fn submit(&self, jpeg: &[u8]) -> Result<String, InferenceError>;
}

/// Transport for a hosted inference API: bearer-token POST of raw JPEG
/// bytes to `{api_url}/models/{model}`.
pub struct HfTransport {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HfTransport {
    pub fn new(config: &ConfigInference) -> Result<HfTransport, InferenceError> {
        let client = reqwest::Client::builder()
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(InferenceError::ConnectionError)?;
        Ok(HfTransport {
            client,
            url: format!("{}/models/{}", config.api_url, config.model),
            token: config.token.clone(),
        })
    }
}

impl InferenceTransport for HfTransport {
    async fn submit(&self, jpeg: &[u8]) -> Result<String, InferenceError> {
        let res = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.token))
            .body(jpeg.to_vec())
            .send()
            .await
            .map_err(InferenceError::ConnectionError)?;
        if !res.status().is_success() {
            return Err(InferenceError::BadStatus(res.status().as_u16()));
        }
        res.text().await.map_err(InferenceError::InvalidResponseBody)
    }
}

/// Asks the remote model whether a frame contains the target object class,
/// retrying transient transport failures per the [`RetryPolicy`].
pub struct Classifier<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: InferenceTransport> Classifier<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Classifier<T> {
        Classifier { transport, policy }
    }

    /// True iff the model reports a label containing `target` with a score
    /// above `threshold`. The match is a case-sensitive substring test, so
    /// model label variants like "fox squirrel, Sciurus niger" count; when
    /// several labels match, the highest-scoring one decides. A response
    /// with no matching label is a negative result, not an error.
    pub async fn classify(
        &self,
        image: &Frame,
        target: &str,
        threshold: f64,
    ) -> Result<bool, InferenceError> {
        let jpeg = image.to_jpeg()?;
        let body = self.submit_with_retry(&jpeg).await?;

        let predictions: Vec<LabelScore> = serde_json::from_str(&body)?;
        debug!(?predictions, "inference response");

        let best_match = predictions
            .iter()
            .filter(|p| p.label.contains(target))
            .max_by(|a, b| a.score.total_cmp(&b.score));
        Ok(best_match.map_or(false, |p| p.score > threshold))
    }

    async fn submit_with_retry(&self, jpeg: &[u8]) -> Result<String, InferenceError> {
        let mut failed = 0;
        loop {
            match self.transport.submit(jpeg).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    failed += 1;
                    if failed >= self.policy.max_attempts {
                        return Err(e);
                    }
                    let delay = self.policy.delay_after(failed);
                    warn!(attempt = failed, "inference call failed: {}. Retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum InferenceError {
        ConnectionError(error: reqwest::Error) {
            display("Unable to reach inference API: {}", error)
            source(error)
        }
        BadStatus(status: u16) {
            display("Inference API returned status {}", status)
        }
        InvalidResponseBody(error: reqwest::Error) {
            display("Inference API returned mangled response body: {}", error)
            source(error)
        }
        ResponseInvalid(error: serde_json::Error) {
            from()
            display("Inference response could not be parsed: {}", error)
            source(error)
        }
        ImageEncoding(error: image::ImageError) {
            from()
            display("Unable to encode frame as JPEG: {}", error)
            source(error)
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;
    use std::time::Duration;

    use image::{GrayImage, Luma};

    use super::super::retry::RetryPolicy;
    use super::{Classifier, InferenceError, InferenceTransport, LabelScore};
    use crate::camera::Frame;

    /// Pops one canned result per call; `Err(u16)` entries become status
    /// failures. Records how many submissions were made.
    struct FakeTransport {
        script: Mutex<Vec<Result<String, u16>>>,
        calls: Mutex<u32>,
    }

    impl FakeTransport {
        fn new(script: Vec<Result<&str, u16>>) -> FakeTransport {
            FakeTransport {
                script: Mutex::new(
                    script
                        .into_iter()
                        .rev()
                        .map(|r| r.map(String::from))
                        .collect(),
                ),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl InferenceTransport for FakeTransport {
        async fn submit(&self, _jpeg: &[u8]) -> Result<String, InferenceError> {
            *self.calls.lock().unwrap() += 1;
            match self.script.lock().unwrap().pop() {
                Some(Ok(body)) => Ok(body),
                Some(Err(status)) => Err(InferenceError::BadStatus(status)),
                None => panic!("transport called more often than scripted"),
            }
        }
    }

    fn frame() -> Frame {
        Frame::from_gray(GrayImage::from_pixel(8, 8, Luma([128])))
    }

    fn classifier(script: Vec<Result<&str, u16>>) -> Classifier<FakeTransport> {
        Classifier::new(FakeTransport::new(script), RetryPolicy::default())
    }

    #[test]
    fn test_parse_response() {
        let predictions: Vec<LabelScore> = serde_json::from_str(indoc::indoc! {r#"
            [
                {"label": "squirrel", "score": 0.9},
                {"label": "acorn", "score": 0.05}
            ]
        "#})
        .unwrap();
        insta::assert_yaml_snapshot!(predictions, @r###"
        ---
        - label: squirrel
          score: 0.9
        - label: acorn
          score: 0.05
        "###);
    }

    #[tokio::test]
    async fn test_exact_label_above_threshold() {
        let c = classifier(vec![Ok(r#"[{"label": "squirrel", "score": 0.5}]"#)]);
        assert!(c.classify(&frame(), "squirrel", 0.01).await.unwrap());
    }

    #[tokio::test]
    async fn test_no_matching_label_is_negative() {
        let c = classifier(vec![Ok(
            r#"[{"label": "acorn", "score": 0.99}, {"label": "bird feeder", "score": 0.9}]"#,
        )]);
        assert!(!c.classify(&frame(), "squirrel", 0.01).await.unwrap());
    }

    #[tokio::test]
    async fn test_highest_scoring_match_decides() {
        // Two labels contain the target; the stronger one must win even
        // though the weaker one comes first
        let c = classifier(vec![Ok(
            r#"[{"label": "ground squirrel", "score": 0.005}, {"label": "fox squirrel", "score": 0.9}]"#,
        )]);
        assert!(c.classify(&frame(), "squirrel", 0.01).await.unwrap());
    }

    #[tokio::test]
    async fn test_match_below_threshold_is_negative() {
        let c = classifier(vec![Ok(r#"[{"label": "squirrel", "score": 0.005}]"#)]);
        assert!(!c.classify(&frame(), "squirrel", 0.01).await.unwrap());
    }

    #[tokio::test]
    async fn test_substring_match_is_case_sensitive() {
        let c = classifier(vec![Ok(r#"[{"label": "Squirrel", "score": 0.9}]"#)]);
        assert!(!c.classify(&frame(), "squirrel", 0.01).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let c = classifier(vec![
            Err(503),
            Err(503),
            Err(503),
            Err(503),
            Ok(r#"[{"label": "squirrel", "score": 0.5}]"#),
        ]);

        let started = tokio::time::Instant::now();
        assert!(c.classify(&frame(), "squirrel", 0.01).await.unwrap());
        assert_eq!(c.transport.calls(), 5);
        // Backoff of 2 + 4 + 8 + 16 before the final attempt
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_propagate_last_error() {
        let c = classifier(vec![Err(500); 5]);

        let result = c.classify(&frame(), "squirrel", 0.01).await;
        assert!(matches!(result, Err(InferenceError::BadStatus(500))));
        // No sixth attempt
        assert_eq!(c.transport.calls(), 5);
    }

    #[tokio::test]
    async fn test_malformed_response_is_fatal_without_retry() {
        let c = classifier(vec![Ok("surprisingly not json")]);

        let result = c.classify(&frame(), "squirrel", 0.01).await;
        assert!(matches!(result, Err(InferenceError::ResponseInvalid(_))));
        assert_eq!(c.transport.calls(), 1);
    }
}
