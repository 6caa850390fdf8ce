use crate::codeforces::model::*;
use crate::codeforces::pacer::RequestPacer;
use crate::config::ClientConfig;
use async_trait::async_trait;
use itertools::Itertools;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::{self, Duration};

pub type Result<T> = std::result::Result<T, UpstreamError>;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to build upstream client: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("request to {resource} failed: {source}")]
    TransportError {
        resource: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid upstream url given")]
    InvalidUrlError(#[from] url::ParseError),
    #[error("failed to deserialize response of {resource}: {source}")]
    DeserializeError {
        resource: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("upstream returned status {status} for {resource}: {message}")]
    StatusError {
        resource: String,
        status: u16,
        message: String,
    },
    #[error("upstream rejected {resource}: {comment}")]
    FailedError { resource: String, comment: String },
    #[error("{resource} not found upstream")]
    NotFound { resource: String },
    #[error("still rate limited after {attempts} attempts at {resource}")]
    RateLimited { resource: String, attempts: u32 },
}

impl UpstreamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::NotFound { .. })
    }
}

/// Raw answer of a single HTTP exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// The network seam of the client: one GET of an API method with query parameters.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, method: &str, params: &[(&str, String)]) -> Result<TransportResponse>;
}

pub struct HttpTransport {
    base_url: Url,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder().gzip(true).timeout(timeout).build()?;

        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, method: &str, params: &[(&str, String)]) -> Result<TransportResponse> {
        let url = self.base_url.join(method)?;
        let failed = |source: reqwest::Error| UpstreamError::TransportError {
            resource: describe(method, params),
            source,
        };
        let res = self.client.get(url).query(params).send().await.map_err(failed)?;
        let status = res.status().as_u16();
        let body = res.text().await.map_err(failed)?;

        Ok(TransportResponse { status, body })
    }
}

/// Typed read operations of the upstream API.
#[async_trait]
pub trait CodeforcesApi: Send + Sync {
    async fn fetch_profile(&self, handle: &str) -> Result<ProfileInfo>;
    async fn fetch_submissions(&self, handle: &str) -> Result<Vec<RawSubmission>>;
    async fn fetch_rating_history(&self, handle: &str) -> Result<Vec<RatingChangeEvent>>;
    async fn fetch_contest_list(&self) -> Result<Vec<ContestSummary>>;
    async fn fetch_contest_standings(&self, contest_id: i64, handle: &str) -> Result<StandingsSlice>;
    /// `Ok(None)` when the upstream does not know the problem, which is common for old problems.
    async fn fetch_problem_metadata(&self, contest_id: i64, index: &str) -> Result<Option<ProblemMetadata>>;
}

/// Single chokepoint for all upstream traffic.
///
/// Every call waits for the shared pacer. A 429 answer blocks for the configured
/// cool-down and retries instead of failing.
pub struct RateLimitedClient<T = HttpTransport> {
    transport: T,
    pacer: RequestPacer,
    cooldown: Duration,
    max_rate_limit_retries: u32,
}

impl RateLimitedClient<HttpTransport> {
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.base_url, config.http_timeout)?;
        Ok(Self::new(transport, config))
    }
}

impl<T: Transport> RateLimitedClient<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            pacer: RequestPacer::new(config.request_delay),
            cooldown: config.rate_limit_cooldown,
            max_rate_limit_retries: config.max_rate_limit_retries,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<R> {
        let resource = describe(method, params);
        let mut attempts: u32 = 0;

        loop {
            self.pacer.acquire().await;
            let response = self.transport.get(method, params).await?;

            if is_rate_limited(&response) {
                attempts += 1;
                if attempts > self.max_rate_limit_retries {
                    tracing::error!("gave up on {} after {} rate-limited attempts", resource, attempts);
                    return Err(UpstreamError::RateLimited { resource, attempts });
                }
                tracing::warn!(
                    "rate limit exceeded at {}, waiting {} seconds before retrying",
                    resource,
                    self.cooldown.as_secs()
                );
                time::sleep(self.cooldown).await;
                continue;
            }

            return decode(resource, response);
        }
    }
}

fn describe(method: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        String::from(method)
    } else {
        format!(
            "{}({})",
            method,
            params.iter().map(|(key, value)| format!("{}={}", key, value)).join(", ")
        )
    }
}

fn is_rate_limited(response: &TransportResponse) -> bool {
    response.status == 429 || response.body.contains("Call limit exceeded")
}

fn decode<R: DeserializeOwned>(resource: String, response: TransportResponse) -> Result<R> {
    let success = (200..300).contains(&response.status);
    if response.status == 404 {
        return Err(UpstreamError::NotFound { resource });
    }

    let envelope: ApiEnvelope<R> = match serde_json::from_str(&response.body) {
        Ok(envelope) => envelope,
        Err(e) if success => {
            return Err(UpstreamError::DeserializeError { resource, source: e });
        }
        Err(_) => {
            return Err(UpstreamError::StatusError {
                resource,
                status: response.status,
                message: response.body.chars().take(200).collect(),
            });
        }
    };

    if envelope.status != "OK" {
        let comment = envelope.comment.unwrap_or_default();
        if comment.to_lowercase().contains("not found") {
            return Err(UpstreamError::NotFound { resource });
        }
        if !success {
            return Err(UpstreamError::StatusError {
                resource,
                status: response.status,
                message: comment,
            });
        }
        return Err(UpstreamError::FailedError { resource, comment });
    }

    envelope.result.ok_or(UpstreamError::FailedError {
        resource,
        comment: String::from("response has no result"),
    })
}

#[async_trait]
impl<T: Transport> CodeforcesApi for RateLimitedClient<T> {
    async fn fetch_profile(&self, handle: &str) -> Result<ProfileInfo> {
        let params = [("handles", handle.to_string())];
        let mut profiles: Vec<ProfileInfo> = self.call("user.info", &params).await?;
        if profiles.is_empty() {
            return Err(UpstreamError::NotFound {
                resource: describe("user.info", &params),
            });
        }
        Ok(profiles.swap_remove(0))
    }

    async fn fetch_submissions(&self, handle: &str) -> Result<Vec<RawSubmission>> {
        let params = [
            ("handle", handle.to_string()),
            ("from", String::from("1")),
            ("count", String::from("100000")),
        ];
        self.call("user.status", &params).await
    }

    async fn fetch_rating_history(&self, handle: &str) -> Result<Vec<RatingChangeEvent>> {
        self.call("user.rating", &[("handle", handle.to_string())]).await
    }

    async fn fetch_contest_list(&self) -> Result<Vec<ContestSummary>> {
        self.call("contest.list", &[]).await
    }

    async fn fetch_contest_standings(&self, contest_id: i64, handle: &str) -> Result<StandingsSlice> {
        let params = [
            ("contestId", contest_id.to_string()),
            ("handles", handle.to_string()),
            ("showUnofficial", String::from("false")),
        ];
        let standings: StandingsResponse = self.call("contest.standings", &params).await?;
        Ok(StandingsSlice::from(standings))
    }

    async fn fetch_problem_metadata(&self, contest_id: i64, index: &str) -> Result<Option<ProblemMetadata>> {
        let params = [
            ("contestId", contest_id.to_string()),
            ("problemIndex", index.to_string()),
        ];
        match self.call::<ProblemResponse>("problemset.problem", &params).await {
            Ok(response) => Ok(Some(ProblemMetadata::from_raw(contest_id, response.problem))),
            Err(UpstreamError::NotFound { resource }) => {
                tracing::info!("{} is not listed upstream", resource);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::ScriptedTransport;
    use tokio::time::Instant;

    fn config(delay_ms: u64) -> ClientConfig {
        ClientConfig {
            base_url: String::from("http://localhost/api/"),
            request_delay: Duration::from_millis(delay_ms),
            rate_limit_cooldown: Duration::from_secs(10),
            max_rate_limit_retries: 2,
            http_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn create_http_transport_appends_trailing_slash() {
        let transport = HttpTransport::new("https://codeforces.com/api", Duration::from_secs(1)).unwrap();
        assert_eq!(
            transport.base_url.join("user.info").unwrap(),
            Url::parse("https://codeforces.com/api/user.info").unwrap()
        );
    }

    #[tokio::test]
    async fn test_connection_failure_names_resource() {
        let transport = HttpTransport::new("http://127.0.0.1:1/api/", Duration::from_secs(2)).unwrap();
        let client = RateLimitedClient::new(transport, &config(0));

        let err = client.fetch_rating_history("alice").await.unwrap_err();

        assert!(matches!(err, UpstreamError::TransportError { .. }));
        let message = err.to_string();
        assert!(message.contains("user.rating"));
        assert!(message.contains("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_by_min_delay() {
        let transport = ScriptedTransport::new();
        transport.respond_ok("contest.list", "[]");
        let client = RateLimitedClient::new(transport, &config(1000));

        let start = Instant::now();
        for _ in 0..4 {
            client.fetch_contest_list().await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(3000));
        assert_eq!(client.transport().calls("contest.list"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_call_waits_and_retries() {
        let transport = ScriptedTransport::new();
        transport.push("contest.list", 429, r#"{"status":"FAILED","comment":"Call limit exceeded"}"#);
        transport.respond_ok("contest.list", "[]");
        let client = RateLimitedClient::new(transport, &config(0));

        let start = Instant::now();
        let contests = client.fetch_contest_list().await.unwrap();

        assert!(contests.is_empty());
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert_eq!(client.transport().calls("contest.list"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_gives_up_after_retries() {
        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.push("contest.list", 429, "");
        }
        let client = RateLimitedClient::new(transport, &config(0));

        let result = client.fetch_contest_list().await;
        assert!(matches!(result, Err(UpstreamError::RateLimited { attempts: 3, .. })));
    }

    #[tokio::test]
    async fn test_missing_problem_is_not_an_error() {
        let transport = ScriptedTransport::new();
        transport.push("problemset.problem", 404, "");
        let client = RateLimitedClient::new(transport, &config(0));

        let problem = client.fetch_problem_metadata(1, "Z").await.unwrap();
        assert_eq!(problem, None);
    }

    #[tokio::test]
    async fn test_unknown_handle_is_not_found() {
        let transport = ScriptedTransport::new();
        transport.push(
            "user.info",
            400,
            r#"{"status":"FAILED","comment":"handles: User with handle nobody not found"}"#,
        );
        let client = RateLimitedClient::new(transport, &config(0));

        let error = client.fetch_profile("nobody").await.unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_keeps_status_and_resource() {
        let transport = ScriptedTransport::new();
        transport.push("user.rating", 503, "<html>maintenance</html>");
        let client = RateLimitedClient::new(transport, &config(0));

        match client.fetch_rating_history("alice").await {
            Err(UpstreamError::StatusError { resource, status, .. }) => {
                assert_eq!(status, 503);
                assert_eq!(resource, "user.rating(handle=alice)");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_profile_decodes_envelope() {
        let transport = ScriptedTransport::new();
        transport.respond_ok(
            "user.info",
            r#"[{"handle":"alice","rating":1450,"maxRating":1500,"rank":"specialist","maxRank":"specialist"}]"#,
        );
        let client = RateLimitedClient::new(transport, &config(0));

        let profile = client.fetch_profile("alice").await.unwrap();
        assert_eq!(profile.rating, Some(1450));
        assert_eq!(profile.max_rating, Some(1500));
        assert_eq!(profile.rank.as_deref(), Some("specialist"));
    }
}
