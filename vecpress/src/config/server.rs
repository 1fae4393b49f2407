/// Server side behavior of the mock vector search service.
#[derive(Debug, Clone, clap::Args, Default)]
pub struct ServerConfig {
    /// Base latency added to every response.
    #[arg(long, value_name = "SECONDS", default_value_t = 0.01)]
    pub base_latency: f64,

    /// Random latency added or subtracted per request.
    #[arg(long, value_name = "SECONDS", default_value_t = 0.)]
    pub jitter: f64,

    /// Ratio of requests answered with an error code.
    #[arg(long, value_name = "RATIO", default_value_t = 0.)]
    pub error_rate: f32,
}
