use std::{convert::Infallible, sync::Arc, time::Duration};

use secrecy::{ExposeSecret as _, SecretBox};

/// Secret CLI value, redacted in debug output.
pub type Secret = Arc<SecretBox<String>>;

fn parse_secret(value: &str) -> Result<Secret, Infallible> {
    Ok(Arc::new(SecretBox::new(Box::new(value.to_owned()))))
}

/// Kind of request sent to the vector search service.
#[derive(Debug, Clone, Copy, clap::ValueEnum, Default, PartialEq, Eq)]
pub enum RequestKind {
    /// Vector similarity search with a random query vector.
    #[default]
    Search,

    /// Scalar query, requires a filter expression.
    Query,
}

impl RequestKind {
    /// RESTful path used when none is configured.
    pub fn default_path(self) -> &'static str {
        match self {
            RequestKind::Search => "/v1/vector/search",
            RequestKind::Query => "/v1/vector/query",
        }
    }
}

/// What is requested from the target and how.
#[derive(Debug, Clone, clap::Args)]
pub struct TargetConfig {
    /// Request kind to press the target with.
    #[arg(long, value_enum, default_value_t = RequestKind::Search)]
    pub kind: RequestKind,

    /// Name of the collection to search in.
    #[arg(long, short = 'c', value_name = "NAME", required = true)]
    pub collection: String,

    /// Dimension of the random query vectors.
    #[arg(long, value_name = "N", default_value_t = 768)]
    pub dim: usize,

    /// Maximum amount of results per request.
    #[arg(long, value_name = "N", default_value_t = 1000)]
    pub top_k: usize,

    /// Boolean filter expression.
    #[arg(long, value_name = "EXPR")]
    pub filter: Option<String>,

    /// Overwrite the RESTful path of the request kind.
    #[arg(long, value_name = "PATH")]
    pub restful_path: Option<String>,

    /// Api token, takes precedence over username and password.
    #[arg(
        long,
        env = "VECPRESS_TOKEN",
        hide_env_values = true,
        value_parser = parse_secret,
    )]
    pub token: Option<Secret>,

    #[arg(long, env = "VECPRESS_USERNAME")]
    pub username: Option<String>,

    #[arg(
        long,
        env = "VECPRESS_PASSWORD",
        hide_env_values = true,
        value_parser = parse_secret,
    )]
    pub password: Option<Secret>,

    /// Timeout of a single request.
    #[arg(
        long,
        value_name = "DURATION",
        default_value = "60s",
        value_parser = humantime::parse_duration,
    )]
    pub timeout: Duration,
}

impl TargetConfig {
    pub fn restful_path(&self) -> &str {
        self.restful_path
            .as_deref()
            .unwrap_or_else(|| self.kind.default_path())
    }

    /// Bearer credential, if any is configured.
    pub fn credential(&self) -> Option<SecretBox<String>> {
        if let Some(token) = self
            .token
            .as_ref()
            .filter(|token| !token.expose_secret().is_empty())
        {
            return Some(SecretBox::new(Box::new(token.expose_secret().clone())));
        }
        match (self.username.as_deref(), self.password.as_ref()) {
            (Some(username), Some(password)) if !username.is_empty() => Some(SecretBox::new(
                Box::new(format!("{username}:{}", password.expose_secret())),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct Cli {
        #[clap(flatten)]
        target: TargetConfig,
    }

    fn parse(args: &[&str]) -> TargetConfig {
        Cli::try_parse_from(std::iter::once("vecpress").chain(args.iter().copied()))
            .unwrap()
            .target
    }

    #[test]
    fn test_defaults() {
        let target = parse(&["-c", "books"]);
        assert_eq!(RequestKind::Search, target.kind);
        assert_eq!("books", target.collection);
        assert_eq!(768, target.dim);
        assert_eq!(1000, target.top_k);
        assert_eq!(Duration::from_secs(60), target.timeout);
        assert_eq!("/v1/vector/search", target.restful_path());
    }

    #[test]
    fn test_collection_is_required() {
        assert!(Cli::try_parse_from(["vecpress"]).is_err());
    }

    #[test]
    fn test_restful_path() {
        let target = parse(&["-c", "books", "--kind", "query"]);
        assert_eq!("/v1/vector/query", target.restful_path());

        let target = parse(&["-c", "books", "--restful-path", "/v2/vectordb/entities/search"]);
        assert_eq!("/v2/vectordb/entities/search", target.restful_path());
    }

    #[test]
    fn test_credential() {
        let exposed = |target: TargetConfig| {
            target
                .credential()
                .map(|credential| credential.expose_secret().clone())
        };

        let target = parse(&["-c", "x", "--token", "abc", "--username", "u"]);
        assert_eq!(Some("abc".to_owned()), exposed(target));

        let target = parse(&["-c", "x", "--username", "root", "--password", "pw"]);
        assert_eq!(Some("root:pw".to_owned()), exposed(target));

        let target = parse(&["-c", "x", "--username", "root"]);
        assert_eq!(None, exposed(target));

        let target = parse(&["-c", "x", "--token", ""]);
        assert_eq!(None, exposed(target));
    }

    #[test]
    fn test_secrets_are_redacted_in_debug_output() {
        let target = parse(&[
            "-c",
            "x",
            "--token",
            "tok-3f9a",
            "--username",
            "root",
            "--password",
            "hunter2-secret",
        ]);
        let debug = format!("{target:?}");
        assert!(!debug.contains("tok-3f9a"), "{debug}");
        assert!(!debug.contains("hunter2-secret"), "{debug}");
        assert!(debug.contains("root"), "{debug}");

        let credential = target.credential().unwrap();
        assert!(!format!("{credential:?}").contains("tok-3f9a"));
    }
}
