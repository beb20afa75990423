//! Model resolution.
//!
//! Maps a user's AI configuration to a concrete provider client. The
//! resolver is constructed from an explicit table of enabled providers:
//! there is no global registry, and tests inject their own table or a fake
//! client through the [`Resolve`] seam. Resolution is a pure function of its
//! inputs; clients are built fresh per call from a shared `reqwest::Client`.

use crate::config::ProvidersConfig;
use compact_str::CompactString;
use llm::{Client, HttpProvider, Model};
use std::collections::BTreeMap;
use thiserror::Error;

/// Chat-completions endpoints for the shipped providers.
pub mod endpoint {
    /// OpenAI chat completions.
    pub const OPENAI: &str = "https://api.openai.com/v1/chat/completions";
    /// Anthropic chat completions (OpenAI-compatible surface).
    pub const ANTHROPIC: &str = "https://api.anthropic.com/v1/chat/completions";
    /// Google Gemini chat completions (OpenAI-compatible surface).
    pub const GOOGLE: &str =
        "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
    /// Groq chat completions.
    pub const GROQ: &str = "https://api.groq.com/openai/v1/chat/completions";
    /// OpenRouter chat completions.
    pub const OPENROUTER: &str = "https://openrouter.ai/api/v1/chat/completions";
}

/// How a provider authenticates requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// A named header carrying the key (e.g. `x-api-key`).
    Header(CompactString),
    /// No authentication (local backends).
    None,
}

/// One enabled provider in the resolver table.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    /// Provider id (e.g. "openai").
    pub id: CompactString,
    /// Chat completions endpoint URL.
    pub endpoint: String,
    /// Authentication scheme.
    pub auth: AuthScheme,
    /// Model used when the user has not picked one.
    pub default_model: CompactString,
    /// Cheaper tier substituted when economy mode is requested.
    pub economy_model: Option<CompactString>,
    /// Extra headers sent with every request (e.g. `anthropic-version`).
    pub extra_headers: Vec<(CompactString, String)>,
}

impl ProviderSpec {
    /// Whether this provider needs an API key.
    pub fn requires_key(&self) -> bool {
        self.auth != AuthScheme::None
    }
}

/// A user's AI configuration: provider, model, optional own API key.
///
/// Owned by the account record; read-only here.
#[derive(Debug, Clone, Default)]
pub struct UserAiFields {
    /// Selected provider id; `None` means the table's default provider.
    pub provider: Option<CompactString>,
    /// Selected model id; `None` means the provider's default model.
    pub model: Option<CompactString>,
    /// The user's own API key, if supplied.
    pub api_key: Option<String>,
}

/// Per-call provider-specific parameters, built fresh per resolution.
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    /// Extra headers applied to the call.
    pub headers: Vec<(CompactString, String)>,
}

/// The outcome of resolution: exactly one concrete client plus its identity.
#[derive(Clone)]
pub struct Resolved<C> {
    /// Resolved provider id.
    pub provider: CompactString,
    /// Resolved model id.
    pub model: CompactString,
    /// The concrete model client.
    pub client: C,
    /// Provider-specific call options.
    pub options: ProviderOptions,
}

/// Clients carry credentials in headers; show only the identity fields.
impl<C> std::fmt::Debug for Resolved<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Resolution-time failures. These abort immediately, with no retry.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The provider id is not in the table.
    #[error("unsupported provider '{0}'")]
    UnsupportedProvider(CompactString),

    /// No API key available for a provider that requires one.
    #[error("no API key available for provider '{0}'")]
    MissingCredentials(CompactString),

    /// The provider entry could not be turned into a client.
    #[error("invalid provider configuration for '{id}': {message}")]
    InvalidConfig {
        /// Provider id.
        id: CompactString,
        /// What went wrong.
        message: String,
    },
}

/// Seam between the dispatcher and model resolution, so tests can hand the
/// dispatcher a fake client.
pub trait Resolve: Send + Sync {
    /// The concrete client type this resolver produces.
    type Client: Model + Send + Sync;

    /// Resolve a user's configuration to a concrete model client.
    fn resolve(
        &self,
        user: &UserAiFields,
        use_economy: bool,
    ) -> Result<Resolved<Self::Client>, ResolveError>;
}

/// The production resolver: an explicit provider table over HTTP clients.
#[derive(Clone)]
pub struct Resolver {
    /// Enabled providers keyed by id.
    specs: BTreeMap<CompactString, ProviderSpec>,
    /// Provider used when the user has not picked one (first table entry).
    default_provider: CompactString,
    /// Shared key used when the user has no key of their own.
    default_api_key: Option<String>,
    /// Shared HTTP client for constructing provider clients.
    client: Client,
}

impl Resolver {
    /// Create a resolver from an ordered list of enabled providers.
    ///
    /// The first entry becomes the default provider. Panics if the list is
    /// empty; an empty table is a programming error, not a runtime state.
    pub fn new(specs: Vec<ProviderSpec>, default_api_key: Option<String>) -> Self {
        assert!(!specs.is_empty(), "provider table must not be empty");
        let default_provider = specs[0].id.clone();
        Self {
            specs: specs.into_iter().map(|s| (s.id.clone(), s)).collect(),
            default_provider,
            default_api_key,
            client: Client::new(),
        }
    }

    /// Look up a provider spec by id.
    pub fn spec(&self, id: &str) -> Option<&ProviderSpec> {
        self.specs.get(id)
    }

    /// Build the concrete HTTP client for a spec.
    fn build_client(
        &self,
        spec: &ProviderSpec,
        api_key: Option<&str>,
    ) -> Result<HttpProvider, ResolveError> {
        let invalid = |e: anyhow::Error| ResolveError::InvalidConfig {
            id: spec.id.clone(),
            message: e.to_string(),
        };

        let mut provider = match &spec.auth {
            AuthScheme::Bearer => {
                let key = api_key.ok_or_else(|| {
                    ResolveError::MissingCredentials(spec.id.clone())
                })?;
                HttpProvider::bearer(self.client.clone(), key, &spec.endpoint).map_err(invalid)?
            }
            AuthScheme::Header(name) => {
                let key = api_key.ok_or_else(|| {
                    ResolveError::MissingCredentials(spec.id.clone())
                })?;
                HttpProvider::custom_header(self.client.clone(), name, key, &spec.endpoint)
                    .map_err(invalid)?
            }
            AuthScheme::None => HttpProvider::no_auth(self.client.clone(), &spec.endpoint),
        };

        for (name, value) in &spec.extra_headers {
            provider = provider
                .header(name, value)
                .map_err(|e| ResolveError::InvalidConfig {
                    id: spec.id.clone(),
                    message: e.to_string(),
                })?;
        }

        Ok(provider)
    }
}

impl Resolve for Resolver {
    type Client = HttpProvider;

    fn resolve(
        &self,
        user: &UserAiFields,
        use_economy: bool,
    ) -> Result<Resolved<HttpProvider>, ResolveError> {
        let id = user.provider.as_ref().unwrap_or(&self.default_provider);
        let spec = self
            .specs
            .get(id)
            .ok_or_else(|| ResolveError::UnsupportedProvider(id.clone()))?;

        let model = match (use_economy, &spec.economy_model) {
            (true, Some(economy)) => economy.clone(),
            _ => user
                .model
                .clone()
                .unwrap_or_else(|| spec.default_model.clone()),
        };

        let api_key = user
            .api_key
            .as_deref()
            .or(self.default_api_key.as_deref());
        let client = self.build_client(spec, api_key)?;

        tracing::debug!(provider = %spec.id, model = %model, "resolved model client");
        Ok(Resolved {
            provider: spec.id.clone(),
            model,
            client,
            options: ProviderOptions {
                headers: spec.extra_headers.clone(),
            },
        })
    }
}

/// Build the production provider table.
///
/// Optional backends appear only when configured; the table is fixed for
/// the life of the process.
pub fn default_providers(config: &ProvidersConfig) -> Vec<ProviderSpec> {
    let mut specs = vec![
        ProviderSpec {
            id: "openai".into(),
            endpoint: endpoint::OPENAI.into(),
            auth: AuthScheme::Bearer,
            default_model: "gpt-4o".into(),
            economy_model: Some("gpt-4o-mini".into()),
            extra_headers: Vec::new(),
        },
        ProviderSpec {
            id: "anthropic".into(),
            endpoint: endpoint::ANTHROPIC.into(),
            auth: AuthScheme::Header("x-api-key".into()),
            default_model: "claude-3-7-sonnet-20250219".into(),
            economy_model: Some("claude-3-5-haiku-latest".into()),
            extra_headers: vec![("anthropic-version".into(), "2023-06-01".into())],
        },
        ProviderSpec {
            id: "google".into(),
            endpoint: endpoint::GOOGLE.into(),
            auth: AuthScheme::Bearer,
            default_model: "gemini-2.0-flash".into(),
            economy_model: Some("gemini-2.0-flash-lite".into()),
            extra_headers: Vec::new(),
        },
        ProviderSpec {
            id: "groq".into(),
            endpoint: endpoint::GROQ.into(),
            auth: AuthScheme::Bearer,
            default_model: "llama-3.3-70b-versatile".into(),
            economy_model: None,
            extra_headers: Vec::new(),
        },
        ProviderSpec {
            id: "openrouter".into(),
            endpoint: endpoint::OPENROUTER.into(),
            auth: AuthScheme::Bearer,
            default_model: "anthropic/claude-3.7-sonnet".into(),
            economy_model: None,
            extra_headers: Vec::new(),
        },
    ];

    if let Some(url) = &config.ollama_endpoint {
        specs.push(ProviderSpec {
            id: "ollama".into(),
            endpoint: url.clone(),
            auth: AuthScheme::None,
            default_model: config
                .ollama_model
                .clone()
                .unwrap_or_else(|| "llama3.1".into()),
            economy_model: None,
            extra_headers: Vec::new(),
        });
    }

    specs
}
