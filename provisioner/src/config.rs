use serde::Deserialize;
use url::Url;

const DEFAULT_ADMIN_URL: &str = "https://app.harness.io/ng/api";
const DEFAULT_PLATFORM_URL: &str = "https://api.split.io/internal/api/v2";

/// Where the two remote services live.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    /// Tenant management service, used to create the project.
    #[serde(default = "default_admin_url")]
    pub admin_url: Url,
    /// Flag platform admin API: workspaces, environments, keys, segments, splits.
    #[serde(default = "default_platform_url")]
    pub platform_url: Url,
    /// Certificate validation is off for these clients unless explicitly enabled.
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            admin_url: default_admin_url(),
            platform_url: default_platform_url(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

fn default_admin_url() -> Url {
    Url::parse(DEFAULT_ADMIN_URL).expect("default admin url is valid")
}

fn default_platform_url() -> Url {
    Url::parse(DEFAULT_PLATFORM_URL).expect("default platform url is valid")
}

fn default_accept_invalid_certs() -> bool {
    true
}
