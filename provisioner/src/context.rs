/// Credentials for the run plus the identifiers discovered or created by the
/// provisioning steps. A `None` identifier means the step that owns it did not
/// produce one; dependent steps check for it instead of sending empty paths.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunContext {
    pub account_identifier: String,
    pub org_identifier: String,
    pub api_key: String,
    workspace_id: Option<String>,
    environment_id: Option<String>,
    traffic_type_id: Option<String>,
    client_api_key: Option<String>,
}

impl RunContext {
    pub fn new(account_identifier: &str, org_identifier: &str, api_key: &str) -> Self {
        RunContext {
            account_identifier: account_identifier.into(),
            org_identifier: org_identifier.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn workspace_id(&self) -> Option<&str> {
        self.workspace_id.as_deref()
    }

    pub fn environment_id(&self) -> Option<&str> {
        self.environment_id.as_deref()
    }

    pub fn traffic_type_id(&self) -> Option<&str> {
        self.traffic_type_id.as_deref()
    }

    pub fn client_api_key(&self) -> Option<&str> {
        self.client_api_key.as_deref()
    }

    pub fn set_workspace_id(&mut self, id: Option<String>) {
        self.workspace_id = non_empty(id);
    }

    pub fn set_environment_id(&mut self, id: Option<String>) {
        self.environment_id = non_empty(id);
    }

    pub fn set_traffic_type_id(&mut self, id: Option<String>) {
        self.traffic_type_id = non_empty(id);
    }

    pub fn set_client_api_key(&mut self, key: Option<String>) {
        self.client_api_key = non_empty(key);
    }
}

// The remote services occasionally answer with an empty identifier; treat it as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
