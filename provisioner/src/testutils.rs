use crate::client::{ApiError, NamedObject, Platform, ProjectSpec};
use async_trait::async_trait;
use http::StatusCode;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub args: Vec<String>,
}

impl Call {
    pub fn new(op: &'static str, args: &[&str]) -> Self {
        Call {
            op,
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FakeState {
    pub projects: Vec<String>,
    pub project_specs: Vec<ProjectSpec>,
    pub workspaces: Vec<NamedObject>,
    pub traffic_types: Vec<(String, NamedObject)>,
    pub environments: Vec<(String, NamedObject)>,
    pub api_keys: Vec<String>,
    pub segments: Vec<String>,
    pub enabled_segments: Vec<(String, String)>,
    pub segment_keys: HashMap<(String, String), Vec<String>>,
    pub flags: Vec<String>,
    pub definitions: HashMap<(String, String, String), Value>,
    counter: usize,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}-{}", self.counter)
    }
}

/// In-memory flag platform that answers like the real one: creating an object
/// twice is a conflict, listing returns what was created.
pub struct FakePlatform {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<Call>>,
    failing: HashSet<&'static str>,
    user_traffic_type: bool,
}

fn status(status: StatusCode) -> ApiError {
    ApiError::Status {
        status,
        code: None,
        message: status.to_string(),
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        FakePlatform {
            state: Mutex::new(FakeState::default()),
            calls: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            user_traffic_type: true,
        }
    }

    /// A tenant where the workshop project and its workspace already exist.
    pub fn with_existing_project(workspace_id: &str) -> Self {
        let platform = FakePlatform::new();
        {
            let mut state = platform.state.lock().unwrap();
            state.projects.push(crate::pipeline::PROJECT_IDENTIFIER.into());
            state.workspaces.push(NamedObject {
                id: workspace_id.into(),
                name: crate::pipeline::WORKSPACE_NAME.into(),
            });
            state.traffic_types.push((
                workspace_id.into(),
                NamedObject {
                    id: "tt-existing".into(),
                    name: "user".into(),
                },
            ));
        }
        platform
    }

    /// Every call to `op` answers with a 500.
    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.insert(op);
        self
    }

    pub fn without_user_traffic_type(mut self) -> Self {
        self.user_traffic_type = false;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn state(&self) -> FakeState {
        self.state.lock().unwrap().clone()
    }

    pub fn segment_keys(&self, environment_id: &str, name: &str) -> Option<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .segment_keys
            .get(&(environment_id.to_string(), name.to_string()))
            .cloned()
    }

    pub fn definition(
        &self,
        workspace_id: &str,
        name: &str,
        environment_id: &str,
    ) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .definitions
            .get(&(
                workspace_id.to_string(),
                name.to_string(),
                environment_id.to_string(),
            ))
            .cloned()
    }

    fn call(&self, op: &'static str, args: &[&str]) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(Call::new(op, args));
        if self.failing.contains(op) {
            return Err(status(StatusCode::INTERNAL_SERVER_ERROR));
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn create_project(&self, project: &ProjectSpec) -> Result<String, ApiError> {
        self.call("create_project", &[project.identifier.as_str()])?;
        let mut state = self.state.lock().unwrap();
        if state.projects.contains(&project.identifier) {
            return Err(ApiError::Status {
                status: StatusCode::BAD_REQUEST,
                code: Some("DUPLICATE_FIELD".into()),
                message: "project already exists".into(),
            });
        }

        state.projects.push(project.identifier.clone());
        state.project_specs.push(project.clone());
        let workspace_id = state.next_id("ws");
        state.workspaces.push(NamedObject {
            id: workspace_id.clone(),
            name: project.name.clone(),
        });
        let mut traffic_types = vec!["account"];
        if self.user_traffic_type {
            traffic_types.push("user");
        }
        for name in traffic_types {
            let id = state.next_id("tt");
            state.traffic_types.push((
                workspace_id.clone(),
                NamedObject {
                    id,
                    name: name.into(),
                },
            ));
        }
        Ok(project.identifier.clone())
    }

    async fn list_workspaces(&self) -> Result<Vec<NamedObject>, ApiError> {
        self.call("list_workspaces", &[])?;
        Ok(self.state.lock().unwrap().workspaces.clone())
    }

    async fn list_traffic_types(&self, workspace_id: &str) -> Result<Vec<NamedObject>, ApiError> {
        self.call("list_traffic_types", &[workspace_id])?;
        let state = self.state.lock().unwrap();
        Ok(state
            .traffic_types
            .iter()
            .filter(|(ws, _)| ws == workspace_id)
            .map(|(_, tt)| tt.clone())
            .collect())
    }

    async fn create_environment(&self, workspace_id: &str, name: &str) -> Result<String, ApiError> {
        self.call("create_environment", &[workspace_id, name])?;
        let mut state = self.state.lock().unwrap();
        if state
            .environments
            .iter()
            .any(|(ws, env)| ws == workspace_id && env.name == name)
        {
            return Err(status(StatusCode::CONFLICT));
        }
        let id = state.next_id("env");
        state.environments.push((
            workspace_id.into(),
            NamedObject {
                id: id.clone(),
                name: name.into(),
            },
        ));
        Ok(id)
    }

    async fn list_environments(&self, workspace_id: &str) -> Result<Vec<NamedObject>, ApiError> {
        self.call("list_environments", &[workspace_id])?;
        let state = self.state.lock().unwrap();
        Ok(state
            .environments
            .iter()
            .filter(|(ws, _)| ws == workspace_id)
            .map(|(_, env)| env.clone())
            .collect())
    }

    async fn create_client_api_key(
        &self,
        workspace_id: &str,
        environment_id: &str,
    ) -> Result<String, ApiError> {
        self.call("create_client_api_key", &[workspace_id, environment_id])?;
        let mut state = self.state.lock().unwrap();
        let key = format!("key-{}", state.api_keys.len() + 1);
        state.api_keys.push(key.clone());
        Ok(key)
    }

    async fn create_segment(
        &self,
        workspace_id: &str,
        traffic_type_id: &str,
        name: &str,
        _description: &str,
    ) -> Result<(), ApiError> {
        self.call("create_segment", &[workspace_id, traffic_type_id, name])?;
        let mut state = self.state.lock().unwrap();
        if state.segments.iter().any(|s| s == name) {
            return Err(status(StatusCode::CONFLICT));
        }
        state.segments.push(name.into());
        Ok(())
    }

    async fn enable_segment(&self, environment_id: &str, name: &str) -> Result<(), ApiError> {
        self.call("enable_segment", &[environment_id, name])?;
        let mut state = self.state.lock().unwrap();
        let entry = (environment_id.to_string(), name.to_string());
        if state.enabled_segments.contains(&entry) {
            return Err(status(StatusCode::CONFLICT));
        }
        state.enabled_segments.push(entry);
        Ok(())
    }

    async fn replace_segment_keys(
        &self,
        environment_id: &str,
        name: &str,
        keys: &[String],
        _comment: &str,
    ) -> Result<(), ApiError> {
        self.call("replace_segment_keys", &[environment_id, name])?;
        self.state
            .lock()
            .unwrap()
            .segment_keys
            .insert((environment_id.into(), name.into()), keys.to_vec());
        Ok(())
    }

    async fn create_flag(
        &self,
        workspace_id: &str,
        traffic_type: &str,
        name: &str,
        _description: &str,
    ) -> Result<(), ApiError> {
        self.call("create_flag", &[workspace_id, traffic_type, name])?;
        let mut state = self.state.lock().unwrap();
        if state.flags.iter().any(|f| f == name) {
            return Err(status(StatusCode::CONFLICT));
        }
        state.flags.push(name.into());
        Ok(())
    }

    async fn create_flag_definition(
        &self,
        workspace_id: &str,
        name: &str,
        environment_id: &str,
        definition: &Value,
    ) -> Result<(), ApiError> {
        self.call("create_flag_definition", &[workspace_id, name, environment_id])?;
        let mut state = self.state.lock().unwrap();
        let key: (String, String, String) =
            (workspace_id.into(), name.into(), environment_id.into());
        if state.definitions.contains_key(&key) {
            return Err(status(StatusCode::CONFLICT));
        }
        state.definitions.insert(key, definition.clone());
        Ok(())
    }

    async fn update_flag_definition(
        &self,
        workspace_id: &str,
        name: &str,
        environment_id: &str,
        definition: &Value,
    ) -> Result<(), ApiError> {
        self.call("update_flag_definition", &[workspace_id, name, environment_id])?;
        let mut state = self.state.lock().unwrap();
        let key: (String, String, String) =
            (workspace_id.into(), name.into(), environment_id.into());
        match state.definitions.get_mut(&key) {
            Some(existing) => {
                *existing = definition.clone();
                Ok(())
            }
            None => Err(status(StatusCode::NOT_FOUND)),
        }
    }
}
