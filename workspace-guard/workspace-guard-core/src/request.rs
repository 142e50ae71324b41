use uuid::Uuid;

/// Identity of one inbound call.
///
/// Handed through to the auth collaborator and the persistence client; the
/// permission layer never looks inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    id: Uuid,
    path: String,
    workspace_id: Option<String>,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            workspace_id: None,
        }
    }

    pub fn with_workspace_id(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Workspace the request was addressed to via a `/w/{id}` URL, if any.
    pub fn workspace_id(&self) -> Option<&str> {
        self.workspace_id.as_deref()
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new("/")
    }
}
