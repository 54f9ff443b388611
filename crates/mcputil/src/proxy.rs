//! Callable views over discovered tools.

use std::fmt;
use std::sync::Arc;

use jsonschema::Validator;
use serde_json::Value;

use crate::calls::CallId;
use crate::error::{Error, Result};
use crate::protocol::ToolDescriptor;
use crate::session::Session;
use crate::stream::EventStream;

/// A callable view over one discovered tool on one session.
///
/// Arguments are validated against the tool's declared input schema before
/// anything is dispatched. [`ToolProxy::invoke`] awaits only the terminal
/// output; [`ToolProxy::call`] returns the full [`EventStream`] for
/// progress-aware callers.
#[derive(Clone)]
pub struct ToolProxy {
    session: Session,
    session_name: Option<String>,
    descriptor: Arc<ToolDescriptor>,
    validator: Arc<Validator>,
}

impl ToolProxy {
    /// Binds `descriptor` to its owning session, compiling the input
    /// schema once.
    pub(crate) fn new(session: Session, descriptor: Arc<ToolDescriptor>) -> Result<Self> {
        let validator = jsonschema::validator_for(&descriptor.input_schema).map_err(|e| {
            Error::Protocol(format!(
                "invalid input schema for tool '{}': {e}",
                descriptor.name
            ))
        })?;
        Ok(Self {
            session,
            session_name: None,
            descriptor,
            validator: Arc::new(validator),
        })
    }

    /// Tags the proxy with the name of the session that owns it.
    pub(crate) fn tagged(mut self, session_name: &str) -> Self {
        self.session_name = Some(session_name.to_owned());
        self
    }

    /// The tool's programmatic name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// The tool's description, or an empty string if none was declared.
    pub fn description(&self) -> &str {
        self.descriptor.description.as_deref().unwrap_or("")
    }

    /// The full discovered descriptor.
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// The owning session's name, when the proxy came from a group.
    pub fn session_name(&self) -> Option<&str> {
        self.session_name.as_deref()
    }

    /// Calls the tool and awaits its terminal output, discarding progress.
    pub async fn invoke(&self, arguments: Value) -> Result<Value> {
        self.call(arguments, None).await?.output().await
    }

    /// Calls the tool and returns the full event stream.
    ///
    /// Supply a non-empty `call_id` to receive progress events; with
    /// `None` the call is fire-and-forget with respect to progress.
    pub async fn call(&self, arguments: Value, call_id: Option<CallId>) -> Result<EventStream> {
        self.validate(&arguments)?;
        self.session
            .invoke(&self.descriptor.name, arguments, call_id)
            .await
    }

    /// Checks `arguments` against the declared input schema.
    fn validate(&self, arguments: &Value) -> Result<()> {
        let violations: Vec<String> = self
            .validator
            .iter_errors(arguments)
            .map(|err| {
                let path = err.instance_path().to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{path}: {err}")
                }
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidArguments {
                tool: self.descriptor.name.clone(),
                violations,
            })
        }
    }
}

impl fmt::Debug for ToolProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolProxy")
            .field("name", &self.descriptor.name)
            .field("session_name", &self.session_name)
            .finish_non_exhaustive()
    }
}
