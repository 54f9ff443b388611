//! Aggregation of named sessions under one tool namespace.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future;
use serde_json::Value;

use mcputil_transport::Transport;

use crate::calls::CallId;
use crate::catalog::SessionCatalog;
use crate::error::{Error, Result};
use crate::proxy::ToolProxy;
use crate::session::Session;
use crate::stream::EventStream;

/// A group of named sessions exposing one namespaced tool catalog.
///
/// Tool names may repeat across sessions because every entry is keyed by
/// `(session name, tool name)`; duplicates within one session were already
/// rejected at discovery. Calls on different sessions are fully
/// independent: one session failing does not affect the others.
#[derive(Debug, Default)]
pub struct Group {
    sessions: BTreeMap<String, Session>,
}

impl Group {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects all named transports concurrently and groups the sessions.
    ///
    /// On any failure the sessions that did connect are closed before the
    /// first error is returned.
    pub async fn connect(
        transports: impl IntoIterator<Item = (String, Arc<dyn Transport>)>,
    ) -> Result<Self> {
        let (names, transports): (Vec<_>, Vec<_>) = transports.into_iter().unzip();
        let results = future::join_all(transports.into_iter().map(Session::connect)).await;

        let mut sessions = BTreeMap::new();
        let mut first_error = None;
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(session) => {
                    sessions.insert(name, session);
                }
                Err(err) => {
                    tracing::error!(session = %name, error = %err, "session failed to connect");
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            future::join_all(sessions.values().map(Session::close)).await;
            return Err(err);
        }
        Ok(Self { sessions })
    }

    /// Adds a connected session under `name`, replacing any prior holder.
    pub fn add_session(&mut self, name: impl Into<String>, session: Session) {
        self.sessions.insert(name.into(), session);
    }

    /// Looks up a member session by name.
    pub fn session(&self, name: &str) -> Result<&Session> {
        self.sessions.get(name).ok_or_else(|| Error::UnknownSession {
            name: name.to_owned(),
            available: self.session_names(),
        })
    }

    /// Member session names, in name order.
    pub fn session_names(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    /// Returns proxies for every tool of every member session, each tagged
    /// with its owning session's name. Sessions are visited in name order,
    /// tools within a session in server order.
    pub async fn tools(&self) -> Result<Vec<ToolProxy>> {
        let mut all = Vec::new();
        for (name, session) in &self.sessions {
            let proxies = session.tools().await?;
            all.extend(proxies.into_iter().map(|proxy| proxy.tagged(name)));
        }
        Ok(all)
    }

    /// Routes a tool call to the named session.
    ///
    /// Fails with [`Error::UnknownSession`] before any transport
    /// interaction when `session_name` is not a member.
    pub async fn call_tool(
        &self,
        session_name: &str,
        tool_name: &str,
        arguments: Value,
        call_id: Option<CallId>,
    ) -> Result<EventStream> {
        self.session(session_name)?
            .invoke(tool_name, arguments, call_id)
            .await
    }

    /// Snapshots every member's catalog, keyed by session name.
    ///
    /// The result is order-stable (name order, server tool order), so
    /// rendering it for stub generation is deterministic across runs.
    pub async fn catalogs(&self) -> Result<BTreeMap<String, SessionCatalog>> {
        let mut catalogs = BTreeMap::new();
        for (name, session) in &self.sessions {
            catalogs.insert(name.clone(), session.catalog().await?);
        }
        Ok(catalogs)
    }

    /// Drops every member's cached catalog.
    pub fn invalidate_catalogs(&self) {
        for session in self.sessions.values() {
            session.invalidate_catalog();
        }
    }

    /// Closes all member sessions concurrently. Idempotent.
    pub async fn close(&self) {
        future::join_all(self.sessions.values().map(Session::close)).await;
    }
}
