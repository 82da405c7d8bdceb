//! Process Registry
//!
//! Live mailboxes by pid and registered names by atom. Names are unique per
//! node and always point at a live mailbox: removing a mailbox releases every
//! name bound to it.

use crate::messages::Envelope;
use crate::{NodeError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;
use types::{Atom, Pid};

pub(crate) type MailboxSender = mpsc::UnboundedSender<Envelope>;
pub(crate) type MailboxReceiver = mpsc::UnboundedReceiver<Envelope>;

#[derive(Debug, Default)]
pub struct ProcessRegistry {
    /// Live mailboxes on this node
    mailboxes: RwLock<HashMap<Pid, MailboxSender>>,

    /// Registered names
    names: RwLock<HashMap<Atom, Pid>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_mailbox(&self, pid: Pid, sender: MailboxSender) {
        tracing::trace!("Adding mailbox: {}", pid);
        self.mailboxes.write().insert(pid, sender);
    }

    /// Drop a mailbox and release its names, returning the released names
    pub(crate) fn remove_mailbox(&self, pid: &Pid) -> Vec<Atom> {
        // Lock ordering: mailboxes before names
        let mut mailboxes = self.mailboxes.write();
        let mut names = self.names.write();

        mailboxes.remove(pid);
        let released: Vec<Atom> = names
            .iter()
            .filter(|(_, owner)| *owner == pid)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &released {
            names.remove(name);
        }

        tracing::trace!("Removed mailbox {} (released names: {:?})", pid, released);
        released
    }

    pub(crate) fn mailbox(&self, pid: &Pid) -> Option<MailboxSender> {
        self.mailboxes.read().get(pid).cloned()
    }

    /// Bind `name` to a live local process
    pub fn register(&self, name: Atom, pid: Pid) -> Result<()> {
        let mailboxes = self.mailboxes.read();
        if !mailboxes.contains_key(&pid) {
            return Err(NodeError::no_process(&pid));
        }

        let mut names = self.names.write();
        if let Some(owner) = names.get(&name) {
            return Err(NodeError::NameTaken {
                name,
                pid: owner.clone(),
            });
        }

        tracing::debug!("Registering name {} for {}", name, pid);
        names.insert(name, pid);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Option<Pid> {
        let removed = self.names.write().remove(name);
        if removed.is_none() {
            tracing::warn!("Attempted to unregister unknown name: {}", name);
        }
        removed
    }

    pub fn whereis(&self, name: &str) -> Option<Pid> {
        self.names.read().get(name).cloned()
    }

    pub fn contains(&self, pid: &Pid) -> bool {
        self.mailboxes.read().contains_key(pid)
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.mailboxes.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.mailboxes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mailboxes.read().is_empty()
    }
}
