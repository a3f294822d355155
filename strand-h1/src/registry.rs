//! Hierarchical resource registry.
//!
//! Handlers are mounted at paths in a trie of owned children with
//! non-owning parent links. Overlap is forbidden: no handler may sit on
//! a strict prefix of another handler's path. The trie is an id-indexed
//! arena, so parent back-references are plain indices rather than
//! reference cycles; every mutation happens under the server's core
//! mutex.

use slab::Slab;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::request::Request;
use crate::response::Response;
use crate::server::ServerInner;
use crate::transport::Connection;

/// A resource handler: takes the (path-rewritten) request, the
/// connection it arrived on, and the residual bytes that followed the
/// request in the receive buffer, and produces the response. Returning
/// status 101 transfers ownership of the connection to the handler.
pub type ResourceHandler =
    Arc<dyn Fn(&Request, &Arc<dyn Connection>, &[u8]) -> Response + Send + Sync>;

struct ResourceNode {
    name: String,
    handler: Option<ResourceHandler>,
    children: HashMap<String, usize>,
    parent: Option<usize>,
}

/// The trie. Node ids are stable for the lifetime of the node; a node
/// holding a handler is only ever removed by its own unregistration.
pub(crate) struct ResourceRegistry {
    nodes: Slab<ResourceNode>,
    root: Option<usize>,
}

impl ResourceRegistry {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Slab::new(),
            root: None,
        }
    }

    /// Mounts a handler at the given path. Returns the id of the node
    /// now holding the handler, or `None` when the mount would overlap
    /// an existing registration; rejection leaves the trie untouched.
    pub(crate) fn register(
        &mut self,
        path: &[String],
        handler: ResourceHandler,
    ) -> Option<usize> {
        // Walk the existing prefix first so a rejection creates nothing.
        let mut existing = self.root;
        let mut depth = 0;
        while let Some(id) = existing {
            let node = &self.nodes[id];
            if node.handler.is_some() {
                return None;
            }
            match path.get(depth) {
                Some(segment) => {
                    existing = node.children.get(segment).copied();
                    depth += 1;
                }
                None => break,
            }
        }
        if let Some(id) = existing {
            // The full path already exists; it must be an empty leaf.
            let node = &self.nodes[id];
            if node.handler.is_some() || !node.children.is_empty() {
                return None;
            }
            self.nodes[id].handler = Some(handler);
            return Some(id);
        }

        let mut current = match self.root {
            Some(root) => root,
            None => {
                let root = self.nodes.insert(ResourceNode {
                    name: String::new(),
                    handler: None,
                    children: HashMap::new(),
                    parent: None,
                });
                self.root = Some(root);
                root
            }
        };
        for segment in path {
            current = match self.nodes[current].children.get(segment) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.insert(ResourceNode {
                        name: segment.clone(),
                        handler: None,
                        children: HashMap::new(),
                        parent: Some(current),
                    });
                    self.nodes[current].children.insert(segment.clone(), child);
                    child
                }
            };
        }
        self.nodes[current].handler = Some(handler);
        Some(current)
    }

    /// Clears the handler at `node_id` and prunes every ancestor left
    /// with neither handler nor children. An emptied root resets the
    /// registry.
    pub(crate) fn unregister(&mut self, node_id: usize) {
        if !self.nodes.contains(node_id) {
            return;
        }
        self.nodes[node_id].handler = None;
        let mut current = node_id;
        loop {
            let node = &self.nodes[current];
            if node.handler.is_some() || !node.children.is_empty() {
                break;
            }
            let parent = node.parent;
            let name = node.name.clone();
            self.nodes.remove(current);
            match parent {
                Some(parent) => {
                    self.nodes[parent].children.remove(&name);
                    current = parent;
                }
                None => {
                    self.root = None;
                    break;
                }
            }
        }
    }

    /// Resolves a handler for the given path segments. A leading empty
    /// segment (absolute path) is skipped. Returns the handler of the
    /// deepest matching node together with the unconsumed segments.
    pub(crate) fn lookup(
        &self,
        segments: &[String],
    ) -> Option<(ResourceHandler, Vec<String>)> {
        let mut remaining: &[String] = segments;
        if remaining.first().is_some_and(|s| s.is_empty()) {
            remaining = &remaining[1..];
        }
        let mut current = self.root?;
        while let Some(segment) = remaining.first() {
            match self.nodes[current].children.get(segment) {
                Some(&child) => {
                    current = child;
                    remaining = &remaining[1..];
                }
                None => break,
            }
        }
        self.nodes[current]
            .handler
            .clone()
            .map(|handler| (handler, remaining.to_vec()))
    }

    #[cfg(test)]
    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Revokes a resource registration made through
/// [`Server::register_resource`](crate::Server::register_resource).
///
/// Unregistration is explicit; dropping the value without calling
/// [`unregister`](Registration::unregister) leaves the handler mounted.
pub struct Registration {
    pub(crate) server: Weak<ServerInner>,
    pub(crate) node_id: usize,
}

impl Registration {
    /// Unmounts the handler and prunes the path it occupied, leaving
    /// intact any node another registration still needs.
    pub fn unregister(self) {
        if let Some(server) = self.server.upgrade() {
            server.unregister_resource(self.node_id);
        }
    }
}
