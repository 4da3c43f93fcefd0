//! Hierarchical name server: longest-prefix-match registry of path
//! segments to server endpoints.

use std::collections::HashMap;

/// An owned endpoint capability registered under a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointHandle(pub u32);

/// A flat `(segment, endpoint)` registry with longest-prefix-match lookup.
///
/// Registering under an already-used name replaces the existing entry
/// silently (matches the donor C implementation's `nsv_register_handler`,
/// which never errors on re-registration of the same name).
#[derive(Default)]
pub struct NameServer {
    entries: HashMap<String, EndpointHandle>,
}

impl NameServer {
    /// Creates an empty name server.
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Registers `name` to `ep`, replacing any existing entry with the
    /// same segment.
    pub fn register(&mut self, name: &str, ep: EndpointHandle) {
        self.entries.insert(name.to_string(), ep);
    }

    /// Removes the entry for `name`, if present.
    pub fn unregister(&mut self, name: &str) -> Option<EndpointHandle> {
        self.entries.remove(name)
    }

    /// Finds the entry whose registered segment is the longest prefix of
    /// `path` that ends on a `/`-boundary, returning the endpoint and the
    /// number of bytes of `path` consumed by the match.
    ///
    /// Returns `None` if no registered segment is a prefix boundary of
    /// `path`.
    pub fn resolve(&self, path: &str) -> Option<(EndpointHandle, usize)> {
        let mut best: Option<(&str, EndpointHandle)> = None;
        for (segment, ep) in &self.entries {
            if is_segment_boundary_prefix(path, segment)
                && best.is_none_or(|(b, _)| segment.len() > b.len())
            {
                best = Some((segment.as_str(), *ep));
            }
        }
        best.map(|(segment, ep)| (ep, segment.len()))
    }
}

/// True iff `prefix` is a prefix of `path` and either consumes all of
/// `path` or is immediately followed by a `/`.
fn is_segment_boundary_prefix(path: &str, prefix: &str) -> bool {
    if !path.starts_with(prefix) {
        return false;
    }
    match path.as_bytes().get(prefix.len()) {
        None => true,
        Some(b'/') => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_longest_registered_prefix() {
        let mut ns = NameServer::new();
        ns.register("/dev", EndpointHandle(1));
        ns.register("/dev/console", EndpointHandle(2));
        let (ep, consumed) = ns.resolve("/dev/console/0").unwrap();
        assert_eq!(ep, EndpointHandle(2));
        assert_eq!(consumed, "/dev/console".len());
    }

    #[test]
    fn falls_back_to_shorter_prefix_when_longer_does_not_match() {
        let mut ns = NameServer::new();
        ns.register("/dev", EndpointHandle(1));
        ns.register("/dev/console", EndpointHandle(2));
        let (ep, _) = ns.resolve("/dev/timer").unwrap();
        assert_eq!(ep, EndpointHandle(1));
    }

    #[test]
    fn no_match_returns_none() {
        let ns = NameServer::new();
        assert_eq!(ns.resolve("/dev/console"), None);
    }

    #[test]
    fn prefix_must_land_on_segment_boundary() {
        let mut ns = NameServer::new();
        ns.register("/dev", EndpointHandle(1));
        // "/device" must not match the "/dev" registration.
        assert_eq!(ns.resolve("/device"), None);
    }

    #[test]
    fn register_replaces_existing_entry_silently() {
        let mut ns = NameServer::new();
        ns.register("/dev", EndpointHandle(1));
        ns.register("/dev", EndpointHandle(2));
        assert_eq!(ns.resolve("/dev"), Some((EndpointHandle(2), "/dev".len())));
    }

    #[test]
    fn unregister_removes_entry() {
        let mut ns = NameServer::new();
        ns.register("/dev", EndpointHandle(1));
        ns.unregister("/dev");
        assert_eq!(ns.resolve("/dev"), None);
    }
}
