//! Builds the route table from the registered converters.

use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

use super::table::RouteTable;
use crate::converter::ConverterRegistry;
use crate::formats::FormatCode;

/// Default bound for composed routes.
pub const DEFAULT_MAX_ROUTE_HOPS: usize = 4;

/// Computes conversion routes.
///
/// For a key `(current, target)` the first rule that yields a valid route wins:
/// 1. a direct conversion offered by any converter,
/// 2. a fixed chain declared by a converter for `current`, extended with
///    `target` when the chain does not already reach it,
/// 3. the shortest composition of direct conversions, up to `max_hops`.
///    Among equally short routes the one found first in registration order
///    is used.
pub struct RouteResolver<'a> {
    converters: &'a ConverterRegistry,
    max_hops: usize,
}

impl<'a> RouteResolver<'a> {
    pub fn new(converters: &'a ConverterRegistry) -> Self {
        Self {
            converters,
            max_hops: DEFAULT_MAX_ROUTE_HOPS,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops.max(1);
        self
    }

    /// Builds and validates routes for every key. Keys with
    /// `current == target` and keys without a route get no entry.
    pub fn build_routes<I>(&self, keys: I) -> RouteTable
    where
        I: IntoIterator<Item = (FormatCode, FormatCode)>,
    {
        let mut table = RouteTable::new();
        let mut seen = HashSet::new();

        for (from, to) in keys {
            if from == to || from.is_unknown() || !seen.insert((from.clone(), to.clone())) {
                continue;
            }
            match self.resolve(&from, &to) {
                Some(hops) => {
                    debug!(%from, %to, hops = ?hops, "Route resolved");
                    table.insert(from, to, hops);
                }
                None => debug!(%from, %to, "No route"),
            }
        }

        let removed = self.validate_table(&mut table);
        info!(routes = table.len(), pruned = removed, "Route table built");
        table
    }

    /// Route for one key, if any.
    pub fn resolve(&self, from: &FormatCode, to: &FormatCode) -> Option<Vec<FormatCode>> {
        if from == to {
            return None;
        }

        if self.converters.supports(from, to) {
            return Some(vec![to.clone()]);
        }

        for registered in self.converters.iter() {
            for chain in registered.converter().capability().fixed_chains() {
                if chain.source != *from {
                    continue;
                }
                let hops = extend_chain(&chain.hops, to);
                if self.is_valid(from, &hops) {
                    return Some(hops);
                }
                debug!(
                    converter = %registered.name(),
                    %from,
                    %to,
                    "Fixed chain not usable for target"
                );
            }
        }

        self.compose(from, to)
    }

    /// Breadth-first search over the union of direct conversions.
    fn compose(&self, from: &FormatCode, to: &FormatCode) -> Option<Vec<FormatCode>> {
        let mut previous: HashMap<FormatCode, FormatCode> = HashMap::new();
        let mut visited: HashSet<FormatCode> = HashSet::from([from.clone()]);
        let mut queue: VecDeque<(FormatCode, usize)> = VecDeque::from([(from.clone(), 0)]);

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= self.max_hops {
                continue;
            }
            for registered in self.converters.iter() {
                for next in registered.converter().capability().targets_from(&node) {
                    if !visited.insert(next.clone()) {
                        continue;
                    }
                    previous.insert(next.clone(), node.clone());
                    if next == to {
                        return Some(unwind(&previous, from, to));
                    }
                    queue.push_back((next.clone(), depth + 1));
                }
            }
        }
        None
    }

    /// Whether every consecutive pair of `from` followed by `hops` is
    /// supported by some registered converter.
    pub fn is_valid(&self, from: &FormatCode, hops: &[FormatCode]) -> bool {
        if hops.is_empty() {
            return false;
        }
        let mut current = from;
        for hop in hops {
            if !self.converters.supports(current, hop) {
                return false;
            }
            current = hop;
        }
        true
    }

    /// Removes every route containing an unsupported hop. Returns the number
    /// removed.
    pub fn validate_table(&self, table: &mut RouteTable) -> usize {
        table.retain(|from, hops| {
            let valid = self.is_valid(from, hops);
            if !valid {
                warn!(%from, hops = ?hops, "Removing route with unsupported hop");
            }
            valid
        })
    }
}

/// Chain hops up to and including `target`, or the whole chain followed by
/// `target`.
fn extend_chain(chain: &[FormatCode], target: &FormatCode) -> Vec<FormatCode> {
    match chain.iter().position(|hop| hop == target) {
        Some(index) => chain[..=index].to_vec(),
        None => {
            let mut hops = chain.to_vec();
            hops.push(target.clone());
            hops
        }
    }
}

fn unwind(
    previous: &HashMap<FormatCode, FormatCode>,
    from: &FormatCode,
    to: &FormatCode,
) -> Vec<FormatCode> {
    let mut hops = vec![to.clone()];
    let mut node = to;
    while let Some(prev) = previous.get(node) {
        if prev == from {
            break;
        }
        hops.push(prev.clone());
        node = prev;
    }
    hops.reverse();
    hops
}

/// Convenience wrapper: builds routes for `keys` with the given bound.
pub fn build_routes<I>(keys: I, converters: &ConverterRegistry, max_hops: usize) -> RouteTable
where
    I: IntoIterator<Item = (FormatCode, FormatCode)>,
{
    RouteResolver::new(converters)
        .with_max_hops(max_hops)
        .build_routes(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::codes;
    use crate::testing::MockConverter;
    use std::sync::Arc;

    fn key(from: &str, to: &str) -> (FormatCode, FormatCode) {
        (from.into(), to.into())
    }

    fn office_and_pdf() -> ConverterRegistry {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(
            MockConverter::new("office")
                .with_conversion("fmt/40", "fmt/412")
                .with_conversion("fmt/412", "fmt/276"),
        ));
        registry.register(Arc::new(
            MockConverter::new("pdf")
                .with_conversion("fmt/276", "fmt/477")
                .with_conversion("fmt/412", "fmt/477"),
        ));
        registry
    }

    #[test]
    fn test_direct_route() {
        let registry = office_and_pdf();
        let resolver = RouteResolver::new(&registry);
        assert_eq!(
            resolver.resolve(&"fmt/412".into(), &"fmt/477".into()),
            Some(codes(&["fmt/477"]))
        );
    }

    #[test]
    fn test_composed_route_is_shortest() {
        let registry = office_and_pdf();
        let table = RouteResolver::new(&registry).build_routes([key("fmt/40", "fmt/477")]);
        // fmt/40 -> fmt/412 -> fmt/477 beats the three-hop path through fmt/276.
        assert_eq!(
            table.get(&"fmt/40".into(), &"fmt/477".into()),
            Some(codes(&["fmt/412", "fmt/477"]).as_slice())
        );
    }

    #[test]
    fn test_max_hops_bounds_composition() {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(
            MockConverter::new("chain")
                .with_conversion("a/1", "a/2")
                .with_conversion("a/2", "a/3")
                .with_conversion("a/3", "a/4"),
        ));

        let resolver = RouteResolver::new(&registry).with_max_hops(2);
        assert!(resolver.resolve(&"a/1".into(), &"a/4".into()).is_none());
        assert!(resolver.resolve(&"a/1".into(), &"a/3".into()).is_some());

        let resolver = RouteResolver::new(&registry).with_max_hops(3);
        assert_eq!(
            resolver.resolve(&"a/1".into(), &"a/4".into()),
            Some(codes(&["a/2", "a/3", "a/4"]))
        );
    }

    #[test]
    fn test_fixed_chain_preferred_over_composition() {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(
            MockConverter::new("mail")
                .with_conversion("x-fmt/430", "fmt/950")
                .with_conversion("fmt/950", "fmt/18")
                .with_conversion("x-fmt/430", "fmt/111")
                .with_conversion("fmt/111", "fmt/18")
                .with_chain("x-fmt/430", &["fmt/950", "fmt/18"]),
        ));
        registry.register(Arc::new(
            MockConverter::new("pdfa").with_conversion("fmt/18", "fmt/477"),
        ));
        let resolver = RouteResolver::new(&registry);

        assert_eq!(
            resolver.resolve(&"x-fmt/430".into(), &"fmt/18".into()),
            Some(codes(&["fmt/950", "fmt/18"]))
        );
        assert_eq!(
            resolver.resolve(&"x-fmt/430".into(), &"fmt/477".into()),
            Some(codes(&["fmt/950", "fmt/18", "fmt/477"]))
        );
        // Direct conversion still wins.
        assert_eq!(
            resolver.resolve(&"x-fmt/430".into(), &"fmt/950".into()),
            Some(codes(&["fmt/950"]))
        );
    }

    #[test]
    fn test_invalid_chain_falls_back() {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(
            MockConverter::new("mail")
                .with_conversion("x-fmt/430", "fmt/950")
                .with_conversion("fmt/950", "fmt/276")
                .with_chain("x-fmt/430", &["fmt/950", "fmt/18"]),
        ));
        let resolver = RouteResolver::new(&registry);
        assert_eq!(
            resolver.resolve(&"x-fmt/430".into(), &"fmt/276".into()),
            Some(codes(&["fmt/950", "fmt/276"]))
        );
    }

    #[test]
    fn test_no_route_and_identity_keys_skipped() {
        let registry = office_and_pdf();
        let table = RouteResolver::new(&registry).build_routes([
            key("fmt/13", "fmt/477"),
            key("fmt/477", "fmt/477"),
            key("", "fmt/477"),
        ]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_validation_pass_removes_unsupported_hops() {
        let registry = office_and_pdf();
        let resolver = RouteResolver::new(&registry);
        let mut table = RouteTable::new();
        table.insert("fmt/40".into(), "fmt/477".into(), codes(&["fmt/412", "fmt/477"]));
        table.insert("fmt/40".into(), "fmt/18".into(), codes(&["fmt/412", "fmt/18"]));

        assert_eq!(resolver.validate_table(&mut table), 1);
        assert!(table.contains(&"fmt/40".into(), &"fmt/477".into()));
        assert!(!table.contains(&"fmt/40".into(), &"fmt/18".into()));
    }

    #[test]
    fn test_every_built_route_is_valid() {
        let registry = office_and_pdf();
        let keys = ["fmt/40", "fmt/412", "fmt/276", "fmt/477"]
            .into_iter()
            .flat_map(|a| {
                ["fmt/412", "fmt/276", "fmt/477"]
                    .into_iter()
                    .map(move |b| key(a, b))
            });
        let table = build_routes(keys, &registry, DEFAULT_MAX_ROUTE_HOPS);
        let resolver = RouteResolver::new(&registry);

        assert!(!table.is_empty());
        for entry in table.entries() {
            assert!(resolver.is_valid(&entry.from, &entry.hops));
            assert_eq!(entry.hops.last(), Some(&entry.to));
        }
    }

    #[test]
    fn test_extend_chain() {
        let chain = codes(&["fmt/950", "fmt/18"]);
        assert_eq!(extend_chain(&chain, &"fmt/950".into()), codes(&["fmt/950"]));
        assert_eq!(
            extend_chain(&chain, &"fmt/477".into()),
            codes(&["fmt/950", "fmt/18", "fmt/477"])
        );
    }
}
