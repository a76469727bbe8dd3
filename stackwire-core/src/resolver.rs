//! Deployment order resolution.
//!
//! Stacks form a DAG through their declared dependencies. The resolver
//! produces a topological order with Kahn's algorithm; among stacks that are
//! ready at the same time, the one declared first goes first, so the same
//! input always yields the same order. Regions play no part in ordering.

use crate::error::{Result, StackwireError};
use crate::types::{RegistryKey, StackDescriptor};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, instrument};

/// A consumed key that no other stack declares as produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsatisfiedContract {
    pub stack: String,
    pub key: RegistryKey,
}

/// A hard dependency on a key whose producer is not ordered before the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingHazard {
    pub stack: String,
    pub key: RegistryKey,
    pub producer: String,
}

/// Validated set of stacks.
#[derive(Debug, Clone)]
pub struct Resolver {
    stacks: Vec<StackDescriptor>,
    index: HashMap<String, usize>,
    /// Per stack, indices of its (deduplicated) dependencies.
    dependencies: Vec<BTreeSet<usize>>,
}

impl Resolver {
    /// Validate names and dependency references.
    pub fn new(stacks: Vec<StackDescriptor>) -> Result<Self> {
        let mut index = HashMap::with_capacity(stacks.len());
        for (i, stack) in stacks.iter().enumerate() {
            if index.insert(stack.name.clone(), i).is_some() {
                return Err(StackwireError::DuplicateStack { stack: stack.name.clone() });
            }
        }

        let mut dependencies = Vec::with_capacity(stacks.len());
        for stack in &stacks {
            let mut deps = BTreeSet::new();
            for dep in &stack.depends_on {
                let &i = index.get(dep).ok_or_else(|| StackwireError::MissingDependency {
                    stack: stack.name.clone(),
                    dependency: dep.clone(),
                })?;
                deps.insert(i);
            }
            dependencies.push(deps);
        }

        Ok(Self { stacks, index, dependencies })
    }

    pub fn stacks(&self) -> &[StackDescriptor] {
        &self.stacks
    }

    pub fn get(&self, name: &str) -> Option<&StackDescriptor> {
        self.index.get(name).map(|&i| &self.stacks[i])
    }

    /// Deployment order over every stack.
    ///
    /// Fails with `CycleDetected` and no partial order when the graph has a cycle.
    #[instrument(skip(self), fields(stacks = self.stacks.len()))]
    pub fn order(&self) -> Result<Vec<&StackDescriptor>> {
        let count = self.stacks.len();
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(|d| d.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (i, deps) in self.dependencies.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(i);
            }
        }

        // Ordered set of ready stacks keyed by declaration index.
        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != count {
            let remaining: HashSet<usize> = (0..count).filter(|&i| in_degree[i] > 0).collect();
            let cycle = self.find_cycle(&remaining);
            return Err(StackwireError::CycleDetected { stacks: cycle });
        }

        let names: Vec<&str> = order.iter().map(|&i| self.stacks[i].name.as_str()).collect();
        info!("Resolved deployment order: {}", names.join(" -> "));
        Ok(order.into_iter().map(|i| &self.stacks[i]).collect())
    }

    /// Deployment order restricted to `target` and everything it depends on.
    #[instrument(skip(self))]
    pub fn plan_for(&self, target: &str) -> Result<Vec<&StackDescriptor>> {
        let &start = self
            .index
            .get(target)
            .ok_or_else(|| StackwireError::UnknownStack { stack: target.to_string() })?;

        let needed = self.closure(start);
        let order = self.order()?;
        let plan: Vec<&StackDescriptor> =
            order.into_iter().filter(|s| needed.contains(&self.index[&s.name])).collect();

        debug!(target, steps = plan.len(), "Planned targeted deployment");
        Ok(plan)
    }

    /// Consumed keys that no other stack produces.
    pub fn unsatisfied_contracts(&self) -> Vec<UnsatisfiedContract> {
        let mut unsatisfied = Vec::new();
        for (i, stack) in self.stacks.iter().enumerate() {
            for dependency in &stack.consumes {
                let produced_elsewhere = self
                    .stacks
                    .iter()
                    .enumerate()
                    .any(|(j, other)| j != i && other.produces.contains(&dependency.key));
                if !produced_elsewhere {
                    unsatisfied.push(UnsatisfiedContract {
                        stack: stack.name.clone(),
                        key: dependency.key.clone(),
                    });
                }
            }
        }
        unsatisfied
    }

    /// Hard dependencies whose producer is not a (transitive) dependency of
    /// the consumer. Such reads only succeed by luck of timing.
    pub fn ordering_hazards(&self) -> Vec<OrderingHazard> {
        let mut hazards = Vec::new();
        for (i, stack) in self.stacks.iter().enumerate() {
            let upstream = self.closure(i);
            for key in stack.required_keys() {
                for (j, producer) in self.stacks.iter().enumerate() {
                    if j != i && producer.produces.contains(key) && !upstream.contains(&j) {
                        hazards.push(OrderingHazard {
                            stack: stack.name.clone(),
                            key: key.clone(),
                            producer: producer.name.clone(),
                        });
                    }
                }
            }
        }
        hazards
    }

    /// `start` plus every stack it transitively depends on.
    fn closure(&self, start: usize) -> HashSet<usize> {
        let mut seen = HashSet::from([start]);
        let mut pending = vec![start];
        while let Some(i) = pending.pop() {
            for &dep in &self.dependencies[i] {
                if seen.insert(dep) {
                    pending.push(dep);
                }
            }
        }
        seen
    }

    /// Walk unresolved dependencies until a stack repeats.
    ///
    /// Every stack left over by Kahn's algorithm still has an unresolved
    /// dependency, so the walk always closes a loop.
    fn find_cycle(&self, remaining: &HashSet<usize>) -> Vec<String> {
        let Some(&start) = remaining.iter().min() else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut position = HashMap::from([(start, 0usize)]);
        let mut current = start;

        loop {
            let next = self.dependencies[current].iter().copied().find(|d| remaining.contains(d));
            let Some(next) = next else {
                break;
            };
            if let Some(&at) = position.get(&next) {
                let mut cycle: Vec<String> =
                    path[at..].iter().map(|&i| self.stacks[i].name.clone()).collect();
                cycle.push(self.stacks[next].name.clone());
                return cycle;
            }
            position.insert(next, path.len());
            path.push(next);
            current = next;
        }

        path.into_iter().map(|i| self.stacks[i].name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dependency;

    fn stack(name: &str, deps: &[&str]) -> StackDescriptor {
        deps.iter().fold(StackDescriptor::new(name, "eu-west-1"), |s, d| s.depends_on(*d))
    }

    fn names(order: &[&StackDescriptor]) -> Vec<String> {
        order.iter().map(|s| s.name.clone()).collect()
    }

    fn key(raw: &str) -> RegistryKey {
        RegistryKey::parse(raw).unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let resolver = Resolver::new(vec![
            stack("edge", &["app-shell"]),
            stack("system-health", &["app-shell"]),
            stack("app-shell", &[]),
        ])
        .unwrap();

        let order = names(&resolver.order().unwrap());
        assert_eq!(order, vec!["app-shell", "edge", "system-health"]);
    }

    #[test]
    fn test_tie_break_is_declaration_order() {
        let resolver =
            Resolver::new(vec![stack("c", &[]), stack("a", &[]), stack("b", &["c"])]).unwrap();

        // "b" becomes ready after "c" but was declared after "a".
        assert_eq!(names(&resolver.order().unwrap()), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_order_is_deterministic() {
        let build = || {
            Resolver::new(vec![
                stack("d", &["b", "c"]),
                stack("b", &["a"]),
                stack("c", &["a"]),
                stack("a", &[]),
                stack("e", &[]),
            ])
            .unwrap()
        };

        let first = names(&build().order().unwrap());
        for _ in 0..10 {
            assert_eq!(names(&build().order().unwrap()), first);
        }
        assert_eq!(first, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_every_stack_after_its_dependencies() {
        let resolver = Resolver::new(vec![
            stack("web", &["db", "cache"]),
            stack("worker", &["db"]),
            stack("cache", &["net"]),
            stack("db", &["net"]),
            stack("net", &[]),
        ])
        .unwrap();

        let order = names(&resolver.order().unwrap());
        let position = |n: &str| order.iter().position(|s| s == n).unwrap();
        for s in resolver.stacks() {
            for dep in &s.depends_on {
                assert!(position(dep) < position(&s.name), "{} must follow {}", s.name, dep);
            }
        }
    }

    #[test]
    fn test_cross_region_dependency_is_ordered() {
        let resolver = Resolver::new(vec![
            StackDescriptor::new("edge", "us-east-1").depends_on("app-shell"),
            StackDescriptor::new("app-shell", "eu-west-1"),
        ])
        .unwrap();

        assert_eq!(names(&resolver.order().unwrap()), vec!["app-shell", "edge"]);
    }

    #[test]
    fn test_cycle_detected() {
        let resolver = Resolver::new(vec![
            stack("a", &["c"]),
            stack("b", &["a"]),
            stack("c", &["b"]),
            stack("d", &[]),
        ])
        .unwrap();

        match resolver.order() {
            Err(StackwireError::CycleDetected { stacks }) => {
                assert_eq!(stacks.first(), stacks.last());
                assert_eq!(stacks.len(), 4);
                assert!(!stacks.contains(&"d".to_string()));
            }
            other => panic!("expected cycle, got {:?}", other.map(|o| names(&o))),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let resolver = Resolver::new(vec![stack("a", &["a"])]).unwrap();
        let err = resolver.order().unwrap_err();
        assert!(matches!(err, StackwireError::CycleDetected { .. }));
    }

    #[test]
    fn test_cycle_blocks_targeted_plan() {
        let resolver =
            Resolver::new(vec![stack("a", &[]), stack("b", &["c"]), stack("c", &["b"])]).unwrap();
        assert!(matches!(resolver.plan_for("a"), Err(StackwireError::CycleDetected { .. })));
    }

    #[test]
    fn test_missing_and_duplicate_stacks() {
        let err = Resolver::new(vec![stack("a", &["ghost"])]).unwrap_err();
        assert!(matches!(err, StackwireError::MissingDependency { .. }));

        let err = Resolver::new(vec![stack("a", &[]), stack("a", &[])]).unwrap_err();
        assert!(matches!(err, StackwireError::DuplicateStack { .. }));
    }

    #[test]
    fn test_plan_for_target_includes_transitive_dependencies() {
        let resolver = Resolver::new(vec![
            stack("net", &[]),
            stack("unrelated", &[]),
            stack("cluster", &["net"]),
            stack("island", &["cluster"]),
        ])
        .unwrap();

        assert_eq!(names(&resolver.plan_for("island").unwrap()), vec!["net", "cluster", "island"]);
        assert_eq!(names(&resolver.plan_for("net").unwrap()), vec!["net"]);
        assert!(matches!(
            resolver.plan_for("nope"),
            Err(StackwireError::UnknownStack { .. })
        ));
    }

    #[test]
    fn test_contracts_and_hazards() {
        let resolver = Resolver::new(vec![
            StackDescriptor::new("a", "eu-west-1").produces(key("/net/vpc/id")),
            StackDescriptor::new("b", "eu-west-1")
                .consumes(Dependency::hard(key("/net/vpc/id")))
                .consumes(Dependency::soft(key("/edge/distribution/id"))),
        ])
        .unwrap();

        let unsatisfied = resolver.unsatisfied_contracts();
        assert_eq!(unsatisfied.len(), 1);
        assert_eq!(unsatisfied[0].key, key("/edge/distribution/id"));

        // "b" reads a hard key from "a" without declaring the dependency.
        let hazards = resolver.ordering_hazards();
        assert_eq!(hazards.len(), 1);
        assert_eq!(hazards[0].producer, "a");
    }
}
