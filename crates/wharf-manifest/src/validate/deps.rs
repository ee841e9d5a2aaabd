//! Container dependency graph checks.

use std::collections::{BTreeMap, BTreeSet};

use crate::image::{ContainerStatus, DependsOn, Image, SidecarConfig};

use super::{DependencyError, ValidationError, ValidationResult};

/// Startup dependencies between the main container and its sidecars.
///
/// Nodes are visited in name order, so the reported failure is stable for a
/// given manifest.
#[derive(Debug)]
pub struct ContainerGraph<'a> {
    containers: BTreeMap<&'a str, Container<'a>>,
}

#[derive(Debug)]
struct Container<'a> {
    essential: bool,
    /// More than one entry when a sidecar shares the main container's name.
    depends_on: Vec<&'a DependsOn>,
}

impl<'a> Container<'a> {
    fn edges(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.depends_on.iter().copied().flat_map(DependsOn::iter)
    }
}

impl<'a> ContainerGraph<'a> {
    /// Build the graph for a workload whose main container is named `main`.
    pub fn new(main: &'a str, image: &'a Image, sidecars: &'a BTreeMap<String, SidecarConfig>) -> Self {
        let mut containers: BTreeMap<&'a str, Container<'a>> = sidecars
            .iter()
            .map(|(name, sidecar)| {
                let node = Container {
                    essential: sidecar.is_essential(),
                    depends_on: vec![&sidecar.depends_on],
                };
                (name.as_str(), node)
            })
            .collect();
        let node = containers.entry(main).or_insert(Container {
            essential: true,
            depends_on: Vec::new(),
        });
        node.essential = true;
        node.depends_on.insert(0, &image.depends_on);
        Self { containers }
    }

    /// Check statuses, edges and acyclicity, in that order.
    pub fn validate(&self) -> ValidationResult {
        self.check().map_err(ValidationError::Dependencies)
    }

    fn check(&self) -> Result<(), DependencyError> {
        self.check_essential_status()?;
        self.check_edges()?;
        match self.find_cycle() {
            Some(cycle) => Err(DependencyError::Circular(cycle)),
            None => Ok(()),
        }
    }

    /// Essential containers can only be waited on until they start or are healthy.
    fn check_essential_status(&self) -> Result<(), DependencyError> {
        for (name, container) in &self.containers {
            for (target, status) in container.edges() {
                let Some(dependency) = self.containers.get(target) else {
                    continue;
                };
                if !dependency.essential {
                    continue;
                }
                let allowed = status
                    .parse::<ContainerStatus>()
                    .is_ok_and(ContainerStatus::allowed_for_essential);
                if !allowed {
                    return Err(DependencyError::EssentialStatus {
                        container: name.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_edges(&self) -> Result<(), DependencyError> {
        for (name, container) in &self.containers {
            for (target, _) in container.edges() {
                if target == *name {
                    return Err(DependencyError::SelfDependency(name.to_string()));
                }
                if !self.containers.contains_key(target) {
                    return Err(DependencyError::UnknownContainer(target.to_string()));
                }
            }
        }
        Ok(())
    }

    /// First cycle found by a depth-first walk, listed from the repeated node.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = BTreeSet::new();
        let mut path = Vec::new();
        self.containers
            .keys()
            .find_map(|name| self.visit(*name, &mut visited, &mut path))
    }

    fn visit(
        &self,
        node: &'a str,
        visited: &mut BTreeSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(start) = path.iter().position(|n| *n == node) {
            return Some(path[start..].iter().map(|n| n.to_string()).collect());
        }
        if !visited.insert(node) {
            return None;
        }

        path.push(node);
        if let Some(container) = self.containers.get(node) {
            for (target, _) in container.edges() {
                if let Some(cycle) = self.visit(target, visited, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }
}
