//! Utility functions for the container
//!
//! This module provides common utility functions used throughout the crate,
//! covering bean naming conventions and dependency-graph ordering.

/// Naming convention utilities for bean names
pub mod naming {
    /// Converts a PascalCase type name to camelCase for bean naming.
    ///
    /// This is the default bean naming strategy, where `UserService`
    /// becomes `userService`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wisteria_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("UserService"), "userService");
    /// assert_eq!(to_camel_case("DatabaseConnectionPool"), "databaseConnectionPool");
    /// assert_eq!(to_camel_case("A"), "a");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }

    /// Strips module path and generic arguments from a full type name.
    ///
    /// # Examples
    ///
    /// ```
    /// use wisteria_core::utils::naming::short_type_name;
    ///
    /// assert_eq!(short_type_name("myapp::services::UserService"), "UserService");
    /// assert_eq!(short_type_name("alloc::vec::Vec<alloc::string::String>"), "Vec");
    /// assert_eq!(short_type_name("UserService"), "UserService");
    /// ```
    pub fn short_type_name(s: &str) -> &str {
        let base = s.split('<').next().unwrap_or(s);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// The default bean name for a type: the short type name in camelCase.
    ///
    /// # Examples
    ///
    /// ```
    /// use wisteria_core::utils::naming::default_bean_name;
    ///
    /// assert_eq!(default_bean_name("myapp::services::UserService"), "userService");
    /// ```
    pub fn default_bean_name(type_name: &str) -> String {
        to_camel_case(short_type_name(type_name))
    }
}

/// Dependency graph ordering
pub mod dependency {
    use std::collections::{HashMap, HashSet, VecDeque};

    /// Topologically sorts `nodes` so that every node comes after the nodes
    /// it depends on. `edges` maps a node to its dependencies; edges to nodes
    /// outside `nodes` are ignored. Ties keep the input order, so the result
    /// is deterministic.
    ///
    /// Returns the unsortable remainder (the cycle participants) on failure.
    pub fn topological_sort(
        nodes: &[String],
        edges: &HashMap<String, Vec<String>>,
    ) -> Result<Vec<String>, Vec<String>> {
        let node_set: HashSet<&str> = nodes.iter().map(String::as_str).collect();
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for node in nodes {
            let deps: Vec<&str> = edges
                .get(node)
                .map(|ds| {
                    ds.iter()
                        .map(String::as_str)
                        .filter(|d| node_set.contains(d))
                        .collect()
                })
                .unwrap_or_default();
            in_degree.insert(node.as_str(), deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(node.as_str());
            }
        }

        let mut queue: VecDeque<&str> = nodes
            .iter()
            .map(String::as_str)
            .filter(|n| in_degree.get(n) == Some(&0))
            .collect();
        let mut sorted = Vec::with_capacity(nodes.len());

        while let Some(node) = queue.pop_front() {
            sorted.push(node.to_string());
            if let Some(deps) = dependents.get(node) {
                for dependent in deps {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if sorted.len() == nodes.len() {
            Ok(sorted)
        } else {
            let remaining: Vec<String> = nodes
                .iter()
                .filter(|n| in_degree.get(n.as_str()).is_some_and(|d| *d > 0))
                .cloned()
                .collect();
            Err(remaining)
        }
    }
}
