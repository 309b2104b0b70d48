//! Dependency descriptors and candidate selection.
//!
//! The factory gathers candidates by provided type; this module decides what
//! a given injection point actually asks for (one bean, all beans as a list,
//! all beans as a name-keyed map) and which single candidate wins when
//! several match.

use crate::convert::{TypeDescriptor, TypeKind};
use crate::error::{ContainerError, ContainerResult};

/// What shape of injection the dependency asks for.
#[derive(Clone, Debug)]
pub enum DependencyShape {
    /// Exactly one bean of the element type.
    Single(TypeDescriptor),
    /// Every matching bean, ordered.
    List(TypeDescriptor),
    /// Every matching bean keyed by bean name.
    Map(TypeDescriptor),
}

/// A resolvable injection point: the requested type plus resolution
/// modifiers.
#[derive(Clone, Debug)]
pub struct DependencyDescriptor {
    pub shape: DependencyShape,
    pub required: bool,
    pub lazy: bool,
    /// Bean that declares this injection point, for error reporting and
    /// self-exclusion.
    pub containing_bean: Option<String>,
}

impl DependencyDescriptor {
    /// Derives the shape from the declared descriptor: list and map targets
    /// become collection injections of their element type, everything else is
    /// a single-bean injection.
    pub fn from_descriptor(descriptor: &TypeDescriptor) -> Self {
        let shape = match descriptor.kind() {
            TypeKind::List(element) => DependencyShape::List((**element).clone()),
            TypeKind::Map(_, value) => DependencyShape::Map((**value).clone()),
            _ => DependencyShape::Single(descriptor.clone()),
        };
        DependencyDescriptor {
            shape,
            required: true,
            lazy: false,
            containing_bean: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn for_bean(mut self, name: impl Into<String>) -> Self {
        self.containing_bean = Some(name.into());
        self
    }

    pub fn element_type(&self) -> &TypeDescriptor {
        match &self.shape {
            DependencyShape::Single(t)
            | DependencyShape::List(t)
            | DependencyShape::Map(t) => t,
        }
    }

    pub fn requester(&self) -> &str {
        self.containing_bean.as_deref().unwrap_or("<unknown>")
    }
}

/// A matching bean for an injection point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub primary: bool,
    pub order: Option<i32>,
}

/// Picks the winning candidate for a single-bean injection.
///
/// One candidate wins outright. With several, a unique primary wins; failing
/// that, a unique lowest explicit order wins. Anything else is ambiguous.
pub fn select_candidate(
    descriptor: &DependencyDescriptor,
    candidates: &[Candidate],
) -> ContainerResult<Candidate> {
    match candidates {
        [] => Err(ContainerError::NoMatchingBean {
            requester: descriptor.requester().to_string(),
            type_name: descriptor.element_type().name().to_string(),
        }),
        [only] => Ok(only.clone()),
        several => {
            let primaries: Vec<&Candidate> = several.iter().filter(|c| c.primary).collect();
            if let [winner] = primaries.as_slice() {
                return Ok((*winner).clone());
            }
            if primaries.is_empty() {
                let lowest = several.iter().filter_map(|c| c.order).min();
                if let Some(order) = lowest {
                    let winners: Vec<&Candidate> = several
                        .iter()
                        .filter(|c| c.order == Some(order))
                        .collect();
                    if let [winner] = winners.as_slice() {
                        return Ok((*winner).clone());
                    }
                }
            }
            Err(ContainerError::AmbiguousDependency {
                requester: descriptor.requester().to_string(),
                type_name: descriptor.element_type().name().to_string(),
                candidates: several.iter().map(|c| c.name.clone()).collect(),
            })
        }
    }
}

/// Sorts candidates for collection injection: explicit order ascending,
/// unordered candidates after ordered ones, ties keep definition order.
pub fn order_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by_key(|c| match c.order {
        Some(order) => (0, order),
        None => (1, 0),
    });
}
