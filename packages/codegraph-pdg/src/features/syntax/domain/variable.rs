//! Variable identities as resolved by a syntax adapter

use serde::{Deserialize, Serialize};

/// Declaration identity, unique within one procedure (lambdas share the
/// counter of their enclosing method so captured bindings stay comparable)
pub type DeclId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "decl", rename_all = "snake_case")]
pub enum Binding {
    Local(DeclId),
    Parameter(DeclId),
    /// Enclosing-scope local seen from a lambda body
    Captured(DeclId),
    /// Field of the enclosing class, tracked by name
    Field,
    Unresolved,
}

/// Name + binding. Two occurrences are the same variable iff both match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub binding: Binding,
}

impl Variable {
    pub fn new(name: impl Into<String>, binding: Binding) -> Self {
        Self {
            name: name.into(),
            binding,
        }
    }

    pub fn local(name: impl Into<String>, decl: DeclId) -> Self {
        Self::new(name, Binding::Local(decl))
    }

    pub fn parameter(name: impl Into<String>, decl: DeclId) -> Self {
        Self::new(name, Binding::Parameter(decl))
    }

    pub fn captured(name: impl Into<String>, decl: DeclId) -> Self {
        Self::new(name, Binding::Captured(decl))
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::new(name, Binding::Field)
    }

    pub fn unresolved(name: impl Into<String>) -> Self {
        Self::new(name, Binding::Unresolved)
    }

    pub fn is_resolved(&self) -> bool {
        self.binding != Binding::Unresolved
    }

    /// Last `.`-separated segment (`this.count` -> `count`)
    pub fn bare_name(&self) -> &str {
        bare_name(&self.name)
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

pub fn bare_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// A write to a variable. Weak writes (array element, field of another
/// object) add a definition without killing earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarDef {
    pub var: Variable,
    pub strong: bool,
}

impl VarDef {
    pub fn strong(var: Variable) -> Self {
        Self { var, strong: true }
    }

    pub fn weak(var: Variable) -> Self {
        Self { var, strong: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_includes_binding() {
        let a = Variable::local("x", 1);
        let b = Variable::local("x", 2);
        assert_ne!(a, b);
        assert_eq!(a, Variable::local("x", 1));
        assert_ne!(Variable::field("x"), Variable::unresolved("x"));
    }

    #[test]
    fn test_bare_name() {
        assert_eq!(Variable::unresolved("this.count").bare_name(), "count");
        assert_eq!(Variable::unresolved("a.b.c").bare_name(), "c");
        assert_eq!(Variable::local("x", 0).bare_name(), "x");
    }
}
