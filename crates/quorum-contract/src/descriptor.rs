//! Runtime-visible method descriptors.

use std::fmt;

/// One bridgeable operation, as emitted into the generated contract table.
///
/// Parameter and return types are erased names rather than type objects:
/// two independently loaded copies of a type never compare equal, their
/// names do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Process-wide unique key for this operation.
    pub stable_id: &'static str,
    /// Method name as declared on the marked trait.
    pub declaring_name: &'static str,
    /// Erased parameter type names, receiver excluded.
    pub parameter_type_names: &'static [&'static str],
    /// Erased return type name.
    pub return_type_name: &'static str,
    /// Logical namespace of the declaring trait.
    pub namespace: &'static str,
    /// Protocol version that introduced the operation.
    pub introduced_at_version: u32,
}

impl MethodDescriptor {
    /// Number of parameters, receiver excluded.
    pub fn arity(&self) -> usize {
        self.parameter_type_names.len()
    }

    /// `name(T1,T2)` rendering used in diagnostics.
    pub fn signature(&self) -> String {
        format!(
            "{}({})",
            self.declaring_name,
            self.parameter_type_names.join(",")
        )
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} => {}::{} -> {}",
            self.stable_id,
            self.namespace,
            self.signature(),
            self.return_type_name
        )
    }
}
