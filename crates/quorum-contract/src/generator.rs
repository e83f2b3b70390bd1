//! Build-time contract generation.
//!
//! [`ContractGenerator`] scans Rust sources for `#[bridge_api]` traits,
//! derives a stable id for every `#[bridge]` method, validates the whole set
//! and renders the lookup table that the runtime `include!`s.
//!
//! Validation never picks a winner: every problem is collected as a
//! [`Diagnostic`] pointing at `file:line (Trait::method)` and generation
//! fails as a whole.

use crate::erase::{alias_token, erase_return, erase_type};
use crate::markers::{
    is_marker, ApiMarker, MethodMarker, OverloadPolicy, SignaturePolicy, API_MARKER,
    METHOD_MARKER,
};
use proc_macro2::Span;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use syn::spanned::Spanned;
use syn::{FnArg, Item, ItemTrait, TraitItem, TraitItemFn};
use thiserror::Error;

/// One attributable contract problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Errors produced while generating the contract.
#[derive(Error, Debug)]
pub enum ContractError {
    /// A source file or the output file could not be read or written.
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A scanned file is not valid Rust.
    #[error("Failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: syn::Error,
    },

    /// The marked methods do not form a valid contract.
    #[error("Invalid bridge contract:\n{}", render_diagnostics(.0))]
    Invalid(Vec<Diagnostic>),
}

impl ContractError {
    /// Diagnostics of an invalid contract; empty for other errors.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ContractError::Invalid(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|diagnostic| format!("  - {diagnostic}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A marked method as seen by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub stable_id: String,
    pub namespace: String,
    /// Name of the declaring trait.
    pub api: String,
    pub declaring_name: String,
    pub parameter_type_names: Vec<String>,
    pub return_type_name: String,
    pub introduced_at_version: u32,
    pub location: String,
    pub signature: SignaturePolicy,
    pub overloads: OverloadPolicy,
}

impl MethodSpec {
    /// Alias constant name: `METHOD__TOKEN1__TOKEN2`.
    pub fn alias(&self) -> String {
        let mut alias = self.declaring_name.to_ascii_uppercase();
        for parameter in &self.parameter_type_names {
            alias.push_str("__");
            alias.push_str(&alias_token(parameter));
        }
        alias
    }
}

/// Stable id for a method with the given marker options.
pub fn derive_stable_id(
    namespace: &str,
    name: &str,
    parameter_type_names: &[String],
    marker: &MethodMarker,
) -> String {
    if let Some(id) = &marker.stable_id {
        return id.clone();
    }
    if let Some(key) = &marker.overload_key {
        return format!("{namespace}#{name}:{key}");
    }
    match marker.signature {
        SignaturePolicy::ArityOnly => format!("{namespace}#{name}/{}", parameter_type_names.len()),
        SignaturePolicy::Full => format!("{namespace}#{name}({})", parameter_type_names.join(",")),
    }
}

/// Collects marked methods from sources and builds a [`Contract`].
#[derive(Debug, Default)]
pub struct ContractGenerator {
    methods: Vec<MethodSpec>,
    diagnostics: Vec<Diagnostic>,
}

impl ContractGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every `.rs` file below `root`, in path order.
    pub fn scan_dir(&mut self, root: &Path) -> Result<(), ContractError> {
        let mut files = Vec::new();
        collect_sources(root, &mut files)?;
        files.sort();

        for path in files {
            let source = fs::read_to_string(&path).map_err(|source| ContractError::Io {
                path: path.clone(),
                source,
            })?;
            self.scan_source(&path.display().to_string(), &source)?;
        }
        Ok(())
    }

    /// Scan one source text. `origin` is used in diagnostics.
    pub fn scan_source(&mut self, origin: &str, source: &str) -> Result<(), ContractError> {
        let file = syn::parse_file(source).map_err(|source| ContractError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        self.scan_items(origin, &file.items);
        Ok(())
    }

    /// Methods collected so far, in scan order.
    pub fn methods(&self) -> &[MethodSpec] {
        &self.methods
    }

    /// Validate everything scanned and produce the sorted contract.
    pub fn build(self) -> Result<Contract, ContractError> {
        let Self {
            mut methods,
            mut diagnostics,
        } = self;

        check_duplicate_ids(&methods, &mut diagnostics);
        check_module_names(&methods, &mut diagnostics);
        check_overloads(&methods, &mut diagnostics);
        check_aliases(&methods, &mut diagnostics);

        if !diagnostics.is_empty() {
            return Err(ContractError::Invalid(diagnostics));
        }

        methods.sort_by(|a, b| {
            a.namespace
                .cmp(&b.namespace)
                .then_with(|| a.stable_id.cmp(&b.stable_id))
        });
        Ok(Contract { methods })
    }

    fn scan_items(&mut self, origin: &str, items: &[Item]) {
        for item in items {
            match item {
                Item::Trait(item_trait) => self.scan_trait(origin, item_trait),
                Item::Mod(module) => {
                    if let Some((_, inner)) = &module.content {
                        self.scan_items(origin, inner);
                    }
                }
                _ => {}
            }
        }
    }

    fn scan_trait(&mut self, origin: &str, item: &ItemTrait) {
        let Some(attr) = item.attrs.iter().find(|attr| is_marker(attr, API_MARKER)) else {
            return;
        };
        let api = item.ident.to_string();

        let marker = match ApiMarker::from_attribute(attr) {
            Ok(marker) => marker,
            Err(err) => {
                self.diagnostics.push(Diagnostic {
                    location: format!("{origin}:{} ({api})", line_of(attr.span())),
                    message: err.to_string(),
                });
                return;
            }
        };

        for trait_item in &item.items {
            if let TraitItem::Fn(method) = trait_item {
                self.scan_method(origin, &marker.namespace, &api, method);
            }
        }
    }

    fn scan_method(&mut self, origin: &str, namespace: &str, api: &str, method: &TraitItemFn) {
        let Some(attr) = method
            .attrs
            .iter()
            .find(|attr| is_marker(attr, METHOD_MARKER))
        else {
            return;
        };
        let name = method.sig.ident.to_string();
        let location = format!(
            "{origin}:{} ({api}::{name})",
            line_of(method.sig.ident.span())
        );

        let marker = match MethodMarker::from_attribute(attr)
            .map_err(|err| err.to_string())
            .and_then(|marker| marker.validate().map(|()| marker))
        {
            Ok(marker) => marker,
            Err(message) => {
                self.diagnostics.push(Diagnostic { location, message });
                return;
            }
        };

        let parameter_type_names: Vec<String> = method
            .sig
            .inputs
            .iter()
            .filter_map(|input| match input {
                FnArg::Typed(arg) => Some(erase_type(&arg.ty)),
                FnArg::Receiver(_) => None,
            })
            .collect();
        let stable_id = derive_stable_id(namespace, &name, &parameter_type_names, &marker);

        self.methods.push(MethodSpec {
            stable_id,
            namespace: namespace.to_string(),
            api: api.to_string(),
            declaring_name: name,
            parameter_type_names,
            return_type_name: erase_return(&method.sig.output),
            introduced_at_version: marker.since,
            location,
            signature: marker.signature,
            overloads: marker.overloads,
        });
    }
}

fn line_of(span: Span) -> usize {
    span.start().line
}

fn collect_sources(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ContractError> {
    let io_error = |source| ContractError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            collect_sources(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
    Ok(())
}

fn check_duplicate_ids(methods: &[MethodSpec], diagnostics: &mut Vec<Diagnostic>) {
    let mut first: HashMap<&str, &MethodSpec> = HashMap::new();
    for method in methods {
        match first.get(method.stable_id.as_str()) {
            Some(existing) => diagnostics.push(Diagnostic {
                location: method.location.clone(),
                message: format!(
                    "duplicate stable id '{}', first defined at {}",
                    method.stable_id, existing.location
                ),
            }),
            None => {
                first.insert(&method.stable_id, method);
            }
        }
    }
}

/// Distinct namespaces must not share a generated `ids` module.
fn check_module_names(methods: &[MethodSpec], diagnostics: &mut Vec<Diagnostic>) {
    let mut first: HashMap<String, &MethodSpec> = HashMap::new();
    let mut reported: HashSet<&str> = HashSet::new();
    for method in methods {
        let module = module_name(&method.namespace);
        match first.get(&module) {
            Some(existing) if existing.namespace != method.namespace => {
                if reported.insert(method.namespace.as_str()) {
                    diagnostics.push(Diagnostic {
                        location: method.location.clone(),
                        message: format!(
                            "namespace '{}' maps to module '{module}' like namespace '{}' at {}",
                            method.namespace, existing.namespace, existing.location
                        ),
                    });
                }
            }
            Some(_) => {}
            None => {
                first.insert(module, method);
            }
        }
    }
}

fn check_overloads(methods: &[MethodSpec], diagnostics: &mut Vec<Diagnostic>) {
    let mut groups: BTreeMap<(&str, &str), Vec<&MethodSpec>> = BTreeMap::new();
    for method in methods {
        groups
            .entry((method.namespace.as_str(), method.declaring_name.as_str()))
            .or_default()
            .push(method);
    }

    for ((namespace, name), group) in groups {
        if group.len() < 2 {
            continue;
        }

        if group.iter().any(|m| m.overloads == OverloadPolicy::Error) {
            for method in &group {
                diagnostics.push(Diagnostic {
                    location: method.location.clone(),
                    message: format!(
                        "'{namespace}::{name}' forbids overloads but is declared {} times",
                        group.len()
                    ),
                });
            }
            continue;
        }

        let mut by_arity: BTreeMap<usize, Vec<&MethodSpec>> = BTreeMap::new();
        for method in &group {
            by_arity
                .entry(method.parameter_type_names.len())
                .or_default()
                .push(method);
        }
        for (arity, same) in by_arity {
            let arity_only = same
                .iter()
                .any(|m| m.signature == SignaturePolicy::ArityOnly);
            if same.len() > 1 && arity_only {
                for method in &same {
                    diagnostics.push(Diagnostic {
                        location: method.location.clone(),
                        message: format!(
                            "arity-only ids are ambiguous: {} overloads of '{namespace}::{name}' take {arity} parameter(s)",
                            same.len()
                        ),
                    });
                }
            }
        }
    }
}

fn check_aliases(methods: &[MethodSpec], diagnostics: &mut Vec<Diagnostic>) {
    let mut seen: HashMap<(&str, String), &MethodSpec> = HashMap::new();
    for method in methods {
        let alias = method.alias();
        let key = (method.namespace.as_str(), alias.clone());
        match seen.get(&key) {
            Some(existing) if existing.stable_id != method.stable_id => {
                diagnostics.push(Diagnostic {
                    location: method.location.clone(),
                    message: format!(
                        "alias '{}::{alias}' collides with {}",
                        method.namespace, existing.location
                    ),
                })
            }
            Some(_) => {}
            None => {
                seen.insert(key, method);
            }
        }
    }
}

/// A validated contract, sorted by namespace then stable id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    methods: Vec<MethodSpec>,
}

impl Contract {
    pub fn methods(&self) -> &[MethodSpec] {
        &self.methods
    }

    /// Render the Rust source of the contract table.
    ///
    /// The output expects `MethodDescriptor` to be in scope at the include
    /// site.
    pub fn render(&self) -> String {
        let mut out = CodeWriter::default();
        out.line("// @generated by quorum-contract from #[bridge_api] traits. Do not edit.");
        out.blank();

        out.line("/// Every bridgeable method, sorted by namespace then stable id.");
        out.open("pub static METHODS: &[MethodDescriptor] = &[");
        for method in &self.methods {
            let parameters = method
                .parameter_type_names
                .iter()
                .map(|name| format!("{name:?}"))
                .collect::<Vec<_>>()
                .join(", ");
            out.open("MethodDescriptor {");
            out.line(format!("stable_id: {:?},", method.stable_id));
            out.line(format!("declaring_name: {:?},", method.declaring_name));
            out.line(format!("parameter_type_names: &[{parameters}],"));
            out.line(format!("return_type_name: {:?},", method.return_type_name));
            out.line(format!("namespace: {:?},", method.namespace));
            out.line(format!(
                "introduced_at_version: {},",
                method.introduced_at_version
            ));
            out.close("},");
        }
        out.close("];");
        out.blank();

        out.line("/// Descriptor for `stable_id`, if this build's contract exposes it.");
        out.open("pub fn lookup(stable_id: &str) -> Option<&'static MethodDescriptor> {");
        out.open("let index: usize = match stable_id {");
        for (index, method) in self.methods.iter().enumerate() {
            out.line(format!("{:?} => {index},", method.stable_id));
        }
        out.line("_ => return None,");
        out.close("};");
        out.line("METHODS.get(index)");
        out.close("}");
        out.blank();

        let mut namespaces: BTreeMap<&str, Vec<(String, &str)>> = BTreeMap::new();
        for method in &self.methods {
            namespaces
                .entry(method.namespace.as_str())
                .or_default()
                .push((method.alias(), method.stable_id.as_str()));
        }

        out.line("/// Readable aliases for the stable ids, grouped by namespace.");
        out.open("pub mod ids {");
        for (namespace, mut aliases) in namespaces {
            aliases.sort();
            out.open(format!("pub mod {} {{", module_name(namespace)));
            for (alias, stable_id) in aliases {
                out.line(format!("pub const {alias}: &str = {stable_id:?};"));
            }
            out.close("}");
        }
        out.close("}");

        out.finish()
    }

    /// Write the rendered contract, leaving an identical file untouched.
    ///
    /// Returns whether the file was rewritten.
    pub fn write_to(&self, path: &Path) -> Result<bool, ContractError> {
        let rendered = self.render();
        if fs::read_to_string(path).is_ok_and(|existing| existing == rendered) {
            return Ok(false);
        }
        fs::write(path, rendered).map_err(|source| ContractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }
}

fn module_name(namespace: &str) -> String {
    let name: String = namespace
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("ns_{name}")
    } else {
        name
    }
}

#[derive(Default)]
struct CodeWriter {
    out: String,
    depth: usize,
}

impl CodeWriter {
    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANAGER_API: &str = r#"
#[bridge_api(namespace = "service_manager")]
pub trait ServiceManager: Reflect {
    #[bridge]
    fn service(&self, name: &str) -> BridgeResult<Option<Arc<dyn Service>>>;

    #[bridge]
    fn all_services(&self) -> BridgeResult<Vec<Arc<dyn Service>>>;

    fn local_only(&self) -> usize;
}
"#;

    const LIBRARY_API: &str = r#"
#[bridge_api(namespace = "library")]
pub trait LibraryApi: Service {
    #[bridge(stable_id = "LIB_API_SHUTDOWN")]
    fn shutdown(&self) -> BridgeResult<()>;
}
"#;

    fn generate(sources: &[(&str, &str)]) -> Result<Contract, ContractError> {
        let mut generator = ContractGenerator::new();
        for (origin, source) in sources {
            generator.scan_source(origin, source)?;
        }
        generator.build()
    }

    fn ids(contract: &Contract) -> Vec<&str> {
        contract
            .methods()
            .iter()
            .map(|m| m.stable_id.as_str())
            .collect()
    }

    #[test]
    fn test_derived_and_explicit_ids_sorted_by_namespace() {
        let contract = generate(&[("manager.rs", MANAGER_API), ("library.rs", LIBRARY_API)]).unwrap();
        assert_eq!(
            ids(&contract),
            vec![
                "LIB_API_SHUTDOWN",
                "service_manager#all_services()",
                "service_manager#service(str)",
            ]
        );

        let service = &contract.methods()[2];
        assert_eq!(service.declaring_name, "service");
        assert_eq!(service.parameter_type_names, vec!["str".to_string()]);
        assert_eq!(service.return_type_name, "Option");
        assert_eq!(service.api, "ServiceManager");
        assert_eq!(service.introduced_at_version, 1);
    }

    #[test]
    fn test_overload_key_and_arity_ids() {
        let source = r#"
#[bridge_api(namespace = "cfg")]
trait DefaultConfig {
    #[bridge(overload_key = "default")]
    fn create(&self, owner: &OwnerRef) -> ConfigSnapshot;
}

#[bridge_api(namespace = "cfg")]
trait NamedConfig {
    #[bridge(signature = "arity_only", since = 2)]
    fn create(&self, owner: &OwnerRef, file: &str) -> ConfigSnapshot;
}
"#;
        let contract = generate(&[("cfg.rs", source)]).unwrap();
        assert_eq!(ids(&contract), vec!["cfg#create/2", "cfg#create:default"]);
        assert_eq!(contract.methods()[0].introduced_at_version, 2);
    }

    #[test]
    fn test_duplicate_ids_report_both_locations() {
        let source = r#"
#[bridge_api(namespace = "a")]
trait First {
    #[bridge(stable_id = "SAME")]
    fn one(&self);
}

#[bridge_api(namespace = "b")]
trait Second {
    #[bridge(stable_id = "SAME")]
    fn two(&self);
}
"#;
        let err = generate(&[("dup.rs", source)]).unwrap_err();
        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].location, "dup.rs:11 (Second::two)");
        assert!(diagnostics[0]
            .message
            .contains("first defined at dup.rs:5 (First::one)"));
    }

    #[test]
    fn test_blank_stable_id_fails() {
        let source = r#"
#[bridge_api(namespace = "a")]
trait Blank {
    #[bridge(stable_id = "   ")]
    fn blank(&self);
}
"#;
        let err = generate(&[("blank.rs", source)]).unwrap_err();
        assert_eq!(err.diagnostics().len(), 1);
        assert!(err.diagnostics()[0].message.contains("must not be blank"));
    }

    #[test]
    fn test_forbidden_overload_fails_every_declaration() {
        let source = r#"
#[bridge_api(namespace = "lookup")]
trait ByName {
    #[bridge(overloads = "error")]
    fn find(&self, name: &str) -> Option<Uuid>;
}

#[bridge_api(namespace = "lookup")]
trait ById {
    #[bridge]
    fn find(&self, id: Uuid, exact: bool) -> Option<Uuid>;
}
"#;
        let err = generate(&[("overload.rs", source)]).unwrap_err();
        assert_eq!(err.diagnostics().len(), 2);
        assert!(err
            .diagnostics()
            .iter()
            .all(|d| d.message.contains("forbids overloads")));
    }

    #[test]
    fn test_ambiguous_arity_only_overloads_fail() {
        let source = r#"
#[bridge_api(namespace = "lookup")]
trait ByName {
    #[bridge(signature = "arity_only")]
    fn find(&self, name: &str) -> Option<Uuid>;
}

#[bridge_api(namespace = "lookup")]
trait ById {
    #[bridge]
    fn find(&self, id: Uuid) -> Option<Uuid>;
}
"#;
        let err = generate(&[("arity.rs", source)]).unwrap_err();
        assert_eq!(err.diagnostics().len(), 2);
        assert!(err.to_string().contains("arity-only ids are ambiguous"));
    }

    #[test]
    fn test_full_signature_overloads_are_allowed() {
        let source = r#"
#[bridge_api(namespace = "lookup")]
trait ByName {
    #[bridge]
    fn find(&self, name: &str) -> Option<Uuid>;
}

#[bridge_api(namespace = "lookup")]
trait ById {
    #[bridge]
    fn find(&self, id: Uuid) -> Option<Uuid>;
}
"#;
        let contract = generate(&[("overload.rs", source)]).unwrap();
        assert_eq!(ids(&contract), vec!["lookup#find(Uuid)", "lookup#find(str)"]);
    }

    #[test]
    fn test_colliding_aliases_fail() {
        let source = r#"
#[bridge_api(namespace = "cache")]
trait Text {
    #[bridge(overload_key = "text")]
    fn get(&self, key: Option<String>);
}

#[bridge_api(namespace = "cache")]
trait Number {
    #[bridge(overload_key = "number")]
    fn get(&self, key: Option<u32>);
}
"#;
        let err = generate(&[("alias.rs", source)]).unwrap_err();
        assert_eq!(err.diagnostics().len(), 1);
        assert!(err.diagnostics()[0]
            .message
            .contains("alias 'cache::GET__OPTION'"));
    }

    #[test]
    fn test_namespaces_sharing_a_module_fail() {
        let source = r#"
#[bridge_api(namespace = "a-b")]
trait Dashed {
    #[bridge]
    fn one(&self);
}

#[bridge_api(namespace = "a_b")]
trait Underscored {
    #[bridge]
    fn two(&self);

    #[bridge]
    fn three(&self);
}
"#;
        let err = generate(&[("modules.rs", source)]).unwrap_err();
        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].location, "modules.rs:11 (Underscored::two)");
        assert!(diagnostics[0]
            .message
            .contains("maps to module 'a_b' like namespace 'a-b' at modules.rs:5 (Dashed::one)"));
    }

    #[test]
    fn test_render_is_independent_of_scan_order() {
        let forward = generate(&[("manager.rs", MANAGER_API), ("library.rs", LIBRARY_API)]).unwrap();
        let backward = generate(&[("library.rs", LIBRARY_API), ("manager.rs", MANAGER_API)]).unwrap();
        assert_eq!(forward.render(), backward.render());
    }

    #[test]
    fn test_render_contents() {
        let contract = generate(&[("manager.rs", MANAGER_API), ("library.rs", LIBRARY_API)]).unwrap();
        let rendered = contract.render();

        assert!(rendered.contains("stable_id: \"service_manager#service(str)\","));
        assert!(rendered.contains("parameter_type_names: &[\"str\"],"));
        assert!(rendered.contains("\"LIB_API_SHUTDOWN\" => 0,"));
        assert!(rendered.contains("pub mod service_manager {"));
        assert!(rendered.contains("pub const SERVICE__STR: &str = \"service_manager#service(str)\";"));
        assert!(rendered.contains("pub const ALL_SERVICES: &str = \"service_manager#all_services()\";"));
        assert!(rendered.contains("pub const SHUTDOWN: &str = \"LIB_API_SHUTDOWN\";"));
        assert!(!rendered.contains("local_only"));
    }

    #[test]
    fn test_scan_dir_recurses_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("library.rs"), LIBRARY_API).unwrap();
        fs::write(nested.join("manager.rs"), MANAGER_API).unwrap();
        fs::write(dir.path().join("notes.txt"), "not rust").unwrap();

        let mut generator = ContractGenerator::new();
        generator.scan_dir(dir.path()).unwrap();
        assert_eq!(generator.methods().len(), 3);

        let contract = generator.build().unwrap();
        let out = dir.path().join("bridge_contract.rs");
        assert!(contract.write_to(&out).unwrap());
        assert!(!contract.write_to(&out).unwrap());
        assert_eq!(fs::read_to_string(&out).unwrap(), contract.render());
    }

    #[test]
    fn test_parse_errors_name_the_origin() {
        let err = generate(&[("broken.rs", "trait {")]).unwrap_err();
        assert!(matches!(err, ContractError::Parse { ref origin, .. } if origin == "broken.rs"));
    }
}
